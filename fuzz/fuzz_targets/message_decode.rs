//! Decode arbitrary payloads on every topic kind.
//!
//! Decoding must never panic, and anything that decodes must decode again
//! to the same message from its own encoding.

#![no_main]

use libfuzzer_sys::fuzz_target;
use whale_proto::{Message, TopicKind};

fuzz_target!(|data: &[u8]| {
    for kind in TopicKind::ALL {
        let Ok(message) = Message::decode(kind, data) else {
            continue;
        };
        assert_eq!(message.kind(), kind);

        let encoded = message.encode();
        let again = Message::decode(kind, encoded.as_bytes());
        assert_eq!(again.as_ref(), Ok(&message), "re-decode of {encoded:?}");
    }
});
