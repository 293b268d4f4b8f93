//! Transport that records every call and replays scripted events.
//!
//! Useful for asserting that nothing reached the transport (offline
//! fallbacks) and for feeding exact event sequences to a runtime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use whale_core::{ConnectOptions, Transport, TransportError, TransportEvent, TransportHandle};

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// `Transport::connect`
    Connect(ConnectOptions),
    /// `TransportHandle::subscribe`
    Subscribe(Vec<String>),
    /// `TransportHandle::publish`
    Publish {
        /// Topic
        topic: String,
        /// Payload
        payload: Bytes,
    },
    /// `TransportHandle::disconnect`
    Disconnect,
}

#[derive(Debug, Default)]
struct Recorder {
    calls: Vec<TransportCall>,
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    fail_subscribe: bool,
    failing_connects: usize,
}

/// Recording transport. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    inner: Arc<Mutex<Recorder>>,
}

impl RecordingTransport {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorder> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.lock().calls.clone()
    }

    /// Only the publishes, as `(topic, payload text)`.
    pub fn publishes(&self) -> Vec<(String, String)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                TransportCall::Publish { topic, payload } => {
                    Some((topic.clone(), String::from_utf8_lossy(payload).into_owned()))
                },
                _ => None,
            })
            .collect()
    }

    /// Deliver `event` to the most recently connected handle.
    ///
    /// Returns false when no handle is listening.
    pub fn push_event(&self, event: TransportEvent) -> bool {
        self.lock().events.as_ref().is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Make the next `count` connects fail. The attempts are still recorded.
    pub fn fail_connects(&self, count: usize) {
        self.lock().failing_connects = count;
    }

    /// End the current handle's event stream, as a transport that gave up.
    pub fn finish_handle(&self) {
        self.lock().events = None;
    }

    /// Number of connect attempts so far.
    pub fn connect_attempts(&self) -> usize {
        self.lock().calls.iter().filter(|call| matches!(call, TransportCall::Connect(_))).count()
    }

    /// Make subsequent subscribes fail.
    pub fn fail_subscribe(&self, fail: bool) {
        self.lock().fail_subscribe = fail;
    }

    fn record(&self, call: TransportCall) {
        self.lock().calls.push(call);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    type Handle = RecordingHandle;

    async fn connect(&self, options: &ConnectOptions) -> Result<RecordingHandle, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut inner = self.lock();
            inner.calls.push(TransportCall::Connect(options.clone()));
            if inner.failing_connects > 0 {
                inner.failing_connects -= 1;
                return Err(TransportError::Connect("refused".into()));
            }
            inner.events = Some(tx);
        }
        Ok(RecordingHandle { recorder: self.clone(), events: rx })
    }
}

/// Handle of a [`RecordingTransport`].
#[derive(Debug)]
pub struct RecordingHandle {
    recorder: RecordingTransport,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
impl TransportHandle for RecordingHandle {
    async fn subscribe(&mut self, topics: &[String]) -> Result<(), TransportError> {
        self.recorder.record(TransportCall::Subscribe(topics.to_vec()));
        if self.recorder.lock().fail_subscribe {
            return Err(TransportError::Subscribe("rejected".into()));
        }
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        self.recorder.record(TransportCall::Publish { topic: topic.to_string(), payload });
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    async fn disconnect(&mut self) {
        self.recorder.record(TransportCall::Disconnect);
        self.events.close();
    }
}
