//! Command parsing for the control panel.
//!
//! This module parses command strings into structured [`Command`] values.

use whale_proto::{Pattern, PeerId, Rgb};

/// Parsed command from user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Touch a whale.
    Touch {
        /// Whale touched.
        peer: PeerId,
    },

    /// Set the shared color.
    Color {
        /// New color.
        color: Rgb,
    },

    /// Set the shared pattern.
    Pattern {
        /// New pattern.
        pattern: Pattern,
    },

    /// Publish an online heartbeat.
    Heartbeat,

    /// Republish color and pattern.
    Sync,

    /// Switch every device off.
    Off,

    /// Print connection state, rings and counters.
    Status,

    /// Break the broker link to exercise reconnects.
    Drop,

    /// Start connecting.
    Start,

    /// Stop and release the transport.
    Stop,

    /// Print the command list.
    Help,

    /// Quit the application.
    Quit,

    /// Blank line.
    Empty,

    /// Unknown or invalid command.
    Unknown {
        /// The original input.
        input: String,
    },

    /// Command with missing or invalid arguments.
    InvalidArgs {
        /// Command name.
        command: String,
        /// Error message.
        error: String,
    },
}

/// One line per command, for `/help`.
pub const HELP: &str = "\
/touch <1|2>             touch a whale
/color <r,g,b|#hex|name> set the shared color
/pattern <name>          set the shared pattern
/heartbeat               publish an online heartbeat
/sync                    republish color and pattern
/off                     switch every whale off
/status                  show rings and counters
/drop                    break the broker link
/start, /stop            connect or disconnect
/quit                    exit";

fn invalid(command: &str, error: impl Into<String>) -> Command {
    Command::InvalidArgs { command: command.into(), error: error.into() }
}

fn parse_peer(raw: &str) -> Option<PeerId> {
    match raw {
        "1" => Some(PeerId::Whale1),
        "2" => Some(PeerId::Whale2),
        other => other.parse().ok(),
    }
}

/// Parse a user input string into a command.
///
/// Commands start with `/`.
pub fn parse(input: &str) -> Command {
    let input = input.trim();

    if input.is_empty() {
        return Command::Empty;
    }

    let Some(cmd_str) = input.strip_prefix('/') else {
        return Command::Unknown { input: input.to_string() };
    };

    let parts: Vec<&str> = cmd_str.split_whitespace().collect();
    let command = parts.first().copied().unwrap_or("");

    match command {
        "touch" | "t" => match parts.get(1) {
            Some(raw) => match parse_peer(raw) {
                Some(peer) => Command::Touch { peer },
                None => invalid("touch", format!("Unknown whale: {raw}")),
            },
            None => invalid("touch", "Usage: /touch <1|2>"),
        },

        "color" | "c" => match parts.get(1) {
            Some(raw) => match raw.parse::<Rgb>() {
                Ok(color) => Command::Color { color },
                Err(e) => invalid("color", e.to_string()),
            },
            None => invalid("color", "Usage: /color <r,g,b|#rrggbb|preset>"),
        },

        "pattern" | "p" => match parts.get(1) {
            Some(raw) => match raw.parse::<Pattern>() {
                Ok(pattern) => Command::Pattern { pattern },
                Err(e) => invalid("pattern", e.to_string()),
            },
            None => invalid("pattern", "Usage: /pattern <name>"),
        },

        "heartbeat" | "hb" => Command::Heartbeat,

        "sync" => Command::Sync,

        "off" => Command::Off,

        "status" | "s" => Command::Status,

        "drop" => Command::Drop,

        "start" => Command::Start,

        "stop" => Command::Stop,

        "help" | "h" | "?" => Command::Help,

        "quit" | "q" => Command::Quit,

        _ => Command::Unknown { input: input.to_string() },
    }
}
