//! Whale pair control panel.
//!
//! Runs a session against an in-process broker and reads slash commands from
//! stdin. Logs go to stderr, controlled by `RUST_LOG`.

use std::{
    io::{self, Write},
    time::Duration,
};

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;
use whale_app::{Runtime, RuntimeConfig, RuntimeHandle, SystemEnv};
use whale_cli::{
    CliError, Command,
    commands::{self, HELP},
    display,
};
use whale_core::{ConnectOptions, Environment, PublishStatus, SessionConfig};
use whale_harness::MemoryBroker;
use whale_proto::PairingId;

/// Whale pair control panel
#[derive(Parser, Debug)]
#[command(name = "whale-panel")]
#[command(about = "Control panel for a pair of touch-responsive whales")]
struct Args {
    /// Pairing id shared by both whales
    #[arg(long, default_value = "whale_pair_jeff_friend")]
    pair: String,

    /// How long a whale responds after the other one is touched
    #[arg(long, default_value = "5000")]
    response_ms: u64,

    /// Publish an online heartbeat this often while connected
    #[arg(long)]
    heartbeat_secs: Option<u64>,

    /// Do not connect on startup
    #[arg(long)]
    offline: bool,

    /// Fraction of broker messages to drop
    #[arg(long, default_value = "0.0")]
    loss: f64,

    /// Seed for the broker's loss RNG
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Render interval in milliseconds
    #[arg(long, default_value = "16")]
    frame_ms: u64,
}

impl Args {
    fn runtime_config(&self, unix_millis: u64) -> RuntimeConfig {
        RuntimeConfig {
            session: SessionConfig {
                pairing: PairingId::new(self.pair.clone()),
                connect: ConnectOptions {
                    client_id: ConnectOptions::client_id_at(unix_millis),
                    ..ConnectOptions::default()
                },
                response_duration: Duration::from_millis(self.response_ms),
                ..SessionConfig::default()
            },
            frame_interval: Duration::from_millis(self.frame_ms),
            heartbeat_interval: self.heartbeat_secs.map(Duration::from_secs),
            auto_start: !self.offline,
            ..RuntimeConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let env = SystemEnv;
    let config = args.runtime_config(env.unix_millis());

    let broker = MemoryBroker::with_seed(args.seed);
    broker.set_loss_rate(args.loss);

    info!(pair = %args.pair, client_id = %config.session.connect.client_id, "starting panel");
    let runtime = Runtime::spawn(broker.transport(), env, config);

    let result = run(&runtime, &broker).await;
    runtime.shutdown().await?;
    result
}

async fn run(runtime: &RuntimeHandle, broker: &MemoryBroker) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut notices = runtime.notices();
    let control = runtime.control();

    writeln!(stdout, "Type /help for commands")?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };

                let status = match commands::parse(&line) {
                    Command::Touch { peer } => Some(control.touch(peer).await?),
                    Command::Color { color } => Some(control.set_color(color).await?),
                    Command::Pattern { pattern } => Some(control.set_pattern(pattern).await?),
                    Command::Heartbeat => Some(control.heartbeat().await?),
                    Command::Sync => Some(control.sync_all().await?),
                    Command::Off => Some(control.turn_off().await?),
                    Command::Status => {
                        writeln!(stdout, "{}", display::format_status(&runtime.snapshot()))?;
                        writeln!(stdout, "{}", display::format_frame(&runtime.frames().borrow()))?;
                        None
                    },
                    Command::Drop => {
                        broker.drop_connections();
                        None
                    },
                    Command::Start => {
                        if let Err(e) = control.start().await {
                            writeln!(stdout, "Cannot start: {e}")?;
                        }
                        None
                    },
                    Command::Stop => {
                        control.stop().await?;
                        None
                    },
                    Command::Help => {
                        writeln!(stdout, "{HELP}")?;
                        None
                    },
                    Command::Quit => return Ok(()),
                    Command::Empty => None,
                    Command::Unknown { input } => {
                        writeln!(stdout, "Unknown command: {input}")?;
                        None
                    },
                    Command::InvalidArgs { command, error } => {
                        writeln!(stdout, "/{command}: {error}")?;
                        None
                    },
                };

                if status == Some(PublishStatus::Sent) {
                    writeln!(stdout, "sent")?;
                }
            },

            notice = notices.recv() => match notice {
                Ok(notice) => writeln!(stdout, "{}", display::format_notice(&notice))?,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    writeln!(stdout, "({n} notices skipped)")?;
                },
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return Ok(()),
            },

            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}
