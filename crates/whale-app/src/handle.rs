//! Control surface handle.
//!
//! The only way to mutate a running session from outside: every method sends
//! a command to the session task and waits for its reply, so calls are
//! applied one at a time in the order they arrive.

use tokio::sync::{mpsc, oneshot};
use whale_core::{ConnectionError, PublishStatus};
use whale_proto::{Pattern, PeerId, Rgb};

use crate::error::RuntimeError;

/// Commands for the session task.
#[derive(Debug)]
pub(crate) enum Command {
    Start(oneshot::Sender<Result<(), ConnectionError>>),
    Stop(oneshot::Sender<()>),
    Touch(PeerId, oneshot::Sender<PublishStatus>),
    SetColor(Rgb, oneshot::Sender<PublishStatus>),
    SetPattern(Pattern, oneshot::Sender<PublishStatus>),
    Heartbeat(oneshot::Sender<PublishStatus>),
    SyncAll(oneshot::Sender<PublishStatus>),
    TurnOff(oneshot::Sender<PublishStatus>),
}

/// Cloneable handle for issuing control commands.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    commands: mpsc::Sender<Command>,
}

impl ControlHandle {
    pub(crate) fn new(commands: mpsc::Sender<Command>) -> Self {
        Self { commands }
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(build(tx)).await.map_err(|_| RuntimeError::Closed)?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    /// Start connecting.
    ///
    /// # Errors
    ///
    /// `Connection` if already started, `Closed` after shutdown.
    pub async fn start(&self) -> Result<(), RuntimeError> {
        Ok(self.request(Command::Start).await??)
    }

    /// Stop and release the transport. Sends an offline heartbeat first when
    /// connected.
    ///
    /// # Errors
    ///
    /// `Closed` after shutdown.
    pub async fn stop(&self) -> Result<(), RuntimeError> {
        self.request(Command::Stop).await
    }

    /// Touch `peer` as if the physical whale was touched.
    ///
    /// # Errors
    ///
    /// `Closed` after shutdown.
    pub async fn touch(&self, peer: PeerId) -> Result<PublishStatus, RuntimeError> {
        self.request(|tx| Command::Touch(peer, tx)).await
    }

    /// Set the shared color.
    ///
    /// # Errors
    ///
    /// `Closed` after shutdown.
    pub async fn set_color(&self, color: Rgb) -> Result<PublishStatus, RuntimeError> {
        self.request(|tx| Command::SetColor(color, tx)).await
    }

    /// Set the shared pattern.
    ///
    /// # Errors
    ///
    /// `Closed` after shutdown.
    pub async fn set_pattern(&self, pattern: Pattern) -> Result<PublishStatus, RuntimeError> {
        self.request(|tx| Command::SetPattern(pattern, tx)).await
    }

    /// Publish an online heartbeat.
    ///
    /// # Errors
    ///
    /// `Closed` after shutdown.
    pub async fn heartbeat(&self) -> Result<PublishStatus, RuntimeError> {
        self.request(Command::Heartbeat).await
    }

    /// Republish color and pattern.
    ///
    /// # Errors
    ///
    /// `Closed` after shutdown.
    pub async fn sync_all(&self) -> Result<PublishStatus, RuntimeError> {
        self.request(Command::SyncAll).await
    }

    /// Switch every device off.
    ///
    /// # Errors
    ///
    /// `Closed` after shutdown.
    pub async fn turn_off(&self) -> Result<PublishStatus, RuntimeError> {
        self.request(Command::TurnOff).await
    }
}
