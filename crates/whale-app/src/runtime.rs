//! Runtime: one task owns the session, everything else talks to it.
//!
//! # Tasks
//!
//! ```text
//!  ControlHandle ──commands──┐
//!  TransportHandle ─events───┤
//!  expiry tasks ──fired──────┼──> session task ──watch<Snapshot>──> render task
//!  heartbeat interval ───────┘        │                                  │
//!                                     ├──watch<ConnectionState>          └──watch<RenderFrame>
//!                                     └──broadcast<Notice>
//! ```
//!
//! The session task is the single writer. It processes one input at a time,
//! executes the resulting actions in order, then publishes a snapshot and the
//! connection state, in that order. Control replies are sent only after that,
//! so a caller whose `set_color` returned reads the new color, even on a
//! multi-threaded runtime.
//!
//! Each response window expiry is its own sleeping task, keyed by
//! [`TimerId`]. Cancelling a window aborts the task. A firing that races
//! with its cancellation reaches the session as a stale id and is ignored.
//!
//! A lost transport handle (failed connect, or a handle that finished) is
//! retried by a single retry task after `reconnect_period`.

use std::collections::{HashMap, VecDeque};

use bytes::Bytes;
use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
    time::{self, Interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};
use whale_core::{
    ConnectionError, ConnectionState, Environment, Notice, NoticeLevel, RenderFrame, Session,
    SessionAction, Snapshot, TimerId, Transport, TransportError, TransportEvent, TransportHandle,
    render_frame,
};
use whale_proto::PeerId;

use crate::{
    config::RuntimeConfig,
    error::RuntimeError,
    handle::{Command, ControlHandle},
    render_task::spawn_render,
};

/// Entry point for spawning a runtime.
pub struct Runtime;

impl Runtime {
    /// Spawn the session task and the render task on the current tokio
    /// runtime.
    pub fn spawn<T: Transport, E: Environment>(
        transport: T,
        env: E,
        config: RuntimeConfig,
    ) -> RuntimeHandle {
        let session = Session::new(config.session.clone());
        let initial = session.snapshot();

        let (command_tx, command_rx) = mpsc::channel(config.command_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);
        let (state_tx, state_rx) = watch::channel(initial.connection);
        let (frame_tx, frame_rx) =
            watch::channel(render_frame(&initial, env.unix_millis(), &config.render));
        let (notice_tx, _) = broadcast::channel(config.notice_capacity.max(1));
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();

        let render_task = spawn_render(
            env.clone(),
            config.render,
            config.frame_interval,
            snapshot_rx.clone(),
            frame_tx,
        );

        let task = SessionTask {
            session,
            transport,
            env,
            handle: None,
            timers: HashMap::new(),
            expiry_tx,
            retry: None,
            retry_tx,
            snapshot_tx,
            state_tx,
            notice_tx: notice_tx.clone(),
        };
        let inputs = Inputs {
            commands: command_rx,
            expiries: expiry_rx,
            retries: retry_rx,
            shutdown: shutdown_rx,
            heartbeat: config.heartbeat_interval.map(|period| {
                let mut interval = time::interval_at(time::Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                interval
            }),
        };
        let session_task = tokio::spawn(task.run(inputs, config.auto_start));

        RuntimeHandle {
            control: ControlHandle::new(command_tx),
            snapshots: snapshot_rx,
            states: state_rx,
            frames: frame_rx,
            notices: notice_tx,
            shutdown: Some(shutdown_tx),
            session_task,
            render_task,
        }
    }
}

/// Owner-side handle of a running runtime.
///
/// Dropping it without [`RuntimeHandle::shutdown`] also stops the session
/// task, but without waiting for the offline heartbeat to go out.
#[derive(Debug)]
pub struct RuntimeHandle {
    control: ControlHandle,
    snapshots: watch::Receiver<Snapshot>,
    states: watch::Receiver<ConnectionState>,
    frames: watch::Receiver<RenderFrame>,
    notices: broadcast::Sender<Notice>,
    shutdown: Option<oneshot::Sender<()>>,
    session_task: JoinHandle<()>,
    render_task: JoinHandle<()>,
}

impl RuntimeHandle {
    /// Control handle, cloneable.
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    /// Snapshot signal, updated after every session step.
    pub fn snapshots(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> Snapshot {
        *self.snapshots.borrow()
    }

    /// Connection state signal.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.states.clone()
    }

    /// Rendered frame signal.
    pub fn frames(&self) -> watch::Receiver<RenderFrame> {
        self.frames.clone()
    }

    /// Subscribe to notices emitted from now on.
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    /// Stop everything: releases the transport, aborts pending expiries and
    /// the render loop.
    ///
    /// # Errors
    ///
    /// `Join` if the session task panicked.
    pub async fn shutdown(mut self) -> Result<(), RuntimeError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.render_task.abort();

        let session = (&mut self.session_task).await;
        let _ = (&mut self.render_task).await;
        session.map_err(|e| RuntimeError::Join(e.to_string()))
    }
}

impl Drop for RuntimeHandle {
    fn drop(&mut self) {
        self.render_task.abort();
        self.session_task.abort();
    }
}

struct Inputs {
    commands: mpsc::Receiver<Command>,
    expiries: mpsc::UnboundedReceiver<(PeerId, TimerId)>,
    retries: mpsc::UnboundedReceiver<()>,
    shutdown: oneshot::Receiver<()>,
    heartbeat: Option<Interval>,
}

struct SessionTask<T: Transport, E: Environment> {
    session: Session,
    transport: T,
    env: E,
    handle: Option<T::Handle>,
    timers: HashMap<TimerId, JoinHandle<()>>,
    expiry_tx: mpsc::UnboundedSender<(PeerId, TimerId)>,
    retry: Option<JoinHandle<()>>,
    retry_tx: mpsc::UnboundedSender<()>,
    snapshot_tx: watch::Sender<Snapshot>,
    state_tx: watch::Sender<ConnectionState>,
    notice_tx: broadcast::Sender<Notice>,
}

async fn next_event<H: TransportHandle>(handle: &mut Option<H>) -> Option<TransportEvent> {
    match handle {
        Some(handle) => handle.next_event().await,
        None => std::future::pending().await,
    }
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        },
        None => std::future::pending().await,
    }
}

impl<T: Transport, E: Environment> SessionTask<T, E> {
    async fn run(mut self, mut inputs: Inputs, auto_start: bool) {
        if auto_start {
            if let Err(e) = self.start().await {
                warn!(error = %e, "auto start failed");
            }
        }

        loop {
            tokio::select! {
                biased;

                _ = &mut inputs.shutdown => break,

                command = inputs.commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },

                event = next_event(&mut self.handle) => match event {
                    Some(event) => self.on_transport(event).await,
                    None => {
                        self.handle = None;
                        let actions = self.session.transport_lost("transport handle finished");
                        self.execute(actions).await;
                    },
                },

                Some(()) = inputs.retries.recv() => {
                    self.retry = None;
                    let actions = self.session.retry();
                    self.execute(actions).await;
                },

                Some((peer, timer)) = inputs.expiries.recv() => {
                    self.timers.remove(&timer);
                    let actions = self.session.expire(peer, timer);
                    self.execute(actions).await;
                },

                () = tick(&mut inputs.heartbeat) => {
                    if self.session.connection().is_connected() {
                        let outcome = self.session.send_heartbeat(self.env.unix_millis());
                        self.execute(outcome.actions).await;
                    }
                },
            }
        }

        info!("session task shutting down");
        let actions = self.session.shutdown(self.env.unix_millis());
        self.execute(actions).await;
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        if let Some(retry) = self.retry.take() {
            retry.abort();
        }
    }

    async fn start(&mut self) -> Result<(), ConnectionError> {
        let actions = self.session.start()?;
        self.execute(actions).await;
        Ok(())
    }

    async fn on_command(&mut self, command: Command) {
        let now = self.env.now();
        let wall_ms = self.env.unix_millis();

        match command {
            Command::Start(reply) => {
                let result = self.start().await;
                let _ = reply.send(result);
            },
            Command::Stop(reply) => {
                let actions = self.session.stop(wall_ms);
                self.execute(actions).await;
                let _ = reply.send(());
            },
            Command::Touch(peer, reply) => {
                let outcome = self.session.request_touch(peer, now, wall_ms);
                self.execute(outcome.actions).await;
                let _ = reply.send(outcome.status);
            },
            Command::SetColor(color, reply) => {
                let outcome = self.session.set_color(color);
                self.execute(outcome.actions).await;
                let _ = reply.send(outcome.status);
            },
            Command::SetPattern(pattern, reply) => {
                let outcome = self.session.set_pattern(pattern);
                self.execute(outcome.actions).await;
                let _ = reply.send(outcome.status);
            },
            Command::Heartbeat(reply) => {
                let outcome = self.session.send_heartbeat(wall_ms);
                self.execute(outcome.actions).await;
                let _ = reply.send(outcome.status);
            },
            Command::SyncAll(reply) => {
                let outcome = self.session.sync_all();
                self.execute(outcome.actions).await;
                let _ = reply.send(outcome.status);
            },
            Command::TurnOff(reply) => {
                let outcome = self.session.turn_off();
                self.execute(outcome.actions).await;
                let _ = reply.send(outcome.status);
            },
        }
    }

    async fn on_transport(&mut self, event: TransportEvent) {
        let actions = self.session.handle_transport(&event, self.env.now());
        self.execute(actions).await;
    }

    async fn execute(&mut self, actions: Vec<SessionAction>) {
        let mut queue = VecDeque::from(actions);

        while let Some(action) = queue.pop_front() {
            match action {
                SessionAction::Open(options) => match self.transport.connect(&options).await {
                    Ok(handle) => self.handle = Some(handle),
                    Err(e) => {
                        warn!(error = %e, "transport connect failed");
                        queue.extend(self.session.transport_lost(&e.to_string()));
                    },
                },

                SessionAction::Subscribe(topics) => {
                    let result = match self.handle.as_mut() {
                        Some(handle) => handle.subscribe(&topics).await,
                        None => Err(TransportError::Closed),
                    };
                    queue.extend(self.session.subscribe_result(&result));
                },

                SessionAction::Publish { topic, payload } => {
                    let result = match self.handle.as_mut() {
                        Some(handle) => handle.publish(&topic, Bytes::from(payload)).await,
                        None => Err(TransportError::Closed),
                    };
                    if let Err(e) = result {
                        warn!(%topic, error = %e, "publish failed");
                        self.notify(Notice::error(format!("Publish error: {e}")));
                    }
                },

                SessionAction::Disconnect => {
                    if let Some(mut handle) = self.handle.take() {
                        handle.disconnect().await;
                    }
                },

                SessionAction::ScheduleRetry(after) => {
                    let env = self.env.clone();
                    let fired = self.retry_tx.clone();
                    let task = tokio::spawn(async move {
                        env.sleep(after).await;
                        let _ = fired.send(());
                    });
                    if let Some(previous) = self.retry.replace(task) {
                        previous.abort();
                    }
                },

                SessionAction::ScheduleExpiry { peer, timer, at } => {
                    let delay = at.saturating_duration_since(self.env.now());
                    let env = self.env.clone();
                    let fired = self.expiry_tx.clone();
                    let task = tokio::spawn(async move {
                        env.sleep(delay).await;
                        let _ = fired.send((peer, timer));
                    });
                    if let Some(previous) = self.timers.insert(timer, task) {
                        previous.abort();
                    }
                },

                SessionAction::CancelExpiry { timer, .. } => {
                    if let Some(task) = self.timers.remove(&timer) {
                        task.abort();
                    }
                },

                SessionAction::ConnectionChanged(state) => debug!(?state, "connection changed"),

                SessionAction::RespondingChanged { peer, responding } => {
                    debug!(%peer, responding, "responding changed");
                },

                SessionAction::ColorChanged(color) => debug!(%color, "color changed"),

                SessionAction::PatternChanged(pattern) => debug!(%pattern, "pattern changed"),

                SessionAction::Notice(notice) => self.notify(notice),
            }
        }

        self.publish_snapshot();
    }

    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info | NoticeLevel::Success => info!(notice = %notice.message),
            NoticeLevel::Warning => warn!(notice = %notice.message),
            NoticeLevel::Error => error!(notice = %notice.message),
        }
        // No subscribers is fine.
        let _ = self.notice_tx.send(notice);
    }

    /// Snapshot first, then connection state: whoever wakes on a state change
    /// already sees the matching snapshot.
    fn publish_snapshot(&self) {
        let snapshot = self.session.snapshot();
        self.snapshot_tx.send_if_modified(|current| replace_if_changed(current, snapshot));
        self.state_tx.send_if_modified(|current| replace_if_changed(current, snapshot.connection));
    }

    /// Pending expiry tasks, for teardown checks.
    #[cfg(test)]
    fn pending_timers(&self) -> usize {
        self.timers.len()
    }
}

fn replace_if_changed<V: PartialEq>(current: &mut V, next: V) -> bool {
    if *current == next {
        false
    } else {
        *current = next;
        true
    }
}
