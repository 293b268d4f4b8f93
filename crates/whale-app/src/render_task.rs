//! Render loop task.

use std::time::Duration;

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::trace;
use whale_core::{Environment, RenderConfig, RenderFrame, Snapshot, render_frame};

/// Spawn the render loop.
///
/// Every `interval` it reads the latest snapshot and publishes a frame. It
/// keeps no state between ticks and only ends when aborted.
pub fn spawn_render<E: Environment>(
    env: E,
    config: RenderConfig,
    interval: Duration,
    snapshots: watch::Receiver<Snapshot>,
    frames: watch::Sender<RenderFrame>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let snapshot = *snapshots.borrow();
            let frame = render_frame(&snapshot, env.unix_millis(), &config);
            trace!(wall_ms = frame.wall_ms, "frame");
            frames.send_replace(frame);
        }
    })
}
