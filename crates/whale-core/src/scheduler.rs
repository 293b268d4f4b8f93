//! Per-peer response windows.
//!
//! A window opens when a touch names the *other* peer as the trigger and
//! closes when its expiry fires. The scheduler never sleeps: it hands out
//! [`TimerId`]s and asks the driver to schedule or cancel the matching
//! timers. A firing whose id no longer matches the window is stale and
//! ignored, so a refresh can never be cut short by the timer it replaced.

use std::time::{Duration, Instant};

use tracing::debug;
use whale_proto::PeerId;

/// Handle of one scheduled expiry.
///
/// Ids are never reused within a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// An open response window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseWindow {
    /// When the window closes
    pub expires_at: Instant,
    /// Timer that will close it
    pub timer: TimerId,
}

/// Actions for the driver's timer wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerAction {
    /// Arrange for `expire(peer, timer)` to be called at `at`
    ScheduleExpiry {
        /// Window owner
        peer: PeerId,
        /// Timer handle
        timer: TimerId,
        /// Deadline
        at: Instant,
    },

    /// Cancel a previously scheduled expiry
    CancelExpiry {
        /// Window owner
        peer: PeerId,
        /// Timer handle
        timer: TimerId,
    },

    /// Responding flag of a peer flipped
    RespondingChanged {
        /// Peer whose flag changed
        peer: PeerId,
        /// New value
        responding: bool,
    },
}

/// Response windows for both peers.
#[derive(Debug, Clone, Default)]
pub struct ResponseScheduler {
    windows: [Option<ResponseWindow>; 2],
    next_timer: u64,
}

impl ResponseScheduler {
    /// Scheduler with no open windows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or refresh `peer`'s window so it closes at `now + duration`.
    ///
    /// A refresh cancels the pending expiry before scheduling the new one.
    pub fn trigger(
        &mut self,
        peer: PeerId,
        duration: Duration,
        now: Instant,
    ) -> Vec<SchedulerAction> {
        let timer = self.allocate();
        let at = now + duration;
        let mut actions = Vec::with_capacity(3);

        match self.windows[peer.index()].replace(ResponseWindow { expires_at: at, timer }) {
            Some(old) => {
                debug!(%peer, old = old.timer.0, new = timer.0, "refreshing response window");
                actions.push(SchedulerAction::CancelExpiry { peer, timer: old.timer });
            },
            None => {
                debug!(%peer, "opening response window");
                actions.push(SchedulerAction::RespondingChanged { peer, responding: true });
            },
        }

        actions.push(SchedulerAction::ScheduleExpiry { peer, timer, at });
        actions
    }

    /// Whether `peer` is currently responding.
    #[must_use]
    pub fn is_responding(&self, peer: PeerId) -> bool {
        self.windows[peer.index()].is_some()
    }

    /// Open window of `peer`, if any.
    pub fn window(&self, peer: PeerId) -> Option<ResponseWindow> {
        self.windows[peer.index()]
    }

    /// Close `peer`'s window if `timer` is its current expiry.
    ///
    /// Stale and repeated firings return no actions.
    pub fn expire(&mut self, peer: PeerId, timer: TimerId) -> Vec<SchedulerAction> {
        let slot = &mut self.windows[peer.index()];
        if slot.is_some_and(|window| window.timer == timer) {
            *slot = None;
            debug!(%peer, timer = timer.0, "response window expired");
            vec![SchedulerAction::RespondingChanged { peer, responding: false }]
        } else {
            debug!(%peer, timer = timer.0, "ignoring stale expiry");
            Vec::new()
        }
    }

    /// Close every window whose deadline is at or before `now`.
    pub fn poll_expired(&mut self, now: Instant) -> Vec<SchedulerAction> {
        let mut actions = Vec::new();
        for peer in PeerId::ALL {
            let due = self.windows[peer.index()].filter(|window| window.expires_at <= now);
            if let Some(window) = due {
                actions.push(SchedulerAction::CancelExpiry { peer, timer: window.timer });
                actions.extend(self.expire(peer, window.timer));
            }
        }
        actions
    }

    /// Cancel every pending expiry and close all windows.
    pub fn cancel_all(&mut self) -> Vec<SchedulerAction> {
        let mut actions = Vec::new();
        for peer in PeerId::ALL {
            if let Some(window) = self.windows[peer.index()].take() {
                actions.push(SchedulerAction::CancelExpiry { peer, timer: window.timer });
                actions.push(SchedulerAction::RespondingChanged { peer, responding: false });
            }
        }
        actions
    }

    fn allocate(&mut self) -> TimerId {
        let id = TimerId(self.next_timer);
        self.next_timer += 1;
        id
    }
}
