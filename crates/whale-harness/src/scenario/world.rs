//! World state for scenario execution.
//!
//! The World owns the session under test and plays driver for it: it keeps
//! the publish log, the subscription list and a timer wheel, and fires due
//! expiries as virtual time advances.

use std::{collections::BTreeMap, time::Instant};

use whale_core::{Notice, Session, SessionAction, Snapshot, TimerId};
use whale_proto::PeerId;

use crate::sim_env::SimClock;

/// World state: the session plus everything its actions produced.
pub struct World {
    session: Session,
    clock: SimClock,
    published: Vec<(String, String)>,
    subscriptions: Vec<Vec<String>>,
    notices: Vec<Notice>,
    timers: BTreeMap<(Instant, TimerId), PeerId>,
    opens: usize,
    disconnects: usize,
    retries: usize,
}

impl World {
    /// World around `session` on `clock`.
    pub fn new(session: Session, clock: SimClock) -> Self {
        Self {
            session,
            clock,
            published: Vec::new(),
            subscriptions: Vec::new(),
            notices: Vec::new(),
            timers: BTreeMap::new(),
            opens: 0,
            disconnects: 0,
            retries: 0,
        }
    }

    /// Session under test.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Mutable session, for steps.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.session.snapshot()
    }

    /// Virtual clock.
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Every publish, as `(topic, payload)`.
    pub fn published(&self) -> &[(String, String)] {
        &self.published
    }

    /// Payloads published on `topic`.
    pub fn published_on(&self, topic: &str) -> Vec<&str> {
        self.published.iter().filter(|(t, _)| t == topic).map(|(_, p)| p.as_str()).collect()
    }

    /// Every subscribe batch.
    pub fn subscriptions(&self) -> &[Vec<String>] {
        &self.subscriptions
    }

    /// Every notice.
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Expiries still scheduled.
    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Transport handles opened.
    pub fn opens(&self) -> usize {
        self.opens
    }

    /// Transport handles released.
    pub fn disconnects(&self) -> usize {
        self.disconnects
    }

    /// Retries requested after a lost transport handle.
    pub fn scheduled_retries(&self) -> usize {
        self.retries
    }

    /// Execute actions the way a runtime would.
    pub fn execute(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::Open(_) => self.opens += 1,
                SessionAction::Disconnect => self.disconnects += 1,
                SessionAction::ScheduleRetry(_) => self.retries += 1,
                SessionAction::Subscribe(topics) => self.subscriptions.push(topics),
                SessionAction::Publish { topic, payload } => self.published.push((topic, payload)),
                SessionAction::ScheduleExpiry { peer, timer, at } => {
                    self.timers.insert((at, timer), peer);
                },
                SessionAction::CancelExpiry { timer, .. } => {
                    self.timers.retain(|(_, id), _| *id != timer);
                },
                SessionAction::Notice(notice) => self.notices.push(notice),
                SessionAction::ConnectionChanged(_)
                | SessionAction::RespondingChanged { .. }
                | SessionAction::ColorChanged(_)
                | SessionAction::PatternChanged(_) => {},
            }
        }
    }

    /// Fire every timer due at the current virtual time, earliest first.
    pub fn fire_due_timers(&mut self) {
        let now = self.clock.now();
        while let Some((&(at, timer), &peer)) = self.timers.iter().next() {
            if at > now {
                break;
            }
            self.timers.remove(&(at, timer));
            let actions = self.session.expire(peer, timer);
            self.execute(actions);
        }
    }
}
