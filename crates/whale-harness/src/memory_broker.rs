//! In-memory publish/subscribe broker.
//!
//! Stands in for the MQTT broker in tests and in the offline demo binary.
//! Every handle gets its own supervisor task that behaves like a real
//! client library: it reports `Connected`, waits for the link to drop, then
//! retries every `reconnect_period`, announcing each attempt with
//! `Reconnecting`. Subscriptions do not survive a reconnect (clean session).
//!
//! # Fault Injection
//!
//! - [`MemoryBroker::drop_connections`]: break every live link
//! - [`MemoryBroker::set_offline`]: broker unreachable, attempts fail
//! - [`MemoryBroker::set_loss_rate`]: drop messages with a seeded RNG
//! - [`MemoryBroker::set_reject_subscribe`]: refuse subscriptions
//!
//! Messages are delivered to every matching subscriber, the publisher
//! included.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::{
    sync::{Notify, mpsc},
    task::JoinHandle,
};
use tracing::{debug, trace};
use whale_core::{ConnectOptions, Transport, TransportError, TransportEvent, TransportHandle};

/// A message the broker accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// Topic
    pub topic: String,
    /// Payload
    pub payload: Bytes,
    /// False when fault injection dropped it
    pub delivered: bool,
}

impl Published {
    /// Payload as text, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

struct Client {
    events: mpsc::UnboundedSender<TransportEvent>,
    subscriptions: Vec<String>,
    online: bool,
    lost: Arc<Notify>,
}

struct BrokerState {
    clients: HashMap<u64, Client>,
    next_client: u64,
    offline: bool,
    reject_subscribe: bool,
    loss_rate: f64,
    rng: ChaCha8Rng,
    log: Vec<Published>,
}

impl BrokerState {
    fn route(&mut self, topic: &str, payload: &Bytes) {
        let lost = self.loss_rate > 0.0 && self.rng.gen_bool(self.loss_rate.min(1.0));
        self.log.push(Published {
            topic: topic.to_string(),
            payload: payload.clone(),
            delivered: !lost,
        });
        if lost {
            debug!(%topic, "message dropped by loss injection");
            return;
        }

        for (id, client) in &self.clients {
            if client.online && client.subscriptions.iter().any(|f| topic_matches(f, topic)) {
                trace!(client = id, %topic, "delivering");
                let _ = client.events.send(TransportEvent::Message {
                    topic: topic.to_string(),
                    payload: payload.clone(),
                });
            }
        }
    }

    fn sever(&mut self, id: u64) {
        if let Some(client) = self.clients.get_mut(&id) {
            if client.online {
                client.online = false;
                client.subscriptions.clear();
                let _ = client.events.send(TransportEvent::Closed);
                client.lost.notify_one();
            }
        }
    }
}

/// True when subscription `filter` matches `topic`.
///
/// Supports exact names and a trailing multi-level `#` wildcard.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    if filter == "#" {
        return true;
    }
    match filter.strip_suffix("/#") {
        Some(prefix) => {
            topic == prefix
                || topic.strip_prefix(prefix).is_some_and(|rest| rest.starts_with('/'))
        },
        None => filter == topic,
    }
}

/// Shared in-memory broker. Clones refer to the same broker.
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl std::fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryBroker")
            .field("clients", &state.clients.len())
            .field("offline", &state.offline)
            .field("published", &state.log.len())
            .finish_non_exhaustive()
    }
}

impl MemoryBroker {
    /// Broker with loss injection seeded with 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Broker whose loss injection uses `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(BrokerState {
                clients: HashMap::new(),
                next_client: 0,
                offline: false,
                reject_subscribe: false,
                loss_rate: 0.0,
                rng: ChaCha8Rng::seed_from_u64(seed),
                log: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Transport factory connected to this broker.
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport { broker: self.clone() }
    }

    /// Publish as an outside device.
    pub fn inject(&self, topic: &str, payload: impl Into<Bytes>) {
        let payload = payload.into();
        self.lock().route(topic, &payload);
    }

    /// Every message the broker accepted, in order.
    pub fn published(&self) -> Vec<Published> {
        self.lock().log.clone()
    }

    /// Accepted messages on `topic`.
    pub fn published_on(&self, topic: &str) -> Vec<Published> {
        self.lock().log.iter().filter(|p| p.topic == topic).cloned().collect()
    }

    /// Number of registered handles.
    pub fn client_count(&self) -> usize {
        self.lock().clients.len()
    }

    /// Number of handles with a live link.
    pub fn online_count(&self) -> usize {
        self.lock().clients.values().filter(|c| c.online).count()
    }

    /// Break every live link. Supervisors start reconnecting.
    pub fn drop_connections(&self) {
        let mut state = self.lock();
        let ids: Vec<u64> = state.clients.keys().copied().collect();
        for id in ids {
            state.sever(id);
        }
    }

    /// Make the broker unreachable (or reachable again).
    ///
    /// Going offline also drops every live link.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
        if offline {
            self.drop_connections();
        }
    }

    /// Drop each routed message with probability `rate`.
    pub fn set_loss_rate(&self, rate: f64) {
        self.lock().loss_rate = rate.clamp(0.0, 1.0);
    }

    /// Refuse (or accept again) subscription requests.
    pub fn set_reject_subscribe(&self, reject: bool) {
        self.lock().reject_subscribe = reject;
    }

    fn register(&self) -> (u64, mpsc::UnboundedReceiver<TransportEvent>, Arc<Notify>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let lost = Arc::new(Notify::new());
        let mut state = self.lock();
        let id = state.next_client;
        state.next_client += 1;
        state.clients.insert(
            id,
            Client { events: tx, subscriptions: Vec::new(), online: false, lost: Arc::clone(&lost) },
        );
        (id, rx, lost)
    }

    /// One connection attempt: `Some(connected)`, or `None` once the handle is gone.
    fn attempt(&self, id: u64) -> Option<bool> {
        let mut state = self.lock();
        let offline = state.offline;
        let client = state.clients.get_mut(&id)?;
        if offline {
            let _ = client.events.send(TransportEvent::Error { reason: "broker unreachable".into() });
            Some(false)
        } else {
            client.online = true;
            let _ = client.events.send(TransportEvent::Connected);
            Some(true)
        }
    }

    fn announce_retry(&self, id: u64) -> bool {
        match self.lock().clients.get(&id) {
            Some(client) => client.events.send(TransportEvent::Reconnecting).is_ok(),
            None => false,
        }
    }

    fn unregister(&self, id: u64) {
        self.lock().clients.remove(&id);
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

async fn supervise(broker: MemoryBroker, id: u64, lost: Arc<Notify>, retry: Duration) {
    loop {
        match broker.attempt(id) {
            None => return,
            Some(true) => lost.notified().await,
            Some(false) => {},
        }

        tokio::time::sleep(retry).await;
        if !broker.announce_retry(id) {
            return;
        }
    }
}

/// Transport factory for a [`MemoryBroker`].
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    broker: MemoryBroker,
}

#[async_trait]
impl Transport for MemoryTransport {
    type Handle = MemoryHandle;

    async fn connect(&self, options: &ConnectOptions) -> Result<MemoryHandle, TransportError> {
        let (id, events, lost) = self.broker.register();
        debug!(client = id, client_id = %options.client_id, "memory transport connecting");
        let supervisor =
            tokio::spawn(supervise(self.broker.clone(), id, lost, options.reconnect_period));
        Ok(MemoryHandle { broker: self.broker.clone(), id, events, supervisor })
    }
}

/// One client of a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemoryHandle {
    broker: MemoryBroker,
    id: u64,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    supervisor: JoinHandle<()>,
}

#[async_trait]
impl TransportHandle for MemoryHandle {
    async fn subscribe(&mut self, topics: &[String]) -> Result<(), TransportError> {
        let mut state = self.broker.lock();
        if state.reject_subscribe {
            return Err(TransportError::Subscribe("not authorized".into()));
        }
        let client = state
            .clients
            .get_mut(&self.id)
            .filter(|c| c.online)
            .ok_or_else(|| TransportError::Subscribe("not connected".into()))?;
        for topic in topics {
            if !client.subscriptions.contains(topic) {
                client.subscriptions.push(topic.clone());
            }
        }
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<(), TransportError> {
        let mut state = self.broker.lock();
        let online = state.clients.get(&self.id).is_some_and(|c| c.online);
        if !online {
            return Err(TransportError::Closed);
        }
        state.route(topic, &payload);
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    async fn disconnect(&mut self) {
        self.supervisor.abort();
        self.broker.unregister(self.id);
        self.events.close();
    }
}

impl Drop for MemoryHandle {
    fn drop(&mut self) {
        self.supervisor.abort();
        self.broker.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ConnectOptions {
        ConnectOptions::default()
    }

    #[test]
    fn wildcard_matching() {
        assert!(topic_matches("pico_whale/demo/#", "pico_whale/demo/touch"));
        assert!(topic_matches("pico_whale/demo/#", "pico_whale/demo"));
        assert!(!topic_matches("pico_whale/demo/#", "pico_whale/demox/touch"));
        assert!(topic_matches("#", "anything/at/all"));
        assert!(topic_matches("a/b", "a/b"));
        assert!(!topic_matches("a/b", "a/b/c"));
    }

    #[tokio::test(start_paused = true)]
    async fn publisher_receives_its_own_message() {
        let broker = MemoryBroker::new();
        let mut handle = broker.transport().connect(&options()).await.unwrap();

        assert_eq!(handle.next_event().await, Some(TransportEvent::Connected));
        handle.subscribe(&["t/a".to_string()]).await.unwrap();
        handle.publish("t/a", Bytes::from_static(b"hi")).await.unwrap();

        assert_eq!(
            handle.next_event().await,
            Some(TransportEvent::Message { topic: "t/a".into(), payload: Bytes::from_static(b"hi") })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_link_reconnects_after_period() {
        let broker = MemoryBroker::new();
        let mut handle = broker.transport().connect(&options()).await.unwrap();
        assert_eq!(handle.next_event().await, Some(TransportEvent::Connected));

        broker.drop_connections();

        assert_eq!(handle.next_event().await, Some(TransportEvent::Closed));
        let before = tokio::time::Instant::now();
        assert_eq!(handle.next_event().await, Some(TransportEvent::Reconnecting));
        assert_eq!(before.elapsed(), Duration::from_secs(5));
        assert_eq!(handle.next_event().await, Some(TransportEvent::Connected));
    }

    #[tokio::test(start_paused = true)]
    async fn offline_broker_fails_attempts_until_back() {
        let broker = MemoryBroker::new();
        broker.set_offline(true);
        let mut handle = broker.transport().connect(&options()).await.unwrap();

        assert!(matches!(handle.next_event().await, Some(TransportEvent::Error { .. })));
        assert_eq!(handle.next_event().await, Some(TransportEvent::Reconnecting));
        assert!(matches!(handle.next_event().await, Some(TransportEvent::Error { .. })));

        broker.set_offline(false);
        assert_eq!(handle.next_event().await, Some(TransportEvent::Reconnecting));
        assert_eq!(handle.next_event().await, Some(TransportEvent::Connected));
    }

    #[tokio::test(start_paused = true)]
    async fn subscriptions_do_not_survive_reconnect() {
        let broker = MemoryBroker::new();
        let mut handle = broker.transport().connect(&options()).await.unwrap();
        handle.next_event().await;
        handle.subscribe(&["t".to_string()]).await.unwrap();

        broker.drop_connections();
        handle.next_event().await;
        handle.next_event().await;
        handle.next_event().await;
        broker.inject("t", "x");

        assert_eq!(broker.online_count(), 1);
        assert!(tokio::time::timeout(Duration::from_secs(1), handle.next_event()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn full_loss_drops_everything() {
        let broker = MemoryBroker::with_seed(7);
        broker.set_loss_rate(1.0);
        let mut handle = broker.transport().connect(&options()).await.unwrap();
        handle.next_event().await;
        handle.subscribe(&["#".to_string()]).await.unwrap();

        handle.publish("t", Bytes::from_static(b"x")).await.unwrap();

        assert_eq!(broker.published().len(), 1);
        assert!(!broker.published()[0].delivered);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_unregisters() {
        let broker = MemoryBroker::new();
        let mut handle = broker.transport().connect(&options()).await.unwrap();
        handle.next_event().await;

        handle.disconnect().await;

        assert_eq!(broker.client_count(), 0);
        assert!(handle.publish("t", Bytes::new()).await.is_err());
    }
}
