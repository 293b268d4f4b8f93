//! Publish/subscribe transport abstraction.
//!
//! The broker client itself is an external collaborator. Production can plug
//! in an MQTT-over-WebSocket client, tests use the in-memory broker from the
//! harness crate. Either way the runtime only sees this contract.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// Options handed to [`Transport::connect`].
///
/// Retry cadence and connect timeout belong to the transport. The lifecycle
/// passes them through and never schedules retries itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Broker endpoint, WebSocket capable
    pub url: String,
    /// Client identifier presented to the broker
    pub client_id: String,
    /// Give up on a single connection attempt after this long
    pub connect_timeout: Duration,
    /// Delay between automatic reconnect attempts
    pub reconnect_period: Duration,
    /// Keep-alive ping interval
    pub keep_alive: Duration,
    /// Start every connection without broker-side session state
    pub clean_session: bool,
}

impl ConnectOptions {
    /// Prefix for generated client identifiers.
    pub const CLIENT_ID_PREFIX: &'static str = "web_control";

    /// Client id unique to a start time, as `web_control_{unix_millis}`.
    pub fn client_id_at(unix_millis: u64) -> String {
        format!("{}_{unix_millis}", Self::CLIENT_ID_PREFIX)
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            url: "wss://test.mosquitto.org:8081".to_string(),
            client_id: Self::CLIENT_ID_PREFIX.to_string(),
            connect_timeout: Duration::from_secs(10),
            reconnect_period: Duration::from_secs(5),
            keep_alive: Duration::from_secs(60),
            clean_session: true,
        }
    }
}

/// Events emitted by a transport handle, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Connection (or reconnection) established
    Connected,

    /// Message received on a subscribed topic
    Message {
        /// Full topic name
        topic: String,
        /// Raw payload
        payload: Bytes,
    },

    /// Connection attempt or live connection failed
    Error {
        /// Human-readable cause
        reason: String,
    },

    /// Connection closed
    Closed,

    /// Transport is starting an automatic reconnect attempt
    Reconnecting,
}

/// Factory for transport handles.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Live connection handle.
    type Handle: TransportHandle;

    /// Begin connecting.
    ///
    /// Returns a handle immediately. Success or failure of the attempt is
    /// reported later through [`TransportHandle::next_event`], and the handle
    /// keeps retrying on its own every `reconnect_period` until disconnected.
    async fn connect(&self, options: &ConnectOptions) -> Result<Self::Handle, TransportError>;
}

/// A connection to a broker.
///
/// At most one handle exists per runtime. Dropping it without
/// [`TransportHandle::disconnect`] is allowed but may leave the broker to time
/// the client out.
#[async_trait]
pub trait TransportHandle: Send + 'static {
    /// Subscribe to all `topics` in one batched request.
    async fn subscribe(&mut self, topics: &[String]) -> Result<(), TransportError>;

    /// Publish `payload` on `topic`. Fire and forget beyond handing it over.
    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Next event from the broker.
    ///
    /// Must be cancel safe: the runtime polls it inside `select!` and drops
    /// the future whenever another branch wins. Returns `None` once the handle
    /// is permanently finished.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Close the connection and stop reconnecting.
    async fn disconnect(&mut self);
}
