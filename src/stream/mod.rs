//! Feed stream abstraction and the connection manager.
//!
//! A *feed* is one logical real-time channel exposed by the CEMS backend at
//! an endpoint path (`/ws/gas`, `/ws/status`). The [`StreamManager`] keeps
//! one live [`Connection`] per feed and turns everything that happens on it
//! into an ordered stream of [`FeedEvent`]s.
//!
//! The physical stream is pluggable through the [`Transport`] trait;
//! [`WsTransport`] is the WebSocket implementation used by the console.

mod connection;
mod manager;
#[cfg(test)]
pub(crate) mod testing;
mod websocket;

pub use connection::{Connection, ConnectionState};
pub use manager::{StreamManager, StreamSettings};
pub use websocket::WsTransport;

use std::fmt::{self, Debug};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::StreamError;

/// Identifies one logical feed by its endpoint path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeedEndpoint(String);

impl FeedEndpoint {
    /// Gas readings feed.
    pub const GAS_PATH: &'static str = "/ws/gas";
    /// Discrete status/alarm bits feed.
    pub const STATUS_PATH: &'static str = "/ws/status";

    /// Create an endpoint for an arbitrary path.
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The gas readings feed.
    pub fn gas() -> Self {
        Self::new(Self::GAS_PATH)
    }

    /// The status bits feed.
    pub fn status() -> Self {
        Self::new(Self::STATUS_PATH)
    }

    /// The endpoint path.
    pub fn path(&self) -> &str {
        &self.0
    }

    /// Which payload family this feed carries.
    pub fn kind(&self) -> FeedKind {
        match self.0.as_str() {
            Self::GAS_PATH => FeedKind::Gas,
            Self::STATUS_PATH => FeedKind::Status,
            _ => FeedKind::Unknown,
        }
    }

    /// Build the stream URL from an HTTP base URL (`http` → `ws`, `https` → `wss`).
    pub fn url(&self, base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https") {
            format!("wss{}", rest)
        } else if let Some(rest) = base.strip_prefix("http") {
            format!("ws{}", rest)
        } else {
            base.to_string()
        };
        format!("{}{}", base, self.0)
    }
}

impl fmt::Display for FeedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload family carried by a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Gas,
    Status,
    Unknown,
}

/// Unique id of one physical connection instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A payload received on a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub payload: String,
    pub received_at: Instant,
}

impl RawMessage {
    /// Wrap a payload received now.
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            received_at: Instant::now(),
        }
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The server closed the stream.
    Remote,
    /// The stream failed (an `Error` event preceded the close).
    Transport,
    /// The stream did not open within the connect timeout.
    Timeout,
    /// `disconnect` was called.
    Manual,
}

impl CloseReason {
    /// True if the reconnect policy applies.
    pub fn is_unexpected(&self) -> bool {
        !matches!(self, CloseReason::Manual)
    }
}

/// Events produced by the [`StreamManager`], in arrival order per connection.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// The connection for the feed reached `Open`.
    Opened { endpoint: FeedEndpoint, id: ConnectionId },
    /// A message arrived on the feed.
    Message { endpoint: FeedEndpoint, message: RawMessage },
    /// Informational transport failure; a `Closed` event follows.
    Error { endpoint: FeedEndpoint, error: String },
    /// The feed's connection ended.
    Closed { endpoint: FeedEndpoint, reason: CloseReason },
}

impl FeedEvent {
    /// The feed this event belongs to.
    pub fn endpoint(&self) -> &FeedEndpoint {
        match self {
            FeedEvent::Opened { endpoint, .. }
            | FeedEvent::Message { endpoint, .. }
            | FeedEvent::Error { endpoint, .. }
            | FeedEvent::Closed { endpoint, .. } => endpoint,
        }
    }
}

/// Opens physical streams.
///
/// Implementations must be cheap to share; the manager clones an `Arc` of
/// the transport into every connection task.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Open a stream to `url`.
    async fn open(&self, url: &str) -> Result<Box<dyn Link>, StreamError>;
}

/// One open bidirectional stream.
#[async_trait]
pub trait Link: Send {
    /// Receive the next text payload.
    ///
    /// Returns `None` once the remote side has closed the stream.
    /// Must be cancel-safe.
    async fn recv(&mut self) -> Option<Result<String, StreamError>>;

    /// Send a text payload.
    async fn send(&mut self, text: String) -> Result<(), StreamError>;

    /// Close the stream gracefully.
    async fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        let gas = FeedEndpoint::gas();
        assert_eq!(gas.url("http://127.0.0.1:8000"), "ws://127.0.0.1:8000/ws/gas");
        assert_eq!(gas.url("https://cems.local/"), "wss://cems.local/ws/gas");
        assert_eq!(gas.url("ws://already:1"), "ws://already:1/ws/gas");
    }

    #[test]
    fn test_endpoint_kind() {
        assert_eq!(FeedEndpoint::gas().kind(), FeedKind::Gas);
        assert_eq!(FeedEndpoint::status().kind(), FeedKind::Status);
        assert_eq!(FeedEndpoint::new("/ws/other").kind(), FeedKind::Unknown);
    }

    #[test]
    fn test_close_reason_policy() {
        assert!(CloseReason::Remote.is_unexpected());
        assert!(CloseReason::Timeout.is_unexpected());
        assert!(!CloseReason::Manual.is_unexpected());
    }
}
