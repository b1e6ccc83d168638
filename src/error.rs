//! Error types for the feed transport and the backend REST client.

use std::time::Duration;

use thiserror::Error;

/// Errors raised inside a feed connection.
///
/// These never cross the [`StreamManager`](crate::stream::StreamManager) API;
/// they are reported as [`FeedEvent::Error`](crate::stream::FeedEvent::Error)
/// followed by a close.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// The stream could not be established.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The established stream failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An outbound message could not be delivered.
    #[error("Send failed: {0}")]
    Send(String),
}

/// Errors from the backend request/response endpoints.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned status {0}")]
    Status(u16),

    /// Failed to parse the response body.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Connection to the backend failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Timeout waiting for a response.
    #[error("Request timed out")]
    Timeout,

    /// The backend never became healthy during startup.
    #[error("Backend not ready after {attempts} attempts ({waited:?})")]
    StartupTimeout { attempts: u32, waited: Duration },
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_connect() {
            BackendError::Connection(err.to_string())
        } else if err.is_decode() {
            BackendError::Parse(err.to_string())
        } else {
            BackendError::Http(err.to_string())
        }
    }
}
