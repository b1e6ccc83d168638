//! Client for the CEMS backend request/response endpoints.
//!
//! The live feeds go through the [`stream`](crate::stream) module; this
//! client covers the plain HTTP side: the health probe used at startup and
//! the gas configuration that drives thresholds and visible parameters.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use cems_console::backend::BackendClient;
//!
//! # tokio_test::block_on(async {
//! let client = BackendClient::builder()
//!     .base_url("http://127.0.0.1:8000")
//!     .build()
//!     .unwrap();
//!
//! client.wait_until_ready(30, Duration::from_secs(1)).await.unwrap();
//! let config = client.gas_config().await.unwrap();
//! for gas in config.gases() {
//!     println!("{}: {:?}", gas.display_name, gas.alarm_threshold);
//! }
//! # });
//! ```

use std::time::Duration;

use cems_types::GasConfigResponse;
use reqwest::Client;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::BackendError;

/// Default backend address.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// HTTP client for the backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> BackendClientBuilder {
        BackendClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe `GET /health`.
    pub async fn health(&self) -> Result<(), BackendError> {
        let response = self.client.get(self.url("/health")).send().await?;
        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    /// Fetch `GET /config/gas`.
    pub async fn gas_config(&self) -> Result<GasConfigResponse, BackendError> {
        let response = self.client.get(self.url("/config/gas")).send().await?;
        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))
    }

    /// Poll the health endpoint until it answers.
    ///
    /// Returns the number of attempts it took.
    pub async fn wait_until_ready(
        &self,
        attempts: u32,
        interval: Duration,
    ) -> Result<u32, BackendError> {
        let start = Instant::now();

        for attempt in 1..=attempts {
            match self.health().await {
                Ok(()) => {
                    info!("Backend {} ready after {} attempt(s)", self.base_url, attempt);
                    return Ok(attempt);
                }
                Err(e) => debug!("Backend not ready ({}/{}): {}", attempt, attempts, e),
            }
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        Err(BackendError::StartupTimeout {
            attempts,
            waited: start.elapsed(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Builder for [`BackendClient`].
#[derive(Debug, Default)]
pub struct BackendClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl BackendClientBuilder {
    /// Set the backend base URL (default: "http://127.0.0.1:8000").
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the request timeout (default: 5 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<BackendClient, BackendError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));
        let client = Client::builder().timeout(timeout).build()?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        debug!("Backend client for {}", base_url);

        Ok(BackendClient { client, base_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve every request on a local port with a fixed response.
    async fn serve(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{}", addr)
    }

    /// An address nothing listens on.
    async fn closed_port() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    #[test]
    fn test_builder_defaults() {
        let client = BackendClient::builder().build().unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);

        let client = BackendClient::builder()
            .base_url("http://cems.local:8000/")
            .build()
            .unwrap();
        assert_eq!(client.url("/health"), "http://cems.local:8000/health");
    }

    #[tokio::test]
    async fn test_health_ok() {
        let base = serve("200 OK", r#"{"status":"ok"}"#).await;
        let client = BackendClient::builder().base_url(base).build().unwrap();
        client.health().await.unwrap();
        assert_eq!(
            client
                .wait_until_ready(3, Duration::from_millis(10))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_health_error_status() {
        let base = serve("503 Service Unavailable", "{}").await;
        let client = BackendClient::builder().base_url(base).build().unwrap();
        assert!(matches!(
            client.health().await,
            Err(BackendError::Status(503))
        ));
    }

    #[tokio::test]
    async fn test_gas_config() {
        let base = serve(
            "200 OK",
            r#"{"default_gases":[{"name":"SO2","display_name":"SO₂","unit":"ppm","enabled":true,"alarm_threshold":200}],"additional_gases":[]}"#,
        )
        .await;
        let client = BackendClient::builder().base_url(base).build().unwrap();

        let config = client.gas_config().await.unwrap();
        assert_eq!(config.default_gases.len(), 1);
        assert_eq!(config.default_gases[0].alarm_threshold, Some(200.0));
    }

    #[tokio::test]
    async fn test_wait_until_ready_gives_up() {
        let client = BackendClient::builder()
            .base_url(closed_port().await)
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap();

        match client.wait_until_ready(3, Duration::from_millis(10)).await {
            Err(BackendError::StartupTimeout { attempts, waited }) => {
                assert_eq!(attempts, 3);
                assert!(waited >= Duration::from_millis(20));
            }
            other => panic!("expected StartupTimeout, got {:?}", other),
        }
    }
}
