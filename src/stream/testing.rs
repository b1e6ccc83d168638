//! In-memory transport for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Link, Transport};
use crate::error::StreamError;

/// How the mock answers `open`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) enum Mode {
    #[default]
    Accept,
    Refuse,
    /// Never completes the handshake.
    Hang,
}

/// Server side of one accepted mock link.
///
/// Dropping it closes the stream from the server side.
#[derive(Debug)]
pub(crate) struct MockServer {
    pub to_client: mpsc::UnboundedSender<Result<String, StreamError>>,
    pub from_client: mpsc::UnboundedReceiver<String>,
}

impl MockServer {
    pub fn push(&self, payload: &str) {
        let _ = self.to_client.send(Ok(payload.to_string()));
    }
}

#[derive(Debug, Default)]
struct MockState {
    mode: Mode,
    opens: usize,
    live: usize,
    servers: Vec<MockServer>,
}

/// Counts a link (or a pending handshake) as live until dropped.
#[derive(Debug)]
struct LiveGuard(Arc<Mutex<MockState>>);

impl LiveGuard {
    fn new(state: &Arc<Mutex<MockState>>) -> Self {
        state.lock().unwrap().live += 1;
        Self(state.clone())
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.0.lock() {
            state.live -= 1;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn set_mode(&self, mode: Mode) {
        self.state.lock().unwrap().mode = mode;
    }

    /// Number of `open` calls so far.
    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    /// Links and handshakes currently alive.
    pub fn live(&self) -> usize {
        self.state.lock().unwrap().live
    }

    /// Take the server side of the oldest accepted link.
    pub fn take_server(&self) -> MockServer {
        self.state.lock().unwrap().servers.remove(0)
    }

    /// Take every accepted server side, oldest first.
    pub fn take_servers(&self) -> Vec<MockServer> {
        std::mem::take(&mut self.state.lock().unwrap().servers)
    }
}

struct MockLink {
    incoming: mpsc::UnboundedReceiver<Result<String, StreamError>>,
    outgoing: mpsc::UnboundedSender<String>,
    _guard: LiveGuard,
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, url: &str) -> Result<Box<dyn Link>, StreamError> {
        let mode = {
            let mut state = self.state.lock().unwrap();
            state.opens += 1;
            state.mode
        };
        match mode {
            Mode::Refuse => Err(StreamError::Connect(format!("{} refused", url))),
            Mode::Hang => {
                let _guard = LiveGuard::new(&self.state);
                std::future::pending::<()>().await;
                Err(StreamError::Connect(format!("{} hung up", url)))
            }
            Mode::Accept => {
                let (to_client, incoming) = mpsc::unbounded_channel();
                let (outgoing, from_client) = mpsc::unbounded_channel();
                let guard = LiveGuard::new(&self.state);
                self.state.lock().unwrap().servers.push(MockServer {
                    to_client,
                    from_client,
                });
                Ok(Box::new(MockLink {
                    incoming,
                    outgoing,
                    _guard: guard,
                }))
            }
        }
    }
}

#[async_trait]
impl Link for MockLink {
    async fn recv(&mut self) -> Option<Result<String, StreamError>> {
        self.incoming.recv().await
    }

    async fn send(&mut self, text: String) -> Result<(), StreamError> {
        self.outgoing
            .send(text)
            .map_err(|e| StreamError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        self.incoming.close();
    }
}
