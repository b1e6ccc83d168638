//! One physical stream instance bound to a feed.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::{ConnectionId, FeedEndpoint, RawMessage, Transport};
use crate::error::StreamError;

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    /// True for `Connecting` and `Open`.
    pub fn is_live(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Open)
    }
}

/// What a connection task reports back to the manager.
#[derive(Debug)]
pub(crate) enum LinkEvent {
    Opened,
    Message(RawMessage),
    Error(StreamError),
    Closed,
}

/// A [`LinkEvent`] tagged with its origin.
#[derive(Debug)]
pub(crate) struct LinkSignal {
    pub endpoint: FeedEndpoint,
    pub id: ConnectionId,
    pub event: LinkEvent,
}

/// A physical stream owned by the [`StreamManager`](super::StreamManager).
///
/// The I/O runs in a background task that only forwards [`LinkSignal`]s;
/// the state recorded here is updated by the manager on its own loop.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    endpoint: FeedEndpoint,
    pub(crate) state: ConnectionState,
    created_at: Instant,
    pub(crate) last_message_at: Option<Instant>,
    pub(crate) failed: bool,
    outbound: Option<mpsc::UnboundedSender<String>>,
    task: JoinHandle<()>,
}

impl Connection {
    /// Spawn the I/O task for a new connection in the `Connecting` state.
    pub(crate) fn spawn(
        id: ConnectionId,
        endpoint: FeedEndpoint,
        url: String,
        transport: Arc<dyn Transport>,
        signals: mpsc::UnboundedSender<LinkSignal>,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_link(
            transport,
            url,
            endpoint.clone(),
            id,
            signals,
            outbound_rx,
        ));

        Self {
            id,
            endpoint,
            state: ConnectionState::Connecting,
            created_at: Instant::now(),
            last_message_at: None,
            failed: false,
            outbound: Some(outbound_tx),
            task,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn endpoint(&self) -> &FeedEndpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_message_at(&self) -> Option<Instant> {
        self.last_message_at
    }

    /// Queue a payload for the I/O task. Only valid while `Open`.
    pub(crate) fn send(&self, text: String) -> bool {
        if self.state != ConnectionState::Open {
            return false;
        }
        match &self.outbound {
            Some(tx) => tx.send(text).is_ok(),
            None => false,
        }
    }

    /// Close the connection.
    ///
    /// An open stream is closed gracefully by its task; a stream still
    /// connecting is aborted outright.
    pub(crate) fn close(&mut self) {
        match self.state {
            ConnectionState::Connecting => {
                self.task.abort();
                self.outbound = None;
                self.state = ConnectionState::Closed;
            }
            ConnectionState::Open => {
                // Dropping the sender tells the task to close the link.
                self.outbound = None;
                self.state = ConnectionState::Closing;
            }
            ConnectionState::Closing | ConnectionState::Closed => {}
        }
        debug!("Closing connection {} for {}", self.id, self.endpoint);
    }
}

/// Drive one link until it closes, forwarding everything as signals.
async fn run_link(
    transport: Arc<dyn Transport>,
    url: String,
    endpoint: FeedEndpoint,
    id: ConnectionId,
    signals: mpsc::UnboundedSender<LinkSignal>,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    let emit = |event: LinkEvent| {
        // The manager may already have dropped this connection
        let _ = signals.send(LinkSignal {
            endpoint: endpoint.clone(),
            id,
            event,
        });
    };

    let mut link = match transport.open(&url).await {
        Ok(link) => link,
        Err(e) => {
            emit(LinkEvent::Error(e));
            emit(LinkEvent::Closed);
            return;
        }
    };
    emit(LinkEvent::Opened);

    loop {
        tokio::select! {
            incoming = link.recv() => match incoming {
                Some(Ok(payload)) => emit(LinkEvent::Message(RawMessage::new(payload))),
                Some(Err(e)) => {
                    emit(LinkEvent::Error(e));
                    break;
                }
                None => break,
            },
            outgoing = outbound.recv() => match outgoing {
                Some(text) => {
                    if let Err(e) = link.send(text).await {
                        emit(LinkEvent::Error(e));
                        break;
                    }
                }
                None => {
                    link.close().await;
                    break;
                }
            },
        }
    }

    // Release the socket before the manager can react to the close.
    drop(link);
    trace!("Link task {} for {} finished", id, endpoint);
    emit(LinkEvent::Closed);
}
