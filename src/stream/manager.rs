//! The stream connection manager.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use super::connection::{LinkEvent, LinkSignal};
use super::{
    CloseReason, Connection, ConnectionId, ConnectionState, FeedEndpoint, FeedEvent, Transport,
};
use crate::schedule::{self, Schedule};

/// Timing policy of the [`StreamManager`].
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings {
    /// Budget for a connection to reach `Open`.
    pub connect_timeout: Duration,
    /// Constant delay before reconnecting after an unexpected close.
    pub reconnect_delay: Duration,
    /// How long a manual disconnect suppresses automatic reconnects.
    pub manual_cooldown: Duration,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(10),
            manual_cooldown: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Timer {
    ConnectTimeout,
    Reconnect,
    Cooldown,
}

/// Keeps exactly one live connection per feed endpoint.
///
/// All methods are meant to be called from a single event loop, which also
/// drives [`StreamManager::next_event`]. Connection I/O happens in background
/// tasks that report back over a channel, so the registry is only ever
/// touched from that loop.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use cems_console::stream::{FeedEndpoint, FeedEvent, StreamManager, StreamSettings, WsTransport};
///
/// # tokio_test::block_on(async {
/// let mut manager = StreamManager::new(
///     "http://127.0.0.1:8000",
///     Arc::new(WsTransport::default()),
///     StreamSettings::default(),
/// );
/// manager.connect(&FeedEndpoint::gas());
///
/// while let FeedEvent::Message { message, .. } = manager.next_event().await {
///     println!("{}", message.payload);
/// }
/// # });
/// ```
#[derive(Debug)]
pub struct StreamManager {
    base_url: String,
    transport: Arc<dyn Transport>,
    settings: StreamSettings,
    connections: HashMap<FeedEndpoint, Connection>,
    /// Endpoints inside their post-disconnect cool-down.
    manual: HashSet<FeedEndpoint>,
    timers: Schedule<(FeedEndpoint, Timer)>,
    signal_tx: mpsc::UnboundedSender<LinkSignal>,
    signal_rx: mpsc::UnboundedReceiver<LinkSignal>,
    pending: VecDeque<FeedEvent>,
    next_id: u64,
}

impl StreamManager {
    /// Create a manager for the backend at `base_url` (an `http(s)://` URL).
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
        settings: StreamSettings,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Self {
            base_url: base_url.into(),
            transport,
            settings,
            connections: HashMap::new(),
            manual: HashSet::new(),
            timers: Schedule::new(),
            signal_tx,
            signal_rx,
            pending: VecDeque::new(),
            next_id: 1,
        }
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The timing policy.
    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Connect `endpoint`, or return the existing connection if it is open.
    ///
    /// Any stale (connecting or closing) connection is closed before the new
    /// one is registered.
    pub fn connect(&mut self, endpoint: &FeedEndpoint) -> ConnectionId {
        if let Some(conn) = self.connections.get(endpoint) {
            if conn.state == ConnectionState::Open {
                trace!("{} already open as {}", endpoint, conn.id());
                return conn.id();
            }
        }

        if let Some(mut stale) = self.connections.remove(endpoint) {
            debug!("Replacing stale connection {} for {}", stale.id(), endpoint);
            stale.close();
        }
        self.timers.cancel(&(endpoint.clone(), Timer::Reconnect));

        let id = ConnectionId(self.next_id);
        self.next_id += 1;

        let url = endpoint.url(&self.base_url);
        info!("Connecting {} to {} ({})", endpoint, url, id);

        let conn = Connection::spawn(
            id,
            endpoint.clone(),
            url,
            self.transport.clone(),
            self.signal_tx.clone(),
        );
        self.timers.arm_after(
            (endpoint.clone(), Timer::ConnectTimeout),
            conn.created_at(),
            self.settings.connect_timeout,
        );
        self.connections.insert(endpoint.clone(), conn);
        id
    }

    /// Close `endpoint` and suppress automatic reconnection for the cool-down.
    pub fn disconnect(&mut self, endpoint: &FeedEndpoint) {
        self.manual.insert(endpoint.clone());
        self.timers.cancel(&(endpoint.clone(), Timer::Reconnect));
        self.timers.cancel(&(endpoint.clone(), Timer::ConnectTimeout));

        if let Some(mut conn) = self.connections.remove(endpoint) {
            info!("Disconnecting {} ({})", endpoint, conn.id());
            conn.close();
            self.pending.push_back(FeedEvent::Closed {
                endpoint: endpoint.clone(),
                reason: CloseReason::Manual,
            });
        }

        self.timers.arm_after(
            (endpoint.clone(), Timer::Cooldown),
            Instant::now(),
            self.settings.manual_cooldown,
        );
    }

    /// Disconnect every endpoint that is connected or waiting to reconnect.
    pub fn disconnect_all(&mut self) {
        let mut endpoints: Vec<FeedEndpoint> = self
            .connections
            .keys()
            .cloned()
            .chain(
                self.timers
                    .keys()
                    .filter(|(_, timer)| *timer == Timer::Reconnect)
                    .map(|(endpoint, _)| endpoint.clone()),
            )
            .collect();
        endpoints.sort();
        endpoints.dedup();
        for endpoint in &endpoints {
            self.disconnect(endpoint);
        }
    }

    /// Send a JSON message if the endpoint is open. Never queues.
    pub fn send<T: Serialize>(&self, endpoint: &FeedEndpoint, message: &T) -> bool {
        let Some(conn) = self.connections.get(endpoint) else {
            return false;
        };
        if conn.state != ConnectionState::Open {
            return false;
        }
        match serde_json::to_string(message) {
            Ok(text) => conn.send(text),
            Err(e) => {
                warn!("Failed to serialize message for {}: {}", endpoint, e);
                false
            }
        }
    }

    /// Check if `endpoint` has an open connection.
    pub fn is_connected(&self, endpoint: &FeedEndpoint) -> bool {
        self.connections
            .get(endpoint)
            .is_some_and(|c| c.state == ConnectionState::Open)
    }

    /// The registered connection for `endpoint`, if any.
    pub fn connection(&self, endpoint: &FeedEndpoint) -> Option<&Connection> {
        self.connections.get(endpoint)
    }

    /// Check if a reconnect is scheduled for `endpoint`.
    pub fn reconnect_pending(&self, endpoint: &FeedEndpoint) -> bool {
        self.timers.is_armed(&(endpoint.clone(), Timer::Reconnect))
    }

    /// Check if `endpoint` is inside its post-disconnect cool-down.
    pub fn is_suppressed(&self, endpoint: &FeedEndpoint) -> bool {
        self.manual.contains(endpoint)
    }

    /// Wait for the next feed event.
    ///
    /// Also fires the manager's own timers (connect timeouts, reconnects,
    /// cool-downs). Cancel-safe: dropping the future loses nothing.
    pub async fn next_event(&mut self) -> FeedEvent {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return event;
            }

            let deadline = self.timers.next_deadline();
            tokio::select! {
                Some(signal) = self.signal_rx.recv() => self.handle_signal(signal),
                _ = schedule::sleep_until(deadline) => self.fire_due(Instant::now()),
            }
        }
    }

    fn handle_signal(&mut self, signal: LinkSignal) {
        let LinkSignal {
            endpoint,
            id,
            event,
        } = signal;

        let Some(conn) = self.connections.get_mut(&endpoint) else {
            trace!("Dropping signal from unregistered connection {} ({})", id, endpoint);
            return;
        };
        if conn.id() != id {
            trace!("Dropping signal from superseded connection {} ({})", id, endpoint);
            return;
        }

        match event {
            LinkEvent::Opened => {
                conn.state = ConnectionState::Open;
                self.timers.cancel(&(endpoint.clone(), Timer::ConnectTimeout));
                self.timers.cancel(&(endpoint.clone(), Timer::Reconnect));
                info!("Connected {} ({})", endpoint, id);
                self.pending.push_back(FeedEvent::Opened { endpoint, id });
            }
            LinkEvent::Message(message) => {
                conn.last_message_at = Some(message.received_at);
                self.pending.push_back(FeedEvent::Message { endpoint, message });
            }
            LinkEvent::Error(e) => {
                conn.failed = true;
                warn!("Feed {} error: {}", endpoint, e);
                self.pending.push_back(FeedEvent::Error {
                    endpoint,
                    error: e.to_string(),
                });
            }
            LinkEvent::Closed => {
                let reason = if conn.failed {
                    CloseReason::Transport
                } else {
                    CloseReason::Remote
                };
                if let Some(mut conn) = self.connections.remove(&endpoint) {
                    conn.state = ConnectionState::Closed;
                }
                self.timers.cancel(&(endpoint.clone(), Timer::ConnectTimeout));
                self.connection_lost(endpoint, reason);
            }
        }
    }

    fn fire_due(&mut self, now: Instant) {
        for (endpoint, timer) in self.timers.take_due(now) {
            match timer {
                Timer::ConnectTimeout => {
                    let connecting = self
                        .connections
                        .get(&endpoint)
                        .is_some_and(|c| c.state == ConnectionState::Connecting);
                    if connecting {
                        if let Some(mut conn) = self.connections.remove(&endpoint) {
                            warn!(
                                "Connection {} for {} not open after {:?}, closing",
                                conn.id(),
                                endpoint,
                                self.settings.connect_timeout
                            );
                            conn.close();
                        }
                        self.connection_lost(endpoint, CloseReason::Timeout);
                    }
                }
                Timer::Reconnect => {
                    info!("Reconnecting {}", endpoint);
                    self.connect(&endpoint);
                }
                Timer::Cooldown => {
                    debug!("Automatic reconnect re-armed for {}", endpoint);
                    self.manual.remove(&endpoint);
                }
            }
        }
    }

    /// Report a close and apply the reconnect policy.
    fn connection_lost(&mut self, endpoint: FeedEndpoint, reason: CloseReason) {
        if self.manual.contains(&endpoint) {
            debug!("{} closed ({:?}) during cool-down, not reconnecting", endpoint, reason);
        } else {
            info!(
                "{} closed ({:?}), reconnecting in {:?}",
                endpoint, reason, self.settings.reconnect_delay
            );
            self.timers.arm_after(
                (endpoint.clone(), Timer::Reconnect),
                Instant::now(),
                self.settings.reconnect_delay,
            );
        }
        self.pending.push_back(FeedEvent::Closed { endpoint, reason });
    }
}
