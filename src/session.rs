//! One console session: feeds, aggregation and cache wired together.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::ConsoleConfig;
use crate::data::{AggregatedState, Aggregator, ReadingCache};
use crate::schedule::{self, Schedule};
use crate::stream::{FeedEndpoint, FeedEvent, StreamManager, Transport};

/// How long readings may sit unsaved before the cache is written.
const CACHE_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Timer {
    Reconnect,
    Persist,
}

/// What one [`Session::next`] call did.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A feed event was applied.
    Feed(FeedEvent),
    /// A timer fired.
    Tick,
}

/// Owns the stream manager and the aggregator and drives them from one loop.
///
/// The session is the only writer of the aggregated state; the presentation
/// side observes it through [`Session::subscribe`].
#[derive(Debug)]
pub struct Session {
    manager: StreamManager,
    aggregator: Aggregator,
    cache: Option<ReadingCache>,
    feeds: Vec<FeedEndpoint>,
    refresh_delay: Duration,
    timers: Schedule<Timer>,
}

impl Session {
    /// Create a session for the gas and status feeds.
    pub fn new(config: &ConsoleConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            manager: StreamManager::new(
                config.backend_url.clone(),
                transport,
                config.stream.clone(),
            ),
            aggregator: Aggregator::new(config.aggregator.clone()),
            cache: config.cache_path.clone().map(ReadingCache::new),
            feeds: vec![FeedEndpoint::gas(), FeedEndpoint::status()],
            refresh_delay: config.refresh_delay,
            timers: Schedule::new(),
        }
    }

    /// Receive state change notifications.
    pub fn subscribe(&self) -> watch::Receiver<AggregatedState> {
        self.aggregator.subscribe()
    }

    pub fn state(&self) -> &AggregatedState {
        self.aggregator.state()
    }

    pub fn manager(&self) -> &StreamManager {
        &self.manager
    }

    pub fn feeds(&self) -> &[FeedEndpoint] {
        &self.feeds
    }

    /// Seed the state from the last-known cache, if one is configured.
    ///
    /// Returns true if cached readings were restored.
    pub fn restore_cache(&mut self) -> Result<bool> {
        let Some(cache) = self.cache.as_mut() else {
            return Ok(false);
        };
        match cache.load()? {
            Some(cached) if !cached.is_empty() => {
                info!("Restored last-known readings from {}", cache.path().display());
                self.aggregator.restore(cached);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Connect every feed.
    pub fn start(&mut self) {
        for feed in &self.feeds {
            self.manager.connect(feed);
        }
    }

    /// Tear every feed down and reconnect shortly after.
    ///
    /// The reconnect waits out the manual cool-down, so a failing feed is
    /// again subject to automatic reconnection.
    pub fn refresh(&mut self) {
        info!("Refreshing feed connections");
        self.manager.disconnect_all();
        self.aggregator.reset_status();
        let delay = self.manager.settings().manual_cooldown + self.refresh_delay;
        self.timers.arm_after(Timer::Reconnect, Instant::now(), delay);
    }

    /// Check if a refresh is waiting to reconnect.
    pub fn refresh_pending(&self) -> bool {
        self.timers.is_armed(&Timer::Reconnect)
    }

    /// Stop every feed and flush the cache.
    pub fn shutdown(&mut self) {
        self.timers.cancel(&Timer::Reconnect);
        self.timers.cancel(&Timer::Persist);
        self.manager.disconnect_all();
        self.persist();
    }

    /// Process the next feed event or due timer.
    ///
    /// Cancel-safe, so it can sit in a `tokio::select!` next to input handling.
    pub async fn next(&mut self) -> SessionEvent {
        let deadline = [self.aggregator.next_deadline(), self.timers.next_deadline()]
            .into_iter()
            .flatten()
            .min();

        tokio::select! {
            event = self.manager.next_event() => {
                self.aggregator.handle_event(&event);
                // Batch cache writes instead of hitting the disk per message
                if self.cache.is_some() && !self.timers.is_armed(&Timer::Persist) {
                    self.timers
                        .arm_after(Timer::Persist, Instant::now(), CACHE_FLUSH_INTERVAL);
                }
                SessionEvent::Feed(event)
            }
            _ = schedule::sleep_until(deadline) => {
                let now = Instant::now();
                self.aggregator.fire_due(now);
                for timer in self.timers.take_due(now) {
                    match timer {
                        Timer::Reconnect => self.start(),
                        Timer::Persist => self.persist(),
                    }
                }
                SessionEvent::Tick
            }
        }
    }

    fn persist(&mut self) {
        let Some(cache) = self.cache.as_mut() else {
            return;
        };
        if let Err(e) = cache.store(self.aggregator.state()) {
            warn!("Failed to cache readings: {:#}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ConnectionStatus, LastKnown};
    use crate::stream::testing::MockTransport;
    use crate::stream::CloseReason;
    use cems_types::Parameter;
    use tempfile::TempDir;

    const READING: &str = r#"{"gas":[210,45,7,12,3,150,12,85000,101325],"connection_status":"connected","has_real_data":true}"#;

    fn session(transport: &MockTransport, config: ConsoleConfig) -> Session {
        Session::new(&config, Arc::new(transport.clone()))
    }

    async fn next_feed_event(session: &mut Session) -> FeedEvent {
        loop {
            if let SessionEvent::Feed(event) = session.next().await {
                return event;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_connects_all_feeds() {
        let transport = MockTransport::default();
        let mut session = session(&transport, ConsoleConfig::default());
        session.start();

        for _ in 0..2 {
            assert!(matches!(
                next_feed_event(&mut session).await,
                FeedEvent::Opened { .. }
            ));
        }
        assert!(session.manager().is_connected(&FeedEndpoint::gas()));
        assert!(session.manager().is_connected(&FeedEndpoint::status()));
        assert_eq!(transport.opens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_messages_reach_the_state() {
        let transport = MockTransport::default();
        let mut session = session(&transport, ConsoleConfig::default());
        let rx = session.subscribe();
        session.start();
        next_feed_event(&mut session).await;
        next_feed_event(&mut session).await;

        transport.take_server().push(READING);
        next_feed_event(&mut session).await;

        let state = rx.borrow();
        assert_eq!(state.value(Parameter::So2), Some(210.0));
        assert_eq!(state.settled_status, Some(ConnectionStatus::Connected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_reconnects_after_cooldown() {
        let transport = MockTransport::default();
        let mut session = session(&transport, ConsoleConfig::default());
        session.start();
        next_feed_event(&mut session).await;
        next_feed_event(&mut session).await;
        let servers = transport.take_servers();
        servers[0].push(READING);
        next_feed_event(&mut session).await;
        assert!(session.state().show_success);

        let start = Instant::now();
        session.refresh();
        assert!(session.refresh_pending());
        assert_eq!(session.state().settled_status, None);

        for _ in 0..2 {
            match next_feed_event(&mut session).await {
                FeedEvent::Closed { reason, .. } => assert_eq!(reason, CloseReason::Manual),
                other => panic!("expected Closed, got {:?}", other),
            }
        }

        for _ in 0..2 {
            assert!(matches!(
                next_feed_event(&mut session).await,
                FeedEvent::Opened { .. }
            ));
        }
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
        assert!(!session.refresh_pending());
        assert!(!session.manager().is_suppressed(&FeedEndpoint::gas()));
        assert_eq!(transport.opens(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_readings_are_cached_and_restored() {
        let dir = TempDir::new().unwrap();
        let config = ConsoleConfig {
            cache_path: Some(dir.path().join("last_known.json")),
            ..Default::default()
        };

        let transport = MockTransport::default();
        let mut first = session(&transport, config.clone());
        first.start();
        next_feed_event(&mut first).await;
        next_feed_event(&mut first).await;
        transport.take_server().push(READING);
        next_feed_event(&mut first).await;
        first.shutdown();

        let mut second = session(&MockTransport::default(), config);
        assert!(second.restore_cache().unwrap());
        let state = second.state();
        assert_eq!(state.value(Parameter::Pressure), Some(101325.0));
        assert_eq!(state.last_updated(), None);
        assert_eq!(
            LastKnown::from_state(state).values.len(),
            Parameter::GAS_ORDER.len()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_writes_are_batched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_known.json");
        let config = ConsoleConfig {
            cache_path: Some(path.clone()),
            ..Default::default()
        };

        let transport = MockTransport::default();
        let mut session = session(&transport, config);
        session.start();
        next_feed_event(&mut session).await;
        next_feed_event(&mut session).await;
        transport.take_server().push(READING);
        next_feed_event(&mut session).await;
        assert!(!path.exists());

        let started = Instant::now();
        while session.next().await != SessionEvent::Tick {}
        assert_eq!(started.elapsed(), CACHE_FLUSH_INTERVAL);
        assert!(path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_without_cache() {
        let mut session = session(&MockTransport::default(), ConsoleConfig::default());
        assert!(!session.restore_cache().unwrap());
    }
}
