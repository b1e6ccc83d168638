//! Coalesces feed events into the canonical [`AggregatedState`].

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::cache::LastKnown;
use super::decoder::{self, DecodedRecord, LinkHealth};
use super::state::{AggregatedState, ConnectionStatus, FeedSnapshot};
use crate::schedule::Schedule;
use crate::stream::{CloseReason, FeedEndpoint, FeedEvent};

/// Timing policy of the [`Aggregator`].
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorSettings {
    /// How long a worse status must hold before it is shown.
    pub debounce_window: Duration,
    /// How long the success banner stays up.
    pub banner_duration: Duration,
}

impl Default for AggregatorSettings {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_secs(3),
            banner_duration: Duration::from_secs(12),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Timer {
    /// Apply the pending raw status as settled.
    Settle,
    /// Hide the success banner.
    Banner,
}

/// Owns the [`AggregatedState`] and publishes it to observers.
///
/// Observers get a [`watch::Receiver`] from [`Aggregator::subscribe`]. They
/// are woken only when something they render changes: the settled status,
/// the banner hint, values or status bits. Counters and timestamps are
/// always current in the published snapshot but never wake anyone.
#[derive(Debug)]
pub struct Aggregator {
    settings: AggregatorSettings,
    state: AggregatedState,
    timers: Schedule<Timer>,
    tx: watch::Sender<AggregatedState>,
}

impl Aggregator {
    pub fn new(settings: AggregatorSettings) -> Self {
        let (tx, _) = watch::channel(AggregatedState::default());
        Self {
            settings,
            state: AggregatedState::default(),
            timers: Schedule::new(),
            tx,
        }
    }

    /// Receive state change notifications.
    pub fn subscribe(&self) -> watch::Receiver<AggregatedState> {
        self.tx.subscribe()
    }

    /// The current state.
    pub fn state(&self) -> &AggregatedState {
        &self.state
    }

    pub fn settings(&self) -> &AggregatorSettings {
        &self.settings
    }

    /// Apply a manager event, decoding message payloads.
    pub fn handle_event(&mut self, event: &FeedEvent) {
        let before = self.state.clone();
        let now = Instant::now();

        match event {
            FeedEvent::Opened { endpoint, id } => {
                debug!("Feed {} opened ({})", endpoint, id);
                // Keep the prior status until the first message
                self.feed_mut(endpoint).last_error = None;
            }
            FeedEvent::Message { endpoint, message } => {
                let records = decoder::decode(endpoint, &message.payload);
                self.apply_records(endpoint, &records, message.received_at);
            }
            FeedEvent::Error { endpoint, error } => {
                let feed = self.feed_mut(endpoint);
                feed.status = Some(ConnectionStatus::Disconnected);
                feed.last_error = Some(error.clone());
            }
            FeedEvent::Closed { endpoint, reason } => {
                debug!("Feed {} closed ({:?})", endpoint, reason);
                // A deliberate close stops the feed reporting rather than failing it
                self.feed_mut(endpoint).status = match reason {
                    CloseReason::Manual => None,
                    _ => Some(ConnectionStatus::Disconnected),
                };
            }
        }

        self.recompute(now);
        self.publish(&before);
    }

    /// Apply already decoded records from `endpoint` received at `at`.
    pub fn apply(&mut self, endpoint: &FeedEndpoint, records: &[DecodedRecord], at: Instant) {
        let before = self.state.clone();
        self.apply_records(endpoint, records, at);
        self.recompute(at);
        self.publish(&before);
    }

    /// Seed values and bits from a previous session.
    ///
    /// No feed timestamp is set, so the values render as stale until live
    /// data replaces them.
    pub fn restore(&mut self, cached: LastKnown) {
        let before = self.state.clone();
        self.state.values = cached.values;
        self.state.corrected_values = cached.corrected_values;
        self.state.bits = cached.bits;
        self.publish(&before);
    }

    /// Forget all connection status, as if no feed had reported yet.
    ///
    /// Used when the operator refreshes the connection, so the next
    /// successful connect is announced again.
    pub fn reset_status(&mut self) {
        let before = self.state.clone();
        for feed in self.state.feeds.values_mut() {
            feed.status = None;
        }
        self.state.raw_status = None;
        self.state.settled_status = None;
        self.state.show_success = false;
        self.timers.cancel(&Timer::Settle);
        self.timers.cancel(&Timer::Banner);
        self.publish(&before);
    }

    /// Earliest pending timer, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Fire every timer due at `now`.
    pub fn fire_due(&mut self, now: Instant) {
        let before = self.state.clone();
        for timer in self.timers.take_due(now) {
            match timer {
                Timer::Settle => {
                    if let Some(raw) = self.state.raw_status {
                        if self.state.settled_status != Some(raw) {
                            self.settle(raw, now);
                        }
                    }
                }
                Timer::Banner => {
                    if self.state.settled_status == Some(ConnectionStatus::Connected) {
                        debug!("Hiding connection banner");
                        self.state.show_success = false;
                    }
                }
            }
        }
        self.publish(&before);
    }

    fn feed_mut(&mut self, endpoint: &FeedEndpoint) -> &mut FeedSnapshot {
        self.state.feeds.entry(endpoint.clone()).or_default()
    }

    fn apply_records(&mut self, endpoint: &FeedEndpoint, records: &[DecodedRecord], at: Instant) {
        let mut readings = false;
        let mut health = None;

        for record in records {
            match record {
                DecodedRecord::GasReading {
                    values,
                    corrected_values,
                } => {
                    // Latest wins, including nulls
                    self.state.values.extend(values.iter().map(|(p, v)| (*p, *v)));
                    self.state
                        .corrected_values
                        .extend(corrected_values.iter().map(|(p, v)| (*p, *v)));
                    readings = true;
                }
                DecodedRecord::StatusBits { bits } => {
                    self.state.bits = bits.clone();
                    readings = true;
                }
                DecodedRecord::ConnectionHealth { state } => {
                    health = Some(*state);
                }
                DecodedRecord::Malformed { reason } => {
                    warn!("Malformed payload on {}: {}", endpoint, reason);
                    self.feed_mut(endpoint).malformed += 1;
                }
            }
        }

        if !readings && health.is_none() {
            return;
        }

        let feed = self.feed_mut(endpoint);
        feed.messages += 1;
        // Health reports alone say nothing about how old the readings are
        if readings {
            feed.last_updated = Some(at);
        }
        match health {
            Some(LinkHealth::Connected) => feed.status = Some(ConnectionStatus::Connected),
            Some(LinkHealth::Degraded) | Some(LinkHealth::Error) => {
                feed.status = Some(ConnectionStatus::Degraded)
            }
            None => {
                if matches!(feed.status, None | Some(ConnectionStatus::Disconnected)) {
                    feed.status = Some(ConnectionStatus::Connected);
                }
            }
        }
    }

    /// Re-derive the raw status and apply the debounce policy.
    fn recompute(&mut self, now: Instant) {
        let raw = self.state.combined_status();
        let previous_raw = self.state.raw_status;
        self.state.raw_status = raw;

        let Some(raw) = raw else {
            return;
        };

        match self.state.settled_status {
            Some(settled) if settled == raw => {
                self.timers.cancel(&Timer::Settle);
            }
            // Improvements and the first status show immediately
            None => self.settle(raw, now),
            Some(settled) if raw < settled => self.settle(raw, now),
            Some(_) => {
                if previous_raw != Some(raw) || !self.timers.is_armed(&Timer::Settle) {
                    debug!(
                        "Status {:?} pending for {:?}",
                        raw, self.settings.debounce_window
                    );
                    self.timers
                        .arm_after(Timer::Settle, now, self.settings.debounce_window);
                }
            }
        }
    }

    fn settle(&mut self, status: ConnectionStatus, now: Instant) {
        let previous = self.state.settled_status.replace(status);
        self.timers.cancel(&Timer::Settle);
        info!("Connection status {:?} -> {:?}", previous, status);

        if status == ConnectionStatus::Connected {
            self.state.show_success = true;
            self.timers
                .arm_after(Timer::Banner, now, self.settings.banner_duration);
        } else {
            self.state.show_success = false;
            self.timers.cancel(&Timer::Banner);
        }
    }

    /// Push the working state to observers, waking them only for visible changes.
    fn publish(&self, before: &AggregatedState) {
        let notify = self.state.differs_visibly(before);
        self.tx.send_if_modified(|published| {
            *published = self.state.clone();
            notify
        });
    }
}
