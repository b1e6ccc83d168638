//! The canonical console state published by the aggregator.

use std::collections::BTreeMap;

use cems_types::Parameter;
use tokio::time::Instant;

use super::decoder::Readings;
use crate::stream::FeedEndpoint;

/// Coalesced connection status.
///
/// Ordered from best to worst so the combined status of several feeds is
/// simply the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectionStatus {
    Connected,
    /// The stream is up but the backend reports a device-side problem.
    Degraded,
    Disconnected,
}

impl ConnectionStatus {
    /// Returns a short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "CONNECTED",
            ConnectionStatus::Degraded => "DEVICE ERROR",
            ConnectionStatus::Disconnected => "OFFLINE",
        }
    }
}

/// Per-feed bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedSnapshot {
    /// `None` until the feed produced its first signal.
    pub status: Option<ConnectionStatus>,
    /// When the feed last delivered a well-formed reading.
    pub last_updated: Option<Instant>,
    /// Payloads that could not be decoded.
    pub malformed: u64,
    /// Well-formed payloads received.
    pub messages: u64,
    /// Most recent transport error, cleared when the feed reopens.
    pub last_error: Option<String>,
}

/// Snapshot of everything the console displays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedState {
    /// Latest raw value per parameter.
    pub values: Readings,
    /// Latest O2-corrected value per corrected parameter.
    pub corrected_values: Readings,
    /// Latest status/alarm bit vector.
    pub bits: Vec<bool>,
    pub feeds: BTreeMap<FeedEndpoint, FeedSnapshot>,
    /// Worst status across reporting feeds, applied immediately.
    pub raw_status: Option<ConnectionStatus>,
    /// Debounced status; what the console renders.
    pub settled_status: Option<ConnectionStatus>,
    /// Success banner hint, raised when the console becomes connected.
    pub show_success: bool,
}

impl AggregatedState {
    /// Latest value for `parameter`, if one has been received.
    pub fn value(&self, parameter: Parameter) -> Option<f64> {
        self.values.get(&parameter).copied().flatten()
    }

    /// Latest backend-corrected value for `parameter`.
    pub fn corrected(&self, parameter: Parameter) -> Option<f64> {
        self.corrected_values.get(&parameter).copied().flatten()
    }

    /// Bookkeeping for `endpoint`, if it has reported.
    pub fn feed(&self, endpoint: &FeedEndpoint) -> Option<&FeedSnapshot> {
        self.feeds.get(endpoint)
    }

    /// Worst status among feeds that have reported.
    pub fn combined_status(&self) -> Option<ConnectionStatus> {
        self.feeds.values().filter_map(|f| f.status).max()
    }

    /// Most recent successful update on any feed.
    pub fn last_updated(&self) -> Option<Instant> {
        self.feeds.values().filter_map(|f| f.last_updated).max()
    }

    /// Total malformed payloads across feeds.
    pub fn malformed_total(&self) -> u64 {
        self.feeds.values().map(|f| f.malformed).sum()
    }

    /// Check if a change to `other` is something observers must be told about.
    ///
    /// Raw status, timestamps and counters change constantly and are only
    /// picked up on the next read.
    pub fn differs_visibly(&self, other: &AggregatedState) -> bool {
        self.settled_status != other.settled_status
            || self.show_success != other.show_success
            || self.values != other.values
            || self.corrected_values != other.corrected_values
            || self.bits != other.bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_status_is_worst_reported() {
        let mut state = AggregatedState::default();
        assert_eq!(state.combined_status(), None);

        state.feeds.insert(
            FeedEndpoint::gas(),
            FeedSnapshot {
                status: Some(ConnectionStatus::Connected),
                ..Default::default()
            },
        );
        // A feed that has not reported does not drag the status down
        state.feeds.insert(FeedEndpoint::status(), FeedSnapshot::default());
        assert_eq!(state.combined_status(), Some(ConnectionStatus::Connected));

        state.feeds.get_mut(&FeedEndpoint::status()).unwrap().status =
            Some(ConnectionStatus::Degraded);
        assert_eq!(state.combined_status(), Some(ConnectionStatus::Degraded));
    }

    #[test]
    fn test_counters_are_not_visible_changes() {
        let before = AggregatedState::default();
        let mut after = before.clone();
        after.feeds.entry(FeedEndpoint::gas()).or_default().malformed = 3;
        after.raw_status = Some(ConnectionStatus::Disconnected);
        assert!(!after.differs_visibly(&before));

        after.bits = vec![true];
        assert!(after.differs_visibly(&before));
    }
}
