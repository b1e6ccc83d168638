//! Deadline bookkeeping for timers owned by the event loop.
//!
//! Every timer in the console (connection timeouts, reconnect back-off,
//! debounce, banner auto-hide) is a keyed deadline in a [`Schedule`]. The
//! owner polls the schedule from its loop, so cancelling a timer is just
//! removing its key and at most one deadline exists per key.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

/// Longest delay a timer can be armed with.
const MAX_DELAY: Duration = Duration::from_secs(86_400 * 365 * 30);

/// A set of keyed deadlines.
#[derive(Debug, Clone)]
pub struct Schedule<K> {
    deadlines: HashMap<K, Instant>,
}

impl<K> Default for Schedule<K> {
    fn default() -> Self {
        Self {
            deadlines: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> Schedule<K> {
    /// Create an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` to fire at `at`, replacing any previous deadline for it.
    pub fn arm(&mut self, key: K, at: Instant) {
        self.deadlines.insert(key, at);
    }

    /// Arm `key` to fire `delay` after `now`. Longer delays are clamped.
    pub fn arm_after(&mut self, key: K, now: Instant, delay: Duration) {
        self.arm(key, now + delay.min(MAX_DELAY));
    }

    /// Cancel `key`. Returns true if it was armed.
    pub fn cancel(&mut self, key: &K) -> bool {
        self.deadlines.remove(key).is_some()
    }

    /// Check if `key` is armed.
    pub fn is_armed(&self, key: &K) -> bool {
        self.deadlines.contains_key(key)
    }

    /// Deadline of `key`, if armed.
    pub fn deadline(&self, key: &K) -> Option<Instant> {
        self.deadlines.get(key).copied()
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every key due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let mut due: Vec<(K, Instant)> = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(k, at)| (k.clone(), *at))
            .collect();
        due.sort_by_key(|(_, at)| *at);

        for (key, _) in &due {
            self.deadlines.remove(key);
        }
        due.into_iter().map(|(k, _)| k).collect()
    }

    /// Iterate over the armed keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.deadlines.keys()
    }

    /// Cancel every key matching the predicate.
    pub fn cancel_where<F>(&mut self, mut f: F)
    where
        F: FnMut(&K) -> bool,
    {
        self.deadlines.retain(|k, _| !f(k));
    }

    /// Number of armed deadlines.
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    /// Check if nothing is armed.
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

/// Sleep until `deadline`, or forever if there is none.
///
/// Meant to be used as a `tokio::select!` branch next to an event source.
pub async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_take_due_orders_by_deadline() {
        let now = Instant::now();
        let mut schedule = Schedule::new();
        schedule.arm_after("late", now, Duration::from_secs(5));
        schedule.arm_after("early", now, Duration::from_secs(1));
        schedule.arm_after("future", now, Duration::from_secs(60));

        let due = schedule.take_due(now + Duration::from_secs(10));
        assert_eq!(due, vec!["early", "late"]);
        assert_eq!(schedule.len(), 1);
        assert!(schedule.is_armed(&"future"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_deadline() {
        let now = Instant::now();
        let mut schedule = Schedule::new();
        schedule.arm_after(1u8, now, Duration::from_secs(1));
        schedule.arm_after(1u8, now, Duration::from_secs(9));

        assert_eq!(schedule.len(), 1);
        assert!(schedule.take_due(now + Duration::from_secs(2)).is_empty());
        assert_eq!(schedule.next_deadline(), Some(now + Duration::from_secs(9)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_delay_is_clamped() {
        let now = Instant::now();
        let mut schedule = Schedule::new();
        schedule.arm_after("never", now, Duration::MAX);

        assert_eq!(schedule.deadline(&"never"), Some(now + MAX_DELAY));
        assert!(schedule.take_due(now + Duration::from_secs(86_400)).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_where() {
        let now = Instant::now();
        let mut schedule = Schedule::new();
        schedule.arm_after(("gas", 1), now, Duration::from_secs(1));
        schedule.arm_after(("gas", 2), now, Duration::from_secs(1));
        schedule.arm_after(("status", 1), now, Duration::from_secs(1));

        schedule.cancel_where(|(feed, _)| *feed == "gas");
        assert_eq!(schedule.len(), 1);
        assert!(!schedule.cancel(&("gas", 1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_until_deadline() {
        let start = Instant::now();
        sleep_until(Some(start + Duration::from_secs(3))).await;
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
