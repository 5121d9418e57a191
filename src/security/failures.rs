//! Failed authentication tracking.
//!
//! Counts failures per source inside a resetting window. Once a source
//! reaches the threshold within one window it is written to the blacklist.
//! A failure arriving after the window has elapsed starts a fresh window
//! with a count of one.
//!
//! Counters live in memory only and reset on restart. Records are not
//! evicted.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::SecurityConfig;
use crate::observability::metrics;
use crate::security::blacklist::{BlacklistError, BlacklistStore};

#[derive(Debug, Clone, Copy)]
struct FailureRecord {
    count: u32,
    window_start: Instant,
}

/// Per-source failure counter feeding the blacklist.
pub struct FailureTracker {
    records: DashMap<String, FailureRecord>,
    threshold: u32,
    window: Duration,
    blacklist: Arc<BlacklistStore>,
}

impl FailureTracker {
    pub fn new(blacklist: Arc<BlacklistStore>, threshold: u32, window: Duration) -> Self {
        Self {
            records: DashMap::new(),
            threshold,
            window,
            blacklist,
        }
    }

    pub fn from_config(config: &SecurityConfig, blacklist: Arc<BlacklistStore>) -> Self {
        Self::new(
            blacklist,
            config.failed_threshold,
            Duration::from_secs(config.failed_window_secs),
        )
    }

    /// Record a failed attempt from `id` now. Returns the count in the
    /// current window.
    pub fn record_failure(&self, id: &str) -> Result<u32, BlacklistError> {
        self.record_failure_at(id, Instant::now())
    }

    /// Record a failed attempt from `id` observed at `now`.
    pub fn record_failure_at(&self, id: &str, now: Instant) -> Result<u32, BlacklistError> {
        // The entry guard holds the shard lock across read-check-update.
        let count = {
            let mut record = self.records.entry(id.to_string()).or_insert(FailureRecord {
                count: 0,
                window_start: now,
            });
            if now.saturating_duration_since(record.window_start) > self.window {
                *record = FailureRecord {
                    count: 0,
                    window_start: now,
                };
            }
            record.count = record.count.saturating_add(1);
            record.count
        };

        metrics::record_auth_failure();
        tracing::info!(
            source = %id,
            attempts = count,
            threshold = self.threshold,
            "Authentication failure recorded"
        );

        if count >= self.threshold {
            self.blacklist.add(id)?;
        }
        Ok(count)
    }

    /// Failures counted for `id` in its current window.
    pub fn attempts(&self, id: &str) -> u32 {
        self.records.get(id).map(|r| r.count).unwrap_or(0)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn store() -> (Arc<BlacklistStore>, PathBuf) {
        let path = std::env::temp_dir().join(format!("failures-{}.txt", uuid::Uuid::new_v4()));
        (Arc::new(BlacklistStore::open(&path).unwrap()), path)
    }

    #[test]
    fn test_threshold_blacklists_on_fifth_failure() {
        let (blacklist, path) = store();
        let tracker = FailureTracker::new(blacklist.clone(), 5, Duration::from_secs(600));
        let start = Instant::now();

        for i in 1..=4 {
            let count = tracker
                .record_failure_at("203.0.113.5", start + Duration::from_secs(i * 10))
                .unwrap();
            assert_eq!(count, i as u32);
            assert!(!blacklist.is_blacklisted("203.0.113.5").unwrap());
        }

        tracker
            .record_failure_at("203.0.113.5", start + Duration::from_secs(50))
            .unwrap();
        assert!(blacklist.is_blacklisted("203.0.113.5").unwrap());

        std::fs::remove_file(path).unwrap_or_default();
    }

    #[test]
    fn test_expired_window_resets_count() {
        let (blacklist, path) = store();
        let tracker = FailureTracker::new(blacklist.clone(), 5, Duration::from_secs(600));
        let start = Instant::now();

        for _ in 0..4 {
            tracker.record_failure_at("198.51.100.1", start).unwrap();
        }
        let count = tracker
            .record_failure_at("198.51.100.1", start + Duration::from_secs(601))
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(tracker.attempts("198.51.100.1"), 1);
        assert!(!blacklist.is_blacklisted("198.51.100.1").unwrap());

        std::fs::remove_file(path).unwrap_or_default();
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let (blacklist, path) = store();
        let tracker = FailureTracker::new(blacklist, 5, Duration::from_secs(600));
        let start = Instant::now();

        tracker.record_failure_at("192.0.2.1", start).unwrap();
        let count = tracker
            .record_failure_at("192.0.2.1", start + Duration::from_secs(600))
            .unwrap();
        assert_eq!(count, 2);

        std::fs::remove_file(path).unwrap_or_default();
    }

    #[test]
    fn test_sources_are_independent() {
        let (blacklist, path) = store();
        let tracker = FailureTracker::new(blacklist.clone(), 2, Duration::from_secs(600));

        tracker.record_failure("10.0.0.1").unwrap();
        tracker.record_failure("10.0.0.2").unwrap();
        assert!(!blacklist.is_blacklisted("10.0.0.1").unwrap());

        tracker.record_failure("10.0.0.1").unwrap();
        assert!(blacklist.is_blacklisted("10.0.0.1").unwrap());
        assert!(!blacklist.is_blacklisted("10.0.0.2").unwrap());
        assert_eq!(tracker.attempts("10.0.0.2"), 1);
        assert_eq!(tracker.attempts("10.0.0.3"), 0);

        std::fs::remove_file(path).unwrap_or_default();
    }

    #[test]
    fn test_concurrent_failures_are_not_lost() {
        let (blacklist, path) = store();
        let tracker = FailureTracker::new(blacklist.clone(), 1_000, Duration::from_secs(600));

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..25 {
                        tracker.record_failure("10.9.9.9").unwrap();
                    }
                });
            }
        });

        assert_eq!(tracker.attempts("10.9.9.9"), 200);
        assert!(!blacklist.is_blacklisted("10.9.9.9").unwrap());

        std::fs::remove_file(path).unwrap_or_default();
    }

    #[test]
    fn test_failures_past_threshold_append_once() {
        let (blacklist, path) = store();
        let tracker = FailureTracker::new(blacklist, 2, Duration::from_secs(600));

        for _ in 0..5 {
            tracker.record_failure("10.2.2.2").unwrap();
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "10.2.2.2\n");

        std::fs::remove_file(path).unwrap_or_default();
    }
}
