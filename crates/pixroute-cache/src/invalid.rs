//! Negative cache of sources known to be missing
//!
//! Entries live until their [`ExpirationPolicy`] says otherwise. Expired
//! entries are dropped on the next lookup, or in bulk by
//! [`InvalidSources::sweep_expired`].

use crate::clock::Clock;
use crate::expiration::ExpirationPolicy;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;

/// Sources recorded as not found, with the time they were recorded
#[derive(Debug)]
pub struct InvalidSources {
    entries: DashMap<String, Instant>,
    clock: Arc<dyn Clock>,
    policy: Arc<dyn ExpirationPolicy>,
}

impl InvalidSources {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, policy: Arc<dyn ExpirationPolicy>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            policy,
        }
    }

    /// Record `source_id` as not found at the current time
    pub fn mark(&self, source_id: &str) {
        let now = self.clock.now();
        self.entries.insert(source_id.to_string(), now);
        tracing::debug!(source_id, "source marked invalid");
    }

    /// Whether `source_id` is recorded and not yet expired
    ///
    /// An expired record is removed as a side effect.
    pub fn is_invalid(&self, source_id: &str) -> bool {
        let now = self.clock.now();
        let Some(marked_at) = self.entries.get(source_id).map(|e| *e.value()) else {
            return false;
        };
        if !self.policy.is_expired(marked_at, now) {
            return true;
        }

        self.entries
            .remove_if(source_id, |_, at| self.policy.is_expired(*at, now));
        tracing::trace!(source_id, "invalid entry expired");
        false
    }

    /// Remove every expired record; returns how many were removed
    ///
    /// Keys are snapshotted first, so concurrent marks and lookups proceed
    /// while the sweep runs.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();

        let removed = keys
            .iter()
            .filter(|key| {
                self.entries
                    .remove_if(key.as_str(), |_, at| self.policy.is_expired(*at, now))
                    .is_some()
            })
            .count();

        if removed > 0 {
            tracing::debug!(removed, remaining = self.entries.len(), "swept invalid sources");
        }
        removed
    }

    /// Forget a source regardless of expiry; returns whether it was recorded
    pub fn remove(&self, source_id: &str) -> bool {
        self.entries.remove(source_id).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Recorded entries, expired or not
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::expiration::{ExpireAfter, NeverExpire};
    use std::time::Duration;

    fn two_unit_window() -> (Arc<ManualClock>, InvalidSources) {
        let clock = Arc::new(ManualClock::new());
        let invalid = InvalidSources::new(
            Arc::clone(&clock) as Arc<dyn Clock>,
            Arc::new(ExpireAfter(Duration::from_secs(2))),
        );
        (clock, invalid)
    }

    #[test]
    fn invalid_within_window_retryable_after() {
        let (clock, invalid) = two_unit_window();
        invalid.mark("missing.png");

        clock.advance(Duration::from_secs(1));
        assert!(invalid.is_invalid("missing.png"));

        clock.advance(Duration::from_secs(2));
        assert!(!invalid.is_invalid("missing.png"));
        // lazily purged
        assert!(invalid.is_empty());
    }

    #[test]
    fn unknown_source_is_not_invalid() {
        let (_clock, invalid) = two_unit_window();
        assert!(!invalid.is_invalid("never-seen.png"));
    }

    #[test]
    fn remarking_restarts_window() {
        let (clock, invalid) = two_unit_window();
        invalid.mark("flaky.png");
        clock.advance(Duration::from_secs(2));
        invalid.mark("flaky.png");
        clock.advance(Duration::from_secs(2));
        assert!(invalid.is_invalid("flaky.png"));
    }

    #[test]
    fn sweep_removes_only_expired() {
        let (clock, invalid) = two_unit_window();
        invalid.mark("old.png");
        clock.advance(Duration::from_secs(2));
        invalid.mark("new.png");
        clock.advance(Duration::from_secs(1));

        assert_eq!(invalid.sweep_expired(), 1);
        assert_eq!(invalid.len(), 1);
        assert!(invalid.is_invalid("new.png"));
    }

    #[test]
    fn never_expire_keeps_entries() {
        let clock = Arc::new(ManualClock::new());
        let invalid = InvalidSources::new(Arc::clone(&clock) as Arc<dyn Clock>, Arc::new(NeverExpire));
        invalid.mark("gone.png");
        clock.advance(Duration::from_secs(1_000_000));

        assert!(invalid.is_invalid("gone.png"));
        assert_eq!(invalid.sweep_expired(), 0);
    }

    #[test]
    fn remove_and_clear() {
        let (_clock, invalid) = two_unit_window();
        invalid.mark("a.png");
        invalid.mark("b.png");

        assert!(invalid.remove("a.png"));
        assert!(!invalid.remove("a.png"));
        invalid.clear();
        assert!(invalid.is_empty());
    }
}
