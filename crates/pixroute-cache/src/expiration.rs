//! Expiration policies for negative cache entries

use std::fmt::Debug;
use std::time::{Duration, Instant};

/// Decides when a not-found record may be retried
pub trait ExpirationPolicy: Send + Sync + Debug {
    /// Whether an entry recorded at `marked_at` has expired by `now`
    fn is_expired(&self, marked_at: Instant, now: Instant) -> bool;
}

/// Entries never expire
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverExpire;

impl ExpirationPolicy for NeverExpire {
    #[inline]
    fn is_expired(&self, _marked_at: Instant, _now: Instant) -> bool {
        false
    }
}

/// Entries expire once strictly more than the window has passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpireAfter(pub Duration);

impl ExpirationPolicy for ExpireAfter {
    #[inline]
    fn is_expired(&self, marked_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(marked_at) > self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_expire_holds_forever() {
        let t = Instant::now();
        assert!(!NeverExpire.is_expired(t, t + Duration::from_secs(86_400 * 365)));
    }

    #[test]
    fn expire_after_is_exclusive_at_window() {
        let t = Instant::now();
        let policy = ExpireAfter(Duration::from_secs(2));
        assert!(!policy.is_expired(t, t + Duration::from_secs(1)));
        assert!(!policy.is_expired(t, t + Duration::from_secs(2)));
        assert!(policy.is_expired(t, t + Duration::from_secs(3)));
    }

    #[test]
    fn clock_running_backwards_is_not_expired() {
        let t = Instant::now() + Duration::from_secs(10);
        assert!(!ExpireAfter(Duration::ZERO).is_expired(t, t - Duration::from_secs(5)));
    }
}
