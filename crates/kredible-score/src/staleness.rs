//! Score staleness policy
//!
//! A cached credit score is served until it goes stale; a stale or absent
//! score forces a recomputation. Callers that need freshness on demand call
//! the engine's compute path directly and bypass this guard.

use chrono::{DateTime, Duration, Utc};

use kredible_common::SCORE_MAX_AGE_DAYS;

/// Time-based staleness check for cached credit scores
#[derive(Debug, Clone)]
pub struct StalenessPolicy {
    max_age: Duration,
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::days(SCORE_MAX_AGE_DAYS),
        }
    }
}

impl StalenessPolicy {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    pub fn days(days: i64) -> Self {
        Self::new(Duration::days(days))
    }

    /// Stale if never computed or older than the configured age
    pub fn is_stale(&self, last_updated: Option<DateTime<Utc>>) -> bool {
        match last_updated {
            None => true,
            Some(ts) => Utc::now() - ts > self.max_age,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_is_stale() {
        assert!(StalenessPolicy::default().is_stale(None));
    }

    #[test]
    fn test_recent_is_fresh() {
        let policy = StalenessPolicy::default();
        assert!(!policy.is_stale(Some(Utc::now())));
        assert!(!policy.is_stale(Some(Utc::now() - Duration::days(29))));
    }

    #[test]
    fn test_old_is_stale() {
        let policy = StalenessPolicy::default();
        assert!(policy.is_stale(Some(Utc::now() - Duration::days(31))));
    }

    #[test]
    fn test_custom_age() {
        let policy = StalenessPolicy::days(7);
        assert!(!policy.is_stale(Some(Utc::now() - Duration::days(6))));
        assert!(policy.is_stale(Some(Utc::now() - Duration::days(8))));
    }
}
