//! Rate-limit backoff.

use std::time::Duration;

/// Default padding added to every rate-limit wait.
pub const DEFAULT_RATE_LIMIT_PAD: Duration = Duration::from_secs(5);

/// Time to wait after a 429: seconds until `reset` (never negative) plus `pad`.
///
/// `reset` is the epoch second from the rate-limit reset header; without it
/// the wait is `pad` alone.
pub fn rate_limit_backoff(reset: Option<i64>, now: i64, pad: Duration) -> Duration {
    let until_reset = reset
        .map(|r| r.saturating_sub(now).max(0))
        .and_then(|secs| u64::try_from(secs).ok())
        .unwrap_or(0);
    Duration::from_secs(until_reset).saturating_add(pad)
}

/// Current epoch second.
pub fn now_epoch_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_in_future() {
        let now = 1_700_000_000;
        assert_eq!(
            rate_limit_backoff(Some(now + 2), now, DEFAULT_RATE_LIMIT_PAD),
            Duration::from_secs(7)
        );
    }

    #[test]
    fn test_reset_in_past_waits_pad_only() {
        let now = 1_700_000_000;
        assert_eq!(
            rate_limit_backoff(Some(now - 30), now, DEFAULT_RATE_LIMIT_PAD),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_missing_reset_waits_pad_only() {
        assert_eq!(
            rate_limit_backoff(None, 42, Duration::from_millis(250)),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        let wait = rate_limit_backoff(Some(i64::MAX), i64::MIN, Duration::from_secs(5));
        assert_eq!(wait, Duration::from_secs(i64::MAX as u64 + 5));
    }

    #[test]
    fn test_now_is_recent() {
        assert!(now_epoch_secs() > 1_600_000_000);
    }
}
