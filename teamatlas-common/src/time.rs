//! Timestamp utilities

use chrono::Utc;

/// Current wall-clock time in Unix milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// True when an entry written at `timestamp_ms` with `ttl_ms` has expired at `now_ms`
///
/// An entry is live for exactly `ttl_ms`; at `timestamp_ms + ttl_ms` it is expired.
pub fn is_expired(timestamp_ms: i64, ttl_ms: i64, now_ms: i64) -> bool {
    now_ms.saturating_sub(timestamp_ms) >= ttl_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_now_millis_is_after_2000() {
        assert!(now_millis() > 946_684_800_000);
    }

    #[tokio::test]
    async fn test_now_millis_advances() {
        let t1 = now_millis();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let t2 = now_millis();
        assert!(t2 > t1);
    }

    #[test]
    fn test_is_expired_boundaries() {
        assert!(!is_expired(1_000, 500, 1_000));
        assert!(!is_expired(1_000, 500, 1_499));
        assert!(is_expired(1_000, 500, 1_500));
        assert!(is_expired(1_000, 0, 1_000));
    }

    #[test]
    fn test_is_expired_clock_skew() {
        // Entry stamped in the future is not expired
        assert!(!is_expired(2_000, 500, 1_000));
    }
}
