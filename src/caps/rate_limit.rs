//! Per-wallet execution rate limiting
//!
//! Two rails: a cooldown between consecutive executions and a sliding
//! 60-second window bounding executions per minute. Failed executions
//! count too, so repeated failed attempts still throttle.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Length of the sliding window
const WINDOW_SECS: i64 = 60;

/// Rate limit state for one wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimit {
    pub wallet_id: String,
    pub last_execution: Option<DateTime<Utc>>,
    pub cooldown_ms: u64,
    pub max_executions_per_minute: usize,
    /// Execution timestamps within the last 60 s, oldest first
    window: Vec<DateTime<Utc>>,
}

impl RateLimit {
    pub fn new(
        wallet_id: impl Into<String>,
        cooldown_ms: u64,
        max_executions_per_minute: usize,
    ) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            last_execution: None,
            cooldown_ms,
            max_executions_per_minute,
            window: Vec::new(),
        }
    }

    /// Record an execution attempt, successful or not
    pub fn record_execution(&mut self, now: DateTime<Utc>) {
        self.last_execution = Some(now);
        self.window.push(now);
        self.prune(now);
    }

    /// Drop window entries older than 60 s
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(WINDOW_SECS);
        self.window.retain(|t| *t > cutoff);
    }

    /// Milliseconds of cooldown still pending, if any
    pub fn remaining_cooldown_ms(&self, now: DateTime<Utc>) -> Option<u64> {
        let last = self.last_execution?;
        let elapsed_ms = (now - last).num_milliseconds().max(0) as u64;
        if elapsed_ms < self.cooldown_ms {
            Some(self.cooldown_ms - elapsed_ms)
        } else {
            None
        }
    }

    /// Executions within the sliding window as of `now`
    pub fn executions_last_minute(&mut self, now: DateTime<Utc>) -> usize {
        self.prune(now);
        self.window.len()
    }

    /// Is the window already at its ceiling?
    pub fn window_full(&mut self, now: DateTime<Utc>) -> bool {
        self.executions_last_minute(now) >= self.max_executions_per_minute
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_cooldown_remaining() {
        let mut limit = RateLimit::new("w1", 30000, 10);
        assert_eq!(limit.remaining_cooldown_ms(t0()), None);

        limit.record_execution(t0());
        limit.record_execution(t0() + Duration::seconds(10));

        // 10 s after the second execution: 20 s of the 30 s cooldown left
        let now = t0() + Duration::seconds(20);
        assert_eq!(limit.remaining_cooldown_ms(now), Some(20000));

        let past_cooldown = t0() + Duration::seconds(45);
        assert_eq!(limit.remaining_cooldown_ms(past_cooldown), None);
    }

    #[test]
    fn test_window_prunes_old_entries() {
        let mut limit = RateLimit::new("w1", 0, 10);
        limit.record_execution(t0());
        limit.record_execution(t0() + Duration::seconds(20));
        limit.record_execution(t0() + Duration::seconds(40));

        assert_eq!(limit.executions_last_minute(t0() + Duration::seconds(40)), 3);
        // 70 s in: the first entry has aged out
        assert_eq!(limit.executions_last_minute(t0() + Duration::seconds(70)), 2);
        // 101 s in: only the 40 s entry remains
        assert_eq!(limit.executions_last_minute(t0() + Duration::seconds(100)), 1);
    }

    #[test]
    fn test_window_full() {
        let mut limit = RateLimit::new("w1", 0, 3);
        for i in 0..3 {
            limit.record_execution(t0() + Duration::seconds(i));
        }
        assert!(limit.window_full(t0() + Duration::seconds(5)));
        // Window drains as entries age out
        assert!(!limit.window_full(t0() + Duration::seconds(65)));
    }
}
