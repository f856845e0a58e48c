//! Inter-chunk pacing
//!
//! The executor pauses between chunk submissions to bound its rate toward
//! the relay. The pause is behind a trait so a token-bucket or leaky-bucket
//! limiter can replace plain sleeping without touching pipeline logic.

use std::time::Duration;

use async_trait::async_trait;

/// Pause policy applied between chunk submissions
#[async_trait]
pub trait ChunkPacer: Send + Sync {
    async fn pause(&self, interval: Duration);
}

/// Default pacer: sleep for the configured interval
#[derive(Debug, Default)]
pub struct SleepPacer;

#[async_trait]
impl ChunkPacer for SleepPacer {
    async fn pause(&self, interval: Duration) {
        if !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }
}

/// Pacer that never waits. For tests and manual draining.
#[derive(Debug, Default)]
pub struct NoopPacer;

#[async_trait]
impl ChunkPacer for NoopPacer {
    async fn pause(&self, _interval: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_sleep_pacer_waits() {
        let pacer = SleepPacer;
        let start = Instant::now();
        pacer.pause(Duration::from_millis(30)).await;
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[tokio::test]
    async fn test_noop_pacer_returns_immediately() {
        let pacer = NoopPacer;
        let start = Instant::now();
        pacer.pause(Duration::from_secs(5)).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
