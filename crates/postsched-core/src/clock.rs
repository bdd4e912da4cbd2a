//! Time source and delay abstraction
//!
//! The dispatcher decides "is this post due" and "cool off before the next
//! attempt" through a [`Clock`], so tests can drive both without waiting on the
//! wall clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Provides the current time and suspends the calling task
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current UTC time
    fn now(&self) -> DateTime<Utc>;

    /// Suspend the current task for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by `chrono` and `tokio::time`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn system_clock_moves_forward() {
        let clock = SystemClock;
        let before = clock.now();
        clock.sleep(Duration::from_millis(5)).await;
        assert!(clock.now() > before);
    }
}
