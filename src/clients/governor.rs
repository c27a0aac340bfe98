//! 请求节流
//!
//! `RateGovernor` 保证同一客户端两次请求的开始时间至少间隔 `min_interval`；
//! 具体怎么"等"交给 [`Sleeper`]，生产环境用 tokio 定时器。

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// 等待能力
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// 基于 tokio 定时器的等待
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// "距上次调用至少间隔 N" 的节流器，每个客户端各持有一个
#[derive(Debug, Clone)]
pub struct RateGovernor {
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl RateGovernor {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// 在 `now` 时刻发起调用还需要等待多久
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_call {
            Some(last) => self
                .min_interval
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// 等到可以发起下一次调用，并记录本次调用的开始时间
    pub async fn wait(&mut self, sleeper: &dyn Sleeper) {
        let remaining = self.remaining(Instant::now());
        if !remaining.is_zero() {
            sleeper.sleep(remaining).await;
        }
        self.last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::testing::RecordingSleeper;

    #[test]
    fn first_call_never_waits() {
        let governor = RateGovernor::new(Duration::from_secs(1));
        assert_eq!(governor.remaining(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn remaining_shrinks_with_elapsed_time() {
        let start = Instant::now();
        let governor = RateGovernor {
            min_interval: Duration::from_secs(1),
            last_call: Some(start),
        };

        assert_eq!(
            governor.remaining(start + Duration::from_millis(300)),
            Duration::from_millis(700)
        );
        assert_eq!(governor.remaining(start + Duration::from_secs(2)), Duration::ZERO);
    }

    #[tokio::test]
    async fn back_to_back_calls_sleep_once() {
        let sleeper = RecordingSleeper::default();
        let mut governor = RateGovernor::new(Duration::from_secs(1));

        governor.wait(&sleeper).await;
        governor.wait(&sleeper).await;

        let calls = sleeper.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0] <= Duration::from_secs(1));
        assert!(calls[0] > Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_sleeper_advances_paused_clock() {
        let start = Instant::now();
        TokioSleeper.sleep(Duration::from_secs(5)).await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }
}
