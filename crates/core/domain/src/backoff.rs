//! 有界指数退避。
//!
//! 写入重试与断线重连共用：第 n 次等待为 `initial * 2^(n-1)`，上限 `max`。

use std::time::Duration;

/// 退避参数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl BackoffPolicy {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let max = if max < initial { initial } else { max };
        Self { initial, max }
    }

    pub fn from_millis(initial_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(initial_ms), Duration::from_millis(max_ms))
    }

    /// 第 `attempt` 次失败后的等待时长（attempt 从 1 开始）。
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let shift = (attempt - 1).min(31);
        let factor = 1u32 << shift;
        self.initial
            .checked_mul(factor)
            .map(|delay| delay.min(self.max))
            .unwrap_or(self.max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_millis(200, 5_000)
    }
}

/// 带状态的退避计数器。
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// 记一次失败并返回下一次等待时长。
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.policy.delay_for(self.attempt)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_until_cap() {
        let policy = BackoffPolicy::from_millis(100, 1_000);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(1_000));
    }

    #[test]
    fn backoff_reset_starts_over() {
        let mut backoff = Backoff::new(BackoffPolicy::from_millis(10, 100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
        assert_eq!(backoff.next_delay(), Duration::from_millis(20));
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(10));
    }

    #[test]
    fn max_below_initial_is_raised() {
        let policy = BackoffPolicy::from_millis(500, 100);
        assert_eq!(policy.max, Duration::from_millis(500));
        assert_eq!(policy.delay_for(3), Duration::from_millis(500));
    }
}
