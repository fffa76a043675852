use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::{AppError, RetryStrategy};

/// リトライ実行器
///
/// 冪等な読み取り（GET）専用。変更系のリクエストは1回だけ送る。
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    strategy: RetryStrategy,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryStrategy::default())
    }
}

impl RetryExecutor {
    pub fn new(strategy: RetryStrategy) -> Self {
        Self { strategy }
    }

    /// 設定値から指数バックオフの実行器を作成
    pub fn from_config(config: &Config) -> Self {
        Self::new(RetryStrategy {
            max_attempts: config.retry_max_attempts.max(1),
            initial_delay: Duration::from_millis(config.retry_initial_delay_ms),
            ..RetryStrategy::default()
        })
    }

    /// リトライなし（1回だけ実行）
    pub fn no_retry() -> Self {
        Self::new(RetryStrategy {
            max_attempts: 1,
            ..RetryStrategy::default()
        })
    }

    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    /// 操作をリトライ付きで実行
    /// リトライ不可能なエラーは即座に返す
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, AppError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !error.is_retryable() {
                        return Err(error);
                    }

                    if attempt >= self.strategy.max_attempts {
                        warn!(
                            max_attempts = self.strategy.max_attempts,
                            error = %error,
                            "Max attempts reached, giving up"
                        );
                        return Err(error);
                    }

                    let delay = self.calculate_delay(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.strategy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Operation failed, retrying"
                    );

                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// 遅延時間を計算
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let multiplier = self.strategy.backoff_multiplier.powi((attempt - 1) as i32);
        let base_delay =
            Duration::from_millis((self.strategy.initial_delay.as_millis() as f64 * multiplier) as u64);

        // 最大遅延時間でクランプ
        let delay = std::cmp::min(base_delay, self.strategy.max_delay);

        if self.strategy.add_jitter {
            add_jitter(delay)
        } else {
            delay
        }
    }
}

/// ジッターを追加（±25%のランダム変動）
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor = rng.gen_range(0.75..=1.25);
    Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_strategy(max_attempts: u32) -> RetryStrategy {
        RetryStrategy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    #[tokio::test]
    async fn test_retry_success_on_first_attempt() {
        let executor = RetryExecutor::default();
        let result = executor.execute(|| async { Ok::<i32, AppError>(42) }).await;

        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_retry_success_after_transient_failures() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let executor = RetryExecutor::new(fast_strategy(3));
        let result = executor
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    let current = count.fetch_add(1, Ordering::SeqCst) + 1;
                    if current < 3 {
                        Err(AppError::Network("connection reset".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_runs_once() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let executor = RetryExecutor::new(fast_strategy(5));
        let result = executor
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, AppError>(AppError::NotFound("list 9".to_string()))
                }
            })
            .await;

        assert_eq!(result, Err(AppError::NotFound("list 9".to_string())));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_max_attempts_reached() {
        let attempt_count = Arc::new(AtomicU32::new(0));
        let attempt_count_clone = attempt_count.clone();

        let executor = RetryExecutor::new(fast_strategy(2));
        let result = executor
            .execute(|| {
                let count = attempt_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, AppError>(AppError::ServiceUnavailable("down".to_string()))
                }
            })
            .await;

        assert!(matches!(result, Err(AppError::ServiceUnavailable(_))));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_delay_calculation() {
        let executor = RetryExecutor::new(RetryStrategy {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            backoff_multiplier: 2.0,
            add_jitter: false,
        });

        assert_eq!(executor.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(executor.calculate_delay(2), Duration::from_millis(200));
        // 最大遅延時間でクランプされる
        assert_eq!(executor.calculate_delay(3), Duration::from_millis(300));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        for _ in 0..50 {
            let delay = add_jitter(Duration::from_millis(1000));
            assert!(delay >= Duration::from_millis(750));
            assert!(delay <= Duration::from_millis(1250));
        }
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            retry_max_attempts: 0,
            retry_initial_delay_ms: 25,
            ..Config::default()
        };

        let executor = RetryExecutor::from_config(&config);

        assert_eq!(executor.strategy().max_attempts, 1);
        assert_eq!(executor.strategy().initial_delay, Duration::from_millis(25));
    }
}
