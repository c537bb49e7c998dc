use std::future::Future;
use std::time::{Duration, Instant};

use report_core::{ReportResult, RetryConfig};
use tracing::{error, info, warn};

use super::lock::FileLock;

/// 带指数退避的重试执行器
///
/// 每次尝试前获取锁（如果配置了锁），尝试结束后立即释放，等待退避期间不持有锁。
/// 只有 [`report_core::ReportError::is_transient`] 判定为瞬时的错误会被重试；
/// 从首次尝试起的耗时超过 `backoff_max` 后放弃并返回最后一次的错误。
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    lock: Option<FileLock>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig, lock: Option<FileLock>) -> Self {
        Self { config, lock }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn lock(&self) -> Option<&FileLock> {
        self.lock.as_ref()
    }

    /// 执行一个逻辑操作，`operation` 每次尝试都会被重新调用
    pub async fn run<T, F, Fut>(&self, name: &str, mut operation: F) -> ReportResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ReportResult<T>>,
    {
        let start = Instant::now();
        let max_elapsed = self.config.backoff_max();
        let mut backoff = self.config.backoff_start();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let result = {
                let _guard = match &self.lock {
                    Some(lock) => Some(lock.acquire().await?),
                    None => None,
                };
                operation().await
            };

            let err = match result {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{} 在第 {} 次尝试后成功", name, attempt);
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(err);
            }

            let elapsed = start.elapsed();
            if elapsed > max_elapsed {
                error!(
                    "{} 重试 {} 次后放弃，已耗时 {:?}: {}",
                    name, attempt, elapsed, err
                );
                return Err(err);
            }

            let delay = self.jittered(backoff);
            warn!(
                "{} 第 {} 次尝试遇到瞬时错误，{:?} 后重试: {}",
                name, attempt, delay, err
            );
            tokio::time::sleep(delay).await;

            backoff = self.next_backoff(backoff);
        }
    }

    fn next_backoff(&self, current: Duration) -> Duration {
        let next = current.as_secs_f64() * self.config.backoff_multiplier;
        let cap = self.config.backoff_max().as_secs_f64();
        Duration::from_secs_f64(next.min(cap))
    }

    /// 添加随机抖动以避免多个进程同时醒来
    fn jittered(&self, delay: Duration) -> Duration {
        let base = delay.as_secs_f64();
        let jitter = base * self.config.jitter_factor * (rand::random::<f64>() - 0.5) * 2.0;
        Duration::from_secs_f64((base + jitter).max(0.0))
    }
}
