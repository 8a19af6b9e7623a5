//! 存储调用的重试与超时
//!
//! 读操作：每次尝试独立超时，超时与可重试错误都会退避重试。
//! 写操作：仅对"确定未执行"的错误（连接获取失败、锁冲突）重试，
//! 整体超时后不再重放，避免计数被重复累加。

use std::future::Future;
use std::time::Duration;

use sea_orm::DbErr;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::DatabaseConfig;

/// 判断数据库错误是否可重试
pub fn is_retryable_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(runtime_err) | DbErr::Query(runtime_err) => {
            is_retryable_runtime_error(runtime_err)
        }
        _ => false,
    }
}

/// 死锁、锁等待超时、SQLite BUSY/LOCKED
fn is_retryable_runtime_error(err: &sea_orm::error::RuntimeErr) -> bool {
    use sea_orm::error::RuntimeErr;

    match err {
        RuntimeErr::SqlxError(sqlx_err) => {
            use std::ops::Deref;
            if let Some(db_err) = sqlx_err.deref().as_database_error()
                && let Some(code) = db_err.code()
            {
                return matches!(
                    code.as_ref(),
                    // MySQL / PostgreSQL / SQLite
                    "1213" | "1205" | "40001" | "40P01" | "5" | "6"
                );
            }
            is_retryable_message(&sqlx_err.to_string().to_lowercase())
        }
        RuntimeErr::Internal(msg) => is_retryable_message(&msg.to_lowercase()),
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

fn is_retryable_message(err_str: &str) -> bool {
    err_str.contains("deadlock")
        || err_str.contains("lock wait timeout")
        || err_str.contains("database is locked")
        || err_str.contains("serialization failure")
}

/// 重试与超时策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// 单次调用超时
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            timeout_ms: 3000,
        }
    }
}

impl From<&DatabaseConfig> for RetryPolicy {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_retries: config.retry_count,
            base_delay_ms: config.retry_base_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
            timeout_ms: config.timeout_ms.max(1),
        }
    }
}

impl RetryPolicy {
    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// 计算第 `attempt` 次重试前的等待（指数退避 + 0-25% 抖动）
    fn backoff(&self, attempt: u32) -> u64 {
        use rand::RngExt;
        let exp_delay = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp_delay.min(self.max_delay_ms);
        let jitter = rand::rng().random_range(0..=capped / 4);
        capped.saturating_add(jitter)
    }

    /// 读操作：每次尝试都有独立超时，超时也会重试
    pub async fn read<T, F, Fut>(&self, op: &str, mut operation: F) -> Result<T, DbErr>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbErr>>,
    {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.timeout(), operation()).await {
                Ok(result) => result,
                Err(_) => Err(timed_out(op, self.timeout_ms)),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("Operation '{}' succeeded after {} retries", op, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if (is_retryable_error(&e) || is_timeout(&e)) && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    warn!(
                        "Operation '{}' failed (attempt {}/{}): {}; retrying in {} ms",
                        op,
                        attempt,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// 写操作：整体受超时约束，超时不重放
    pub async fn write<T, F, Fut>(&self, op: &str, mut operation: F) -> Result<T, DbErr>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DbErr>>,
    {
        let attempts = async {
            let mut attempt = 0;
            loop {
                match operation().await {
                    Ok(value) => return Ok(value),
                    Err(e) if is_retryable_error(&e) && attempt < self.max_retries => {
                        attempt += 1;
                        let delay = self.backoff(attempt);
                        warn!(
                            "Write '{}' failed (attempt {}/{}): {}; retrying in {} ms",
                            op,
                            attempt,
                            self.max_retries + 1,
                            e,
                            delay
                        );
                        sleep(Duration::from_millis(delay)).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        // 写操作的总预算包含重试等待
        let budget = self.timeout() * (self.max_retries + 1);
        match tokio::time::timeout(budget, attempts).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Write '{}' timed out, giving up", op);
                Err(timed_out(op, budget.as_millis() as u64))
            }
        }
    }
}

fn timed_out(op: &str, timeout_ms: u64) -> DbErr {
    DbErr::Custom(format!("Operation '{}' timed out after {}ms", op, timeout_ms))
}

fn is_timeout(err: &DbErr) -> bool {
    matches!(err, DbErr::Custom(msg) if msg.contains("timed out"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay_ms: 5,
            max_delay_ms: 20,
            timeout_ms: 50,
        }
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable_error(&DbErr::ConnectionAcquire(
            sea_orm::error::ConnAcquireErr::Timeout
        )));
        assert!(is_retryable_error(&DbErr::Query(
            sea_orm::error::RuntimeErr::Internal("database is locked".to_string())
        )));
        assert!(is_retryable_error(&DbErr::Exec(
            sea_orm::error::RuntimeErr::Internal("Deadlock found".to_string())
        )));
        assert!(!is_retryable_error(&DbErr::RecordNotFound(
            "missing".to_string()
        )));
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert!((100..=125).contains(&policy.backoff(1)));
        assert!((200..=250).contains(&policy.backoff(2)));
        assert!((2000..=2500).contains(&policy.backoff(10)));
    }

    #[tokio::test]
    async fn test_read_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .read("flaky_read", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(DbErr::ConnectionAcquire(
                            sea_orm::error::ConnAcquireErr::Timeout,
                        ))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_read_timeout_surfaces_as_timed_out() {
        let calls = AtomicU32::new(0);
        let result: Result<(), DbErr> = fast_policy(1)
            .read("slow_read", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    sleep(Duration::from_millis(500)).await;
                    Ok(())
                }
            })
            .await;

        let err = result.unwrap_err();
        assert!(is_timeout(&err));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_write_does_not_retry_non_retryable() {
        let calls = AtomicU32::new(0);
        let result: Result<(), DbErr> = fast_policy(3)
            .write("bad_write", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DbErr::RecordNotFound("missing".to_string())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_write_timeout_is_not_replayed() {
        let calls = AtomicU32::new(0);
        let result: Result<(), DbErr> = fast_policy(0)
            .write("slow_write", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    sleep(Duration::from_millis(500)).await;
                    Ok(())
                }
            })
            .await;

        assert!(is_timeout(&result.unwrap_err()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
