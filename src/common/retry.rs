// src/common/retry.rs

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::common::db_utils::{is_permanent_sql_state, sql_state};
use crate::common::error::AppError;

#[derive(Debug, Clone)]
pub struct RetryOptions {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryOptions {
    /// Espera depois da tentativa `attempt` (1-based):
    /// `min(base_delay * multiplier^(attempt-1), max_delay)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Erros que sabem se vale a pena tentar de novo.
pub trait Retryable {
    fn is_permanent(&self) -> bool;
}

impl Retryable for AppError {
    fn is_permanent(&self) -> bool {
        match self {
            AppError::DatabaseError(sqlx::Error::RowNotFound) => true,
            AppError::DatabaseError(e) => sql_state(e)
                .map(|code| is_permanent_sql_state(&code))
                .unwrap_or(false),
            AppError::InternalServerError(_) => false,
            // Erros de domínio não mudam numa segunda tentativa
            _ => true,
        }
    }
}

/// Executa `operation` até `max_attempts` vezes com backoff exponencial.
/// Erros permanentes são devolvidos na hora; senão devolve o último erro.
pub async fn with_retry<T, E, F, Fut>(options: &RetryOptions, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = options.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_permanent() => return Err(err),
            Err(err) => {
                tracing::warn!("Tentativa {}/{} falhou: {}", attempt, max_attempts, err);

                if attempt >= max_attempts {
                    return Err(err);
                }

                let delay = options.delay_after(attempt);
                tracing::debug!("Nova tentativa em {:?}", delay);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[derive(Debug)]
    struct FakeDbError(Option<&'static str>);

    impl Display for FakeDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "fake error {:?}", self.0)
        }
    }

    impl Retryable for FakeDbError {
        fn is_permanent(&self) -> bool {
            self.0.map(is_permanent_sql_state).unwrap_or(false)
        }
    }

    async fn run_failing(
        options: &RetryOptions,
        code: Option<&'static str>,
    ) -> (u32, Duration) {
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result: Result<(), FakeDbError> = with_retry(options, || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeDbError(code))
            }
        })
        .await;

        assert!(result.is_err());
        (calls.load(Ordering::SeqCst), started.elapsed())
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_key_is_not_retried() {
        let (attempts, elapsed) = run_failing(&RetryOptions::default(), Some("23505")).await;

        assert_eq!(attempts, 1);
        assert_eq!(elapsed, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_key_and_permission_errors_are_not_retried() {
        for code in ["23503", "42501"] {
            let (attempts, _) = run_failing(&RetryOptions::default(), Some(code)).await;
            assert_eq!(attempts, 1, "code {}", code);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn generic_errors_use_every_attempt_with_backoff() {
        let options = RetryOptions::default();
        let (attempts, elapsed) = run_failing(&options, None).await;

        assert_eq!(attempts, 3);
        // 1000ms + 2000ms
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(3100));
    }

    #[tokio::test(start_paused = true)]
    async fn delays_are_capped_by_max_delay() {
        let options = RetryOptions {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            backoff_multiplier: 10.0,
        };
        let (attempts, elapsed) = run_failing(&options, Some("40001")).await;

        assert_eq!(attempts, 5);
        // 1000 + 5000 + 5000 + 5000
        assert!(elapsed >= Duration::from_millis(16_000));
        assert!(elapsed < Duration::from_millis(16_100));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_success() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<u32, FakeDbError> = with_retry(&RetryOptions::default(), || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 2 { Err(FakeDbError(None)) } else { Ok(n) }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[test]
    fn delay_schedule_matches_formula() {
        let options = RetryOptions::default();
        assert_eq!(options.delay_after(1), Duration::from_millis(1000));
        assert_eq!(options.delay_after(2), Duration::from_millis(2000));
        assert_eq!(options.delay_after(3), Duration::from_millis(4000));
        assert_eq!(options.delay_after(10), Duration::from_millis(10_000));
    }

    #[test]
    fn domain_errors_are_permanent() {
        assert!(AppError::UserNotFound.is_permanent());
        assert!(AppError::DatabaseError(sqlx::Error::RowNotFound).is_permanent());
        assert!(!AppError::DatabaseError(sqlx::Error::PoolTimedOut).is_permanent());
    }
}
