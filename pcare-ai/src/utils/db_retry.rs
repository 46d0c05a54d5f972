//! SQLite lock retry
//!
//! Session and plant writes can collide with a background pipeline task on
//! the same database file. Such writes are retried while SQLite reports
//! "database is locked", within the `database_max_lock_wait_ms` budget.

use pcare_common::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};

const FIRST_BACKOFF: Duration = Duration::from_millis(10);
const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Run `operation`, retrying lock errors with doubling backoff
///
/// Any other error is returned at once. Once `max_wait_ms` has passed the
/// lock error becomes `Error::Internal`.
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let deadline = Instant::now() + Duration::from_millis(max_wait_ms);
    let mut backoff = FIRST_BACKOFF;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let err = match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    tracing::debug!(operation = operation_name, attempts, "Write succeeded after lock retry");
                }
                return Ok(value);
            }
            Err(err) if is_lock_error(&err) => err,
            Err(err) => return Err(err),
        };

        let now = Instant::now();
        if now >= deadline {
            tracing::error!(
                operation = operation_name,
                attempts,
                max_wait_ms,
                error = %err,
                "Giving up on locked database"
            );
            return Err(Error::Internal(format!(
                "Database locked: {} gave up after {} attempts ({} ms budget)",
                operation_name, attempts, max_wait_ms
            )));
        }

        let pause = backoff.min(deadline - now);
        tracing::warn!(
            operation = operation_name,
            attempts,
            backoff_ms = pause.as_millis() as u64,
            "Database locked, retrying"
        );
        tokio::time::sleep(pause).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// Whether `err` is SQLite's transient "database is locked" condition
pub fn is_lock_error(err: &Error) -> bool {
    matches!(err, Error::Database(db_err) if db_err.to_string().contains("database is locked"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locked() -> Error {
        Error::Database(sqlx::Error::Protocol("database is locked".to_string()))
    }

    #[tokio::test]
    async fn test_locked_write_retried_until_it_lands() {
        let mut attempts = 0;

        let result = retry_on_lock("save_session", 5000, || {
            attempts += 1;
            let current = attempts;
            async move {
                if current < 3 {
                    Err(locked())
                } else {
                    Ok("saved")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "saved");
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_lock_budget_exhausted() {
        let started = Instant::now();
        let result = retry_on_lock("insert_plant", 50, || async { Err::<(), Error>(locked()) }).await;

        match result {
            Err(Error::Internal(msg)) => assert!(msg.contains("insert_plant")),
            other => panic!("Expected lock timeout, got {:?}", other),
        }
        // Backoff never sleeps past the budget by a full step
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_conflict_is_not_retried() {
        let mut attempts = 0;

        let result = retry_on_lock("insert_plant", 5000, || {
            attempts += 1;
            async { Err::<(), Error>(Error::Conflict("plant exists".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(Error::Conflict(_))));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_is_lock_error() {
        assert!(is_lock_error(&locked()));
        assert!(!is_lock_error(&Error::Internal("database is locked".to_string())));
    }
}
