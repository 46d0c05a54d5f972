//! Settings database operations
//!
//! Provides get/set accessors for settings table following key-value pattern.

use sqlx::{Pool, Sqlite};
use pcare_common::{Error, Result};

/// Default retry budget for locked-database writes
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Settings key holding the API key for a named provider
pub fn api_key_setting(provider: &str) -> String {
    format!("{}_api_key", provider.to_ascii_lowercase())
}

/// Get an API key from database
///
/// **Returns:** Some(key) if exists, None if not set
pub async fn get_api_key(db: &Pool<Sqlite>, provider: &str) -> Result<Option<String>> {
    get_setting::<String>(db, &api_key_setting(provider)).await
}

/// Set an API key in database
pub async fn set_api_key(db: &Pool<Sqlite>, provider: &str, key: String) -> Result<()> {
    set_setting(db, &api_key_setting(provider), key).await
}

/// Get maximum time to retry a locked write
///
/// **Default:** 5000 ms
pub async fn get_max_lock_wait_ms(db: &Pool<Sqlite>) -> Result<u64> {
    get_setting(db, "database_max_lock_wait_ms")
        .await
        .map(|opt| opt.unwrap_or(DEFAULT_MAX_LOCK_WAIT_MS))
}

/// Set maximum time to retry a locked write
pub async fn set_max_lock_wait_ms(db: &Pool<Sqlite>, max_wait_ms: u64) -> Result<()> {
    set_setting(db, "database_max_lock_wait_ms", max_wait_ms).await
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT value FROM settings WHERE key = ?"
    )
    .bind(key)
    .fetch_optional(db)
    .await
    .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value.parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting '{}' failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value"
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn setup_test_db() -> SqlitePool {
        crate::db::init_in_memory_pool().await.unwrap()
    }

    #[tokio::test]
    async fn test_get_api_key_exists() {
        let pool = setup_test_db().await;

        sqlx::query("INSERT INTO settings (key, value) VALUES ('brave_api_key', 'test_key_123')")
            .execute(&pool)
            .await
            .unwrap();

        let result = get_api_key(&pool, "Brave").await.unwrap();

        assert_eq!(result, Some("test_key_123".to_string()));
    }

    #[tokio::test]
    async fn test_get_api_key_not_exists() {
        let pool = setup_test_db().await;

        let result = get_api_key(&pool, "openai").await.unwrap();

        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_set_api_key_update() {
        let pool = setup_test_db().await;

        set_api_key(&pool, "openai", "old_key".to_string()).await.unwrap();
        set_api_key(&pool, "openai", "new_key".to_string()).await.unwrap();

        let result = get_api_key(&pool, "openai").await.unwrap();
        assert_eq!(result, Some("new_key".to_string()));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM settings WHERE key = 'openai_api_key'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1, "Should have exactly one entry after update");
    }

    #[tokio::test]
    async fn test_max_lock_wait_default_and_override() {
        let pool = setup_test_db().await;

        assert_eq!(get_max_lock_wait_ms(&pool).await.unwrap(), DEFAULT_MAX_LOCK_WAIT_MS);

        set_max_lock_wait_ms(&pool, 250).await.unwrap();
        assert_eq!(get_max_lock_wait_ms(&pool).await.unwrap(), 250);
    }

    #[tokio::test]
    async fn test_unparseable_setting_is_config_error() {
        let pool = setup_test_db().await;

        sqlx::query("INSERT INTO settings (key, value) VALUES ('database_max_lock_wait_ms', 'soon')")
            .execute(&pool)
            .await
            .unwrap();

        assert!(matches!(get_max_lock_wait_ms(&pool).await, Err(Error::Config(_))));
    }
}
