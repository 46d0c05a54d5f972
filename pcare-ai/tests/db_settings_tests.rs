//! Tests for database settings accessors against a file-backed database
//!
//! Keys stored in the settings table must survive a restart and take
//! priority over the environment during key resolution.

use pcare_ai::config::resolve_api_key;
use pcare_ai::db::init_database_pool;
use pcare_ai::db::settings::{
    get_api_key, get_max_lock_wait_ms, set_api_key, set_max_lock_wait_ms,
    DEFAULT_MAX_LOCK_WAIT_MS,
};
use serial_test::serial;

#[tokio::test]
async fn test_api_key_persists_across_reopen() {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("pcare.db");

    let pool = init_database_pool(&db_path).await.unwrap();
    set_api_key(&pool, "vision-a", "test-key-123".to_string())
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database_pool(&db_path).await.unwrap();
    let key = get_api_key(&pool, "vision-a").await.unwrap();
    assert_eq!(key, Some("test-key-123".to_string()));

    // Stored under the provider-specific setting name
    let row: (String,) = sqlx::query_as("SELECT value FROM settings WHERE key = 'vision-a_api_key'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.0, "test-key-123");
}

#[tokio::test]
async fn test_lock_wait_default_and_override() {
    let temp_dir = tempfile::tempdir().unwrap();
    let pool = init_database_pool(&temp_dir.path().join("pcare.db"))
        .await
        .unwrap();

    assert_eq!(
        get_max_lock_wait_ms(&pool).await.unwrap(),
        DEFAULT_MAX_LOCK_WAIT_MS
    );

    set_max_lock_wait_ms(&pool, 250).await.unwrap();
    assert_eq!(get_max_lock_wait_ms(&pool).await.unwrap(), 250);
}

#[tokio::test]
#[serial]
async fn test_stored_key_overrides_environment() {
    let temp_dir = tempfile::tempdir().unwrap();
    let pool = init_database_pool(&temp_dir.path().join("pcare.db"))
        .await
        .unwrap();

    std::env::set_var("PCARE_TEST_SEARCH_KEY", "env-key");
    let key = resolve_api_key(&pool, "brave", Some("PCARE_TEST_SEARCH_KEY"), None)
        .await
        .unwrap();
    assert_eq!(key, "env-key");

    set_api_key(&pool, "brave", "db-key".to_string()).await.unwrap();
    let key = resolve_api_key(&pool, "brave", Some("PCARE_TEST_SEARCH_KEY"), None)
        .await
        .unwrap();
    assert_eq!(key, "db-key");

    std::env::remove_var("PCARE_TEST_SEARCH_KEY");
}
