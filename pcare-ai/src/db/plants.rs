//! Finished plant records
//!
//! A plant record is written exactly once, when a session's care profile is
//! confirmed; `session_id` is unique, so a second insert for the same session
//! fails with `Error::Conflict`. Scheduling logic downstream reads the
//! watering and fertilizing intervals from here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pcare_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::db::settings::get_max_lock_wait_ms;
use crate::models::SunlightLevel;
use crate::types::{NewPlant, PlantStore};
use crate::utils::retry_on_lock;

/// Stored plant record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantRecord {
    pub plant_id: Uuid,
    pub session_id: Uuid,
    pub common_name: String,
    pub scientific_name: String,
    pub identification_confidence: Option<f64>,
    pub watering_days: u32,
    pub fertilizing_days: u32,
    pub sunlight_level: SunlightLevel,
    pub humidity: String,
    pub temperature_range: String,
    pub care_notes: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

fn plant_from_row(row: &SqliteRow) -> Result<PlantRecord> {
    let parse_uuid = |column: &str| -> Result<Uuid> {
        let value: String = row.get(column);
        Uuid::parse_str(&value)
            .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
    };

    let sunlight: String = row.get("sunlight_level");
    let created_at: String = row.get("created_at");

    Ok(PlantRecord {
        plant_id: parse_uuid("plant_id")?,
        session_id: parse_uuid("session_id")?,
        common_name: row.get("common_name"),
        scientific_name: row.get("scientific_name"),
        identification_confidence: row.get("identification_confidence"),
        watering_days: row.get::<i64, _>("watering_days") as u32,
        fertilizing_days: row.get::<i64, _>("fertilizing_days") as u32,
        sunlight_level: sunlight.parse().map_err(Error::Internal)?,
        humidity: row.get("humidity"),
        temperature_range: row.get("temperature_range"),
        care_notes: row.get("care_notes"),
        image_url: row.get("image_url"),
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
            .with_timezone(&Utc),
    })
}

/// Insert a plant record and return its id
pub async fn insert_plant(pool: &SqlitePool, plant: &NewPlant) -> Result<Uuid> {
    let plant_id = Uuid::new_v4();
    let plant_id_str = plant_id.to_string();
    let session_id = plant.session_id.to_string();
    let created_at = Utc::now().to_rfc3339();
    let profile = &plant.profile;
    let max_wait_ms = get_max_lock_wait_ms(pool).await?;

    retry_on_lock("insert_plant", max_wait_ms, || async {
        sqlx::query(
            r#"
            INSERT INTO plants (
                plant_id, session_id, common_name, scientific_name,
                identification_confidence, watering_days, fertilizing_days,
                sunlight_level, humidity, temperature_range, care_notes,
                image_url, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&plant_id_str)
        .bind(&session_id)
        .bind(&plant.common_name)
        .bind(&plant.scientific_name)
        .bind(plant.identification_confidence)
        .bind(profile.watering_days as i64)
        .bind(profile.fertilizing_days as i64)
        .bind(profile.sunlight_level.as_str())
        .bind(&profile.humidity)
        .bind(&profile.temperature_range)
        .bind(&profile.care_notes)
        .bind(&plant.image_url)
        .bind(&created_at)
        .execute(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                Error::Conflict(format!("Plant already recorded for session {}", session_id))
            }
            e => Error::Database(e),
        })?;

        Ok(())
    })
    .await?;

    Ok(plant_id)
}

/// Load plant record by id
pub async fn load_plant(pool: &SqlitePool, plant_id: Uuid) -> Result<Option<PlantRecord>> {
    let row = sqlx::query("SELECT * FROM plants WHERE plant_id = ?")
        .bind(plant_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(plant_from_row).transpose()
}

/// All plant records, newest first
pub async fn list_plants(pool: &SqlitePool) -> Result<Vec<PlantRecord>> {
    let rows = sqlx::query("SELECT * FROM plants ORDER BY created_at DESC")
        .fetch_all(pool)
        .await?;

    rows.iter().map(plant_from_row).collect()
}

/// SQLite-backed finished-record creator
#[derive(Clone)]
pub struct SqlitePlantStore {
    pool: SqlitePool,
}

impl SqlitePlantStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlantStore for SqlitePlantStore {
    async fn create_plant(&self, plant: NewPlant) -> Result<Uuid> {
        let plant_id = insert_plant(&self.pool, &plant).await?;
        tracing::info!(
            plant_id = %plant_id,
            session_id = %plant.session_id,
            species = %plant.common_name,
            "Plant record created"
        );
        Ok(plant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CareProfile;

    fn new_plant() -> NewPlant {
        NewPlant {
            session_id: Uuid::new_v4(),
            common_name: "Snake Plant".to_string(),
            scientific_name: "Dracaena trifasciata".to_string(),
            identification_confidence: Some(0.88),
            image_url: "https://img.example/p.jpg".to_string(),
            profile: CareProfile {
                watering_days: 8,
                fertilizing_days: 35,
                sunlight_level: SunlightLevel::Low,
                humidity: "low".to_string(),
                temperature_range: "15-29°C".to_string(),
                care_notes: "Let soil dry out between waterings.".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_store_creates_loadable_record() {
        let pool = crate::db::init_in_memory_pool().await.unwrap();
        let store = SqlitePlantStore::new(pool.clone());
        let plant = new_plant();

        let plant_id = store.create_plant(plant.clone()).await.unwrap();
        let record = load_plant(&pool, plant_id).await.unwrap().unwrap();

        assert_eq!(record.plant_id, plant_id);
        assert_eq!(record.session_id, plant.session_id);
        assert_eq!(record.watering_days, 8);
        assert_eq!(record.fertilizing_days, 35);
        assert_eq!(record.sunlight_level, SunlightLevel::Low);
        assert_eq!(record.identification_confidence, Some(0.88));
    }

    #[tokio::test]
    async fn test_second_plant_for_session_is_conflict() {
        let pool = crate::db::init_in_memory_pool().await.unwrap();
        let plant = new_plant();

        insert_plant(&pool, &plant).await.unwrap();
        let err = insert_plant(&pool, &plant).await.unwrap_err();

        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(list_plants(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_plant_is_none() {
        let pool = crate::db::init_in_memory_pool().await.unwrap();
        assert!(load_plant(&pool, Uuid::new_v4()).await.unwrap().is_none());
        assert!(list_plants(&pool).await.unwrap().is_empty());
    }
}
