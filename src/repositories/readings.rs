use crate::db::DbPool;
use crate::error::Result;
use crate::sensor::{SensorReading, StoredReading};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, FromRow, Row};
use std::sync::{Mutex, PoisonError};

/// Holds the single most recent raw reading.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn write(&self, reading: &SensorReading, recorded_at: DateTime<Utc>) -> Result<()>;

    async fn latest(&self) -> Result<Option<StoredReading>>;
}

#[derive(Debug, Default)]
pub struct MemoryReadingStore {
    latest: Mutex<Option<StoredReading>>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn write(&self, reading: &SensorReading, recorded_at: DateTime<Utc>) -> Result<()> {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(StoredReading {
            reading: *reading,
            recorded_at,
        });
        Ok(())
    }

    async fn latest(&self) -> Result<Option<StoredReading>> {
        Ok(*self.latest.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Latest reading kept in the one-row `sensor_latest` table.
#[derive(Debug, Clone)]
pub struct PgReadingStore {
    pool: DbPool,
}

impl PgReadingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

struct LatestRow(StoredReading);

impl<'r> FromRow<'r, PgRow> for LatestRow {
    fn from_row(row: &'r PgRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self(StoredReading {
            reading: SensorReading {
                pwm_duty_cycle: row.try_get("pwm")?,
                rpm: row.try_get("rpm")?,
                load_weight: row.try_get("load_weight")?,
            },
            recorded_at: row.try_get("recorded_at")?,
        }))
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn write(&self, reading: &SensorReading, recorded_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sensor_latest (id, pwm, rpm, load_weight, recorded_at)
            VALUES (1, $1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                pwm = EXCLUDED.pwm,
                rpm = EXCLUDED.rpm,
                load_weight = EXCLUDED.load_weight,
                recorded_at = EXCLUDED.recorded_at
            "#,
        )
        .bind(reading.pwm_duty_cycle)
        .bind(reading.rpm)
        .bind(reading.load_weight)
        .bind(recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest(&self) -> Result<Option<StoredReading>> {
        let row = sqlx::query_as::<_, LatestRow>(
            r#"
            SELECT pwm, rpm, load_weight, recorded_at
            FROM sensor_latest
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.0))
    }
}
