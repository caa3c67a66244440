use crate::error::AppError;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

pub type DbPool = Pool<Postgres>;

pub async fn connect(url: &str, max_connections: u32) -> Result<DbPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await?;
    Ok(pool)
}

/// Create the ledger and latest-reading tables if they are missing.
pub async fn ensure_schema(pool: &DbPool) -> Result<(), AppError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_ledger
        (
            date        DATE             PRIMARY KEY,
            total_kwh   DOUBLE PRECISION NOT NULL DEFAULT 0,
            total_cost  DOUBLE PRECISION NOT NULL DEFAULT 0,
            updated_at  TIMESTAMPTZ      NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_latest
        (
            id          SMALLINT         PRIMARY KEY CHECK (id = 1),
            pwm         DOUBLE PRECISION NOT NULL,
            rpm         DOUBLE PRECISION NOT NULL,
            load_weight DOUBLE PRECISION NOT NULL,
            recorded_at TIMESTAMPTZ      NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
