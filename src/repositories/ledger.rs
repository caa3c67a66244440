use crate::db::DbPool;
use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Running energy and cost totals for one local calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, FromRow)]
pub struct DailyLedgerEntry {
    pub date: NaiveDate,
    pub total_kwh: f64,
    pub total_cost: f64,
}

impl DailyLedgerEntry {
    pub fn zero(date: NaiveDate) -> Self {
        Self {
            date,
            total_kwh: 0.0,
            total_cost: 0.0,
        }
    }
}

/// Durable per-day totals.
///
/// `accumulate` must be indivisible against the backing store: two callers
/// adding to the same date, from this process or another, never lose an update.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get(&self, date: NaiveDate) -> Result<Option<DailyLedgerEntry>>;

    /// Add the deltas to `date` (absent counts as zero) and return the new totals.
    async fn accumulate(
        &self,
        date: NaiveDate,
        delta_kwh: f64,
        delta_cost: f64,
    ) -> Result<DailyLedgerEntry>;

    /// Write a zeroed entry for `date`.
    async fn reset(&self, date: NaiveDate) -> Result<()>;

    /// Entries with `from <= date <= to`, ordered by date.
    async fn range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyLedgerEntry>>;

    async fn ping(&self) -> Result<()>;
}

/// In-process ledger; every operation runs under one lock.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    entries: Mutex<BTreeMap<NaiveDate, DailyLedgerEntry>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<NaiveDate, DailyLedgerEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn get(&self, date: NaiveDate) -> Result<Option<DailyLedgerEntry>> {
        Ok(self.entries().get(&date).copied())
    }

    async fn accumulate(
        &self,
        date: NaiveDate,
        delta_kwh: f64,
        delta_cost: f64,
    ) -> Result<DailyLedgerEntry> {
        let mut entries = self.entries();
        let entry = entries
            .entry(date)
            .or_insert_with(|| DailyLedgerEntry::zero(date));
        entry.total_kwh += delta_kwh;
        entry.total_cost += delta_cost;
        Ok(*entry)
    }

    async fn reset(&self, date: NaiveDate) -> Result<()> {
        self.entries().insert(date, DailyLedgerEntry::zero(date));
        Ok(())
    }

    async fn range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyLedgerEntry>> {
        if from > to {
            return Ok(Vec::new());
        }
        Ok(self.entries().range(from..=to).map(|(_, e)| *e).collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Ledger in the `daily_ledger` table. Accumulation is a single upsert, so
/// PostgreSQL serializes concurrent writers to the same date.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: DbPool,
}

impl PgLedgerStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn get(&self, date: NaiveDate) -> Result<Option<DailyLedgerEntry>> {
        let entry = sqlx::query_as::<_, DailyLedgerEntry>(
            r#"
            SELECT date, total_kwh, total_cost
            FROM daily_ledger
            WHERE date = $1
            "#,
        )
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn accumulate(
        &self,
        date: NaiveDate,
        delta_kwh: f64,
        delta_cost: f64,
    ) -> Result<DailyLedgerEntry> {
        let entry = sqlx::query_as::<_, DailyLedgerEntry>(
            r#"
            INSERT INTO daily_ledger (date, total_kwh, total_cost, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (date) DO UPDATE SET
                total_kwh = daily_ledger.total_kwh + EXCLUDED.total_kwh,
                total_cost = daily_ledger.total_cost + EXCLUDED.total_cost,
                updated_at = NOW()
            RETURNING date, total_kwh, total_cost
            "#,
        )
        .bind(date)
        .bind(delta_kwh)
        .bind(delta_cost)
        .fetch_one(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn reset(&self, date: NaiveDate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_ledger (date, total_kwh, total_cost, updated_at)
            VALUES ($1, 0, 0, NOW())
            ON CONFLICT (date) DO UPDATE SET
                total_kwh = 0,
                total_cost = 0,
                updated_at = NOW()
            "#,
        )
        .bind(date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyLedgerEntry>> {
        let entries = sqlx::query_as::<_, DailyLedgerEntry>(
            r#"
            SELECT date, total_kwh, total_cost
            FROM daily_ledger
            WHERE date >= $1 AND date <= $2
            ORDER BY date
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
