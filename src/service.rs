use crate::clock::Clock;
use crate::engine::AccumulationEngine;
use crate::error::Result;
use crate::ingest::Ingestor;
use crate::repositories::ledger::{DailyLedgerEntry, LedgerStore};
use crate::repositories::readings::ReadingStore;
use crate::sensor::{EnrichedRecord, SensorReading, StoredReading};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Operations offered to producers and dashboards.
#[derive(Clone)]
pub struct SensorService {
    readings: Arc<dyn ReadingStore>,
    ledger: Arc<dyn LedgerStore>,
    engine: Arc<AccumulationEngine>,
    ingestor: Ingestor,
    clock: Arc<dyn Clock>,
}

impl SensorService {
    pub fn new(
        readings: Arc<dyn ReadingStore>,
        ledger: Arc<dyn LedgerStore>,
        engine: Arc<AccumulationEngine>,
        ingestor: Ingestor,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            readings,
            ledger,
            engine,
            ingestor,
            clock,
        }
    }

    /// Store the reading as the latest one, then queue it for accumulation.
    /// Only the store write can fail the call.
    pub async fn write_reading(&self, reading: SensorReading) -> Result<()> {
        let recorded_at = self.clock.now().with_timezone(&Utc);
        self.readings.write(&reading, recorded_at).await?;
        debug!(pwm = reading.pwm_duty_cycle, "sensor reading written");

        if let Err(e) = self.ingestor.submit(reading).await {
            warn!(error = %e, "written reading could not be queued for accumulation");
        }
        Ok(())
    }

    pub async fn read_latest_reading(&self) -> Result<Option<StoredReading>> {
        self.readings.latest().await
    }

    pub fn history(&self) -> Vec<EnrichedRecord> {
        self.engine.history()
    }

    /// Totals for the date currently being accumulated; zeros if nothing has
    /// been written yet.
    pub async fn today_totals(&self) -> Result<DailyLedgerEntry> {
        let date = self.engine.active_date().await;
        Ok(self
            .ledger
            .get(date)
            .await?
            .unwrap_or_else(|| DailyLedgerEntry::zero(date)))
    }

    pub async fn ledger_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyLedgerEntry>> {
        self.ledger.range(from, to).await
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub async fn ledger_ping(&self) -> Result<()> {
        self.ledger.ping().await
    }
}
