//! Energy accumulation engine.
//!
//! Every inbound reading runs through [`AccumulationEngine::on_reading`]:
//! roll the ledger over if the local date changed, measure the time since the
//! previous reading, and either integrate the reading's power into today's
//! ledger entry or record it against the unchanged totals. The result lands in
//! the in-memory history ring.
//!
//! The engine state lock is held for a whole processing cycle, so readings and
//! scheduler-driven rollovers never interleave. The history ring has its own
//! short-lived lock and can be read while a cycle waits on the ledger.

use crate::clock::{Clock, MILLIS_PER_HOUR};
use crate::config::Config;
use crate::history::{HistoryRing, DEFAULT_HISTORY_CAPACITY};
use crate::power::{estimate_incremental_energy, PowerSpecs, Tariff};
use crate::repositories::ledger::{DailyLedgerEntry, LedgerStore};
use crate::sensor::{EnrichedRecord, SensorReading};
use chrono::NaiveDate;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub history_capacity: usize,
    /// Upper bound (exclusive) of the eligibility window, in hours.
    pub max_gap_hours: f64,
    /// Let the first reading after a rollover bypass the gap rule.
    pub new_day_override: bool,
    pub specs: PowerSpecs,
    pub tariff: Tariff,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            max_gap_hours: 1.0,
            new_day_override: true,
            specs: PowerSpecs::default(),
            tariff: Tariff::default(),
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            history_capacity: cfg.engine.history_capacity,
            max_gap_hours: cfg.engine.max_gap_hours,
            new_day_override: cfg.engine.new_day_override,
            specs: cfg.power,
            tariff: cfg.tariff,
        }
    }
}

impl EngineSettings {
    /// Whether a reading represents continuous draw that may be integrated.
    pub fn is_eligible(&self, pwm_duty_cycle: f64, elapsed_hours: f64, day_rolled_over: bool) -> bool {
        if pwm_duty_cycle.is_nan() || pwm_duty_cycle <= 0.0 {
            return false;
        }
        let within_window = elapsed_hours > 0.0 && elapsed_hours < self.max_gap_hours;
        within_window || (self.new_day_override && day_rolled_over)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineState {
    pub last_processed_at_millis: i64,
    pub last_reset_date: NaiveDate,
    pub day_rolled_over: bool,
}

/// What happened to a reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadingOutcome {
    /// Energy was added to the ledger; the record carries the new totals.
    Accumulated(EnrichedRecord),
    /// Not integrated; the record carries the unchanged totals.
    Recorded(EnrichedRecord),
    /// The ledger could not be reached; nothing was added to history.
    Dropped,
}

impl ReadingOutcome {
    pub fn record(&self) -> Option<&EnrichedRecord> {
        match self {
            Self::Accumulated(r) | Self::Recorded(r) => Some(r),
            Self::Dropped => None,
        }
    }
}

pub struct AccumulationEngine {
    state: AsyncMutex<EngineState>,
    history: Mutex<HistoryRing>,
    ledger: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl AccumulationEngine {
    pub fn new(ledger: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, settings: EngineSettings) -> Self {
        let state = EngineState {
            last_processed_at_millis: clock.now_millis(),
            last_reset_date: clock.today(),
            day_rolled_over: false,
        };
        Self {
            state: AsyncMutex::new(state),
            history: Mutex::new(HistoryRing::with_capacity(settings.history_capacity)),
            ledger,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub async fn state(&self) -> EngineState {
        *self.state.lock().await
    }

    /// The date the ledger is currently accumulating into.
    pub async fn active_date(&self) -> NaiveDate {
        self.state.lock().await.last_reset_date
    }

    pub fn history(&self) -> Vec<EnrichedRecord> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    pub async fn on_reading(&self, reading: SensorReading) -> ReadingOutcome {
        let mut state = self.state.lock().await;
        self.rollover_locked(&mut state).await;

        // the clock reference moves on every reading, integrated or not
        let now = self.clock.now_millis();
        let elapsed_hours = (now - state.last_processed_at_millis) as f64 / MILLIS_PER_HOUR;
        state.last_processed_at_millis = now;
        let date = state.last_reset_date;

        if self
            .settings
            .is_eligible(reading.pwm_duty_cycle, elapsed_hours, state.day_rolled_over)
        {
            let delta = estimate_incremental_energy(
                &reading,
                elapsed_hours,
                &self.settings.specs,
                &self.settings.tariff,
            );
            if delta.is_accumulable() {
                match self.ledger.accumulate(date, delta.kwh, delta.cost).await {
                    Ok(entry) => {
                        state.day_rolled_over = false;
                        debug!(
                            date = %date,
                            elapsed_hours,
                            delta_kwh = delta.kwh,
                            total_kwh = entry.total_kwh,
                            "reading accumulated"
                        );
                        return ReadingOutcome::Accumulated(self.record(reading, &entry, now));
                    }
                    Err(e) => {
                        // the delta may have landed; do not let the override integrate again
                        if e.write_outcome_unknown() {
                            state.day_rolled_over = false;
                        }
                        error!(date = %date, error = %e, "energy accumulation failed; recording reading without it");
                    }
                }
            } else {
                warn!(
                    date = %date,
                    delta_kwh = delta.kwh,
                    delta_cost = delta.cost,
                    "power model produced an unusable delta; not accumulating"
                );
            }
        } else {
            debug!(
                date = %date,
                pwm = reading.pwm_duty_cycle,
                elapsed_hours,
                "reading outside eligibility window"
            );
        }

        match self.ledger.get(date).await {
            Ok(entry) => {
                let entry = entry.unwrap_or_else(|| DailyLedgerEntry::zero(date));
                ReadingOutcome::Recorded(self.record(reading, &entry, now))
            }
            Err(e) => {
                error!(date = %date, error = %e, "ledger read failed; reading dropped from history");
                ReadingOutcome::Dropped
            }
        }
    }

    /// Roll the ledger to a fresh entry if the local date has changed.
    /// Returns true when a rollover happened.
    pub async fn check_and_rollover(&self) -> bool {
        let mut state = self.state.lock().await;
        self.rollover_locked(&mut state).await
    }

    async fn rollover_locked(&self, state: &mut EngineState) -> bool {
        let today = self.clock.today();
        if today == state.last_reset_date {
            return false;
        }
        // a wall clock stepped back across midnight must not zero a closed day
        if today < state.last_reset_date {
            warn!(
                clock_date = %today,
                date = %state.last_reset_date,
                "local date moved backwards; keeping the current ledger date"
            );
            return false;
        }

        let closed = state.last_reset_date;
        self.archive(closed);

        if let Err(e) = self.ledger.reset(today).await {
            error!(date = %today, error = %e, "failed to write zeroed ledger entry");
        }
        state.last_reset_date = today;
        state.day_rolled_over = true;
        info!(closed = %closed, date = %today, "daily ledger rolled over");
        true
    }

    /// Log the closed day's totals without holding up the caller.
    fn archive(&self, date: NaiveDate) {
        let ledger = self.ledger.clone();
        tokio::spawn(async move {
            match ledger.get(date).await {
                Ok(Some(entry)) => info!(
                    date = %entry.date,
                    total_kwh = entry.total_kwh,
                    total_cost = entry.total_cost,
                    "archived daily totals"
                ),
                Ok(None) => debug!(date = %date, "no ledger entry to archive"),
                Err(e) => warn!(date = %date, error = %e, "could not read closed ledger entry"),
            }
        });
    }

    fn record(
        &self,
        reading: SensorReading,
        entry: &DailyLedgerEntry,
        observed_at_millis: i64,
    ) -> EnrichedRecord {
        let record = EnrichedRecord {
            reading,
            cumulative_kwh: entry.total_kwh,
            cumulative_cost: entry.total_cost,
            observed_at_millis,
        };
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append(record);
        record
    }
}
