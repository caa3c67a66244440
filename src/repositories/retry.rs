use crate::config::RetryConfig;
use crate::error::{AppError, Result};
use crate::repositories::ledger::{DailyLedgerEntry, LedgerStore};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub timeout: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            initial_backoff: Duration::from_millis(cfg.initial_backoff_ms),
            timeout: Duration::from_millis(cfg.timeout_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds or the attempts are used up. Each attempt is
    /// cut off after `timeout`; the wait between attempts doubles.
    pub async fn run<T, F, Fut>(&self, op_name: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_while(op_name, |_| true, op).await
    }

    /// Like [`run`](Self::run), but an error for which `retryable` returns
    /// false ends the call at once.
    pub async fn run_while<T, F, Fut, R>(&self, op_name: &str, retryable: R, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        R: Fn(&AppError) -> bool,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;
        loop {
            let err = match tokio::time::timeout(self.timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => e,
                Err(_) => AppError::Timeout(format!("{op_name} after {:?}", self.timeout)),
            };
            if attempt >= self.max_attempts {
                return Err(err);
            }
            if !retryable(&err) {
                warn!(op = op_name, attempt, error = %err, "ledger call failed; not retrying");
                return Err(err);
            }
            warn!(
                op = op_name,
                attempt,
                max_attempts = self.max_attempts,
                error = %err,
                "ledger call failed; retrying in {:?}",
                backoff
            );
            tokio::time::sleep(backoff).await;
            backoff = backoff.saturating_mul(2);
            attempt += 1;
        }
    }
}

/// Applies a [`RetryPolicy`] to every call on the wrapped ledger.
///
/// `accumulate` is not idempotent, so it is only retried when the failed
/// attempt is known not to have reached the store.
pub struct RetryingLedgerStore {
    inner: Arc<dyn LedgerStore>,
    policy: RetryPolicy,
}

impl RetryingLedgerStore {
    pub fn new(inner: Arc<dyn LedgerStore>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LedgerStore for RetryingLedgerStore {
    async fn get(&self, date: NaiveDate) -> Result<Option<DailyLedgerEntry>> {
        self.policy.run("ledger get", || self.inner.get(date)).await
    }

    async fn accumulate(
        &self,
        date: NaiveDate,
        delta_kwh: f64,
        delta_cost: f64,
    ) -> Result<DailyLedgerEntry> {
        self.policy
            .run_while(
                "ledger accumulate",
                |e| !e.write_outcome_unknown(),
                || self.inner.accumulate(date, delta_kwh, delta_cost),
            )
            .await
    }

    async fn reset(&self, date: NaiveDate) -> Result<()> {
        self.policy.run("ledger reset", || self.inner.reset(date)).await
    }

    async fn range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyLedgerEntry>> {
        self.policy
            .run("ledger range", || self.inner.range(from, to))
            .await
    }

    async fn ping(&self) -> Result<()> {
        self.policy.run("ledger ping", || self.inner.ping()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::ledger::MemoryLedgerStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls of every kind, then delegates.
    struct FlakyLedger {
        failures: u32,
        calls: AtomicU32,
        inner: MemoryLedgerStore,
    }

    impl FlakyLedger {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                inner: MemoryLedgerStore::new(),
            }
        }

        fn trip(&self) -> Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                Err(AppError::Ledger("store unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl LedgerStore for FlakyLedger {
        async fn get(&self, date: NaiveDate) -> Result<Option<DailyLedgerEntry>> {
            self.trip()?;
            self.inner.get(date).await
        }
        async fn accumulate(&self, date: NaiveDate, k: f64, c: f64) -> Result<DailyLedgerEntry> {
            self.trip()?;
            self.inner.accumulate(date, k, c).await
        }
        async fn reset(&self, date: NaiveDate) -> Result<()> {
            self.trip()?;
            self.inner.reset(date).await
        }
        async fn range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyLedgerEntry>> {
            self.trip()?;
            self.inner.range(from, to).await
        }
        async fn ping(&self) -> Result<()> {
            self.trip()
        }
    }

    /// Never answers.
    struct HangingLedger;

    #[async_trait]
    impl LedgerStore for HangingLedger {
        async fn get(&self, _date: NaiveDate) -> Result<Option<DailyLedgerEntry>> {
            std::future::pending().await
        }
        async fn accumulate(&self, _d: NaiveDate, _k: f64, _c: f64) -> Result<DailyLedgerEntry> {
            std::future::pending().await
        }
        async fn reset(&self, _date: NaiveDate) -> Result<()> {
            std::future::pending().await
        }
        async fn range(&self, _f: NaiveDate, _t: NaiveDate) -> Result<Vec<DailyLedgerEntry>> {
            std::future::pending().await
        }
        async fn ping(&self) -> Result<()> {
            std::future::pending().await
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(100),
            timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_within_attempt_budget() {
        let flaky = Arc::new(FlakyLedger::new(2));
        let store = RetryingLedgerStore::new(flaky.clone(), policy(3));

        let entry = store.accumulate(today(), 0.1, 150.0).await.unwrap();
        assert_eq!(entry.total_kwh, 0.1);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let flaky = Arc::new(FlakyLedger::new(10));
        let store = RetryingLedgerStore::new(flaky.clone(), policy(3));

        let err = store.get(today()).await.unwrap_err();
        assert!(matches!(err, AppError::Ledger(_)));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_store_times_out() {
        let store = RetryingLedgerStore::new(Arc::new(HangingLedger), policy(2));
        let started = tokio::time::Instant::now();

        let err = store.ping().await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
        // two 2s attempts plus one 100ms backoff
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(4100), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(4200), "elapsed {elapsed:?}");
    }

    /// Applies accumulations, then answers only after `delay`.
    struct LateAckLedger {
        delay: Duration,
        calls: AtomicU32,
        inner: MemoryLedgerStore,
    }

    #[async_trait]
    impl LedgerStore for LateAckLedger {
        async fn get(&self, date: NaiveDate) -> Result<Option<DailyLedgerEntry>> {
            self.inner.get(date).await
        }
        async fn accumulate(&self, date: NaiveDate, k: f64, c: f64) -> Result<DailyLedgerEntry> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let entry = self.inner.accumulate(date, k, c).await?;
            tokio::time::sleep(self.delay).await;
            Ok(entry)
        }
        async fn reset(&self, date: NaiveDate) -> Result<()> {
            self.inner.reset(date).await
        }
        async fn range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyLedgerEntry>> {
            self.inner.range(from, to).await
        }
        async fn ping(&self) -> Result<()> {
            self.inner.ping().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_accumulate_is_applied_once() {
        let late = Arc::new(LateAckLedger {
            delay: Duration::from_secs(5),
            calls: AtomicU32::new(0),
            inner: MemoryLedgerStore::new(),
        });
        let store = RetryingLedgerStore::new(late.clone(), policy(3));

        let err = store.accumulate(today(), 0.1, 150.0).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
        assert_eq!(late.calls.load(Ordering::SeqCst), 1);

        let stored = store.get(today()).await.unwrap().unwrap();
        assert_eq!(stored.total_kwh, 0.1);
        assert_eq!(stored.total_cost, 150.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_read_is_retried() {
        let store = RetryingLedgerStore::new(Arc::new(HangingLedger), policy(3));
        let started = tokio::time::Instant::now();

        let err = store.get(today()).await.unwrap_err();
        assert!(matches!(err, AppError::Timeout(_)));
        // three 2s attempts plus 100ms and 200ms backoff
        assert!(started.elapsed() >= Duration::from_millis(6300));
    }
}
