//! Day-boundary scheduler background task
//!
//! Sleeps until the next local midnight, runs the engine's rollover check,
//! then recomputes the wait. The wait is recomputed on every firing because
//! local days are not all 24 hours long.

use crate::clock::Clock;
use crate::engine::AccumulationEngine;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct DayBoundaryScheduler {
    engine: Arc<AccumulationEngine>,
    clock: Arc<dyn Clock>,
}

/// Stops the scheduler task when asked to.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("Day-boundary scheduler ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl DayBoundaryScheduler {
    pub fn new(engine: Arc<AccumulationEngine>, clock: Arc<dyn Clock>) -> Self {
        Self { engine, clock }
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, rx) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(rx).await });
        SchedulerHandle { shutdown, task }
    }

    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!("Day-boundary scheduler started");

        loop {
            let wait = self.clock.until_next_midnight();
            tracing::debug!("Next day-boundary check in {:?}", wait);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    if self.engine.check_and_rollover().await {
                        tracing::info!("Day boundary reached; ledger rolled to {}", self.clock.today());
                    } else {
                        tracing::debug!("Day-boundary check found nothing to roll over");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Day-boundary scheduler stopped");
    }
}
