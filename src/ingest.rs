use crate::engine::{AccumulationEngine, ReadingOutcome};
use crate::error::AppError;
use crate::sensor::{RawReading, SensorReading};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Producer side of the bounded reading queue. Cloneable; the consumer task
/// ends once every clone has been dropped and the queue is drained.
#[derive(Clone)]
pub struct Ingestor {
    tx: mpsc::Sender<SensorReading>,
}

impl Ingestor {
    /// Start the single consumer that feeds queued readings to the engine in
    /// arrival order.
    pub fn spawn(engine: Arc<AccumulationEngine>, buffer: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<SensorReading>(buffer.max(1));
        let task = tokio::spawn(async move {
            while let Some(reading) = rx.recv().await {
                match engine.on_reading(reading).await {
                    ReadingOutcome::Accumulated(r) => {
                        debug!(total_kwh = r.cumulative_kwh, "reading processed (accumulated)")
                    }
                    ReadingOutcome::Recorded(r) => {
                        debug!(total_kwh = r.cumulative_kwh, "reading processed (recorded)")
                    }
                    ReadingOutcome::Dropped => warn!("reading dropped; ledger unavailable"),
                }
            }
            debug!("reading queue closed; consumer exiting");
        });
        (Self { tx }, task)
    }

    /// Queue a reading, waiting for room if the queue is full.
    pub async fn submit(&self, reading: SensorReading) -> Result<(), AppError> {
        self.tx
            .send(reading)
            .await
            .map_err(|e| AppError::Other(anyhow::anyhow!("queue reading: {}", e)))
    }

    /// Parse a JSON reading and queue it. Field values are coerced the same
    /// way as on the HTTP path; missing fields count as zero.
    pub async fn handle_message(&self, payload: &[u8]) -> Result<(), AppError> {
        let raw: RawReading = serde_json::from_slice(payload)?;
        self.submit(raw.coerce_all()).await
    }
}
