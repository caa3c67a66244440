pub mod api;
pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod history;
pub mod ingest;
pub mod power;
#[cfg(feature = "redpanda")]
pub mod redpanda;
pub mod repositories;
pub mod scheduler;
pub mod sensor;
pub mod service;

// Re-export commonly used items
pub use config::Config;
pub use engine::{AccumulationEngine, EngineSettings, ReadingOutcome};
pub use error::{AppError, Result};
pub use sensor::{EnrichedRecord, SensorReading};
