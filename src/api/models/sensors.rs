use crate::sensor::{EnrichedRecord, RawReading, StoredReading};
use serde::Serialize;

/// Body of `POST /api/v1/sensors`. Fields are kept loose so that numeric
/// strings and other scalars can be coerced instead of rejected.
pub type WriteReadingRequest = RawReading;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LatestReadingResponse {
    pub success: bool,
    pub data: StoredReading,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub data: Vec<EnrichedRecord>,
    pub count: usize,
}
