use crate::repositories::ledger::DailyLedgerEntry;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct LedgerEntryResponse {
    pub success: bool,
    pub data: DailyLedgerEntry,
}

#[derive(Debug, Serialize)]
pub struct LedgerRangeResponse {
    pub success: bool,
    pub data: Vec<DailyLedgerEntry>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub success: bool,
    pub ledger_connected: bool,
    pub message: String,
}
