use super::AppState;
use crate::api::models::ledger::{LedgerEntryResponse, LedgerRangeResponse};
use crate::error::{AppError, Result};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use std::collections::HashMap;

/// GET /api/v1/ledger/today
pub async fn get_today(State(state): State<AppState>) -> Result<Json<LedgerEntryResponse>> {
    let entry = state.sensors.today_totals().await?;
    Ok(Json(LedgerEntryResponse {
        success: true,
        data: entry,
    }))
}

/// GET /api/v1/ledger?from=YYYY-MM-DD&to=YYYY-MM-DD
pub async fn get_range(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<LedgerRangeResponse>> {
    let from = params
        .get("from")
        .ok_or_else(|| AppError::InvalidInput("Missing query parameter: from".into()))
        .and_then(|s| parse_date("from", s))?;

    let to = match params.get("to") {
        Some(s) => parse_date("to", s)?,
        None => state.sensors.today(),
    };

    let data = state.sensors.ledger_range(from, to).await?;
    Ok(Json(LedgerRangeResponse {
        success: true,
        count: data.len(),
        data,
    }))
}

fn parse_date(name: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::InvalidInput(format!("Invalid {name} date, expected YYYY-MM-DD")))
}
