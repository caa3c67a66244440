use super::AppState;
use crate::api::models::ledger::ReadinessResponse;
use axum::{extract::State, http::StatusCode, Json};

/// Liveness check
/// Returns "OK" with 200 status code
pub async fn health() -> &'static str {
    "OK"
}

/// Readiness check: the ledger store must answer.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    match state.sensors.ledger_ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                success: true,
                ledger_connected: true,
                message: "Ledger store connected".into(),
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "ledger store not reachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    success: false,
                    ledger_connected: false,
                    message: format!("Ledger store error: {}", e),
                }),
            )
        }
    }
}
