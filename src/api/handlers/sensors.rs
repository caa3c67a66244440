use super::AppState;
use crate::api::models::sensors::{
    HistoryResponse, LatestReadingResponse, MessageResponse, WriteReadingRequest,
};
use crate::error::{AppError, Result};
use axum::{extract::State, http::StatusCode, Json};

/// GET /api/v1/sensors
pub async fn get_latest(State(state): State<AppState>) -> Result<Json<LatestReadingResponse>> {
    let latest = state
        .sensors
        .read_latest_reading()
        .await?
        .ok_or_else(|| AppError::NotFound("Sensor data not found".into()))?;

    Ok(Json(LatestReadingResponse {
        success: true,
        data: latest,
    }))
}

/// POST /api/v1/sensors
pub async fn write_reading(
    State(state): State<AppState>,
    Json(body): Json<WriteReadingRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let reading = body.into_reading().ok_or_else(|| {
        AppError::InvalidInput("Missing required fields: pwm, rpm, load_weight".into())
    })?;

    state.sensors.write_reading(reading).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            success: true,
            message: "Sensor data written successfully".into(),
        }),
    ))
}

/// GET /api/v1/sensors/history
pub async fn get_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    let data = state.sensors.history();
    Json(HistoryResponse {
        success: true,
        count: data.len(),
        data,
    })
}
