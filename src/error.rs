use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("DB error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Ledger error: {0}")]
    Ledger(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Kafka/Redpanda error: {0}")]
    Kafka(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// True when a failed write may still have been applied by the store:
    /// the call timed out, or the connection failed after the statement
    /// could have been sent. Pool checkout failures happen before anything
    /// reaches the database.
    pub fn write_outcome_unknown(&self) -> bool {
        match self {
            AppError::Timeout(_) => true,
            AppError::Db(sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) => false,
            AppError::Db(_) => true,
            _ => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Json(e) => (StatusCode::BAD_REQUEST, format!("Invalid data format: {e}")),
            AppError::Timeout(msg) => {
                tracing::error!("timeout: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Upstream store timed out".to_string())
            }
            AppError::Db(e) => {
                tracing::error!("database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            other => {
                tracing::error!("internal error: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        };

        let body = Json(json!({
            "success": false,
            "message": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = AppError::NotFound("Sensor data not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_input_maps_to_400() {
        let response = AppError::InvalidInput("bad".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_timeout_maps_to_503() {
        let response = AppError::Timeout("ledger get".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_write_outcome_unknown() {
        assert!(AppError::Timeout("ledger accumulate".into()).write_outcome_unknown());
        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        assert!(AppError::Db(sqlx::Error::Io(reset)).write_outcome_unknown());
        assert!(!AppError::Db(sqlx::Error::PoolTimedOut).write_outcome_unknown());
        assert!(!AppError::Ledger("refused".into()).write_outcome_unknown());
    }

    #[test]
    fn test_ledger_error_maps_to_500() {
        let response = AppError::Ledger("unreachable".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
