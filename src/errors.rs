use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::BookingStatus;

/// A requested status is not reachable from the booking's current status.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot move booking from {current} to {requested}")]
pub struct InvalidTransition {
    pub current: BookingStatus,
    pub requested: BookingStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),

    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("booking can no longer be cancelled (status {0})")]
    NotCancellable(BookingStatus),

    #[error("booking changed status concurrently, reload and retry")]
    StaleStatus,

    #[error("could not allocate a unique booking number after {attempts} attempts")]
    BookingNumberExhausted { attempts: u32 },

    #[error("promotion {0} is no longer available")]
    PromotionUnavailable(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::InvalidTransition(err) = &self {
            let body = serde_json::json!({
                "error": "InvalidTransition",
                "current_status": err.current,
                "requested_status": err.requested,
            });
            return (StatusCode::CONFLICT, axum::Json(body)).into_response();
        }

        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::NotCancellable(_) => StatusCode::CONFLICT,
            AppError::StaleStatus => StatusCode::CONFLICT,
            AppError::BookingNumberExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::PromotionUnavailable(_) => StatusCode::CONFLICT,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
