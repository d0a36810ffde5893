use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::StoreError;
use crate::roster::RosterError;

/// Errors raised by the pure scoring functions.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ScoringError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Weight table error: {0}")]
    WeightTable(String),
}

/// Errors returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{0}")]
    InvalidInput(#[from] ScoringError),

    #[error("{message}")]
    Persistence {
        message: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Roster unavailable")]
    Upstream(#[from] RosterError),

    #[error("Roster webhook is not configured")]
    RosterNotConfigured,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn persistence(message: &'static str) -> impl FnOnce(StoreError) -> ApiError {
        move |source| ApiError::Persistence { message, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Persistence { message, source } => {
                tracing::error!(error = %source, "{message}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Upstream(source) => {
                tracing::error!(error = %source, "roster webhook failed");
                StatusCode::BAD_GATEWAY
            }
            ApiError::RosterNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
