use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Device ID not found")]
    MissingDevice,

    #[error("{0}")]
    Validation(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Invalid update data - missing required fields")]
    InvalidUpdate,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("No JSON data provided")]
    MalformedPayload,

    #[error("Internal server error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Internal server error: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("Internal server error: {0}")]
    Unavailable(&'static str),
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        AppError::InternalError(message.into().into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingDevice
            | AppError::Validation(_)
            | AppError::InvalidField(_)
            | AppError::InvalidUpdate
            | AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_)
            | AppError::Upstream(_)
            | AppError::InternalError(_)
            | AppError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::InternalError(Box::new(e))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::InternalError(Box::new(e))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected request body: {rejection}");

        match rejection {
            JsonRejection::JsonDataError(e) => AppError::Validation(e.body_text()),
            _ => AppError::MalformedPayload,
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(format!("Invalid id: {}", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!("{self}");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
