//! Error surface shared by every game operation.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::store::StoreError;

/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// Missing or malformed input, rejected before touching the store
    #[error("{0}")]
    InvalidInput(String),

    /// The room, player or request no longer exists
    #[error("{0}")]
    NotFound(String),

    /// The action is not allowed in the current state; nothing changed
    #[error("{0}")]
    PreconditionFailed(String),

    #[error("storage failure: {0}")]
    StorageFailure(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

impl GameError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionFailed(msg.into())
    }

    /// Machine-readable kind, sent alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::PreconditionFailed(_) => "PRECONDITION_FAILED",
            Self::StorageFailure(_) => "STORAGE_FAILURE",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotConfigured(_) => "NOT_CONFIGURED",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PreconditionFailed(_) => StatusCode::CONFLICT,
            Self::StorageFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict => {
                Self::PreconditionFailed("room changed concurrently, refresh and retry".to_string())
            }
            other => Self::StorageFailure(other.to_string()),
        }
    }
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (
            status,
            Json(serde_json::json!({ "error": self.to_string(), "code": self.code() })),
        )
            .into_response()
    }
}
