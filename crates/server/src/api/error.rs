//! Mapping of core errors onto `{"code", "message"}` responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ticketdesk_core::{
    AuditError, BoardError, ErrorBody, ErrorCode, QueueError, TicketError, TransitionError,
    TriageError,
};
use tracing::error;

/// An error response: the status follows from the code
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Internal failures are logged in full and reported generically
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        error!(error = %detail, "Request failed");
        Self::new(ErrorCode::InternalError, "Internal server error")
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    fn from_coded(code: ErrorCode, message: String) -> Self {
        if code == ErrorCode::InternalError {
            Self::internal(message)
        } else {
            Self::new(code, message)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody::new(self.code, self.message))).into_response()
    }
}

impl From<TicketError> for ApiError {
    fn from(e: TicketError) -> Self {
        Self::from_coded(e.code(), e.to_string())
    }
}

impl From<TransitionError> for ApiError {
    fn from(e: TransitionError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        Self::from_coded(e.code(), e.to_string())
    }
}

impl From<TriageError> for ApiError {
    fn from(e: TriageError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<BoardError> for ApiError {
    fn from(e: BoardError) -> Self {
        Self::from_coded(e.code(), e.to_string())
    }
}

impl From<AuditError> for ApiError {
    fn from(e: AuditError) -> Self {
        Self::internal(e)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
