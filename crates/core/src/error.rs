//! Machine-readable error codes shared by the service and its clients.
//!
//! The service serializes every failure as an [`ErrorBody`]; clients branch on
//! the code and show the message. Keeping both sides on the same enum means a
//! new condition cannot be emitted without a client-side meaning.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code carried in every error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// A state value outside the known enumeration.
    InvalidState,
    /// The requested transition is not in the adjacency table.
    IllegalTransition,
    /// The queue item was already converted into a ticket.
    AlreadyAssigned,
    /// Retry requested for an item whose external sync is not failing.
    NoRetryNeeded,
    /// Retry requested but the item cannot be synced (no origin board or platform).
    RetryUnavailable,
    /// The target board is archived.
    BoardArchived,
    /// The addressed resource does not exist (or no longer exists).
    NotFound,
    /// Request payload failed validation.
    ValidationError,
    /// Missing or invalid credentials.
    Unauthorized,
    /// Anything else on the service side.
    InternalError,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 10] = [
        ErrorCode::InvalidState,
        ErrorCode::IllegalTransition,
        ErrorCode::AlreadyAssigned,
        ErrorCode::NoRetryNeeded,
        ErrorCode::RetryUnavailable,
        ErrorCode::BoardArchived,
        ErrorCode::NotFound,
        ErrorCode::ValidationError,
        ErrorCode::Unauthorized,
        ErrorCode::InternalError,
    ];

    /// Wire representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::IllegalTransition => "ILLEGAL_TRANSITION",
            ErrorCode::AlreadyAssigned => "ALREADY_ASSIGNED",
            ErrorCode::NoRetryNeeded => "NO_RETRY_NEEDED",
            ErrorCode::RetryUnavailable => "RETRY_UNAVAILABLE",
            ErrorCode::BoardArchived => "BOARD_ARCHIVED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Parse a wire code. Unknown codes return `None` so clients can fall back
    /// to the HTTP status.
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }

    /// HTTP status the service uses for this code.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::IllegalTransition
            | ErrorCode::AlreadyAssigned
            | ErrorCode::NoRetryNeeded => 409,
            ErrorCode::InvalidState
            | ErrorCode::RetryUnavailable
            | ErrorCode::BoardArchived
            | ErrorCode::ValidationError => 422,
            ErrorCode::NotFound => 404,
            ErrorCode::Unauthorized => 401,
            ErrorCode::InternalError => 500,
        }
    }

    /// True for codes meaning "the server state already moved on; refresh".
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ErrorCode::IllegalTransition | ErrorCode::AlreadyAssigned | ErrorCode::NoRetryNeeded
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON error body: `{"code": "...", "message": "..."}`.
///
/// `code` stays a plain string on the wire so that a client built against an
/// older code list can still read the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_str().to_string(),
            message: message.into(),
        }
    }

    /// The parsed code, if known.
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::parse(&self.code)
    }
}
