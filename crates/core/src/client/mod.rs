//! Typed access to the Ticket/Queue Service.

mod http;

pub use http::HttpServiceClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{ErrorBody, ErrorCode};
use crate::standby::{QueuePage, StandbyQueueItem};
use crate::ticket::{StatusChange, Ticket};

/// Body of `POST /tickets/{id}/state`
///
/// `new_state` stays a raw string so the service, not the client, decides
/// whether it names a known state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChangeRequest {
    pub new_state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Body of `POST /standby-queue/{id}/assign`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignRequest {
    pub board_id: i64,
}

/// Failure reported by the service that has no dedicated variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub code: Option<ErrorCode>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("Illegal transition: {0}")]
    IllegalTransition(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Already assigned: {0}")]
    AlreadyAssigned(String),

    #[error("No retry needed: {0}")]
    NoRetryNeeded(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service error {}: {}", .0.status, .0.message)]
    Api(ApiError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Map an HTTP error status and its body
    pub fn from_response(status: u16, body: Option<ErrorBody>) -> Self {
        let (code, message) = match body {
            Some(body) => (body.error_code(), body.message),
            None => (None, format!("HTTP {}", status)),
        };
        match code {
            Some(ErrorCode::IllegalTransition) => ClientError::IllegalTransition(message),
            Some(ErrorCode::InvalidState) => ClientError::InvalidState(message),
            Some(ErrorCode::AlreadyAssigned) => ClientError::AlreadyAssigned(message),
            Some(ErrorCode::NoRetryNeeded) => ClientError::NoRetryNeeded(message),
            Some(ErrorCode::NotFound) => ClientError::NotFound(message),
            None if status == 404 => ClientError::NotFound(message),
            code => ClientError::Api(ApiError {
                status,
                code,
                message,
            }),
        }
    }

    /// Machine-readable code, if the failure came from the service
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::IllegalTransition(_) => Some(ErrorCode::IllegalTransition),
            ClientError::InvalidState(_) => Some(ErrorCode::InvalidState),
            ClientError::AlreadyAssigned(_) => Some(ErrorCode::AlreadyAssigned),
            ClientError::NoRetryNeeded(_) => Some(ErrorCode::NoRetryNeeded),
            ClientError::NotFound(_) => Some(ErrorCode::NotFound),
            ClientError::Api(api) => api.code,
            ClientError::Transport(_) | ClientError::Timeout | ClientError::Decode(_) => None,
        }
    }

    /// Human-readable message without the code prefix
    pub fn message(&self) -> String {
        match self {
            ClientError::IllegalTransition(m)
            | ClientError::InvalidState(m)
            | ClientError::AlreadyAssigned(m)
            | ClientError::NoRetryNeeded(m)
            | ClientError::NotFound(m)
            | ClientError::Transport(m)
            | ClientError::Decode(m) => m.clone(),
            ClientError::Api(api) => api.message.clone(),
            ClientError::Timeout => "request timed out".to_string(),
        }
    }

    /// HTTP status, when the service answered
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api(api) => Some(api.status),
            other => other.code().map(|c| c.http_status()),
        }
    }

    /// The service state already moved on; refresh instead of failing
    pub fn is_conflict(&self) -> bool {
        self.code().is_some_and(|c| c.is_conflict())
    }

    /// Safe to repeat for idempotent reads
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) | ClientError::Timeout => true,
            ClientError::Api(api) => api.status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

/// The Ticket/Queue Service contract as seen by a client
#[async_trait]
pub trait TicketService: Send + Sync {
    async fn get_ticket(&self, id: i64) -> Result<Ticket, ClientError>;

    /// Status changes ordered oldest first
    async fn get_history(&self, id: i64) -> Result<Vec<StatusChange>, ClientError>;

    /// Returns the updated ticket only; callers re-fetch the history
    async fn change_state(
        &self,
        id: i64,
        request: &StateChangeRequest,
    ) -> Result<Ticket, ClientError>;

    async fn list_queue(&self, limit: i64, offset: i64) -> Result<QueuePage, ClientError>;

    async fn get_queue_item(&self, id: i64) -> Result<StandbyQueueItem, ClientError>;

    async fn assign(&self, item_id: i64, board_id: i64) -> Result<Ticket, ClientError>;

    async fn retry(&self, item_id: i64) -> Result<StandbyQueueItem, ClientError>;

    async fn discard(&self, item_id: i64) -> Result<(), ClientError>;
}
