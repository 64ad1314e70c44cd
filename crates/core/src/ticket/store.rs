//! Ticket storage trait and types.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::validate::{validate_description, validate_email, validate_title, ValidationError};
use super::{StatusChange, Ticket, TicketSource, TicketState, Transition, TransitionError, TransitionRequest};
use crate::error::ErrorCode;

/// Error type for ticket operations.
#[derive(Debug, Error)]
pub enum TicketError {
    /// Ticket not found.
    #[error("Ticket not found: {0}")]
    NotFound(i64),

    /// The transition was rejected by the state machine.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Ticket content out of bounds.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl TicketError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TicketError::NotFound(_) => ErrorCode::NotFound,
            TicketError::Transition(e) => e.code(),
            TicketError::Validation(_) => ErrorCode::ValidationError,
            TicketError::Database(_) => ErrorCode::InternalError,
        }
    }
}

impl From<rusqlite::Error> for TicketError {
    fn from(e: rusqlite::Error) -> Self {
        TicketError::Database(e.to_string())
    }
}

/// Request to create a new ticket.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTicketRequest {
    pub board_id: i64,
    pub title: String,
    pub description: String,
    pub creator_email: String,
    pub source: TicketSource,
}

impl CreateTicketRequest {
    /// Check content bounds.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        validate_description(&self.description)?;
        validate_email(&self.creator_email)?;
        Ok(())
    }
}

/// Filter for querying tickets.
#[derive(Debug, Clone)]
pub struct TicketFilter {
    /// Restrict to one board.
    pub board_id: Option<i64>,
    /// Restrict to any of these states (empty = all).
    pub states: Vec<TicketState>,
    /// Only tickets created at or after this instant.
    pub created_since: Option<DateTime<Utc>>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl TicketFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            board_id: None,
            states: Vec::new(),
            created_since: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_board(mut self, board_id: i64) -> Self {
        self.board_id = Some(board_id);
        self
    }

    pub fn with_state(mut self, state: TicketState) -> Self {
        if !self.states.contains(&state) {
            self.states.push(state);
        }
        self
    }

    pub fn with_created_since(mut self, since: DateTime<Utc>) -> Self {
        self.created_since = Some(since);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

impl Default for TicketFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for ticket storage backends.
pub trait TicketStore: Send + Sync {
    /// Create a new ticket in state `new`.
    fn create(&self, request: CreateTicketRequest) -> Result<Ticket, TicketError>;

    /// Get a ticket by ID.
    fn get(&self, id: i64) -> Result<Option<Ticket>, TicketError>;

    /// Get a ticket by its public uuid.
    fn get_by_uuid(&self, uuid: Uuid) -> Result<Option<Ticket>, TicketError>;

    /// List tickets matching the filter, newest first.
    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError>;

    /// Count tickets matching the filter (ignores limit/offset).
    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError>;

    /// Status-change history of a ticket, oldest first.
    fn history(&self, ticket_id: i64) -> Result<Vec<StatusChange>, TicketError>;

    /// Validate and apply a transition atomically, appending to the history.
    fn transition(&self, id: i64, request: TransitionRequest) -> Result<Transition, TicketError>;
}
