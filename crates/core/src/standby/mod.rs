//! Standby queue: inbound messages that failed automatic routing, waiting
//! to be assigned to a board, retried against an external platform, or
//! discarded.

mod retry;
mod sqlite;
mod triage;
mod types;

pub use retry::{retry_external_sync, RetryReport};
pub use sqlite::SqliteQueueStore;
pub use triage::*;
pub use types::*;

use thiserror::Error;

use uuid::Uuid;

use crate::board::Board;
use crate::error::ErrorCode;
use crate::sync::{ExternalTicket, ExternalTicketRef};
use crate::ticket::{Ticket, ValidationError};

/// Errors for queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Triage(#[from] TriageError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    Database(String),
}

impl QueueError {
    pub fn code(&self) -> ErrorCode {
        match self {
            QueueError::Triage(e) => e.code(),
            QueueError::Validation(_) => ErrorCode::ValidationError,
            QueueError::Database(_) => ErrorCode::InternalError,
        }
    }
}

impl From<rusqlite::Error> for QueueError {
    fn from(e: rusqlite::Error) -> Self {
        QueueError::Database(e.to_string())
    }
}

/// Trait for standby-queue storage.
///
/// Reads only see pending items; assigned and discarded items behave as
/// if they no longer exist.
pub trait QueueStore: Send + Sync {
    /// Place a new item on the queue.
    fn enqueue(&self, item: NewQueueItem) -> Result<StandbyQueueItem, QueueError>;

    /// Get a pending item.
    fn get(&self, id: i64) -> Result<Option<StandbyQueueItem>, QueueError>;

    /// Get an item whatever its disposition, for precondition checks.
    fn get_any(&self, id: i64) -> Result<Option<StandbyQueueItem>, QueueError>;

    /// List pending items, newest first.
    fn list(&self, filter: &QueueFilter) -> Result<Vec<StandbyQueueItem>, QueueError>;

    /// Count pending items matching the filter (ignores limit/offset).
    fn count(&self, filter: &QueueFilter) -> Result<i64, QueueError>;

    /// Create a ticket on `board` from the item and mark the item assigned,
    /// atomically. A second call fails with `AlreadyAssigned`.
    fn assign(&self, id: i64, board: &Board) -> Result<Ticket, QueueError>;

    /// Store the outcome of an external sync retry.
    ///
    /// `external` is the issue the platform created, if it did. It is kept
    /// even when the item left the queue while the platform call was in
    /// flight; the triage error is returned after it was written.
    fn record_retry(
        &self,
        id: i64,
        outcome: RetryOutcome,
        external: Option<&ExternalTicketRef>,
    ) -> Result<RetryRecord, QueueError>;

    /// External issues created on `board_id`, newest first.
    fn external_tickets(&self, board_id: i64) -> Result<Vec<ExternalTicket>, QueueError>;

    fn find_external_ticket(&self, uuid: Uuid) -> Result<Option<ExternalTicket>, QueueError>;

    /// Permanently remove an item from the queue.
    fn discard(&self, id: i64) -> Result<(), QueueError>;
}
