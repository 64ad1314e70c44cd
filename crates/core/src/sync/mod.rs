//! Mirroring queue items onto a board's external platform (Jira, Trello).

mod http;

pub use http::HttpPlatformSync;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::board::Board;
use crate::standby::StandbyQueueItem;

/// Reference to an issue or card created on an external platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTicketRef {
    /// `jira` or `trello`.
    pub platform: String,
    /// Issue key (Jira) or card id (Trello).
    pub external_id: String,
    pub external_url: String,
}

/// An external issue created for a queue item, as stored locally.
///
/// Carries its own public `uuid` so the sender can look it up the same way
/// as an internal ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTicket {
    pub id: i64,
    pub uuid: Uuid,
    pub board_id: i64,
    /// Queue item the issue was created from.
    pub item_id: i64,
    pub title: String,
    pub creator_email: String,
    #[serde(flatten)]
    pub reference: ExternalTicketRef,
    pub created_at: DateTime<Utc>,
}

/// Errors from an external platform.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("External sync not configured: {0}")]
    NotConfigured(String),

    #[error("External platform timed out")]
    Timeout,

    #[error("External platform rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SyncError::Timeout
        } else if e.is_decode() {
            SyncError::Decode(e.to_string())
        } else {
            SyncError::Transport(e.to_string())
        }
    }
}

/// Creates issues on a board's external platform.
#[async_trait]
pub trait PlatformSync: Send + Sync {
    /// Create an issue for `item` on `board`'s platform.
    async fn create_external_ticket(
        &self,
        board: &Board,
        item: &StandbyQueueItem,
    ) -> Result<ExternalTicketRef, SyncError>;
}
