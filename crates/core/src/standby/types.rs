//! Types for the standby queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sync::ExternalTicket;
use crate::ticket::validate::{validate_email, ValidationError, MAX_TITLE_LEN};

/// Why an inbound message ended up in the standby queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// No board's routing keywords matched.
    NoKeywordMatch,
    /// A board matched but mirroring to its external platform failed.
    ExternalCreationFailed,
    /// The message addressed a board that does not exist (or is archived).
    NoBoardMatch,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::NoKeywordMatch => "no_keyword_match",
            FailureReason::ExternalCreationFailed => "external_creation_failed",
            FailureReason::NoBoardMatch => "no_board_match",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "no_keyword_match" => Some(FailureReason::NoKeywordMatch),
            "external_creation_failed" => Some(FailureReason::ExternalCreationFailed),
            "no_board_match" => Some(FailureReason::NoBoardMatch),
            _ => None,
        }
    }
}

/// Where an item is in its lifecycle. `Assigned` and `Discarded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemDisposition {
    Pending,
    Assigned { ticket_id: i64 },
    Discarded,
}

impl ItemDisposition {
    pub fn is_pending(&self) -> bool {
        matches!(self, ItemDisposition::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemDisposition::Pending => "pending",
            ItemDisposition::Assigned { .. } => "assigned",
            ItemDisposition::Discarded => "discarded",
        }
    }
}

/// An inbound message waiting for a manager to triage it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandbyQueueItem {
    pub id: i64,
    pub sender_email: String,
    pub subject: String,
    pub body: String,
    pub reason: FailureReason,
    /// Board whose external sync failed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_board_id: Option<i64>,
    /// True while the last attempt to mirror onto the external platform failed.
    pub external_sync_failed: bool,
    /// Number of manual retries so far.
    pub retry_count: u32,
    pub disposition: ItemDisposition,
    pub received_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An inbound message to place on the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQueueItem {
    pub sender_email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    pub reason: FailureReason,
    #[serde(default)]
    pub original_board_id: Option<i64>,
    #[serde(default)]
    pub external_sync_failed: bool,
}

impl NewQueueItem {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.sender_email)?;
        // Subjects are kept verbatim; only absurd lengths are refused.
        let len = self.subject.chars().count();
        if len > MAX_TITLE_LEN * 4 {
            return Err(ValidationError::TooLong {
                field: "subject",
                max: MAX_TITLE_LEN * 4,
                len,
            });
        }
        Ok(())
    }
}

/// Action a manager may take on a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageAction {
    Assign,
    Retry,
    Discard,
}

/// Result of re-attempting the external sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Synced,
    StillFailing,
}

/// What [`QueueStore::record_retry`](super::QueueStore::record_retry) wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryRecord {
    pub item: StandbyQueueItem,
    pub external: Option<ExternalTicket>,
}

/// Filter for listing pending items.
#[derive(Debug, Clone)]
pub struct QueueFilter {
    /// Only items whose external sync failed (or succeeded).
    pub sync_failed: Option<bool>,
    pub limit: i64,
    pub offset: i64,
}

impl QueueFilter {
    pub fn new() -> Self {
        Self {
            sync_failed: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_sync_failed(mut self, failed: bool) -> Self {
        self.sync_failed = Some(failed);
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

impl Default for QueueFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// One page of pending items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuePage {
    pub items: Vec<StandbyQueueItem>,
    /// Pending items matching the filter, ignoring pagination.
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
