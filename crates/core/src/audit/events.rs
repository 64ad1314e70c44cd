use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Ticket lifecycle
    TicketCreated {
        ticket_id: i64,
        board_id: i64,
        /// "email", "external" or "form"
        source: String,
        created_by: String,
    },
    TicketStateChanged {
        ticket_id: i64,
        from_state: String,
        to_state: String,
        changed_by: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },

    // Standby queue
    QueueItemEnqueued {
        item_id: i64,
        reason: String,
        external_sync_failed: bool,
    },
    QueueItemAssigned {
        item_id: i64,
        board_id: i64,
        ticket_id: i64,
        assigned_by: String,
    },
    QueueItemRetried {
        item_id: i64,
        board_id: i64,
        /// Whether the external platform accepted the item this time
        succeeded: bool,
        retry_count: u32,
        retried_by: String,
        /// Public uuid of the stored external ticket, on success
        #[serde(default, skip_serializing_if = "Option::is_none")]
        external_uuid: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        external_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    QueueItemDiscarded {
        item_id: i64,
        discarded_by: String,
    },

    // Boards
    BoardCreated {
        board_id: i64,
        unique_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        platform: Option<String>,
        created_by: String,
    },
    BoardArchived {
        board_id: i64,
        archived_by: String,
    },
    BoardUpdated {
        board_id: i64,
        unique_name: String,
        updated_by: String,
    },
    BoardDeleted {
        board_id: i64,
        deleted_by: String,
    },
}

impl AuditEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::TicketCreated { .. } => "ticket_created",
            Self::TicketStateChanged { .. } => "ticket_state_changed",
            Self::QueueItemEnqueued { .. } => "queue_item_enqueued",
            Self::QueueItemAssigned { .. } => "queue_item_assigned",
            Self::QueueItemRetried { .. } => "queue_item_retried",
            Self::QueueItemDiscarded { .. } => "queue_item_discarded",
            Self::BoardCreated { .. } => "board_created",
            Self::BoardArchived { .. } => "board_archived",
            Self::BoardUpdated { .. } => "board_updated",
            Self::BoardDeleted { .. } => "board_deleted",
        }
    }

    /// Extract ticket_id if this event is ticket-related
    pub fn ticket_id(&self) -> Option<i64> {
        match self {
            Self::TicketCreated { ticket_id, .. }
            | Self::TicketStateChanged { ticket_id, .. }
            | Self::QueueItemAssigned { ticket_id, .. } => Some(*ticket_id),
            _ => None,
        }
    }

    /// Extract user_id if this event was triggered by a user action
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::TicketCreated { created_by, .. } | Self::BoardCreated { created_by, .. } => {
                Some(created_by)
            }
            Self::TicketStateChanged { changed_by, .. } => Some(changed_by),
            Self::QueueItemAssigned { assigned_by, .. } => Some(assigned_by),
            Self::QueueItemRetried { retried_by, .. } => Some(retried_by),
            Self::QueueItemDiscarded { discarded_by, .. } => Some(discarded_by),
            Self::BoardArchived { archived_by, .. } => Some(archived_by),
            Self::BoardUpdated { updated_by, .. } => Some(updated_by),
            Self::BoardDeleted { deleted_by, .. } => Some(deleted_by),
            _ => None,
        }
    }
}

/// A stored audit record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub ticket_id: Option<i64>,
    pub user_id: Option<String>,
    pub data: AuditEvent,
}
