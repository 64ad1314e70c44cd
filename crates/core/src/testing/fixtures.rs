//! Ready-made domain values for tests.

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::board::{Board, ExternalPlatform};
use crate::standby::{FailureReason, ItemDisposition, StandbyQueueItem};
use crate::ticket::{StatusChange, Ticket, TicketSource, TicketState};

fn base_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub fn ticket(id: i64, state: TicketState) -> Ticket {
    Ticket {
        id,
        uuid: Uuid::new_v4(),
        board_id: 1,
        title: format!("Ticket {}", id),
        description: "Printer on floor 2 is jammed".to_string(),
        state,
        creator_email: "reporter@example.com".to_string(),
        source: TicketSource::Form,
        created_at: base_time(),
        updated_at: base_time(),
    }
}

pub fn status_change(ticket_id: i64, from: TicketState, to: TicketState) -> StatusChange {
    StatusChange {
        id: 1,
        ticket_id,
        previous_state: from,
        new_state: to,
        comment: None,
        changed_by: "manager".to_string(),
        changed_at: base_time() + Duration::minutes(5),
    }
}

/// Pending item. Failed items point at board 1 so they can be retried.
pub fn queue_item(id: i64, external_sync_failed: bool) -> StandbyQueueItem {
    StandbyQueueItem {
        id,
        sender_email: format!("sender{}@example.com", id),
        subject: format!("Help request {}", id),
        body: "VPN drops every ten minutes".to_string(),
        reason: if external_sync_failed {
            FailureReason::ExternalCreationFailed
        } else {
            FailureReason::NoKeywordMatch
        },
        original_board_id: external_sync_failed.then_some(1),
        external_sync_failed,
        retry_count: 0,
        disposition: ItemDisposition::Pending,
        received_at: base_time() + Duration::seconds(id),
        updated_at: base_time() + Duration::seconds(id),
    }
}

pub fn board(id: i64) -> Board {
    Board {
        id,
        name: format!("Board {}", id),
        unique_name: format!("board-{}", id),
        is_archived: false,
        external_platform: None,
        created_at: base_time(),
        updated_at: base_time(),
    }
}

pub fn jira_board(id: i64) -> Board {
    Board {
        external_platform: Some(ExternalPlatform::Jira {
            base_url: "https://example.atlassian.net".to_string(),
            project_key: "OPS".to_string(),
            email: "bot@example.com".to_string(),
            api_token: "jira-token".to_string(),
        }),
        ..board(id)
    }
}
