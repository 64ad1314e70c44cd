//! Public ticket status lookup by uuid. Requires no credentials, so only
//! what the reporter may see is returned.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use ticketdesk_core::{Board, ExternalTicket, Ticket, TicketState};
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PublicStatusChange {
    pub previous_state: TicketState,
    pub new_state: TicketState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublicTicketStatus {
    Internal {
        uuid: Uuid,
        title: String,
        description: String,
        state: TicketState,
        board_name: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        status_changes: Vec<PublicStatusChange>,
    },
    External {
        uuid: Uuid,
        title: String,
        board_name: Option<String>,
        platform: String,
        external_url: String,
        created_at: DateTime<Utc>,
    },
}

fn board_name(state: &AppState, board_id: i64) -> ApiResult<Option<String>> {
    Ok(state.board_store().get(board_id)?.map(|b: Board| b.name))
}

fn internal_status(state: &AppState, ticket: Ticket) -> ApiResult<PublicTicketStatus> {
    let status_changes = state
        .ticket_store()
        .history(ticket.id)?
        .into_iter()
        .map(|change| PublicStatusChange {
            previous_state: change.previous_state,
            new_state: change.new_state,
            comment: change.comment,
            created_at: change.changed_at,
        })
        .collect();

    Ok(PublicTicketStatus::Internal {
        uuid: ticket.uuid,
        board_name: board_name(state, ticket.board_id)?,
        title: ticket.title,
        description: ticket.description,
        state: ticket.state,
        created_at: ticket.created_at,
        updated_at: ticket.updated_at,
        status_changes,
    })
}

fn external_status(state: &AppState, ticket: ExternalTicket) -> ApiResult<PublicTicketStatus> {
    Ok(PublicTicketStatus::External {
        uuid: ticket.uuid,
        board_name: board_name(state, ticket.board_id)?,
        title: ticket.title,
        platform: ticket.reference.platform,
        external_url: ticket.reference.external_url,
        created_at: ticket.created_at,
    })
}

/// Internal tickets first, then issues created on an external platform
pub async fn ticket_status(
    State(state): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> ApiResult<Json<PublicTicketStatus>> {
    let not_found = || ApiError::not_found(format!("Ticket not found: {}", raw));
    let uuid = Uuid::parse_str(&raw).map_err(|_| not_found())?;

    if let Some(ticket) = state.ticket_store().get_by_uuid(uuid)? {
        return Ok(Json(internal_status(&state, ticket)?));
    }
    match state.queue_store().find_external_ticket(uuid)? {
        Some(ticket) => Ok(Json(external_status(&state, ticket)?)),
        None => Err(not_found()),
    }
}
