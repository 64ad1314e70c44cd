//! Ticket API handlers.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use ticketdesk_core::{
    AuditEvent, Board, CreateTicketRequest, ErrorCode, StateChangeRequest, StatusChange, Ticket,
    TicketFilter, TicketSource, TicketState, TransitionRequest,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use super::extract::{ApiQuery, Id, JsonBody};
use super::middleware::AuthUser;
use crate::metrics::{TICKETS_CREATED_TOTAL, TICKET_STATE_TRANSITIONS};
use crate::state::AppState;

/// Maximum allowed limit for ticket queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for ticket queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for listing a board's tickets
#[derive(Debug, Deserialize)]
pub struct ListTicketsParams {
    /// One state or several, comma-separated
    pub state: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for listing tickets
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<Ticket>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Default and maximum size of the recent-tickets list
const RECENT_DEFAULT: i64 = 10;
const RECENT_MAX: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct RecentTicketsParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardSummary {
    pub id: i64,
    pub name: String,
    pub unique_name: String,
}

/// A ticket as shown on the recent-activity list
#[derive(Debug, Serialize)]
pub struct RecentTicket {
    pub id: i64,
    pub uuid: Uuid,
    pub title: String,
    pub state: TicketState,
    /// Absent if the board has since been deleted.
    pub board: Option<BoardSummary>,
    pub created_at: DateTime<Utc>,
}

/// Public form submission
#[derive(Debug, Deserialize)]
pub struct SubmitFormBody {
    pub title: String,
    pub description: String,
    pub email: String,
}

pub(crate) fn find_board(state: &AppState, id: i64) -> ApiResult<Board> {
    state
        .board_store()
        .get(id)?
        .ok_or_else(|| ApiError::not_found(format!("Board not found: {}", id)))
}

fn find_ticket(state: &AppState, id: i64) -> ApiResult<Ticket> {
    state
        .ticket_store()
        .get(id)?
        .ok_or_else(|| ApiError::not_found(format!("Ticket not found: {}", id)))
}

/// Get a ticket by ID
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Id(id): Id,
) -> ApiResult<Json<Ticket>> {
    Ok(Json(find_ticket(&state, id)?))
}

/// Status-change history of a ticket, oldest first
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Id(id): Id,
) -> ApiResult<Json<Vec<StatusChange>>> {
    find_ticket(&state, id)?;
    Ok(Json(state.ticket_store().history(id)?))
}

/// Move a ticket to a new state
pub async fn change_state(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Id(id): Id,
    JsonBody(body): JsonBody<StateChangeRequest>,
) -> ApiResult<Json<Ticket>> {
    let target: TicketState = body.new_state.parse()?;

    let mut request = TransitionRequest::new(target, user_id.clone());
    if let Some(comment) = body.comment {
        request = request.with_comment(comment);
    }

    let transition = state.ticket_store().transition(id, request).map_err(|e| {
        let e = ApiError::from(e);
        if e.code() == ErrorCode::IllegalTransition {
            warn!(ticket_id = id, target = %target, changed_by = %user_id, "Transition rejected");
        }
        e
    })?;

    let change = transition.change;
    TICKET_STATE_TRANSITIONS
        .with_label_values(&[change.previous_state.as_str(), change.new_state.as_str()])
        .inc();

    state
        .audit()
        .emit(AuditEvent::TicketStateChanged {
            ticket_id: id,
            from_state: change.previous_state.to_string(),
            to_state: change.new_state.to_string(),
            changed_by: change.changed_by,
            comment: change.comment,
        })
        .await;

    Ok(Json(transition.ticket))
}

/// List tickets on a board
pub async fn list_board_tickets(
    State(state): State<Arc<AppState>>,
    Id(board_id): Id,
    ApiQuery(params): ApiQuery<ListTicketsParams>,
) -> ApiResult<Json<ListTicketsResponse>> {
    find_board(&state, board_id)?;

    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = TicketFilter::new().with_board(board_id);
    if let Some(ref states) = params.state {
        for raw in states.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            filter = filter.with_state(raw.parse()?);
        }
    }

    let total = state.ticket_store().count(&filter)?;
    let tickets = state
        .ticket_store()
        .list(&filter.with_limit(limit).with_offset(offset))?;

    Ok(Json(ListTicketsResponse {
        tickets,
        total,
        limit,
        offset,
    }))
}

/// Most recently created tickets across all boards
pub async fn recent_tickets(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<RecentTicketsParams>,
) -> ApiResult<Json<Vec<RecentTicket>>> {
    let limit = params.limit.unwrap_or(RECENT_DEFAULT);
    if !(1..=RECENT_MAX).contains(&limit) {
        return Err(ApiError::validation(format!(
            "limit must be between 1 and {}",
            RECENT_MAX
        )));
    }

    let tickets = state
        .ticket_store()
        .list(&TicketFilter::new().with_limit(limit))?;

    let mut boards: HashMap<i64, Option<BoardSummary>> = HashMap::new();
    let mut recent = Vec::with_capacity(tickets.len());
    for ticket in tickets {
        let board = match boards.get(&ticket.board_id) {
            Some(cached) => cached.clone(),
            None => {
                let summary = state.board_store().get(ticket.board_id)?.map(|b| BoardSummary {
                    id: b.id,
                    name: b.name,
                    unique_name: b.unique_name,
                });
                boards.insert(ticket.board_id, summary.clone());
                summary
            }
        };
        recent.push(RecentTicket {
            id: ticket.id,
            uuid: ticket.uuid,
            title: ticket.title,
            state: ticket.state,
            board,
            created_at: ticket.created_at,
        });
    }

    Ok(Json(recent))
}

/// Public form submission onto a board
pub async fn submit_form(
    State(state): State<Arc<AppState>>,
    Id(board_id): Id,
    JsonBody(body): JsonBody<SubmitFormBody>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    let board = find_board(&state, board_id)?;
    if board.is_archived {
        return Err(ApiError::new(
            ErrorCode::BoardArchived,
            format!("Board {} is archived", board_id),
        ));
    }

    let ticket = state.ticket_store().create(CreateTicketRequest {
        board_id,
        title: body.title.trim().to_string(),
        description: body.description,
        creator_email: body.email.trim().to_string(),
        source: TicketSource::Form,
    })?;

    info!(ticket_id = ticket.id, board_id, "Ticket submitted through form");
    TICKETS_CREATED_TOTAL
        .with_label_values(&[TicketSource::Form.as_str()])
        .inc();

    state
        .audit()
        .emit(AuditEvent::TicketCreated {
            ticket_id: ticket.id,
            board_id,
            source: TicketSource::Form.as_str().to_string(),
            created_by: ticket.creator_email.clone(),
        })
        .await;

    Ok((StatusCode::CREATED, Json(ticket)))
}
