//! Standby queue API handlers: intake, listing and triage.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;
use ticketdesk_core::{
    retry_external_sync, AssignRequest, AuditEvent, NewQueueItem, QueueFilter, QueuePage,
    StandbyQueueItem, Ticket, TicketSource, TriageAction,
};
use tracing::info;

use super::error::{ApiError, ApiResult};
use super::extract::{ApiQuery, Id, JsonBody};
use super::middleware::AuthUser;
use super::tickets::find_board;
use crate::metrics::{QUEUE_DISPOSITIONS, TICKETS_CREATED_TOTAL};
use crate::state::AppState;

const MAX_LIMIT: i64 = 1000;

const DEFAULT_LIMIT: i64 = 50;

/// Query parameters for listing the queue
#[derive(Debug, Deserialize)]
pub struct ListQueueParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Only items whose external sync failed (`true`) or did not (`false`)
    pub sync_failed: Option<bool>,
}

fn action_label(action: TriageAction) -> &'static str {
    match action {
        TriageAction::Assign => "assign",
        TriageAction::Retry => "retry",
        TriageAction::Discard => "discard",
    }
}

/// Count a triage attempt. Rejections are labelled with their error code.
fn record_disposition<T>(action: TriageAction, result: &ApiResult<T>, ok_label: &str) {
    let outcome = match result {
        Ok(_) => ok_label.to_string(),
        Err(e) => e.code().as_str().to_lowercase(),
    };
    QUEUE_DISPOSITIONS
        .with_label_values(&[action_label(action), &outcome])
        .inc();
}

/// List pending items, newest first
pub async fn list_queue(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<ListQueueParams>,
) -> ApiResult<Json<QueuePage>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = QueueFilter::new();
    if let Some(failed) = params.sync_failed {
        filter = filter.with_sync_failed(failed);
    }

    let total = state.queue_store().count(&filter)?;
    let items = state
        .queue_store()
        .list(&filter.with_limit(limit).with_offset(offset))?;

    Ok(Json(QueuePage {
        items,
        total,
        limit,
        offset,
    }))
}

/// Get a pending item. Assigned and discarded items are gone.
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Id(id): Id,
) -> ApiResult<Json<StandbyQueueItem>> {
    state
        .queue_store()
        .get(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Queue item not found: {}", id)))
}

/// Place an unroutable message on the queue
pub async fn enqueue(
    State(state): State<Arc<AppState>>,
    JsonBody(item): JsonBody<NewQueueItem>,
) -> ApiResult<(StatusCode, Json<StandbyQueueItem>)> {
    if let Some(board_id) = item.original_board_id {
        if state.board_store().get(board_id)?.is_none() {
            return Err(ApiError::validation(format!(
                "original_board_id {} does not exist",
                board_id
            )));
        }
    }

    let item = state.queue_store().enqueue(item)?;
    info!(
        item_id = item.id,
        reason = item.reason.as_str(),
        sync_failed = item.external_sync_failed,
        "Queue item received"
    );

    state
        .audit()
        .emit(AuditEvent::QueueItemEnqueued {
            item_id: item.id,
            reason: item.reason.as_str().to_string(),
            external_sync_failed: item.external_sync_failed,
        })
        .await;

    Ok((StatusCode::CREATED, Json(item)))
}

/// Turn an item into a ticket on the given board
pub async fn assign(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Id(id): Id,
    JsonBody(body): JsonBody<AssignRequest>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    let result = find_board(&state, body.board_id).and_then(|board| {
        state
            .queue_store()
            .assign(id, &board)
            .map_err(ApiError::from)
    });
    record_disposition(TriageAction::Assign, &result, "assigned");
    let ticket = result?;

    TICKETS_CREATED_TOTAL
        .with_label_values(&[TicketSource::Email.as_str()])
        .inc();

    state
        .audit()
        .emit(AuditEvent::QueueItemAssigned {
            item_id: id,
            board_id: ticket.board_id,
            ticket_id: ticket.id,
            assigned_by: user_id.clone(),
        })
        .await;
    state
        .audit()
        .emit(AuditEvent::TicketCreated {
            ticket_id: ticket.id,
            board_id: ticket.board_id,
            source: ticket.source.as_str().to_string(),
            created_by: user_id,
        })
        .await;

    Ok((StatusCode::CREATED, Json(ticket)))
}

/// Re-attempt the external sync of an item
///
/// The item comes back either way; `external_sync_failed` tells whether
/// this attempt worked.
pub async fn retry(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Id(id): Id,
) -> ApiResult<Json<StandbyQueueItem>> {
    let result = retry_external_sync(
        state.queue_store(),
        state.board_store(),
        state.sync(),
        id,
    )
    .await
    .map_err(ApiError::from);

    let ok_label = match &result {
        Ok(report) if report.succeeded() => "synced",
        _ => "still_failing",
    };
    record_disposition(TriageAction::Retry, &result, ok_label);
    let report = result?;

    if let Some(board_id) = report.item.original_board_id {
        state
            .audit()
            .emit(AuditEvent::QueueItemRetried {
                item_id: id,
                board_id,
                succeeded: report.succeeded(),
                retry_count: report.item.retry_count,
                retried_by: user_id,
                external_uuid: report.external.as_ref().map(|e| e.uuid.to_string()),
                external_id: report
                    .external
                    .as_ref()
                    .map(|e| e.reference.external_id.clone()),
                error: report.error.clone(),
            })
            .await;
    }

    Ok(Json(report.item))
}

/// Drop an item from the queue for good
pub async fn discard(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Id(id): Id,
) -> ApiResult<StatusCode> {
    let result = state.queue_store().discard(id).map_err(ApiError::from);
    record_disposition(TriageAction::Discard, &result, "discarded");
    result?;

    state
        .audit()
        .emit(AuditEvent::QueueItemDiscarded {
            item_id: id,
            discarded_by: user_id,
        })
        .await;

    Ok(StatusCode::NO_CONTENT)
}
