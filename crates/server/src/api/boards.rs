//! Board API handlers. Platform credentials never leave the service.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;
use ticketdesk_core::{
    AuditEvent, Board, BoardError, BoardKeyword, CreateBoardRequest, CreateKeywordRequest,
    ExternalTicket, TicketFilter, UpdateBoardRequest,
};

use super::error::ApiResult;
use super::extract::{ApiQuery, Id, IdPair, JsonBody};
use super::middleware::AuthUser;
use super::tickets::find_board;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListBoardsParams {
    #[serde(default)]
    pub include_archived: bool,
}

pub async fn list_boards(
    State(state): State<Arc<AppState>>,
    ApiQuery(params): ApiQuery<ListBoardsParams>,
) -> ApiResult<Json<Vec<Board>>> {
    let boards = state.board_store().list(params.include_archived)?;
    Ok(Json(boards.iter().map(Board::redacted).collect()))
}

pub async fn create_board(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    JsonBody(request): JsonBody<CreateBoardRequest>,
) -> ApiResult<(StatusCode, Json<Board>)> {
    let board = state.board_store().create(request)?;

    state
        .audit()
        .emit(AuditEvent::BoardCreated {
            board_id: board.id,
            unique_name: board.unique_name.clone(),
            platform: board
                .external_platform
                .as_ref()
                .map(|p| p.name().to_string()),
            created_by: user_id,
        })
        .await;

    Ok((StatusCode::CREATED, Json(board.redacted())))
}

pub async fn get_board(
    State(state): State<Arc<AppState>>,
    Id(id): Id,
) -> ApiResult<Json<Board>> {
    Ok(Json(find_board(&state, id)?.redacted()))
}

/// Archive a board; it keeps its tickets but accepts no new ones
pub async fn archive_board(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Id(id): Id,
) -> ApiResult<Json<Board>> {
    let board = state.board_store().archive(id)?;

    state
        .audit()
        .emit(AuditEvent::BoardArchived {
            board_id: id,
            archived_by: user_id,
        })
        .await;

    Ok(Json(board.redacted()))
}

pub async fn update_board(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Id(id): Id,
    JsonBody(request): JsonBody<UpdateBoardRequest>,
) -> ApiResult<Json<Board>> {
    let board = state.board_store().update(id, request)?;

    state
        .audit()
        .emit(AuditEvent::BoardUpdated {
            board_id: id,
            unique_name: board.unique_name.clone(),
            updated_by: user_id,
        })
        .await;

    Ok(Json(board.redacted()))
}

/// Delete a board that never received a ticket
pub async fn delete_board(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Id(id): Id,
) -> ApiResult<StatusCode> {
    find_board(&state, id)?;

    let tickets = state
        .ticket_store()
        .count(&TicketFilter::new().with_board(id))?;
    if tickets > 0 {
        return Err(BoardError::HasTickets(id).into());
    }

    state.board_store().delete(id)?;

    state
        .audit()
        .emit(AuditEvent::BoardDeleted {
            board_id: id,
            deleted_by: user_id,
        })
        .await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_keywords(
    State(state): State<Arc<AppState>>,
    Id(id): Id,
) -> ApiResult<Json<Vec<BoardKeyword>>> {
    Ok(Json(state.board_store().keywords(id)?))
}

pub async fn add_keyword(
    State(state): State<Arc<AppState>>,
    Id(id): Id,
    JsonBody(request): JsonBody<CreateKeywordRequest>,
) -> ApiResult<(StatusCode, Json<BoardKeyword>)> {
    let keyword = state.board_store().add_keyword(id, request)?;
    Ok((StatusCode::CREATED, Json(keyword)))
}

pub async fn remove_keyword(
    State(state): State<Arc<AppState>>,
    IdPair(board_id, keyword_id): IdPair,
) -> ApiResult<StatusCode> {
    find_board(&state, board_id)?;
    state.board_store().remove_keyword(board_id, keyword_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Issues created on the board's platform for queue items, newest first
pub async fn list_external_tickets(
    State(state): State<Arc<AppState>>,
    Id(id): Id,
) -> ApiResult<Json<Vec<ExternalTicket>>> {
    find_board(&state, id)?;
    Ok(Json(state.queue_store().external_tickets(id)?))
}
