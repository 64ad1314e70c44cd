//! In-memory Ticket/Queue Service.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::fixtures;
use crate::client::{ClientError, StateChangeRequest, TicketService};
use crate::error::{ErrorBody, ErrorCode};
use crate::standby::{
    apply_retry_outcome, check_assign, check_discard, check_retry, ItemDisposition, QueuePage,
    RetryOutcome, StandbyQueueItem, TriageError,
};
use crate::ticket::{
    attempt_transition, StatusChange, Ticket, TicketState, TransitionError, TransitionRequest,
};

#[derive(Debug, Default)]
struct ServiceState {
    tickets: BTreeMap<i64, Ticket>,
    history: Vec<StatusChange>,
    items: BTreeMap<i64, StandbyQueueItem>,
    archived_boards: HashSet<i64>,
    retry_outcomes: VecDeque<RetryOutcome>,
    next_ticket_id: i64,
    next_change_id: i64,
    history_requests: usize,
    state_change_requests: usize,
    writes_stalled: bool,
}

impl ServiceState {
    fn ticket_id(&mut self) -> i64 {
        let taken = self.tickets.keys().next_back().copied().unwrap_or(0);
        self.next_ticket_id = self.next_ticket_id.max(taken) + 1;
        self.next_ticket_id
    }

    fn push_change(&mut self, mut change: StatusChange) {
        self.next_change_id += 1;
        change.id = self.next_change_id;
        self.history.push(change);
    }
}

/// Error the way the HTTP service would report it
fn rejected(code: ErrorCode, message: impl Into<String>) -> ClientError {
    ClientError::from_response(code.http_status(), Some(ErrorBody::new(code, message)))
}

fn triage_rejected(e: TriageError) -> ClientError {
    rejected(e.code(), e.to_string())
}

fn transition_rejected(e: TransitionError) -> ClientError {
    rejected(e.code(), e.to_string())
}

/// Mock implementation of [`TicketService`]
///
/// Applies the same pure lifecycle and triage checks as the real service,
/// so conflicts can be provoked by mutating state "behind the client's back"
/// with [`force_state`](Self::force_state) or by calling the trait methods
/// directly. Every board exists; archive one with
/// [`archive_board`](Self::archive_board).
#[derive(Debug, Clone, Default)]
pub struct MockTicketService {
    state: Arc<Mutex<ServiceState>>,
}

impl MockTicketService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_ticket(&self, ticket: Ticket) {
        self.state.lock().await.tickets.insert(ticket.id, ticket);
    }

    pub async fn insert_item(&self, item: StandbyQueueItem) {
        self.state.lock().await.items.insert(item.id, item);
    }

    pub async fn archive_board(&self, board_id: i64) {
        self.state.lock().await.archived_boards.insert(board_id);
    }

    /// Outcome of the next retry; defaults to `Synced`
    pub async fn push_retry_outcome(&self, outcome: RetryOutcome) {
        self.state.lock().await.retry_outcomes.push_back(outcome);
    }

    /// Move a ticket without the adjacency check, as another manager might
    pub async fn force_state(&self, ticket_id: i64, state: TicketState, changed_by: &str) {
        let mut guard = self.state.lock().await;
        let Some(ticket) = guard.tickets.get_mut(&ticket_id) else {
            return;
        };
        let previous = ticket.state;
        let now = Utc::now().max(ticket.updated_at);
        ticket.state = state;
        ticket.updated_at = now;
        guard.push_change(StatusChange {
            id: 0,
            ticket_id,
            previous_state: previous,
            new_state: state,
            comment: None,
            changed_by: changed_by.to_string(),
            changed_at: now,
        });
    }

    /// Make every write hang until the caller gives up on it
    pub async fn stall_writes(&self, stalled: bool) {
        self.state.lock().await.writes_stalled = stalled;
    }

    async fn wait_if_stalled(&self) {
        let stalled = self.state.lock().await.writes_stalled;
        if stalled {
            std::future::pending::<()>().await;
        }
    }

    pub async fn history_requests(&self) -> usize {
        self.state.lock().await.history_requests
    }

    pub async fn state_change_requests(&self) -> usize {
        self.state.lock().await.state_change_requests
    }

    pub async fn ticket_count(&self) -> usize {
        self.state.lock().await.tickets.len()
    }

    /// Items still pending
    pub async fn item_count(&self) -> usize {
        let guard = self.state.lock().await;
        guard
            .items
            .values()
            .filter(|i| i.disposition.is_pending())
            .count()
    }
}

#[async_trait]
impl TicketService for MockTicketService {
    async fn get_ticket(&self, id: i64) -> Result<Ticket, ClientError> {
        let guard = self.state.lock().await;
        guard
            .tickets
            .get(&id)
            .cloned()
            .ok_or_else(|| rejected(ErrorCode::NotFound, format!("Ticket {} not found", id)))
    }

    async fn get_history(&self, id: i64) -> Result<Vec<StatusChange>, ClientError> {
        let mut guard = self.state.lock().await;
        guard.history_requests += 1;
        if !guard.tickets.contains_key(&id) {
            return Err(rejected(ErrorCode::NotFound, format!("Ticket {} not found", id)));
        }
        Ok(guard
            .history
            .iter()
            .filter(|c| c.ticket_id == id)
            .cloned()
            .collect())
    }

    async fn change_state(
        &self,
        id: i64,
        request: &StateChangeRequest,
    ) -> Result<Ticket, ClientError> {
        self.wait_if_stalled().await;
        let mut guard = self.state.lock().await;
        guard.state_change_requests += 1;

        let target: TicketState = request.new_state.parse().map_err(transition_rejected)?;
        let ticket = guard
            .tickets
            .get(&id)
            .ok_or_else(|| rejected(ErrorCode::NotFound, format!("Ticket {} not found", id)))?;

        let mut transition_request = TransitionRequest::new(target, "manager");
        if let Some(comment) = &request.comment {
            transition_request = transition_request.with_comment(comment.clone());
        }
        let transition = attempt_transition(ticket, transition_request, Utc::now())
            .map_err(transition_rejected)?;

        guard.tickets.insert(id, transition.ticket.clone());
        guard.push_change(transition.change);
        Ok(transition.ticket)
    }

    async fn list_queue(&self, limit: i64, offset: i64) -> Result<QueuePage, ClientError> {
        let guard = self.state.lock().await;
        // Newest first, like the service
        let pending: Vec<_> = guard
            .items
            .values()
            .rev()
            .filter(|i| i.disposition.is_pending())
            .cloned()
            .collect();
        let total = pending.len() as i64;
        let items = pending
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok(QueuePage {
            items,
            total,
            limit,
            offset,
        })
    }

    async fn get_queue_item(&self, id: i64) -> Result<StandbyQueueItem, ClientError> {
        let guard = self.state.lock().await;
        guard
            .items
            .get(&id)
            .filter(|i| i.disposition.is_pending())
            .cloned()
            .ok_or_else(|| rejected(ErrorCode::NotFound, format!("Queue item {} not found", id)))
    }

    async fn assign(&self, item_id: i64, board_id: i64) -> Result<Ticket, ClientError> {
        self.wait_if_stalled().await;
        let mut guard = self.state.lock().await;
        let item = guard
            .items
            .get(&item_id)
            .cloned()
            .ok_or(TriageError::NotFound(item_id))
            .map_err(triage_rejected)?;

        let mut board = fixtures::board(board_id);
        board.is_archived = guard.archived_boards.contains(&board_id);
        let draft = check_assign(&item, &board).map_err(triage_rejected)?;

        let now = Utc::now();
        let ticket = Ticket {
            id: guard.ticket_id(),
            uuid: Uuid::new_v4(),
            board_id: draft.board_id,
            title: draft.title,
            description: draft.description,
            state: TicketState::New,
            creator_email: draft.creator_email,
            source: draft.source,
            created_at: now,
            updated_at: now,
        };
        guard.tickets.insert(ticket.id, ticket.clone());
        if let Some(stored) = guard.items.get_mut(&item_id) {
            stored.disposition = ItemDisposition::Assigned {
                ticket_id: ticket.id,
            };
        }
        Ok(ticket)
    }

    async fn retry(&self, item_id: i64) -> Result<StandbyQueueItem, ClientError> {
        self.wait_if_stalled().await;
        let mut guard = self.state.lock().await;
        let item = guard
            .items
            .get(&item_id)
            .cloned()
            .ok_or(TriageError::NotFound(item_id))
            .map_err(triage_rejected)?;
        check_retry(&item).map_err(triage_rejected)?;

        let outcome = guard
            .retry_outcomes
            .pop_front()
            .unwrap_or(RetryOutcome::Synced);
        let updated = apply_retry_outcome(&item, outcome, Utc::now());
        guard.items.insert(item_id, updated.clone());
        Ok(updated)
    }

    async fn discard(&self, item_id: i64) -> Result<(), ClientError> {
        self.wait_if_stalled().await;
        let mut guard = self.state.lock().await;
        let item = guard
            .items
            .get_mut(&item_id)
            .ok_or(TriageError::NotFound(item_id))
            .map_err(triage_rejected)?;
        check_discard(item).map_err(triage_rejected)?;
        item.disposition = ItemDisposition::Discarded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_enforces_lifecycle() {
        let service = MockTicketService::new();
        service.insert_ticket(fixtures::ticket(1, TicketState::Closed)).await;

        let err = service
            .change_state(
                1,
                &StateChangeRequest {
                    new_state: "waiting".to_string(),
                    comment: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::IllegalTransition(_)));

        let err = service
            .change_state(
                1,
                &StateChangeRequest {
                    new_state: "archived".to_string(),
                    comment: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_mock_assign_to_archived_board() {
        let service = MockTicketService::new();
        service.insert_item(fixtures::queue_item(1, false)).await;
        service.archive_board(2).await;

        let err = service.assign(1, 2).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::BoardArchived));
        assert_eq!(service.item_count().await, 1);
        assert_eq!(service.ticket_count().await, 0);
    }

    #[tokio::test]
    async fn test_mock_retry_uses_scripted_outcome() {
        let service = MockTicketService::new();
        service.insert_item(fixtures::queue_item(1, true)).await;
        service.push_retry_outcome(RetryOutcome::StillFailing).await;

        let item = service.retry(1).await.unwrap();
        assert!(item.external_sync_failed);
        assert_eq!(item.retry_count, 1);

        let item = service.retry(1).await.unwrap();
        assert!(!item.external_sync_failed);
        assert_eq!(item.retry_count, 2);
    }
}
