//! End-to-end: the HTTP client and session against a live server.

mod common;

use common::TestFixture;
use ticketdesk_core::{
    ClientConfig, ClientError, DetailView, ErrorCode, HttpServiceClient, Session, SyncError,
    TicketService, TicketSource, TicketState, TriageAction,
};
use tokio_test::{assert_err, assert_ok};

async fn session_for(fixture: &TestFixture) -> (Session<HttpServiceClient>, String) {
    let (base_url, _handle) = fixture.spawn().await;
    let client = HttpServiceClient::new(&ClientConfig {
        base_url: base_url.clone(),
        read_retries: 0,
        ..ClientConfig::default()
    })
    .expect("Failed to build client");
    (Session::new(client), base_url)
}

#[tokio::test]
async fn test_skipping_states_is_rejected_before_sending() {
    let fixture = TestFixture::new().await;
    let board_id = fixture.create_board("support").await;
    let ticket_id = fixture.create_ticket(board_id, "Password reset").await;
    let (mut session, _) = session_for(&fixture).await;

    let view = session.open_ticket(ticket_id).await.unwrap();
    assert_eq!(view.state(), Some(TicketState::New));

    let view = session
        .transition(TicketState::Resolved, None)
        .await
        .unwrap();
    let failure = view.transition.failure().unwrap();
    assert_eq!(failure.code, Some(ErrorCode::IllegalTransition));
    assert!(!failure.reconciled);
    assert_eq!(view.state(), Some(TicketState::New));

    // Nothing reached the server
    let history = session.service().get_history(ticket_id).await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_transition_with_comment_shows_in_history() {
    let fixture = TestFixture::new().await;
    let board_id = fixture.create_board("support").await;
    let ticket_id = fixture.create_ticket(board_id, "Password reset").await;
    let (mut session, _) = session_for(&fixture).await;

    session.open_ticket(ticket_id).await;
    let view = session
        .transition(TicketState::InProgress, Some("starting work".to_string()))
        .await
        .unwrap();

    assert_eq!(view.transition.confirmed(), Some(&TicketState::InProgress));
    assert_eq!(view.state(), Some(TicketState::InProgress));
    assert!(!view.history_stale);
    assert_eq!(view.history.len(), 1);
    assert_eq!(view.history[0].previous_state, TicketState::New);
    assert_eq!(view.history[0].new_state, TicketState::InProgress);
    assert_eq!(view.history[0].comment.as_deref(), Some("starting work"));
}

#[tokio::test]
async fn test_stale_transition_is_reconciled() {
    let fixture = TestFixture::new().await;
    let board_id = fixture.create_board("support").await;
    let ticket_id = fixture.create_ticket(board_id, "Password reset").await;
    let (mut first, _) = session_for(&fixture).await;
    let (mut second, _) = session_for(&fixture).await;

    first.open_ticket(ticket_id).await;
    second.open_ticket(ticket_id).await;

    assert_ok!(first.transition(TicketState::Closed, None).await);

    // The second session still believes the ticket is new
    let view = second
        .transition(TicketState::Waiting, None)
        .await
        .unwrap();
    let failure = view.transition.failure().unwrap();
    assert_eq!(failure.code, Some(ErrorCode::IllegalTransition));
    assert!(failure.reconciled);
    assert_eq!(view.state(), Some(TicketState::Closed));
    assert_eq!(view.history.len(), 1);
}

#[tokio::test]
async fn test_retry_failed_item_through_session() {
    let fixture = TestFixture::new().await;
    let board_id = fixture.create_trello_board("ops").await;
    let item_id = fixture.enqueue("Server down", Some(board_id)).await;
    let (mut session, _) = session_for(&fixture).await;

    session.refresh_queue(0).await;
    assert_eq!(
        session.queue().actions_for(item_id),
        vec![
            TriageAction::Assign,
            TriageAction::Retry,
            TriageAction::Discard
        ]
    );

    fixture.sync.fail_next(SyncError::Timeout).await;
    let item = session.retry(item_id).await.unwrap();
    assert!(item.external_sync_failed);
    assert_eq!(item.retry_count, 1);

    let item = session.retry(item_id).await.unwrap();
    assert!(!item.external_sync_failed);
    assert_eq!(item.retry_count, 2);

    let listed = session.queue().find(item_id).unwrap();
    assert_eq!(listed.retry_count, 2);
    assert!(session
        .queue()
        .triage
        .as_ref()
        .unwrap()
        .state
        .confirmed()
        .is_some());
    assert_eq!(fixture.sync.calls().await.len(), 2);
}

#[tokio::test]
async fn test_retry_without_failure_reports_no_retry_needed() {
    let fixture = TestFixture::new().await;
    let item_id = fixture.enqueue("General question", None).await;
    let (mut session, _) = session_for(&fixture).await;

    let direct = session.service().retry(item_id).await.unwrap_err();
    assert!(matches!(direct, ClientError::NoRetryNeeded(_)));

    session.refresh_queue(0).await;
    assert!(session.retry(item_id).await.is_none());

    let triage = session.queue().triage.as_ref().unwrap();
    assert_eq!(triage.action, TriageAction::Retry);
    let failure = triage.state.failure().unwrap();
    assert_eq!(failure.code, Some(ErrorCode::NoRetryNeeded));
    assert!(failure.reconciled);

    // Still pending and unchanged
    let item = session.queue().find(item_id).unwrap();
    assert_eq!(item.retry_count, 0);
}

#[tokio::test]
async fn test_assign_removes_item_from_queue() {
    let fixture = TestFixture::new().await;
    let board_id = fixture.create_board("support").await;
    let item_id = fixture.enqueue("Cannot print", None).await;
    let other_id = fixture.enqueue("Cannot scan", None).await;
    let (mut session, _) = session_for(&fixture).await;

    session.refresh_queue(0).await;
    session.open_item(item_id).await;
    assert_eq!(session.queue().total, 2);

    let ticket = session.assign(item_id, board_id).await.unwrap();
    assert_eq!(ticket.board_id, board_id);
    assert_eq!(ticket.source, TicketSource::Email);
    assert_eq!(ticket.state, TicketState::New);
    assert_eq!(ticket.title, "Cannot print");

    assert!(session.queue().find(item_id).is_none());
    assert_eq!(
        session.queue().detail,
        DetailView::Unavailable { item_id }
    );

    let queue = session.refresh_queue(0).await;
    let ids: Vec<i64> = queue.items.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![other_id]);
    assert_eq!(queue.total, 1);
}

#[tokio::test]
async fn test_double_assign_is_reconciled() {
    let fixture = TestFixture::new().await;
    let board_id = fixture.create_board("support").await;
    let item_id = fixture.enqueue("Cannot print", None).await;
    let (mut first, _) = session_for(&fixture).await;
    let (mut second, _) = session_for(&fixture).await;

    first.refresh_queue(0).await;
    second.refresh_queue(0).await;

    assert!(first.assign(item_id, board_id).await.is_some());
    assert!(second.assign(item_id, board_id).await.is_none());

    let triage = second.queue().triage.as_ref().unwrap();
    let failure = triage.state.failure().unwrap();
    assert_eq!(failure.code, Some(ErrorCode::AlreadyAssigned));
    assert!(failure.reconciled);
    assert!(second.queue().find(item_id).is_none());

    let direct = second.service().assign(item_id, board_id).await.unwrap_err();
    assert!(matches!(direct, ClientError::AlreadyAssigned(_)));
}

#[tokio::test]
async fn test_discard_needs_confirmation() {
    let fixture = TestFixture::new().await;
    let item_id = fixture.enqueue("Newsletter", None).await;
    let (mut session, _) = session_for(&fixture).await;

    // Not in the snapshot yet
    assert_err!(session.propose_discard(item_id));

    session.refresh_queue(0).await;
    assert_ok!(session.propose_discard(item_id));
    session.cancel_discard();
    assert!(session.pending_discard().is_none());

    // Cancelled: still there
    let queue = session.refresh_queue(0).await;
    assert_eq!(queue.total, 1);

    assert_ok!(session.propose_discard(item_id));
    assert!(assert_ok!(session.confirm_discard().await));
    assert!(session.queue().find(item_id).is_none());

    let gone = session.service().get_queue_item(item_id).await.unwrap_err();
    assert!(matches!(gone, ClientError::NotFound(_)));
}
