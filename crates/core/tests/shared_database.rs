//! Stores sharing one database file, the way the server runs them.

use std::sync::Arc;
use std::thread;

use tempfile::TempDir;

use ticketdesk_core::{
    BoardStore, CreateBoardRequest, FailureReason, NewQueueItem, QueueError, QueueFilter,
    QueueStore, SqliteBoardStore, SqliteQueueStore, SqliteTicketStore, TicketSource, TicketState,
    TicketStore, TriageError,
};

struct Harness {
    boards: SqliteBoardStore,
    queue: Arc<SqliteQueueStore>,
    tickets: SqliteTicketStore,
    _dir: TempDir,
}

fn harness() -> Harness {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("desk.db");
    Harness {
        boards: SqliteBoardStore::new(&path).unwrap(),
        queue: Arc::new(SqliteQueueStore::new(&path).unwrap()),
        tickets: SqliteTicketStore::new(&path).unwrap(),
        _dir: dir,
    }
}

fn enqueue(queue: &SqliteQueueStore, subject: &str) -> i64 {
    queue
        .enqueue(NewQueueItem {
            sender_email: "someone@example.com".to_string(),
            subject: subject.to_string(),
            body: "Details inside".to_string(),
            reason: FailureReason::NoKeywordMatch,
            original_board_id: None,
            external_sync_failed: false,
        })
        .unwrap()
        .id
}

#[test]
fn assigned_ticket_is_visible_to_the_ticket_store() {
    let h = harness();
    let board = h
        .boards
        .create(CreateBoardRequest {
            name: "IT".to_string(),
            unique_name: "it".to_string(),
            external_platform: None,
        })
        .unwrap();
    let item_id = enqueue(&h.queue, "Monitor flickers");

    let ticket = h.queue.assign(item_id, &board).unwrap();

    let stored = h.tickets.get(ticket.id).unwrap().unwrap();
    assert_eq!(stored.state, TicketState::New);
    assert_eq!(stored.source, TicketSource::Email);
    assert_eq!(stored.title, "Monitor flickers");
    assert_eq!(stored.board_id, board.id);
    assert!(h.tickets.history(ticket.id).unwrap().is_empty());
    assert_eq!(h.queue.count(&QueueFilter::new()).unwrap(), 0);
}

#[test]
fn concurrent_assigns_create_exactly_one_ticket() {
    let h = harness();
    let board = h
        .boards
        .create(CreateBoardRequest {
            name: "IT".to_string(),
            unique_name: "it".to_string(),
            external_platform: None,
        })
        .unwrap();
    let item_id = enqueue(&h.queue, "Keyboard missing keys");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let queue = Arc::clone(&h.queue);
            let board = board.clone();
            thread::spawn(move || queue.assign(item_id, &board))
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert!(matches!(
            result,
            Err(QueueError::Triage(TriageError::AlreadyAssigned { .. }))
        ));
    }

    let board_tickets = ticketdesk_core::TicketFilter::new().with_board(board.id);
    assert_eq!(h.tickets.count(&board_tickets).unwrap(), 1);
}
