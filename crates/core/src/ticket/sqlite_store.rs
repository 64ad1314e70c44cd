//! SQLite-backed ticket store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    attempt_transition, CreateTicketRequest, StatusChange, Ticket, TicketError, TicketFilter,
    TicketSource, TicketState, TicketStore, Transition, TransitionRequest,
};
use crate::db::{self, format_ts, parse_enum, parse_ts};

const TICKET_COLUMNS: &str =
    "id, uuid, board_id, title, description, state, creator_email, source, created_at, updated_at";

/// SQLite-backed ticket store.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Create a new SQLite ticket store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TicketError> {
        let conn = db::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite ticket store (useful for testing).
    pub fn in_memory() -> Result<Self, TicketError> {
        let conn = db::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                board_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                state TEXT NOT NULL
                    CHECK (state IN ('new', 'in_progress', 'waiting', 'resolved', 'closed')),
                creator_email TEXT NOT NULL,
                source TEXT NOT NULL CHECK (source IN ('email', 'external', 'form')),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_board_state ON tickets(board_id, state);
            CREATE INDEX IF NOT EXISTS idx_tickets_board_created ON tickets(board_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_tickets_creator ON tickets(creator_email);

            CREATE TABLE IF NOT EXISTS ticket_status_changes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticket_id INTEGER NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
                previous_state TEXT NOT NULL,
                new_state TEXT NOT NULL,
                comment TEXT,
                changed_by TEXT NOT NULL,
                changed_at TEXT NOT NULL,
                CHECK (previous_state <> new_state)
            );

            CREATE INDEX IF NOT EXISTS idx_status_changes_ticket
                ON ticket_status_changes(ticket_id, changed_at);
            "#,
        )
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, TicketError> {
        self.conn
            .lock()
            .map_err(|_| TicketError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &TicketFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(board_id) = filter.board_id {
            conditions.push("board_id = ?".to_string());
            params.push(Box::new(board_id));
        }

        if !filter.states.is_empty() {
            let placeholders = vec!["?"; filter.states.len()].join(", ");
            conditions.push(format!("state IN ({})", placeholders));
            for state in &filter.states {
                params.push(Box::new(state.as_str()));
            }
        }

        if let Some(since) = &filter.created_since {
            conditions.push("created_at >= ?".to_string());
            params.push(Box::new(format_ts(since)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn load(conn: &Connection, id: i64) -> rusqlite::Result<Option<Ticket>> {
        conn.query_row(
            &format!("SELECT {} FROM tickets WHERE id = ?", TICKET_COLUMNS),
            params![id],
            Self::row_to_ticket,
        )
        .optional()
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let uuid_str: String = row.get(1)?;
        let state_str: String = row.get(5)?;
        let source_str: String = row.get(7)?;
        let created_at: String = row.get(8)?;
        let updated_at: String = row.get(9)?;

        let uuid = Uuid::parse_str(&uuid_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

        Ok(Ticket {
            id: row.get(0)?,
            uuid,
            board_id: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            state: parse_enum(5, &state_str, |s| s.parse::<TicketState>().ok())?,
            creator_email: row.get(6)?,
            source: parse_enum(7, &source_str, TicketSource::parse)?,
            created_at: parse_ts(8, &created_at)?,
            updated_at: parse_ts(9, &updated_at)?,
        })
    }

    fn row_to_change(row: &rusqlite::Row) -> rusqlite::Result<StatusChange> {
        let previous: String = row.get(2)?;
        let new: String = row.get(3)?;
        let changed_at: String = row.get(6)?;

        Ok(StatusChange {
            id: row.get(0)?,
            ticket_id: row.get(1)?,
            previous_state: parse_enum(2, &previous, |s| s.parse::<TicketState>().ok())?,
            new_state: parse_enum(3, &new, |s| s.parse::<TicketState>().ok())?,
            comment: row.get(4)?,
            changed_by: row.get(5)?,
            changed_at: parse_ts(6, &changed_at)?,
        })
    }
}

/// Insert a ticket in state `new`. Shared with the standby-queue store so that
/// assignment can create the ticket inside its own transaction.
pub(crate) fn insert_ticket(
    conn: &Connection,
    request: &CreateTicketRequest,
    now: DateTime<Utc>,
) -> rusqlite::Result<Ticket> {
    let uuid = Uuid::new_v4();
    let state = TicketState::New;

    conn.execute(
        "INSERT INTO tickets (uuid, board_id, title, description, state, creator_email, source, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            uuid.to_string(),
            request.board_id,
            request.title,
            request.description,
            state.as_str(),
            request.creator_email,
            request.source.as_str(),
            format_ts(&now),
            format_ts(&now),
        ],
    )?;

    Ok(Ticket {
        id: conn.last_insert_rowid(),
        uuid,
        board_id: request.board_id,
        title: request.title.clone(),
        description: request.description.clone(),
        state,
        creator_email: request.creator_email.clone(),
        source: request.source,
        created_at: now,
        updated_at: now,
    })
}

impl TicketStore for SqliteTicketStore {
    fn create(&self, request: CreateTicketRequest) -> Result<Ticket, TicketError> {
        request.validate()?;
        let conn = self.conn()?;
        let ticket = insert_ticket(&conn, &request, db::now())?;
        debug!(ticket_id = ticket.id, board_id = ticket.board_id, "Ticket created");
        Ok(ticket)
    }

    fn get(&self, id: i64) -> Result<Option<Ticket>, TicketError> {
        let conn = self.conn()?;
        Ok(Self::load(&conn, id)?)
    }

    fn get_by_uuid(&self, uuid: Uuid) -> Result<Option<Ticket>, TicketError> {
        let conn = self.conn()?;
        let ticket = conn
            .query_row(
                &format!("SELECT {} FROM tickets WHERE uuid = ?", TICKET_COLUMNS),
                params![uuid.to_string()],
                Self::row_to_ticket,
            )
            .optional()?;
        Ok(ticket)
    }

    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, TicketError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM tickets {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            TICKET_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql)?;

        let mut all_params = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let tickets = stmt
            .query_map(param_refs.as_slice(), Self::row_to_ticket)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(tickets)
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, TicketError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM tickets {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        Ok(conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?)
    }

    fn history(&self, ticket_id: i64) -> Result<Vec<StatusChange>, TicketError> {
        let conn = self.conn()?;

        if Self::load(&conn, ticket_id)?.is_none() {
            return Err(TicketError::NotFound(ticket_id));
        }

        let mut stmt = conn.prepare(
            "SELECT id, ticket_id, previous_state, new_state, comment, changed_by, changed_at FROM ticket_status_changes WHERE ticket_id = ? ORDER BY changed_at ASC, id ASC",
        )?;
        let changes = stmt
            .query_map(params![ticket_id], Self::row_to_change)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(changes)
    }

    fn transition(&self, id: i64, request: TransitionRequest) -> Result<Transition, TicketError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let ticket = Self::load(&tx, id)?.ok_or(TicketError::NotFound(id))?;
        let mut transition = attempt_transition(&ticket, request, db::now())?;

        tx.execute(
            "UPDATE tickets SET state = ?, updated_at = ? WHERE id = ?",
            params![
                transition.ticket.state.as_str(),
                format_ts(&transition.ticket.updated_at),
                id
            ],
        )?;

        let change = &transition.change;
        tx.execute(
            "INSERT INTO ticket_status_changes (ticket_id, previous_state, new_state, comment, changed_by, changed_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                change.ticket_id,
                change.previous_state.as_str(),
                change.new_state.as_str(),
                change.comment,
                change.changed_by,
                format_ts(&change.changed_at),
            ],
        )?;
        transition.change.id = tx.last_insert_rowid();

        tx.commit()?;

        info!(
            ticket_id = id,
            from = %transition.change.previous_state,
            to = %transition.change.new_state,
            changed_by = %transition.change.changed_by,
            "Ticket state changed"
        );

        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::{verify_history, TransitionError};

    fn request(board_id: i64, title: &str) -> CreateTicketRequest {
        CreateTicketRequest {
            board_id,
            title: title.to_string(),
            description: "Something is broken".to_string(),
            creator_email: "reporter@example.com".to_string(),
            source: TicketSource::Form,
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = SqliteTicketStore::in_memory().unwrap();
        let created = store.create(request(3, "Wifi is down")).unwrap();

        assert_eq!(created.state, TicketState::New);
        assert_eq!(created.board_id, 3);

        let fetched = store.get(created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = SqliteTicketStore::in_memory().unwrap();
        assert!(store.get(999).unwrap().is_none());
    }

    #[test]
    fn test_create_rejects_invalid_content() {
        let store = SqliteTicketStore::in_memory().unwrap();
        let mut bad = request(1, "ok");
        bad.creator_email = "nope".to_string();
        assert!(matches!(store.create(bad), Err(TicketError::Validation(_))));
    }

    #[test]
    fn test_transition_appends_history() {
        let store = SqliteTicketStore::in_memory().unwrap();
        let ticket = store.create(request(1, "Laptop broken")).unwrap();

        let t = store
            .transition(
                ticket.id,
                TransitionRequest::new(TicketState::InProgress, "alice")
                    .with_comment("starting work"),
            )
            .unwrap();
        assert_eq!(t.ticket.state, TicketState::InProgress);
        assert!(t.change.id > 0);

        store
            .transition(ticket.id, TransitionRequest::new(TicketState::Resolved, "alice"))
            .unwrap();

        let history = store.history(ticket.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].previous_state, TicketState::New);
        assert_eq!(history[0].comment.as_deref(), Some("starting work"));
        assert_eq!(history[1].new_state, TicketState::Resolved);
        verify_history(&history).unwrap();

        let stored = store.get(ticket.id).unwrap().unwrap();
        assert_eq!(stored.state, TicketState::Resolved);
        assert!(stored.updated_at >= ticket.updated_at);
    }

    #[test]
    fn test_illegal_transition_changes_nothing() {
        let store = SqliteTicketStore::in_memory().unwrap();
        let ticket = store.create(request(1, "Monitor flickers")).unwrap();

        let err = store
            .transition(ticket.id, TransitionRequest::new(TicketState::Resolved, "bob"))
            .unwrap_err();
        assert!(matches!(
            err,
            TicketError::Transition(TransitionError::IllegalTransition { .. })
        ));

        assert_eq!(store.get(ticket.id).unwrap().unwrap().state, TicketState::New);
        assert!(store.history(ticket.id).unwrap().is_empty());
    }

    #[test]
    fn test_transition_missing_ticket() {
        let store = SqliteTicketStore::in_memory().unwrap();
        let err = store
            .transition(42, TransitionRequest::new(TicketState::Closed, "bob"))
            .unwrap_err();
        assert!(matches!(err, TicketError::NotFound(42)));
    }

    #[test]
    fn test_list_filters_by_board_and_state() {
        let store = SqliteTicketStore::in_memory().unwrap();
        let a = store.create(request(1, "a")).unwrap();
        store.create(request(1, "b")).unwrap();
        store.create(request(2, "c")).unwrap();
        store
            .transition(a.id, TransitionRequest::new(TicketState::Waiting, "mgr"))
            .unwrap();

        let board_one = TicketFilter::new().with_board(1);
        assert_eq!(store.count(&board_one).unwrap(), 2);

        let waiting = TicketFilter::new()
            .with_board(1)
            .with_state(TicketState::Waiting);
        let tickets = store.list(&waiting).unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].id, a.id);

        let multi = TicketFilter::new()
            .with_state(TicketState::Waiting)
            .with_state(TicketState::New);
        assert_eq!(store.count(&multi).unwrap(), 3);

        let page = store.list(&TicketFilter::new().with_limit(1).with_offset(1)).unwrap();
        assert_eq!(page.len(), 1);
    }

    #[test]
    fn test_history_of_missing_ticket() {
        let store = SqliteTicketStore::in_memory().unwrap();
        assert!(matches!(store.history(5), Err(TicketError::NotFound(5))));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.db");

        let id = {
            let store = SqliteTicketStore::new(&path).unwrap();
            store.create(request(1, "persist me")).unwrap().id
        };

        let store = SqliteTicketStore::new(&path).unwrap();
        assert_eq!(store.get(id).unwrap().unwrap().title, "persist me");
    }

    #[test]
    fn test_default_filter_returns_tickets() {
        let store = SqliteTicketStore::in_memory().unwrap();
        store.create(request(1, "first")).unwrap();
        store.create(request(2, "second")).unwrap();

        let tickets = store.list(&TicketFilter::default()).unwrap();
        assert_eq!(tickets.len(), 2);
        assert_eq!(TicketFilter::default().limit, TicketFilter::new().limit);
    }

    #[test]
    fn test_get_by_uuid() {
        let store = SqliteTicketStore::in_memory().unwrap();
        let ticket = store.create(request(1, "Lost badge")).unwrap();

        assert_eq!(store.get_by_uuid(ticket.uuid).unwrap(), Some(ticket));
        assert!(store.get_by_uuid(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_created_since_filter() {
        let store = SqliteTicketStore::in_memory().unwrap();
        let old = store.create(request(1, "old")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let cutoff = db::now();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let recent = store.create(request(1, "recent")).unwrap();

        let since = TicketFilter::new().with_created_since(cutoff);
        let tickets = store.list(&since).unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].id, recent.id);
        assert_eq!(store.count(&since).unwrap(), 1);

        let everything = TicketFilter::new().with_created_since(old.created_at);
        assert_eq!(store.count(&everything).unwrap(), 2);
    }
}
