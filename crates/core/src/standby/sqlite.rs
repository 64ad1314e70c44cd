//! SQLite-backed standby queue.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    apply_retry_outcome, check_assign, check_discard, check_retry, item_title, FailureReason,
    ItemDisposition, NewQueueItem, QueueError, QueueFilter, QueueStore, RetryOutcome,
    RetryRecord, StandbyQueueItem, TriageError,
};
use crate::board::Board;
use crate::db::{self, format_ts, parse_enum, parse_ts};
use crate::sync::{ExternalTicket, ExternalTicketRef};
use crate::ticket::{insert_ticket, SqliteTicketStore, Ticket};

const ITEM_COLUMNS: &str = "id, sender_email, subject, body, reason, original_board_id, external_sync_failed, retry_count, status, ticket_id, received_at, updated_at";

const EXTERNAL_COLUMNS: &str = "id, uuid, board_id, item_id, title, creator_email, platform, external_id, external_url, created_at";

/// SQLite-backed standby queue.
///
/// Shares its database file with the ticket store: assignment writes the
/// new ticket and the item's disposition in one transaction.
pub struct SqliteQueueStore {
    conn: Mutex<Connection>,
}

impl SqliteQueueStore {
    pub fn new(path: &Path) -> Result<Self, QueueError> {
        let conn = db::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, QueueError> {
        let conn = db::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
        SqliteTicketStore::initialize_schema(conn)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS standby_queue_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sender_email TEXT NOT NULL,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                reason TEXT NOT NULL,
                original_board_id INTEGER,
                external_sync_failed INTEGER NOT NULL DEFAULT 0,
                retry_count INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'assigned', 'discarded')),
                ticket_id INTEGER,
                received_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK ((status = 'assigned') = (ticket_id IS NOT NULL))
            );

            CREATE INDEX IF NOT EXISTS idx_queue_status_received
                ON standby_queue_items(status, received_at);

            CREATE TABLE IF NOT EXISTS external_tickets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL UNIQUE,
                board_id INTEGER NOT NULL,
                item_id INTEGER NOT NULL REFERENCES standby_queue_items(id),
                title TEXT NOT NULL,
                creator_email TEXT NOT NULL,
                platform TEXT NOT NULL CHECK (platform IN ('jira', 'trello')),
                external_id TEXT NOT NULL,
                external_url TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_external_tickets_board
                ON external_tickets(board_id, created_at);
            "#,
        )
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, QueueError> {
        self.conn
            .lock()
            .map_err(|_| QueueError::Database("connection lock poisoned".to_string()))
    }

    /// Load an item whatever its disposition.
    fn load(conn: &Connection, id: i64) -> rusqlite::Result<Option<StandbyQueueItem>> {
        conn.query_row(
            &format!(
                "SELECT {} FROM standby_queue_items WHERE id = ?",
                ITEM_COLUMNS
            ),
            params![id],
            Self::row_to_item,
        )
        .optional()
    }

    /// Write the issue the platform created for `item`.
    fn insert_external(
        conn: &Connection,
        item: &StandbyQueueItem,
        board_id: i64,
        reference: &ExternalTicketRef,
        now: DateTime<Utc>,
    ) -> rusqlite::Result<ExternalTicket> {
        let uuid = Uuid::new_v4();
        let title = item_title(item);
        conn.execute(
            "INSERT INTO external_tickets (uuid, board_id, item_id, title, creator_email, platform, external_id, external_url, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                uuid.to_string(),
                board_id,
                item.id,
                title,
                item.sender_email,
                reference.platform,
                reference.external_id,
                reference.external_url,
                format_ts(&now),
            ],
        )?;

        Ok(ExternalTicket {
            id: conn.last_insert_rowid(),
            uuid,
            board_id,
            item_id: item.id,
            title,
            creator_email: item.sender_email.clone(),
            reference: reference.clone(),
            created_at: now,
        })
    }

    fn row_to_external(row: &rusqlite::Row) -> rusqlite::Result<ExternalTicket> {
        let uuid: String = row.get(1)?;
        let created_at: String = row.get(9)?;

        Ok(ExternalTicket {
            id: row.get(0)?,
            uuid: Uuid::parse_str(&uuid)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?,
            board_id: row.get(2)?,
            item_id: row.get(3)?,
            title: row.get(4)?,
            creator_email: row.get(5)?,
            reference: ExternalTicketRef {
                platform: row.get(6)?,
                external_id: row.get(7)?,
                external_url: row.get(8)?,
            },
            created_at: parse_ts(9, &created_at)?,
        })
    }

    fn build_where_clause(filter: &QueueFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = vec!["status = 'pending'".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(failed) = filter.sync_failed {
            conditions.push("external_sync_failed = ?".to_string());
            params.push(Box::new(failed));
        }

        (format!("WHERE {}", conditions.join(" AND ")), params)
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<StandbyQueueItem> {
        let reason: String = row.get(4)?;
        let status: String = row.get(8)?;
        let ticket_id: Option<i64> = row.get(9)?;
        let received_at: String = row.get(10)?;
        let updated_at: String = row.get(11)?;

        let disposition = parse_enum(8, &status, |s| match (s, ticket_id) {
            ("pending", _) => Some(ItemDisposition::Pending),
            ("assigned", Some(ticket_id)) => Some(ItemDisposition::Assigned { ticket_id }),
            ("discarded", _) => Some(ItemDisposition::Discarded),
            _ => None,
        })?;

        Ok(StandbyQueueItem {
            id: row.get(0)?,
            sender_email: row.get(1)?,
            subject: row.get(2)?,
            body: row.get(3)?,
            reason: parse_enum(4, &reason, FailureReason::parse)?,
            original_board_id: row.get(5)?,
            external_sync_failed: row.get(6)?,
            retry_count: row.get(7)?,
            disposition,
            received_at: parse_ts(10, &received_at)?,
            updated_at: parse_ts(11, &updated_at)?,
        })
    }
}

impl QueueStore for SqliteQueueStore {
    fn enqueue(&self, item: NewQueueItem) -> Result<StandbyQueueItem, QueueError> {
        item.validate()?;

        let now = db::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO standby_queue_items (sender_email, subject, body, reason, original_board_id, external_sync_failed, retry_count, status, received_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, 0, 'pending', ?, ?)",
            params![
                item.sender_email,
                item.subject,
                item.body,
                item.reason.as_str(),
                item.original_board_id,
                item.external_sync_failed,
                format_ts(&now),
                format_ts(&now),
            ],
        )?;

        let stored = StandbyQueueItem {
            id: conn.last_insert_rowid(),
            sender_email: item.sender_email,
            subject: item.subject,
            body: item.body,
            reason: item.reason,
            original_board_id: item.original_board_id,
            external_sync_failed: item.external_sync_failed,
            retry_count: 0,
            disposition: ItemDisposition::Pending,
            received_at: now,
            updated_at: now,
        };

        info!(
            item_id = stored.id,
            reason = stored.reason.as_str(),
            sync_failed = stored.external_sync_failed,
            "Queue item enqueued"
        );
        Ok(stored)
    }

    fn get(&self, id: i64) -> Result<Option<StandbyQueueItem>, QueueError> {
        let conn = self.conn()?;
        Ok(Self::load(&conn, id)?.filter(|item| item.disposition.is_pending()))
    }

    fn get_any(&self, id: i64) -> Result<Option<StandbyQueueItem>, QueueError> {
        let conn = self.conn()?;
        Ok(Self::load(&conn, id)?)
    }

    fn list(&self, filter: &QueueFilter) -> Result<Vec<StandbyQueueItem>, QueueError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM standby_queue_items {} ORDER BY received_at DESC, id DESC LIMIT ? OFFSET ?",
            ITEM_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql)?;

        let mut all_params = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let items = stmt
            .query_map(param_refs.as_slice(), Self::row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn count(&self, filter: &QueueFilter) -> Result<i64, QueueError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM standby_queue_items {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        Ok(conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?)
    }

    fn assign(&self, id: i64, board: &Board) -> Result<Ticket, QueueError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Precondition is checked inside the transaction so a racing second
        // assign sees the first one's disposition.
        let item = Self::load(&tx, id)?.ok_or(TriageError::NotFound(id))?;
        let draft = check_assign(&item, board)?;
        draft.validate()?;

        let now = db::now();
        let ticket = insert_ticket(&tx, &draft, now)?;
        tx.execute(
            "UPDATE standby_queue_items SET status = 'assigned', ticket_id = ?, updated_at = ? WHERE id = ? AND status = 'pending'",
            params![ticket.id, format_ts(&now.max(item.updated_at)), id],
        )?;
        tx.commit()?;

        info!(
            item_id = id,
            board_id = board.id,
            ticket_id = ticket.id,
            "Queue item assigned"
        );
        Ok(ticket)
    }

    fn record_retry(
        &self,
        id: i64,
        outcome: RetryOutcome,
        external: Option<&ExternalTicketRef>,
    ) -> Result<RetryRecord, QueueError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = db::now();

        let item = Self::load(&tx, id)?.ok_or(TriageError::NotFound(id))?;

        // The platform already holds the issue: keep the reference even if
        // the item was assigned or discarded during the call.
        let stored = match (external, item.original_board_id) {
            (Some(reference), Some(board_id)) => {
                Some(Self::insert_external(&tx, &item, board_id, reference, now)?)
            }
            _ => None,
        };

        if let Err(e) = check_retry(&item) {
            if let Some(orphan) = &stored {
                tx.commit()?;
                warn!(
                    item_id = id,
                    external_id = %orphan.reference.external_id,
                    error = %e,
                    "Item left the queue during sync; external ticket kept"
                );
            }
            return Err(e.into());
        }

        let updated = apply_retry_outcome(&item, outcome, now);
        tx.execute(
            "UPDATE standby_queue_items SET external_sync_failed = ?, retry_count = ?, updated_at = ? WHERE id = ?",
            params![
                updated.external_sync_failed,
                updated.retry_count,
                format_ts(&updated.updated_at),
                id
            ],
        )?;
        tx.commit()?;

        debug!(
            item_id = id,
            retry_count = updated.retry_count,
            sync_failed = updated.external_sync_failed,
            "Retry outcome recorded"
        );
        Ok(RetryRecord {
            item: updated,
            external: stored,
        })
    }

    fn external_tickets(&self, board_id: i64) -> Result<Vec<ExternalTicket>, QueueError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM external_tickets WHERE board_id = ? ORDER BY created_at DESC, id DESC",
            EXTERNAL_COLUMNS
        ))?;
        let tickets = stmt
            .query_map(params![board_id], Self::row_to_external)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tickets)
    }

    fn find_external_ticket(&self, uuid: Uuid) -> Result<Option<ExternalTicket>, QueueError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {} FROM external_tickets WHERE uuid = ?",
                    EXTERNAL_COLUMNS
                ),
                params![uuid.to_string()],
                Self::row_to_external,
            )
            .optional()?)
    }

    fn discard(&self, id: i64) -> Result<(), QueueError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let item = Self::load(&tx, id)?.ok_or(TriageError::NotFound(id))?;
        check_discard(&item)?;

        tx.execute(
            "UPDATE standby_queue_items SET status = 'discarded', updated_at = ? WHERE id = ?",
            params![format_ts(&db::now().max(item.updated_at)), id],
        )?;
        tx.commit()?;

        info!(item_id = id, "Queue item discarded");
        Ok(())
    }
}
