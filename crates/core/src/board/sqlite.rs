//! SQLite-backed board store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::{
    Board, BoardError, BoardKeyword, BoardStore, CreateBoardRequest, CreateKeywordRequest,
    ExternalPlatform, UpdateBoardRequest,
};
use crate::db::{self, format_ts, parse_ts};

const BOARD_COLUMNS: &str =
    "id, name, unique_name, is_archived, external_platform, created_at, updated_at";

pub struct SqliteBoardStore {
    conn: Mutex<Connection>,
}

impl SqliteBoardStore {
    pub fn new(path: &Path) -> Result<Self, BoardError> {
        let conn = db::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, BoardError> {
        let conn = db::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS boards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                unique_name TEXT NOT NULL UNIQUE,
                is_archived INTEGER NOT NULL DEFAULT 0,
                external_platform TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS board_keywords (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                keyword TEXT NOT NULL COLLATE NOCASE UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_board_keywords_board ON board_keywords(board_id);
            "#,
        )
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, BoardError> {
        self.conn
            .lock()
            .map_err(|_| BoardError::Database("connection lock poisoned".to_string()))
    }

    fn load(conn: &Connection, id: i64) -> rusqlite::Result<Option<Board>> {
        conn.query_row(
            &format!("SELECT {} FROM boards WHERE id = ?", BOARD_COLUMNS),
            params![id],
            Self::row_to_board,
        )
        .optional()
    }

    fn row_to_board(row: &rusqlite::Row) -> rusqlite::Result<Board> {
        let platform_json: Option<String> = row.get(4)?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;

        let external_platform = platform_json
            .map(|json| serde_json::from_str::<ExternalPlatform>(&json))
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

        Ok(Board {
            id: row.get(0)?,
            name: row.get(1)?,
            unique_name: row.get(2)?,
            is_archived: row.get(3)?,
            external_platform,
            created_at: parse_ts(5, &created_at)?,
            updated_at: parse_ts(6, &updated_at)?,
        })
    }

    fn row_to_keyword(row: &rusqlite::Row) -> rusqlite::Result<BoardKeyword> {
        let created_at: String = row.get(3)?;
        Ok(BoardKeyword {
            id: row.get(0)?,
            board_id: row.get(1)?,
            keyword: row.get(2)?,
            created_at: parse_ts(3, &created_at)?,
        })
    }
}

fn platform_to_json(platform: Option<&ExternalPlatform>) -> Result<Option<String>, BoardError> {
    platform
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| BoardError::Invalid(e.to_string()))
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl BoardStore for SqliteBoardStore {
    fn create(&self, request: CreateBoardRequest) -> Result<Board, BoardError> {
        request.validate()?;

        let platform_json = platform_to_json(request.external_platform.as_ref())?;

        let now = db::now();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO boards (name, unique_name, is_archived, external_platform, created_at, updated_at) VALUES (?, ?, 0, ?, ?, ?)",
            params![
                request.name.trim(),
                request.unique_name,
                platform_json,
                format_ts(&now),
                format_ts(&now),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                BoardError::DuplicateName(request.unique_name.clone())
            } else {
                BoardError::from(e)
            }
        })?;

        let board = Board {
            id: conn.last_insert_rowid(),
            name: request.name.trim().to_string(),
            unique_name: request.unique_name,
            is_archived: false,
            external_platform: request.external_platform,
            created_at: now,
            updated_at: now,
        };

        info!(
            board_id = board.id,
            unique_name = %board.unique_name,
            platform = board.external_platform.as_ref().map(|p| p.name()).unwrap_or("none"),
            "Board created"
        );

        Ok(board)
    }

    fn get(&self, id: i64) -> Result<Option<Board>, BoardError> {
        let conn = self.conn()?;
        Ok(Self::load(&conn, id)?)
    }

    fn get_by_unique_name(&self, unique_name: &str) -> Result<Option<Board>, BoardError> {
        let conn = self.conn()?;
        let board = conn
            .query_row(
                &format!("SELECT {} FROM boards WHERE unique_name = ?", BOARD_COLUMNS),
                params![unique_name],
                Self::row_to_board,
            )
            .optional()?;
        Ok(board)
    }

    fn list(&self, include_archived: bool) -> Result<Vec<Board>, BoardError> {
        let conn = self.conn()?;
        let sql = if include_archived {
            format!("SELECT {} FROM boards ORDER BY name, id", BOARD_COLUMNS)
        } else {
            format!(
                "SELECT {} FROM boards WHERE is_archived = 0 ORDER BY name, id",
                BOARD_COLUMNS
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let boards = stmt
            .query_map([], Self::row_to_board)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(boards)
    }

    fn archive(&self, id: i64) -> Result<Board, BoardError> {
        let conn = self.conn()?;
        let mut board = Self::load(&conn, id)?.ok_or(BoardError::NotFound(id))?;
        if board.is_archived {
            return Ok(board);
        }

        let now = db::now().max(board.updated_at);
        conn.execute(
            "UPDATE boards SET is_archived = 1, updated_at = ? WHERE id = ?",
            params![format_ts(&now), id],
        )?;
        board.is_archived = true;
        board.updated_at = now;

        info!(board_id = id, "Board archived");
        Ok(board)
    }

    fn update(&self, id: i64, request: UpdateBoardRequest) -> Result<Board, BoardError> {
        let conn = self.conn()?;
        let current = Self::load(&conn, id)?.ok_or(BoardError::NotFound(id))?;
        let mut board = request.apply(&current)?;
        board.updated_at = db::now().max(current.updated_at);

        let platform_json = platform_to_json(board.external_platform.as_ref())?;
        conn.execute(
            "UPDATE boards SET name = ?, unique_name = ?, external_platform = ?, updated_at = ? WHERE id = ?",
            params![
                board.name,
                board.unique_name,
                platform_json,
                format_ts(&board.updated_at),
                id,
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                BoardError::DuplicateName(board.unique_name.clone())
            } else {
                BoardError::from(e)
            }
        })?;

        info!(
            board_id = id,
            unique_name = %board.unique_name,
            platform = board.external_platform.as_ref().map(|p| p.name()).unwrap_or("none"),
            "Board updated"
        );
        Ok(board)
    }

    fn delete(&self, id: i64) -> Result<(), BoardError> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM boards WHERE id = ?", params![id])?;
        if deleted == 0 {
            return Err(BoardError::NotFound(id));
        }
        info!(board_id = id, "Board deleted");
        Ok(())
    }

    fn keywords(&self, board_id: i64) -> Result<Vec<BoardKeyword>, BoardError> {
        let conn = self.conn()?;
        if Self::load(&conn, board_id)?.is_none() {
            return Err(BoardError::NotFound(board_id));
        }
        let mut stmt = conn.prepare(
            "SELECT id, board_id, keyword, created_at FROM board_keywords WHERE board_id = ? ORDER BY created_at DESC, id DESC",
        )?;
        let keywords = stmt
            .query_map(params![board_id], Self::row_to_keyword)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(keywords)
    }

    fn add_keyword(
        &self,
        board_id: i64,
        request: CreateKeywordRequest,
    ) -> Result<BoardKeyword, BoardError> {
        let keyword = request.normalized()?;
        let conn = self.conn()?;
        if Self::load(&conn, board_id)?.is_none() {
            return Err(BoardError::NotFound(board_id));
        }

        let owner: Option<i64> = conn
            .query_row(
                "SELECT board_id FROM board_keywords WHERE keyword = ?",
                params![keyword],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(owner) = owner {
            return Err(BoardError::DuplicateKeyword {
                keyword,
                board_id: owner,
            });
        }

        let now = db::now();
        conn.execute(
            "INSERT INTO board_keywords (board_id, keyword, created_at) VALUES (?, ?, ?)",
            params![board_id, keyword, format_ts(&now)],
        )?;

        let created = BoardKeyword {
            id: conn.last_insert_rowid(),
            board_id,
            keyword,
            created_at: now,
        };
        info!(board_id, keyword = %created.keyword, "Keyword added");
        Ok(created)
    }

    fn remove_keyword(&self, board_id: i64, keyword_id: i64) -> Result<(), BoardError> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM board_keywords WHERE id = ? AND board_id = ?",
            params![keyword_id, board_id],
        )?;
        if deleted == 0 {
            return Err(BoardError::KeywordNotFound(keyword_id));
        }
        info!(board_id, keyword_id, "Keyword removed");
        Ok(())
    }
}
