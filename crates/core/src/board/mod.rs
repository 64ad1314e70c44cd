//! Boards: the containers tickets live on, optionally mirrored to an
//! external tracker.

mod sqlite;
mod types;

pub use sqlite::SqliteBoardStore;
pub use types::*;

/// Trait for board storage.
pub trait BoardStore: Send + Sync {
    /// Create a board. Fails with `DuplicateName` if the slug is taken.
    fn create(&self, request: CreateBoardRequest) -> Result<Board, BoardError>;

    /// Get a board by ID.
    fn get(&self, id: i64) -> Result<Option<Board>, BoardError>;

    /// Get a board by its slug.
    fn get_by_unique_name(&self, unique_name: &str) -> Result<Option<Board>, BoardError>;

    /// List boards ordered by name.
    fn list(&self, include_archived: bool) -> Result<Vec<Board>, BoardError>;

    /// Archive a board. Archiving twice is a no-op.
    fn archive(&self, id: i64) -> Result<Board, BoardError>;

    /// Apply a partial update, validated like a new board.
    fn update(&self, id: i64, request: UpdateBoardRequest) -> Result<Board, BoardError>;

    /// Delete a board together with its keywords. Callers check it has no tickets.
    fn delete(&self, id: i64) -> Result<(), BoardError>;

    /// Routing keywords of a board, newest first.
    fn keywords(&self, board_id: i64) -> Result<Vec<BoardKeyword>, BoardError>;

    /// Fails with `DuplicateKeyword` if any board already routes on it.
    fn add_keyword(
        &self,
        board_id: i64,
        request: CreateKeywordRequest,
    ) -> Result<BoardKeyword, BoardError>;

    fn remove_keyword(&self, board_id: i64, keyword_id: i64) -> Result<(), BoardError>;
}
