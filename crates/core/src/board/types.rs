//! Types for boards.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorCode;

static UNIQUE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("slug pattern is valid"));

/// Placeholder shown instead of stored credentials.
pub const REDACTED: &str = "********";

/// External tracker a board mirrors its tickets to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "platform", rename_all = "snake_case")]
pub enum ExternalPlatform {
    Jira {
        /// Jira site, e.g. `https://example.atlassian.net`.
        base_url: String,
        project_key: String,
        /// Account used for basic auth.
        email: String,
        api_token: String,
    },
    Trello {
        api_key: String,
        token: String,
        /// List new cards are created in.
        list_id: String,
    },
}

impl ExternalPlatform {
    /// Platform name as stored and reported.
    pub fn name(&self) -> &'static str {
        match self {
            ExternalPlatform::Jira { .. } => "jira",
            ExternalPlatform::Trello { .. } => "trello",
        }
    }

    /// Copy with credentials replaced by [`REDACTED`].
    pub fn redacted(&self) -> Self {
        match self {
            ExternalPlatform::Jira {
                base_url,
                project_key,
                email,
                ..
            } => ExternalPlatform::Jira {
                base_url: base_url.clone(),
                project_key: project_key.clone(),
                email: email.clone(),
                api_token: REDACTED.to_string(),
            },
            ExternalPlatform::Trello { list_id, .. } => ExternalPlatform::Trello {
                api_key: REDACTED.to_string(),
                token: REDACTED.to_string(),
                list_id: list_id.clone(),
            },
        }
    }

    fn validate(&self) -> Result<(), BoardError> {
        let missing = |field: &str| BoardError::Invalid(format!("{} must not be empty", field));
        match self {
            ExternalPlatform::Jira {
                base_url,
                project_key,
                email,
                api_token,
            } => {
                if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                    return Err(BoardError::Invalid(format!(
                        "Jira base_url must be an http(s) URL, got '{}'",
                        base_url
                    )));
                }
                if project_key.trim().is_empty() {
                    return Err(missing("project_key"));
                }
                if email.trim().is_empty() {
                    return Err(missing("email"));
                }
                if api_token.is_empty() {
                    return Err(missing("api_token"));
                }
            }
            ExternalPlatform::Trello {
                api_key,
                token,
                list_id,
            } => {
                if api_key.is_empty() {
                    return Err(missing("api_key"));
                }
                if token.is_empty() {
                    return Err(missing("token"));
                }
                if list_id.trim().is_empty() {
                    return Err(missing("list_id"));
                }
            }
        }
        Ok(())
    }
}

/// A board groups tickets for one team or topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: i64,
    /// Display name.
    pub name: String,
    /// URL slug, unique across boards.
    pub unique_name: String,
    /// Archived boards accept no new tickets.
    pub is_archived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_platform: Option<ExternalPlatform>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    /// Copy safe to return over the API.
    pub fn redacted(&self) -> Self {
        Self {
            external_platform: self.external_platform.as_ref().map(|p| p.redacted()),
            ..self.clone()
        }
    }
}

/// Request to create a board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBoardRequest {
    pub name: String,
    pub unique_name: String,
    #[serde(default)]
    pub external_platform: Option<ExternalPlatform>,
}

impl CreateBoardRequest {
    pub fn validate(&self) -> Result<(), BoardError> {
        let name_len = self.name.trim().chars().count();
        if name_len == 0 || name_len > 255 {
            return Err(BoardError::Invalid(
                "name must be between 1 and 255 characters".to_string(),
            ));
        }
        if self.unique_name.len() > 100 || !UNIQUE_NAME_RE.is_match(&self.unique_name) {
            return Err(BoardError::Invalid(format!(
                "unique_name '{}' must be a lowercase slug (a-z, 0-9, '-')",
                self.unique_name
            )));
        }
        if let Some(platform) = &self.external_platform {
            platform.validate()?;
        }
        Ok(())
    }
}

/// Partial update of a board; absent fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBoardRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unique_name: Option<String>,
    /// New platform settings, replacing the stored ones.
    #[serde(default)]
    pub external_platform: Option<ExternalPlatform>,
    /// Stop mirroring to any platform.
    #[serde(default)]
    pub remove_external_platform: bool,
}

impl UpdateBoardRequest {
    /// Apply the update to `board`, validating the result like a new board.
    pub fn apply(&self, board: &Board) -> Result<Board, BoardError> {
        if self.external_platform.is_some() && self.remove_external_platform {
            return Err(BoardError::Invalid(
                "external_platform and remove_external_platform are exclusive".to_string(),
            ));
        }

        let mut updated = board.clone();
        if let Some(name) = &self.name {
            updated.name = name.trim().to_string();
        }
        if let Some(unique_name) = &self.unique_name {
            updated.unique_name = unique_name.clone();
        }
        if self.remove_external_platform {
            updated.external_platform = None;
        } else if let Some(platform) = &self.external_platform {
            updated.external_platform = Some(platform.clone());
        }

        CreateBoardRequest {
            name: updated.name.clone(),
            unique_name: updated.unique_name.clone(),
            external_platform: updated.external_platform.clone(),
        }
        .validate()?;
        Ok(updated)
    }
}

/// Longest routing keyword accepted.
pub const MAX_KEYWORD_LEN: usize = 255;

/// Subject keyword routing inbound mail to a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardKeyword {
    pub id: i64,
    pub board_id: i64,
    pub keyword: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateKeywordRequest {
    pub keyword: String,
}

impl CreateKeywordRequest {
    /// The keyword as stored: trimmed, 1 to [`MAX_KEYWORD_LEN`] characters.
    pub fn normalized(&self) -> Result<String, BoardError> {
        let keyword = self.keyword.trim();
        let len = keyword.chars().count();
        if len == 0 || len > MAX_KEYWORD_LEN {
            return Err(BoardError::Invalid(format!(
                "keyword must be between 1 and {} characters",
                MAX_KEYWORD_LEN
            )));
        }
        Ok(keyword.to_string())
    }
}

/// Errors for board operations.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Board not found: {0}")]
    NotFound(i64),

    #[error("Board name already taken: {0}")]
    DuplicateName(String),

    #[error("Invalid board: {0}")]
    Invalid(String),

    /// Keywords are unique across boards, ignoring case.
    #[error("Keyword '{keyword}' is already assigned to board {board_id}")]
    DuplicateKeyword { keyword: String, board_id: i64 },

    #[error("Keyword not found: {0}")]
    KeywordNotFound(i64),

    #[error("Board {0} still has tickets; archive it instead")]
    HasTickets(i64),

    #[error("Database error: {0}")]
    Database(String),
}

impl BoardError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BoardError::NotFound(_) | BoardError::KeywordNotFound(_) => ErrorCode::NotFound,
            BoardError::DuplicateName(_)
            | BoardError::Invalid(_)
            | BoardError::DuplicateKeyword { .. }
            | BoardError::HasTickets(_) => ErrorCode::ValidationError,
            BoardError::Database(_) => ErrorCode::InternalError,
        }
    }
}

impl From<rusqlite::Error> for BoardError {
    fn from(e: rusqlite::Error) -> Self {
        BoardError::Database(e.to_string())
    }
}
