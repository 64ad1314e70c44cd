//! Core ticket data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TransitionError;

/// Ticket lifecycle state.
///
/// State machine (no self-loops, no absolute sink):
/// ```text
/// new          -> in_progress, waiting, closed
/// in_progress  -> waiting, resolved, closed
/// waiting      -> in_progress, resolved, closed
/// resolved     -> in_progress, closed
/// closed       -> in_progress
/// ```
///
/// Reopening a closed ticket always restarts active work: there is no edge
/// from `closed` back to `waiting` or `resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    New,
    InProgress,
    Waiting,
    Resolved,
    Closed,
}

impl TicketState {
    /// Every state, in lifecycle order.
    pub const ALL: [TicketState; 5] = [
        TicketState::New,
        TicketState::InProgress,
        TicketState::Waiting,
        TicketState::Resolved,
        TicketState::Closed,
    ];

    /// The adjacency table. Every call site that needs to know whether a
    /// transition is legal goes through here.
    pub fn valid_transitions(&self) -> &'static [TicketState] {
        use TicketState::*;
        match self {
            New => &[InProgress, Waiting, Closed],
            InProgress => &[Waiting, Resolved, Closed],
            Waiting => &[InProgress, Resolved, Closed],
            Resolved => &[InProgress, Closed],
            Closed => &[InProgress],
        }
    }

    /// Returns true if `target` is reachable in one step.
    pub fn can_transition_to(&self, target: TicketState) -> bool {
        self.valid_transitions().contains(&target)
    }

    /// Returns the state as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketState::New => "new",
            TicketState::InProgress => "in_progress",
            TicketState::Waiting => "waiting",
            TicketState::Resolved => "resolved",
            TicketState::Closed => "closed",
        }
    }

    /// Display category used when rendering the state (badges, timeline dots).
    pub fn category(&self) -> StateCategory {
        match self {
            TicketState::New => StateCategory::Info,
            TicketState::InProgress => StateCategory::Primary,
            TicketState::Waiting => StateCategory::Warning,
            TicketState::Resolved => StateCategory::Success,
            TicketState::Closed => StateCategory::Neutral,
        }
    }

    /// Returns true for states where nobody is actively working the ticket.
    pub fn is_settled(&self) -> bool {
        matches!(self, TicketState::Resolved | TicketState::Closed)
    }
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketState {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| TransitionError::InvalidState(s.to_string()))
    }
}

/// Semantic display category of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCategory {
    Info,
    Primary,
    Warning,
    Success,
    Neutral,
}

impl StateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateCategory::Info => "info",
            StateCategory::Primary => "primary",
            StateCategory::Warning => "warning",
            StateCategory::Success => "success",
            StateCategory::Neutral => "neutral",
        }
    }
}

/// Where a ticket came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketSource {
    /// Created from an inbound email (routed or assigned from the standby queue).
    Email,
    /// Mirrored from an external platform.
    External,
    /// Submitted through a board's public form.
    Form,
}

impl TicketSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketSource::Email => "email",
            TicketSource::External => "external",
            TicketSource::Form => "form",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(TicketSource::Email),
            "external" => Some(TicketSource::External),
            "form" => Some(TicketSource::Form),
            _ => None,
        }
    }
}

/// A ticket on a board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    /// Server-assigned identifier.
    pub id: i64,

    /// Public identifier, unique across all boards.
    pub uuid: Uuid,

    /// Owning board. Never changes.
    pub board_id: i64,

    pub title: String,

    pub description: String,

    /// Current state.
    pub state: TicketState,

    /// Address of whoever reported the ticket.
    pub creator_email: String,

    pub source: TicketSource,

    pub created_at: DateTime<Utc>,

    /// Last update timestamp. Never moves backwards.
    pub updated_at: DateTime<Utc>,
}

/// One recorded state transition. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusChange {
    pub id: i64,
    pub ticket_id: i64,
    pub previous_state: TicketState,
    pub new_state: TicketState,
    /// Free text supplied by the manager at transition time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Identity of the acting manager.
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
}
