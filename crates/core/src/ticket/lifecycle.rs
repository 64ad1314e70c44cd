//! Ticket state transitions and audit-trail invariants.
//!
//! Everything here is pure: functions take snapshots and return new ones.
//! The store persists the result, the client uses the same checks to decide
//! which actions to offer.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{StatusChange, Ticket, TicketState};
use crate::error::ErrorCode;

/// Errors from validating a transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// State string outside the known enumeration.
    #[error("Unknown ticket state: {0}")]
    InvalidState(String),

    /// Target is not reachable from the current state.
    #[error("Cannot transition from '{from}' to '{to}'")]
    IllegalTransition { from: TicketState, to: TicketState },
}

impl TransitionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TransitionError::InvalidState(_) => ErrorCode::InvalidState,
            TransitionError::IllegalTransition { .. } => ErrorCode::IllegalTransition,
        }
    }
}

/// A requested transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub target: TicketState,
    pub comment: Option<String>,
    /// Identity of the acting manager.
    pub changed_by: String,
}

impl TransitionRequest {
    pub fn new(target: TicketState, changed_by: impl Into<String>) -> Self {
        Self {
            target,
            comment: None,
            changed_by: changed_by.into(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        let comment = comment.into();
        // Whitespace-only comments are dropped rather than recorded.
        self.comment = if comment.trim().is_empty() {
            None
        } else {
            Some(comment)
        };
        self
    }
}

/// Result of a successful transition: the new ticket snapshot and the
/// history record to append.
///
/// `change.id` is 0 until the store assigns one.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub ticket: Ticket,
    pub change: StatusChange,
}

/// Legal targets for a raw state string as received over the wire.
pub fn valid_transitions_for(raw: &str) -> Result<&'static [TicketState], TransitionError> {
    let state: TicketState = raw.parse()?;
    Ok(state.valid_transitions())
}

/// Validate and compute a transition without mutating the input ticket.
pub fn attempt_transition(
    ticket: &Ticket,
    request: TransitionRequest,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    let from = ticket.state;
    let to = request.target;

    if !from.can_transition_to(to) {
        return Err(TransitionError::IllegalTransition { from, to });
    }

    // Timestamps are monotonic per ticket even if the clock steps back.
    let changed_at = now.max(ticket.updated_at);

    let mut updated = ticket.clone();
    updated.state = to;
    updated.updated_at = changed_at;

    let change = StatusChange {
        id: 0,
        ticket_id: ticket.id,
        previous_state: from,
        new_state: to,
        comment: request.comment,
        changed_by: request.changed_by,
        changed_at,
    };

    Ok(Transition {
        ticket: updated,
        change,
    })
}

/// Violations of the status-change chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("Record {index} goes from '{state}' to itself")]
    SelfLoop { index: usize, state: TicketState },

    #[error("Record {index} starts at '{found}' but the previous record ended at '{expected}'")]
    BrokenChain {
        index: usize,
        expected: TicketState,
        found: TicketState,
    },

    #[error("Record {index} is older than the record before it")]
    OutOfOrder { index: usize },

    #[error("Record {index} is not a legal transition ('{from}' to '{to}')")]
    Illegal {
        index: usize,
        from: TicketState,
        to: TicketState,
    },
}

/// Check that a ticket's history is a well-formed chain of legal transitions
/// in chronological order.
pub fn verify_history(history: &[StatusChange]) -> Result<(), HistoryError> {
    for (index, change) in history.iter().enumerate() {
        if change.previous_state == change.new_state {
            return Err(HistoryError::SelfLoop {
                index,
                state: change.new_state,
            });
        }
        if !change.previous_state.can_transition_to(change.new_state) {
            return Err(HistoryError::Illegal {
                index,
                from: change.previous_state,
                to: change.new_state,
            });
        }
        if index > 0 {
            let prev = &history[index - 1];
            if prev.new_state != change.previous_state {
                return Err(HistoryError::BrokenChain {
                    index,
                    expected: prev.new_state,
                    found: change.previous_state,
                });
            }
            if change.changed_at < prev.changed_at {
                return Err(HistoryError::OutOfOrder { index });
            }
        }
    }
    Ok(())
}
