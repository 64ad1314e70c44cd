//! Triage rules for standby-queue items.
//!
//! Pure functions over item snapshots. The store calls them inside its
//! transactions; clients call them to decide which actions to offer.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{ItemDisposition, RetryOutcome, StandbyQueueItem, TriageAction};
use crate::board::Board;
use crate::error::ErrorCode;
use crate::ticket::validate::{truncate_chars, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN};
use crate::ticket::{CreateTicketRequest, TicketSource};

/// Title used when the inbound message had no subject.
pub const EMPTY_SUBJECT_TITLE: &str = "(no subject)";

/// Description used when the inbound message had no body.
pub const EMPTY_BODY_DESCRIPTION: &str = "(no content)";

/// A ticket about to be created from a queue item. Always starts in state `new`.
pub type TicketDraft = CreateTicketRequest;

/// Errors from triage preconditions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriageError {
    #[error("Queue item {item_id} was already assigned (ticket {ticket_id})")]
    AlreadyAssigned { item_id: i64, ticket_id: i64 },

    #[error("Queue item {0} has no failed external sync to retry")]
    NoRetryNeeded(i64),

    #[error("Queue item not found: {0}")]
    NotFound(i64),

    #[error("Board {0} is archived")]
    BoardArchived(i64),

    #[error("Queue item {0} has no board with an external platform to retry against")]
    RetryUnavailable(i64),
}

impl TriageError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TriageError::AlreadyAssigned { .. } => ErrorCode::AlreadyAssigned,
            TriageError::NoRetryNeeded(_) => ErrorCode::NoRetryNeeded,
            TriageError::NotFound(_) => ErrorCode::NotFound,
            TriageError::BoardArchived(_) => ErrorCode::BoardArchived,
            TriageError::RetryUnavailable(_) => ErrorCode::RetryUnavailable,
        }
    }
}

fn ensure_pending(item: &StandbyQueueItem) -> Result<(), TriageError> {
    match item.disposition {
        ItemDisposition::Pending => Ok(()),
        ItemDisposition::Assigned { ticket_id } => Err(TriageError::AlreadyAssigned {
            item_id: item.id,
            ticket_id,
        }),
        ItemDisposition::Discarded => Err(TriageError::NotFound(item.id)),
    }
}

/// Actions currently legal on an item. Empty once the item left the queue.
pub fn available_actions(item: &StandbyQueueItem) -> Vec<TriageAction> {
    if !item.disposition.is_pending() {
        return Vec::new();
    }
    let mut actions = vec![TriageAction::Assign];
    if item.external_sync_failed && item.original_board_id.is_some() {
        actions.push(TriageAction::Retry);
    }
    actions.push(TriageAction::Discard);
    actions
}

/// Title for anything created from `item`: the trimmed subject, or a placeholder.
pub fn item_title(item: &StandbyQueueItem) -> String {
    let subject = item.subject.trim();
    if subject.is_empty() {
        EMPTY_SUBJECT_TITLE.to_string()
    } else {
        truncate_chars(subject, MAX_TITLE_LEN)
    }
}

/// Check that `item` can be assigned to `board` and build the ticket to create.
pub fn check_assign(item: &StandbyQueueItem, board: &Board) -> Result<TicketDraft, TriageError> {
    ensure_pending(item)?;
    if board.is_archived {
        return Err(TriageError::BoardArchived(board.id));
    }

    let title = item_title(item);
    let description = if item.body.trim().is_empty() {
        EMPTY_BODY_DESCRIPTION.to_string()
    } else {
        truncate_chars(&item.body, MAX_DESCRIPTION_LEN)
    };

    Ok(TicketDraft {
        board_id: board.id,
        title,
        description,
        creator_email: item.sender_email.clone(),
        source: TicketSource::Email,
    })
}

/// Check that a retry is meaningful. Returns the board to sync against.
pub fn check_retry(item: &StandbyQueueItem) -> Result<i64, TriageError> {
    ensure_pending(item)?;
    if !item.external_sync_failed {
        return Err(TriageError::NoRetryNeeded(item.id));
    }
    item.original_board_id
        .ok_or(TriageError::RetryUnavailable(item.id))
}

/// New snapshot after a retry. Queue membership does not change.
pub fn apply_retry_outcome(
    item: &StandbyQueueItem,
    outcome: RetryOutcome,
    now: DateTime<Utc>,
) -> StandbyQueueItem {
    let mut updated = item.clone();
    updated.external_sync_failed = outcome == RetryOutcome::StillFailing;
    updated.retry_count = item.retry_count.saturating_add(1);
    updated.updated_at = now.max(item.updated_at);
    updated
}

pub fn check_discard(item: &StandbyQueueItem) -> Result<(), TriageError> {
    ensure_pending(item)
}

/// First half of the two-step discard. Consumed by [`confirm_discard`].
#[derive(Debug, PartialEq, Eq)]
pub struct DiscardProposal {
    item_id: i64,
    sender_email: String,
    subject: String,
}

impl DiscardProposal {
    pub fn item_id(&self) -> i64 {
        self.item_id
    }

    /// Short description for the confirmation prompt.
    pub fn summary(&self) -> String {
        format!("'{}' from {}", self.subject, self.sender_email)
    }
}

/// Propose discarding a pending item.
pub fn propose_discard(item: &StandbyQueueItem) -> Result<DiscardProposal, TriageError> {
    check_discard(item)?;
    Ok(DiscardProposal {
        item_id: item.id,
        sender_email: item.sender_email.clone(),
        subject: item.subject.clone(),
    })
}

/// Confirm a proposal, returning the id of the item to discard.
pub fn confirm_discard(proposal: DiscardProposal) -> i64 {
    proposal.item_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standby::FailureReason;

    fn item(external_sync_failed: bool) -> StandbyQueueItem {
        let now = Utc::now();
        StandbyQueueItem {
            id: 42,
            sender_email: "user@example.com".to_string(),
            subject: "VPN broken".to_string(),
            body: "Cannot connect since this morning".to_string(),
            reason: FailureReason::NoKeywordMatch,
            original_board_id: external_sync_failed.then_some(3),
            external_sync_failed,
            retry_count: 0,
            disposition: ItemDisposition::Pending,
            received_at: now,
            updated_at: now,
        }
    }

    fn board(id: i64, is_archived: bool) -> Board {
        let now = Utc::now();
        Board {
            id,
            name: "IT".to_string(),
            unique_name: "it".to_string(),
            is_archived,
            external_platform: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_available_actions() {
        assert_eq!(
            available_actions(&item(false)),
            vec![TriageAction::Assign, TriageAction::Discard]
        );
        assert_eq!(
            available_actions(&item(true)),
            vec![TriageAction::Assign, TriageAction::Retry, TriageAction::Discard]
        );

        let mut gone = item(true);
        gone.disposition = ItemDisposition::Discarded;
        assert!(available_actions(&gone).is_empty());
    }

    #[test]
    fn test_retry_not_offered_without_board() {
        let mut orphan = item(true);
        orphan.original_board_id = None;
        assert!(!available_actions(&orphan).contains(&TriageAction::Retry));
        assert_eq!(
            check_retry(&orphan),
            Err(TriageError::RetryUnavailable(42))
        );
    }

    #[test]
    fn test_assign_builds_email_ticket() {
        let draft = check_assign(&item(false), &board(3, false)).unwrap();
        assert_eq!(draft.board_id, 3);
        assert_eq!(draft.source, TicketSource::Email);
        assert_eq!(draft.title, "VPN broken");
        assert_eq!(draft.creator_email, "user@example.com");
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_assign_truncates_and_fills_blanks() {
        let mut long = item(false);
        long.subject = "s".repeat(300);
        long.body = "b".repeat(6000);
        let draft = check_assign(&long, &board(1, false)).unwrap();
        assert_eq!(draft.title.chars().count(), MAX_TITLE_LEN);
        assert_eq!(draft.description.chars().count(), MAX_DESCRIPTION_LEN);

        let mut blank = item(false);
        blank.subject = "  ".to_string();
        blank.body = String::new();
        let draft = check_assign(&blank, &board(1, false)).unwrap();
        assert_eq!(draft.title, EMPTY_SUBJECT_TITLE);
        assert_eq!(draft.description, EMPTY_BODY_DESCRIPTION);
    }

    #[test]
    fn test_assign_preconditions() {
        assert_eq!(
            check_assign(&item(false), &board(3, true)),
            Err(TriageError::BoardArchived(3))
        );

        let mut assigned = item(false);
        assigned.disposition = ItemDisposition::Assigned { ticket_id: 11 };
        assert_eq!(
            check_assign(&assigned, &board(3, false)),
            Err(TriageError::AlreadyAssigned {
                item_id: 42,
                ticket_id: 11
            })
        );

        let mut discarded = item(false);
        discarded.disposition = ItemDisposition::Discarded;
        assert_eq!(
            check_assign(&discarded, &board(3, false)),
            Err(TriageError::NotFound(42))
        );
    }

    #[test]
    fn test_retry_on_synced_item_needs_nothing() {
        let synced = item(false);
        assert_eq!(check_retry(&synced), Err(TriageError::NoRetryNeeded(42)));
        assert_eq!(
            TriageError::NoRetryNeeded(42).code(),
            ErrorCode::NoRetryNeeded
        );
    }

    #[test]
    fn test_retry_outcomes() {
        let failed = item(true);
        assert_eq!(check_retry(&failed), Ok(3));

        let ok = apply_retry_outcome(&failed, RetryOutcome::Synced, Utc::now());
        assert!(!ok.external_sync_failed);
        assert_eq!(ok.retry_count, 1);
        assert!(ok.disposition.is_pending());

        let still = apply_retry_outcome(&ok, RetryOutcome::StillFailing, Utc::now());
        assert!(still.external_sync_failed);
        assert_eq!(still.retry_count, 2);
        assert!(still.updated_at >= ok.updated_at);
    }

    #[test]
    fn test_discard_is_two_step() {
        let pending = item(false);
        let proposal = propose_discard(&pending).unwrap();
        assert_eq!(proposal.item_id(), 42);
        assert!(proposal.summary().contains("VPN broken"));
        assert_eq!(confirm_discard(proposal), 42);

        let mut assigned = item(false);
        assigned.disposition = ItemDisposition::Assigned { ticket_id: 1 };
        assert!(propose_discard(&assigned).is_err());
    }
}
