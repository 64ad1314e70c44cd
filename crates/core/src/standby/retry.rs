//! Re-attempting the external sync of a queue item.

use serde::Serialize;
use tracing::{info, warn};

use super::{check_retry, QueueError, QueueStore, RetryOutcome, StandbyQueueItem, TriageError};
use crate::board::BoardStore;
use crate::sync::{ExternalTicket, PlatformSync};

/// What a retry did.
#[derive(Debug, Clone, Serialize)]
pub struct RetryReport {
    /// The item after the retry; still on the queue either way.
    pub item: StandbyQueueItem,
    /// The stored issue, when the platform accepted the item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalTicket>,
    /// Why the platform refused, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RetryReport {
    pub fn succeeded(&self) -> bool {
        !self.item.external_sync_failed
    }
}

/// Retry the external sync of pending item `id` against its original board.
///
/// A platform failure is not an error here: it is recorded on the item
/// (`external_sync_failed` stays true, `retry_count` goes up).
pub async fn retry_external_sync(
    queue: &dyn QueueStore,
    boards: &dyn BoardStore,
    sync: &dyn PlatformSync,
    id: i64,
) -> Result<RetryReport, QueueError> {
    let item = queue.get_any(id)?.ok_or(TriageError::NotFound(id))?;
    let board_id = check_retry(&item)?;

    let board = boards
        .get(board_id)
        .map_err(|e| QueueError::Database(e.to_string()))?
        .filter(|board| board.external_platform.is_some())
        .ok_or(TriageError::RetryUnavailable(id))?;

    let (outcome, external, error) = match sync.create_external_ticket(&board, &item).await {
        Ok(reference) => {
            info!(
                item_id = id,
                board_id,
                external_id = %reference.external_id,
                "External sync retry succeeded"
            );
            (RetryOutcome::Synced, Some(reference), None)
        }
        Err(e) => {
            warn!(item_id = id, board_id, error = %e, "External sync retry failed");
            (RetryOutcome::StillFailing, None, Some(e.to_string()))
        }
    };

    let record = queue.record_retry(id, outcome, external.as_ref())?;
    Ok(RetryReport {
        item: record.item,
        external: record.external,
        error,
    })
}
