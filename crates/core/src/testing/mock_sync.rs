//! Scripted external platform.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::board::Board;
use crate::standby::StandbyQueueItem;
use crate::sync::{ExternalTicketRef, PlatformSync, SyncError};

/// One call made to the mock
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSync {
    pub board_id: i64,
    pub item_id: i64,
}

/// Mock implementation of [`PlatformSync`]
///
/// Scripted outcomes are consumed in order; once the script is empty every
/// call succeeds with a generated reference.
#[derive(Debug, Clone, Default)]
pub struct MockPlatformSync {
    script: Arc<RwLock<VecDeque<Result<ExternalTicketRef, SyncError>>>>,
    calls: Arc<RwLock<Vec<RecordedSync>>>,
}

impl MockPlatformSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a failure for the next call
    pub async fn fail_next(&self, error: SyncError) {
        self.script.write().await.push_back(Err(error));
    }

    /// Queue a success with a specific reference
    pub async fn succeed_next(&self, reference: ExternalTicketRef) {
        self.script.write().await.push_back(Ok(reference));
    }

    pub async fn calls(&self) -> Vec<RecordedSync> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl PlatformSync for MockPlatformSync {
    async fn create_external_ticket(
        &self,
        board: &Board,
        item: &StandbyQueueItem,
    ) -> Result<ExternalTicketRef, SyncError> {
        self.calls.write().await.push(RecordedSync {
            board_id: board.id,
            item_id: item.id,
        });

        if let Some(outcome) = self.script.write().await.pop_front() {
            return outcome;
        }

        let platform = board
            .external_platform
            .as_ref()
            .map(|p| p.name())
            .unwrap_or("mock");
        Ok(ExternalTicketRef {
            platform: platform.to_string(),
            external_id: format!("MOCK-{}", item.id),
            external_url: format!("https://tracker.invalid/MOCK-{}", item.id),
        })
    }
}
