//! Snapshot of the standby queue list and the item detail pane.

use super::{OpFailure, OpState, RequestToken};
use crate::error::ErrorCode;
use crate::standby::{available_actions, QueuePage, StandbyQueueItem, TriageAction};

/// Item detail pane
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DetailView {
    #[default]
    Closed,
    Loading {
        item_id: i64,
        token: RequestToken,
    },
    Open(StandbyQueueItem),
    /// The item was assigned or discarded; its data is no longer shown
    Unavailable {
        item_id: i64,
    },
    Failed {
        item_id: i64,
        failure: OpFailure,
    },
}

impl DetailView {
    pub fn item_id(&self) -> Option<i64> {
        match self {
            DetailView::Closed => None,
            DetailView::Loading { item_id, .. }
            | DetailView::Unavailable { item_id }
            | DetailView::Failed { item_id, .. } => Some(*item_id),
            DetailView::Open(item) => Some(item.id),
        }
    }

    pub fn item(&self) -> Option<&StandbyQueueItem> {
        match self {
            DetailView::Open(item) => Some(item),
            _ => None,
        }
    }
}

/// A triage action sent for one item
#[derive(Debug, Clone, PartialEq)]
pub struct TriageOp {
    pub item_id: i64,
    pub action: TriageAction,
    pub state: OpState<()>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueueView {
    pub items: Vec<StandbyQueueItem>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub list: OpState<()>,
    pub detail: DetailView,
    pub triage: Option<TriageOp>,
}

impl QueueView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_requested(mut self, token: RequestToken) -> Self {
        self.list = OpState::pending(token);
        self
    }

    /// Replace the list; items known to be gone stay out of the snapshot
    pub fn list_loaded(mut self, token: RequestToken, page: QueuePage) -> Self {
        if !self.list.awaits(token) {
            return self;
        }
        let gone = match &self.detail {
            DetailView::Unavailable { item_id } => Some(*item_id),
            _ => None,
        };
        self.items = page
            .items
            .into_iter()
            .filter(|item| item.disposition.is_pending() && Some(item.id) != gone)
            .collect();
        self.total = page.total;
        self.limit = page.limit;
        self.offset = page.offset;
        self.list = OpState::Confirmed(());
        self
    }

    pub fn list_failed(mut self, token: RequestToken, failure: OpFailure) -> Self {
        self.list = self.list.resolve(token, Err(failure));
        self
    }

    pub fn detail_requested(mut self, item_id: i64, token: RequestToken) -> Self {
        self.detail = DetailView::Loading { item_id, token };
        self
    }

    pub fn detail_loaded(mut self, token: RequestToken, item: StandbyQueueItem) -> Self {
        match self.detail {
            DetailView::Loading {
                item_id,
                token: pending,
            } if pending == token && item_id == item.id => {
                if item.disposition.is_pending() {
                    self.detail = DetailView::Open(item);
                } else {
                    self = self.item_removed(item_id);
                }
                self
            }
            _ => self,
        }
    }

    /// A not-found answer means the item left the queue
    pub fn detail_failed(mut self, token: RequestToken, failure: OpFailure) -> Self {
        match self.detail {
            DetailView::Loading {
                item_id,
                token: pending,
            } if pending == token => {
                if failure.code == Some(ErrorCode::NotFound) {
                    self.item_removed(item_id)
                } else {
                    self.detail = DetailView::Failed { item_id, failure };
                    self
                }
            }
            _ => self,
        }
    }

    pub fn close_detail(mut self) -> Self {
        self.detail = DetailView::Closed;
        self
    }

    pub fn triage_started(mut self, item_id: i64, action: TriageAction, token: RequestToken) -> Self {
        self.triage = Some(TriageOp {
            item_id,
            action,
            state: OpState::pending(token),
        });
        self
    }

    pub fn triage_confirmed(mut self, token: RequestToken) -> Self {
        if let Some(op) = self.triage.take() {
            self.triage = Some(TriageOp {
                state: op.state.resolve(token, Ok(())),
                ..op
            });
        }
        self
    }

    pub fn triage_rejected(mut self, token: RequestToken, failure: OpFailure) -> Self {
        if let Some(op) = self.triage.take() {
            self.triage = Some(TriageOp {
                state: op.state.resolve(token, Err(failure)),
                ..op
            });
        }
        self
    }

    /// Forget a triage call whose result will never arrive
    pub fn triage_abandoned(mut self) -> Self {
        if self.triage.as_ref().is_some_and(|op| op.state.is_pending()) {
            self.triage = None;
        }
        self
    }

    /// Settle every request still marked pending
    pub fn abandoned(mut self) -> Self {
        self.list = self.list.abandon();
        if matches!(self.detail, DetailView::Loading { .. }) {
            self.detail = DetailView::Closed;
        }
        self.triage_abandoned()
    }

    /// The item was assigned or discarded: drop it everywhere
    pub fn item_removed(mut self, item_id: i64) -> Self {
        let before = self.items.len();
        self.items.retain(|item| item.id != item_id);
        if self.items.len() < before {
            self.total = (self.total - 1).max(0);
        }
        if self.detail.item_id() == Some(item_id) {
            self.detail = DetailView::Unavailable { item_id };
        }
        self
    }

    /// A newer snapshot of a pending item (after retry)
    pub fn item_updated(mut self, item: StandbyQueueItem) -> Self {
        if !item.disposition.is_pending() {
            return self.item_removed(item.id);
        }
        if let Some(slot) = self.items.iter_mut().find(|i| i.id == item.id) {
            *slot = item.clone();
        }
        if self.detail.item_id() == Some(item.id) && !matches!(self.detail, DetailView::Loading { .. }) {
            self.detail = DetailView::Open(item);
        }
        self
    }

    /// Find a pending item in the list or the detail pane
    pub fn find(&self, item_id: i64) -> Option<&StandbyQueueItem> {
        self.items
            .iter()
            .find(|i| i.id == item_id)
            .or_else(|| self.detail.item().filter(|i| i.id == item_id))
    }

    /// Actions to offer for an item; none while a triage call on it is pending
    pub fn actions_for(&self, item_id: i64) -> Vec<TriageAction> {
        if self
            .triage
            .as_ref()
            .is_some_and(|op| op.item_id == item_id && op.state.is_pending())
        {
            return Vec::new();
        }
        self.find(item_id).map(available_actions).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TokenIssuer;
    use crate::testing::fixtures;

    fn loaded_view(tokens: &mut TokenIssuer, items: Vec<StandbyQueueItem>) -> QueueView {
        let token = tokens.issue();
        let total = items.len() as i64;
        QueueView::new().list_requested(token).list_loaded(
            token,
            QueuePage {
                items,
                total,
                limit: 50,
                offset: 0,
            },
        )
    }

    #[test]
    fn test_removed_item_leaves_list_and_detail() {
        let mut tokens = TokenIssuer::new();
        let view = loaded_view(
            &mut tokens,
            vec![fixtures::queue_item(1, false), fixtures::queue_item(2, true)],
        );

        let token = tokens.issue();
        let view = view
            .detail_requested(2, token)
            .detail_loaded(token, fixtures::queue_item(2, true));
        assert!(view.detail.item().is_some());

        let view = view.item_removed(2);
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.total, 1);
        assert_eq!(view.detail, DetailView::Unavailable { item_id: 2 });
        assert!(view.find(2).is_none());
    }

    #[test]
    fn test_stale_list_does_not_resurrect_removed_item() {
        let mut tokens = TokenIssuer::new();
        let view = loaded_view(&mut tokens, vec![fixtures::queue_item(1, false)]);

        let detail = tokens.issue();
        let view = view
            .detail_requested(1, detail)
            .detail_loaded(detail, fixtures::queue_item(1, false))
            .item_removed(1);

        let token = tokens.issue();
        let view = view.list_requested(token).list_loaded(
            token,
            QueuePage {
                items: vec![fixtures::queue_item(1, false)],
                total: 1,
                limit: 50,
                offset: 0,
            },
        );
        assert!(view.items.is_empty());
    }

    #[test]
    fn test_not_found_detail_becomes_unavailable() {
        let mut tokens = TokenIssuer::new();
        let token = tokens.issue();
        let view = QueueView::new()
            .detail_requested(5, token)
            .detail_failed(token, OpFailure::new(Some(ErrorCode::NotFound), "gone"));
        assert_eq!(view.detail, DetailView::Unavailable { item_id: 5 });

        let token = tokens.issue();
        let view = view
            .detail_requested(6, token)
            .detail_failed(token, OpFailure::new(None, "connection reset"));
        assert!(matches!(view.detail, DetailView::Failed { item_id: 6, .. }));
    }

    #[test]
    fn test_item_updated_replaces_snapshot() {
        let mut tokens = TokenIssuer::new();
        let view = loaded_view(&mut tokens, vec![fixtures::queue_item(1, true)]);
        assert!(view.actions_for(1).contains(&TriageAction::Retry));

        let view = view.item_updated(fixtures::queue_item(1, false));
        assert!(!view.items[0].external_sync_failed);
        assert!(!view.actions_for(1).contains(&TriageAction::Retry));
    }

    #[test]
    fn test_no_actions_while_triage_pending() {
        let mut tokens = TokenIssuer::new();
        let view = loaded_view(&mut tokens, vec![fixtures::queue_item(1, false)]);

        let token = tokens.issue();
        let view = view.triage_started(1, TriageAction::Assign, token);
        assert!(view.actions_for(1).is_empty());

        let view = view.triage_confirmed(token);
        assert_eq!(view.actions_for(1), vec![TriageAction::Assign, TriageAction::Discard]);
    }

    #[test]
    fn test_abandoned_triage_frees_actions() {
        let mut tokens = TokenIssuer::new();
        let view = loaded_view(
            &mut tokens,
            vec![fixtures::queue_item(1, true), fixtures::queue_item(2, false)],
        );

        let token = tokens.issue();
        let view = view.triage_started(1, TriageAction::Retry, token);
        assert!(view.actions_for(1).is_empty());
        assert_eq!(view.actions_for(2), vec![TriageAction::Assign, TriageAction::Discard]);

        let view = view.abandoned();
        assert!(view.triage.is_none());
        assert_eq!(view.actions_for(1).len(), 3);

        // A result that shows up afterwards changes nothing
        let view = view.triage_confirmed(token);
        assert!(view.triage.is_none());
    }

    #[test]
    fn test_abandoned_keeps_settled_triage() {
        let mut tokens = TokenIssuer::new();
        let view = loaded_view(&mut tokens, vec![fixtures::queue_item(1, false)]);

        let token = tokens.issue();
        let detail = tokens.issue();
        let view = view
            .triage_started(1, TriageAction::Discard, token)
            .triage_rejected(token, OpFailure::new(None, "connection reset"))
            .detail_requested(1, detail)
            .abandoned();

        assert!(view.triage.as_ref().unwrap().state.failure().is_some());
        assert_eq!(view.detail, DetailView::Closed);
    }
}
