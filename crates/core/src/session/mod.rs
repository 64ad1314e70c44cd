//! Client-side session over a [`TicketService`].
//!
//! State lives in explicit snapshots ([`TicketView`], [`QueueView`]) changed
//! only through their reducers. [`Session`] drives the network calls and
//! feeds results back through those reducers, tagging every request with a
//! [`RequestToken`] so late answers cannot overwrite newer state.

mod op;
mod queue_view;
mod ticket_view;

pub use op::{OpFailure, OpState, RequestToken, TokenIssuer};
pub use queue_view::{DetailView, QueueView, TriageOp};
pub use ticket_view::TicketView;

use thiserror::Error;
use tracing::{debug, warn};

use crate::client::{ClientError, StateChangeRequest, TicketService};
use crate::error::ErrorCode;
use crate::standby::{
    confirm_discard, propose_discard, DiscardProposal, StandbyQueueItem, TriageAction, TriageError,
};
use crate::ticket::{Ticket, TicketState};

/// Default page size for queue listings
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Misuse of the session itself; service failures end up in the snapshots
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("No ticket is open")]
    NoTicketOpen,

    #[error("Item {0} is not in the current queue snapshot")]
    UnknownItem(i64),

    #[error("No discard awaiting confirmation")]
    NoDiscardProposal,

    #[error(transparent)]
    Triage(#[from] TriageError),
}

pub struct Session<S: TicketService> {
    service: S,
    tokens: TokenIssuer,
    ticket: Option<TicketView>,
    queue: QueueView,
    discard: Option<DiscardProposal>,
    page_size: i64,
}

impl<S: TicketService> Session<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            tokens: TokenIssuer::new(),
            ticket: None,
            queue: QueueView::new(),
            discard: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn ticket(&self) -> Option<&TicketView> {
        self.ticket.as_ref()
    }

    pub fn queue(&self) -> &QueueView {
        &self.queue
    }

    pub fn pending_discard(&self) -> Option<&DiscardProposal> {
        self.discard.as_ref()
    }

    /// Settle requests left pending by a call that was dropped mid-flight
    ///
    /// Every operation borrows the session mutably, so anything still pending
    /// when a new one starts can no longer be answered. Late results carry a
    /// token nothing waits for and are ignored.
    pub fn abandon_pending(&mut self) {
        let ticket_pending = self
            .ticket
            .as_ref()
            .is_some_and(|v| v.load.is_pending() || v.transition.is_pending());
        let triage_pending = self
            .queue
            .triage
            .as_ref()
            .is_some_and(|op| op.state.is_pending());
        if ticket_pending || triage_pending {
            debug!(ticket_pending, triage_pending, "Abandoning dropped requests");
        }
        self.update_ticket(TicketView::abandoned);
        self.update_queue(QueueView::abandoned);
    }

    fn update_ticket(&mut self, f: impl FnOnce(TicketView) -> TicketView) {
        if let Some(view) = self.ticket.take() {
            self.ticket = Some(f(view));
        }
    }

    fn update_queue(&mut self, f: impl FnOnce(QueueView) -> QueueView) {
        self.queue = f(std::mem::take(&mut self.queue));
    }

    // Tickets

    pub async fn open_ticket(&mut self, id: i64) -> Option<&TicketView> {
        self.abandon_pending();
        let token = self.tokens.issue();
        self.ticket = Some(TicketView::opening(id, token));
        self.fetch_ticket(id, token).await;
        self.ticket.as_ref()
    }

    /// Re-fetch the open ticket and its history
    pub async fn refresh_ticket(&mut self) -> Result<&TicketView, SessionError> {
        self.abandon_pending();
        let id = self.ticket.as_ref().ok_or(SessionError::NoTicketOpen)?.ticket_id;
        let token = self.tokens.issue();
        self.update_ticket(|view| view.reloading(token));
        self.fetch_ticket(id, token).await;
        self.ticket.as_ref().ok_or(SessionError::NoTicketOpen)
    }

    async fn fetch_ticket(&mut self, id: i64, token: RequestToken) {
        let result = tokio::try_join!(self.service.get_ticket(id), self.service.get_history(id));
        match result {
            Ok((ticket, history)) => self.update_ticket(|view| view.loaded(token, ticket, history)),
            Err(e) => {
                debug!(ticket_id = id, error = %e, "Ticket load failed");
                self.update_ticket(|view| view.load_failed(token, OpFailure::from(&e)))
            }
        }
    }

    pub fn close_ticket(&mut self) {
        self.abandon_pending();
        self.ticket = None;
    }

    /// Move the open ticket to `target`
    ///
    /// Targets outside the adjacency table are rejected without a request.
    /// After success the history is fetched again; after a conflict the
    /// ticket is re-fetched and the rejection is marked reconciled.
    pub async fn transition(
        &mut self,
        target: TicketState,
        comment: Option<String>,
    ) -> Result<&TicketView, SessionError> {
        self.abandon_pending();
        let view = self.ticket.as_ref().ok_or(SessionError::NoTicketOpen)?;
        let id = view.ticket_id;
        let current = view.state();
        let token = self.tokens.issue();
        self.update_ticket(|view| view.transition_started(token));

        if let Some(current) = current {
            if !current.can_transition_to(target) {
                let failure = OpFailure::new(
                    Some(ErrorCode::IllegalTransition),
                    format!("Cannot move from {} to {}", current, target),
                );
                self.update_ticket(|view| view.transition_rejected(token, failure));
                return self.ticket.as_ref().ok_or(SessionError::NoTicketOpen);
            }
        }

        let request = StateChangeRequest {
            new_state: target.as_str().to_string(),
            comment,
        };
        match self.service.change_state(id, &request).await {
            Ok(ticket) => {
                self.update_ticket(|view| view.transition_confirmed(token, ticket));
                match self.service.get_history(id).await {
                    Ok(history) => self.update_ticket(|view| view.history_refreshed(history)),
                    Err(e) => warn!(ticket_id = id, error = %e, "History refresh failed"),
                }
            }
            Err(e) if e.is_conflict() => {
                warn!(ticket_id = id, code = ?e.code(), "Transition conflict, reconciling");
                let failure = OpFailure::from(&e).reconciled();
                self.update_ticket(|view| view.transition_rejected(token, failure));
                let reload = self.tokens.issue();
                self.update_ticket(|view| view.reloading(reload));
                self.fetch_ticket(id, reload).await;
            }
            Err(e) => {
                self.update_ticket(|view| view.transition_rejected(token, OpFailure::from(&e)));
            }
        }
        self.ticket.as_ref().ok_or(SessionError::NoTicketOpen)
    }

    // Standby queue

    pub async fn refresh_queue(&mut self, offset: i64) -> &QueueView {
        self.abandon_pending();
        let token = self.tokens.issue();
        self.update_queue(|q| q.list_requested(token));
        match self.service.list_queue(self.page_size, offset).await {
            Ok(page) => self.update_queue(|q| q.list_loaded(token, page)),
            Err(e) => self.update_queue(|q| q.list_failed(token, OpFailure::from(&e))),
        }
        &self.queue
    }

    pub async fn open_item(&mut self, item_id: i64) -> &QueueView {
        self.abandon_pending();
        let token = self.tokens.issue();
        self.update_queue(|q| q.detail_requested(item_id, token));
        match self.service.get_queue_item(item_id).await {
            Ok(item) => self.update_queue(|q| q.detail_loaded(token, item)),
            Err(e) => self.update_queue(|q| q.detail_failed(token, OpFailure::from(&e))),
        }
        &self.queue
    }

    pub fn close_item(&mut self) {
        self.abandon_pending();
        self.update_queue(QueueView::close_detail);
    }

    /// Convert an item into a ticket on `board_id`
    pub async fn assign(&mut self, item_id: i64, board_id: i64) -> Option<Ticket> {
        self.abandon_pending();
        let token = self.tokens.issue();
        self.update_queue(|q| q.triage_started(item_id, TriageAction::Assign, token));

        match self.service.assign(item_id, board_id).await {
            Ok(ticket) => {
                self.update_queue(|q| q.item_removed(item_id).triage_confirmed(token));
                Some(ticket)
            }
            Err(e) => {
                self.reject_triage(item_id, token, &e).await;
                None
            }
        }
    }

    /// Retry the external sync; the item stays queued either way
    pub async fn retry(&mut self, item_id: i64) -> Option<StandbyQueueItem> {
        self.abandon_pending();
        let token = self.tokens.issue();
        self.update_queue(|q| q.triage_started(item_id, TriageAction::Retry, token));

        match self.service.retry(item_id).await {
            Ok(item) => {
                let snapshot = item.clone();
                self.update_queue(|q| q.item_updated(snapshot).triage_confirmed(token));
                Some(item)
            }
            Err(e) => {
                self.reject_triage(item_id, token, &e).await;
                None
            }
        }
    }

    /// First step of discarding: check the item and hold a proposal
    pub fn propose_discard(&mut self, item_id: i64) -> Result<&DiscardProposal, SessionError> {
        let item = self
            .queue
            .find(item_id)
            .ok_or(SessionError::UnknownItem(item_id))?;
        let proposal = propose_discard(item)?;
        Ok(self.discard.insert(proposal))
    }

    pub fn cancel_discard(&mut self) {
        self.discard = None;
    }

    /// Second step: send the held proposal. Returns whether the item was discarded.
    pub async fn confirm_discard(&mut self) -> Result<bool, SessionError> {
        self.abandon_pending();
        let proposal = self.discard.take().ok_or(SessionError::NoDiscardProposal)?;
        let item_id = confirm_discard(proposal);
        let token = self.tokens.issue();
        self.update_queue(|q| q.triage_started(item_id, TriageAction::Discard, token));

        match self.service.discard(item_id).await {
            Ok(()) => {
                self.update_queue(|q| q.item_removed(item_id).triage_confirmed(token));
                Ok(true)
            }
            Err(e) => {
                self.reject_triage(item_id, token, &e).await;
                Ok(false)
            }
        }
    }

    async fn reject_triage(&mut self, item_id: i64, token: RequestToken, e: &ClientError) {
        let reconcile = e.is_conflict() || matches!(e, ClientError::NotFound(_));
        if !reconcile {
            self.update_queue(|q| q.triage_rejected(token, OpFailure::from(e)));
            return;
        }

        warn!(item_id, code = ?e.code(), "Triage conflict, reconciling");
        let failure = OpFailure::from(e).reconciled();
        self.update_queue(|q| q.triage_rejected(token, failure));
        match self.service.get_queue_item(item_id).await {
            Ok(item) => self.update_queue(|q| q.item_updated(item)),
            Err(ClientError::NotFound(_)) => self.update_queue(|q| q.item_removed(item_id)),
            Err(err) => warn!(item_id, error = %err, "Reconcile fetch failed"),
        }
    }
}
