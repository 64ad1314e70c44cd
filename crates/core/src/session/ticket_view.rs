//! Snapshot of one open ticket and its history.

use super::{OpFailure, OpState, RequestToken};
use crate::ticket::{timeline, StatusChange, Ticket, TicketState, Timeline};

/// Everything a ticket detail screen shows
///
/// Reducers take the snapshot by value and return the next one. Results for
/// a token the view is not waiting on are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct TicketView {
    pub ticket_id: i64,
    pub ticket: Option<Ticket>,
    pub history: Vec<StatusChange>,
    /// Set after a transition until the history is fetched again
    pub history_stale: bool,
    pub load: OpState<()>,
    pub transition: OpState<TicketState>,
}

impl TicketView {
    pub fn opening(ticket_id: i64, token: RequestToken) -> Self {
        Self {
            ticket_id,
            ticket: None,
            history: Vec::new(),
            history_stale: false,
            load: OpState::pending(token),
            transition: OpState::Idle,
        }
    }

    pub fn loaded(
        mut self,
        token: RequestToken,
        ticket: Ticket,
        history: Vec<StatusChange>,
    ) -> Self {
        if !self.load.awaits(token) || ticket.id != self.ticket_id {
            return self;
        }
        self.ticket = Some(ticket);
        self.history = history;
        self.history_stale = false;
        self.load = OpState::Confirmed(());
        self
    }

    pub fn load_failed(mut self, token: RequestToken, failure: OpFailure) -> Self {
        self.load = self.load.resolve(token, Err(failure));
        self
    }

    /// Begin a reload that keeps the current data visible
    pub fn reloading(mut self, token: RequestToken) -> Self {
        self.load = OpState::pending(token);
        self
    }

    pub fn transition_started(mut self, token: RequestToken) -> Self {
        self.transition = OpState::pending(token);
        self
    }

    pub fn transition_confirmed(mut self, token: RequestToken, ticket: Ticket) -> Self {
        if !self.transition.awaits(token) || ticket.id != self.ticket_id {
            return self;
        }
        self.transition = OpState::Confirmed(ticket.state);
        self.ticket = Some(ticket);
        self.history_stale = true;
        self
    }

    pub fn transition_rejected(mut self, token: RequestToken, failure: OpFailure) -> Self {
        self.transition = self.transition.resolve(token, Err(failure));
        self
    }

    /// Forget a transition whose result will never arrive
    pub fn transition_abandoned(mut self) -> Self {
        self.transition = self.transition.abandon();
        self
    }

    /// Settle every request still marked pending
    pub fn abandoned(mut self) -> Self {
        self.load = self.load.abandon();
        self.transition_abandoned()
    }

    /// Replace the history after a re-fetch
    pub fn history_refreshed(mut self, history: Vec<StatusChange>) -> Self {
        if history.iter().all(|c| c.ticket_id == self.ticket_id) {
            self.history = history;
            self.history_stale = false;
        }
        self
    }

    pub fn state(&self) -> Option<TicketState> {
        self.ticket.as_ref().map(|t| t.state)
    }

    /// Targets to offer; empty while loading or while a transition is in flight
    pub fn available_targets(&self) -> &'static [TicketState] {
        match (&self.ticket, self.transition.is_pending()) {
            (Some(ticket), false) => ticket.state.valid_transitions(),
            _ => &[],
        }
    }

    pub fn timeline(&self) -> Timeline<'_> {
        timeline(&self.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::session::TokenIssuer;
    use crate::testing::fixtures;

    #[test]
    fn test_open_then_load() {
        let mut tokens = TokenIssuer::new();
        let token = tokens.issue();

        let view = TicketView::opening(1, token);
        assert!(view.load.is_pending());
        assert!(view.available_targets().is_empty());

        let view = view.loaded(token, fixtures::ticket(1, TicketState::New), vec![]);
        assert_eq!(view.state(), Some(TicketState::New));
        assert_eq!(view.available_targets(), TicketState::New.valid_transitions());
    }

    #[test]
    fn test_stale_load_is_ignored() {
        let mut tokens = TokenIssuer::new();
        let first = tokens.issue();
        let second = tokens.issue();

        let view = TicketView::opening(1, first).reloading(second);
        let view = view.loaded(first, fixtures::ticket(1, TicketState::Waiting), vec![]);
        assert!(view.ticket.is_none());
        assert!(view.load.awaits(second));
    }

    #[test]
    fn test_result_for_other_ticket_is_ignored() {
        let mut tokens = TokenIssuer::new();
        let token = tokens.issue();
        let view =
            TicketView::opening(1, token).loaded(token, fixtures::ticket(2, TicketState::New), vec![]);
        assert!(view.ticket.is_none());
    }

    #[test]
    fn test_transition_marks_history_stale_until_refreshed() {
        let mut tokens = TokenIssuer::new();
        let load = tokens.issue();
        let view = TicketView::opening(1, load).loaded(load, fixtures::ticket(1, TicketState::New), vec![]);

        let token = tokens.issue();
        let view = view.transition_started(token);
        assert!(view.available_targets().is_empty());

        let view = view.transition_confirmed(token, fixtures::ticket(1, TicketState::InProgress));
        assert_eq!(view.transition.confirmed(), Some(&TicketState::InProgress));
        assert!(view.history_stale);

        let change = fixtures::status_change(1, TicketState::New, TicketState::InProgress);
        let view = view.history_refreshed(vec![change]);
        assert!(!view.history_stale);
        assert_eq!(view.timeline().count(), 1);
    }

    #[test]
    fn test_rejected_transition_keeps_snapshot() {
        let mut tokens = TokenIssuer::new();
        let load = tokens.issue();
        let before = TicketView::opening(1, load).loaded(load, fixtures::ticket(1, TicketState::Closed), vec![]);

        let token = tokens.issue();
        let after = before.clone().transition_started(token).transition_rejected(
            token,
            OpFailure::new(Some(ErrorCode::IllegalTransition), "closed -> waiting"),
        );

        assert_eq!(after.ticket, before.ticket);
        assert!(after.transition.failure().is_some_and(|f| f.is_conflict()));
    }

    #[test]
    fn test_abandoned_transition_offers_targets_again() {
        let mut tokens = TokenIssuer::new();
        let load = tokens.issue();
        let view = TicketView::opening(1, load).loaded(load, fixtures::ticket(1, TicketState::New), vec![]);

        let token = tokens.issue();
        let view = view.transition_started(token).abandoned();
        assert_eq!(view.transition, OpState::Idle);
        assert_eq!(view.available_targets(), TicketState::New.valid_transitions());

        let view = view.transition_confirmed(token, fixtures::ticket(1, TicketState::Closed));
        assert_eq!(view.state(), Some(TicketState::New));
    }
}
