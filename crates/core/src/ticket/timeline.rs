//! Display rows for a ticket's status-change history.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{StateCategory, StatusChange, TicketState};

/// One rendered history entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineRow<'a> {
    /// Position in the history (0 = oldest).
    pub position: usize,
    pub previous_state: TicketState,
    pub new_state: TicketState,
    /// Category of `new_state`.
    pub category: StateCategory,
    pub comment: Option<&'a str>,
    pub changed_by: &'a str,
    pub changed_at: DateTime<Utc>,
}

/// Lazy iterator over timeline rows.
///
/// Cloning yields an independent cursor; [`Timeline::restart`] rewinds this one.
#[derive(Debug, Clone)]
pub struct Timeline<'a> {
    history: &'a [StatusChange],
    cursor: usize,
}

/// Build a timeline over an ordered history.
pub fn timeline(history: &[StatusChange]) -> Timeline<'_> {
    Timeline { history, cursor: 0 }
}

impl<'a> Timeline<'a> {
    /// Rewind to the oldest entry.
    pub fn restart(&mut self) {
        self.cursor = 0;
    }

    /// Rows in reverse order (newest first), as shown on the ticket page.
    pub fn newest_first(&self) -> impl Iterator<Item = TimelineRow<'a>> + '_ {
        let history = self.history;
        (0..history.len()).rev().map(move |i| row(history, i))
    }
}

fn row(history: &[StatusChange], position: usize) -> TimelineRow<'_> {
    let change = &history[position];
    TimelineRow {
        position,
        previous_state: change.previous_state,
        new_state: change.new_state,
        category: change.new_state.category(),
        comment: change.comment.as_deref(),
        changed_by: &change.changed_by,
        changed_at: change.changed_at,
    }
}

impl<'a> Iterator for Timeline<'a> {
    type Item = TimelineRow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.history.len() {
            return None;
        }
        let item = row(self.history, self.cursor);
        self.cursor += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.history.len() - self.cursor;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Timeline<'_> {}
