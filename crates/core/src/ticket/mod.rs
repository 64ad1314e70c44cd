//! Tickets: lifecycle state machine, history and storage.

mod lifecycle;
mod sqlite_store;
mod store;
mod timeline;
mod types;
pub mod validate;

pub use lifecycle::{
    attempt_transition, valid_transitions_for, verify_history, HistoryError, Transition,
    TransitionError, TransitionRequest,
};
pub(crate) use sqlite_store::insert_ticket;
pub use sqlite_store::SqliteTicketStore;
pub use store::{CreateTicketRequest, TicketError, TicketFilter, TicketStore};
pub use timeline::{timeline, Timeline, TimelineRow};
pub use types::{StateCategory, StatusChange, Ticket, TicketSource, TicketState};
pub use validate::ValidationError;
