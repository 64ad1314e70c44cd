//! HTTP service for ticket lifecycle and standby-queue triage.

pub mod api;
pub mod metrics;
pub mod state;

pub use api::create_router;
pub use state::{AppState, Stores};
