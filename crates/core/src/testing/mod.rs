//! Test doubles and fixtures.
//!
//! `MockPlatformSync` stands in for Jira/Trello, `MockTicketService` for the
//! whole Ticket/Queue Service when exercising the client session.
//!
//! ```rust,ignore
//! use ticketdesk_core::testing::{fixtures, MockTicketService};
//!
//! let service = MockTicketService::new();
//! service.insert_item(fixtures::queue_item(1, true)).await;
//! let mut session = Session::new(service);
//! session.refresh_queue(0).await;
//! ```

pub mod fixtures;
mod mock_service;
mod mock_sync;

pub use mock_service::MockTicketService;
pub use mock_sync::{MockPlatformSync, RecordedSync};
