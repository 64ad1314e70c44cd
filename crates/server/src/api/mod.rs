pub mod audit;
pub mod boards;
pub mod dashboard;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod public;
pub mod routes;
pub mod standby_queue;
pub mod tickets;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
