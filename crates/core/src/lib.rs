pub mod audit;
pub mod auth;
pub mod board;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod session;
pub mod standby;
pub mod sync;
pub mod testing;
pub mod ticket;

pub use audit::{
    create_audit_system, AuditError, AuditEvent, AuditEventEnvelope, AuditFilter, AuditHandle,
    AuditRecord, AuditStore, AuditWriter, SqliteAuditStore,
};
pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use board::{
    Board, BoardError, BoardKeyword, BoardStore, CreateBoardRequest, CreateKeywordRequest,
    ExternalPlatform, SqliteBoardStore, UpdateBoardRequest,
};
pub use client::{
    ApiError, AssignRequest, ClientError, HttpServiceClient, StateChangeRequest, TicketService,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod, ClientConfig,
    Config, ConfigError, DatabaseConfig, ManagerKey, SanitizedConfig, ServerConfig, SyncConfig,
};
pub use error::{ErrorBody, ErrorCode};
pub use session::{
    DetailView, OpFailure, OpState, QueueView, RequestToken, Session, SessionError, TicketView,
};
pub use standby::{
    retry_external_sync, FailureReason, ItemDisposition, NewQueueItem, QueueError, QueueFilter,
    QueuePage, QueueStore, RetryOutcome, RetryRecord, RetryReport, SqliteQueueStore,
    StandbyQueueItem, TriageAction, TriageError,
};
pub use sync::{ExternalTicket, ExternalTicketRef, HttpPlatformSync, PlatformSync, SyncError};
pub use ticket::{
    CreateTicketRequest, SqliteTicketStore, StatusChange, Ticket, TicketError, TicketFilter,
    TicketSource, TicketState, TicketStore, TransitionError, TransitionRequest,
};
