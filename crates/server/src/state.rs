use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ticketdesk_core::{
    AuditHandle, AuditStore, Authenticator, BoardStore, Config, PlatformSync, QueueStore,
    SanitizedConfig, SqliteAuditStore, SqliteBoardStore, SqliteQueueStore, SqliteTicketStore,
    TicketStore,
};

/// The SQLite-backed stores, all opened on one database file
#[derive(Clone)]
pub struct Stores {
    pub audit: Arc<dyn AuditStore>,
    pub tickets: Arc<dyn TicketStore>,
    pub boards: Arc<dyn BoardStore>,
    pub queue: Arc<dyn QueueStore>,
}

impl Stores {
    pub fn open(path: &Path) -> Result<Self> {
        let audit: Arc<dyn AuditStore> =
            Arc::new(SqliteAuditStore::new(path).context("Failed to create audit store")?);
        let tickets: Arc<dyn TicketStore> =
            Arc::new(SqliteTicketStore::new(path).context("Failed to create ticket store")?);
        let boards: Arc<dyn BoardStore> =
            Arc::new(SqliteBoardStore::new(path).context("Failed to create board store")?);
        let queue: Arc<dyn QueueStore> =
            Arc::new(SqliteQueueStore::new(path).context("Failed to create queue store")?);

        Ok(Self {
            audit,
            tickets,
            boards,
            queue,
        })
    }
}

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    audit: AuditHandle,
    stores: Stores,
    sync: Arc<dyn PlatformSync>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        audit: AuditHandle,
        stores: Stores,
        sync: Arc<dyn PlatformSync>,
    ) -> Self {
        Self {
            config,
            authenticator,
            audit,
            stores,
            sync,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn audit(&self) -> &AuditHandle {
        &self.audit
    }

    pub fn audit_store(&self) -> &dyn AuditStore {
        self.stores.audit.as_ref()
    }

    pub fn ticket_store(&self) -> &dyn TicketStore {
        self.stores.tickets.as_ref()
    }

    pub fn board_store(&self) -> &dyn BoardStore {
        self.stores.boards.as_ref()
    }

    pub fn queue_store(&self) -> &dyn QueueStore {
        self.stores.queue.as_ref()
    }

    pub fn sync(&self) -> &dyn PlatformSync {
        self.sync.as_ref()
    }
}
