//! Bankline Core - ledger and transfer logic for a small banking API
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Account, Transaction, User, money)
//! - **ports**: Store traits the services depend on (LedgerStore, UserStore)
//! - **services**: Business logic orchestration (TransferEngine, UserService, ...)
//! - **adapters**: Concrete store implementations (DuckDB, in-memory)
//! - **api**: Explicit request handlers with a bearer-token auth step

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use adapters::duckdb::DuckDbRepository;
use adapters::memory::MemoryStore;
use config::Config;
use ports::{LedgerStore, UserStore};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, Result};
pub use domain::{
    Account, BalanceView, Posted, Posting, Role, Transaction, TransactionKind, User, UserProfile,
};
pub use services::{EntryPoint, LogEntry, LogEvent, LoggingService};

const LEDGER_DB: &str = "bankline.duckdb";

/// Main context for Bankline operations
///
/// Holds the stores, configuration and every service, wired together by
/// constructor injection.
pub struct BanklineContext {
    pub config: Config,
    pub ledger: Arc<dyn LedgerStore>,
    pub users: Arc<dyn UserStore>,
    pub user_service: UserService,
    pub account_service: AccountService,
    pub transfer_engine: TransferEngine,
    pub history_service: HistoryService,
    pub status_service: StatusService,
    pub doctor_service: DoctorService,
    /// Absent when logging is disabled or logs.duckdb could not be opened
    pub logger: Option<LoggingService>,
}

impl BanklineContext {
    /// Open (or create) the data directory backed by DuckDB
    pub fn new(bankline_dir: &Path, entry_point: EntryPoint) -> Result<Self> {
        std::fs::create_dir_all(bankline_dir)?;
        let config = Config::load(bankline_dir)?;

        let repository = Arc::new(DuckDbRepository::new(&bankline_dir.join(LEDGER_DB))?);
        repository.ensure_schema()?;

        // Logging must never block banking operations
        let logger = if config.logging_enabled {
            LoggingService::new(bankline_dir, entry_point, env!("CARGO_PKG_VERSION")).ok()
        } else {
            None
        };

        let ledger: Arc<dyn LedgerStore> = repository.clone();
        let users: Arc<dyn UserStore> = repository;
        Ok(Self::with_stores(config, ledger, users, logger))
    }

    /// Volatile context over [`MemoryStore`], without event logging
    pub fn in_memory(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let ledger: Arc<dyn LedgerStore> = store.clone();
        let users: Arc<dyn UserStore> = store;
        Self::with_stores(config, ledger, users, None)
    }

    /// Wire services over caller-provided stores
    pub fn with_stores(
        config: Config,
        ledger: Arc<dyn LedgerStore>,
        users: Arc<dyn UserStore>,
        logger: Option<LoggingService>,
    ) -> Self {
        Self {
            user_service: UserService::new(Arc::clone(&users), config.clone()),
            account_service: AccountService::new(
                Arc::clone(&ledger),
                config.account_number_prefix.clone(),
            ),
            transfer_engine: TransferEngine::new(Arc::clone(&ledger)),
            history_service: HistoryService::new(Arc::clone(&ledger)),
            status_service: StatusService::new(Arc::clone(&ledger), Arc::clone(&users)),
            doctor_service: DoctorService::new(Arc::clone(&ledger)),
            config,
            ledger,
            users,
            logger,
        }
    }

    /// Record an event if logging is available; failures are ignored
    pub fn log(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            let _ = logger.log(event);
        }
    }
}
