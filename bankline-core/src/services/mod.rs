//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
mod doctor;
mod history;
pub mod logging;
pub mod migration;
mod status;
mod transfer;
mod user;

pub use account::AccountService;
pub use doctor::{CheckResult, DoctorResult, DoctorService, DoctorSummary};
pub use history::HistoryService;
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use status::{DateRange, StatusService, StatusSummary};
pub use transfer::{Movement, TransferEngine, TransferReceipt};
pub use user::{LoginToken, UserService};
