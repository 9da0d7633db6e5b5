//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
pub mod credentials;
pub mod money;
pub mod result;
mod transaction;
mod user;

pub use account::{Account, BalanceView, DEFAULT_NUMBER_PREFIX};
pub use credentials::{Argon2Params, PasswordCredential};
pub use transaction::{Posted, Posting, Transaction, TransactionKind};
pub use user::{Role, Session, User, UserProfile};
