//! Repository ports - storage abstraction for the ledger and for users

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{Account, Posted, Posting, Session, Transaction, User};

/// Ledger storage: accounts, balances and the transaction log
///
/// Implementations must serialize balance mutations per account and make
/// every mutation visible to readers only once fully applied.
pub trait LedgerStore: Send + Sync {
    // === Accounts ===

    /// Persist a newly opened account. Fails with `Conflict` if the number is taken.
    fn save_account(&self, account: &Account) -> Result<()>;

    /// Look up an account by its number. Fails with `NotFound`.
    fn find_by_number(&self, number: &str) -> Result<Account>;

    /// All accounts owned by a user, oldest first
    fn accounts_for_user(&self, user_id: Uuid) -> Result<Vec<Account>>;

    /// All accounts, oldest first
    fn list_accounts(&self) -> Result<Vec<Account>>;

    // === Balances ===

    /// Apply a signed delta to one balance as a single atomic unit
    ///
    /// The delta must be a whole number of cents (`InvalidAmount`
    /// otherwise). Checks `balance + delta >= 0` before committing and fails
    /// with `InsufficientFunds` otherwise. Records no transaction; ledger
    /// operations go through [`LedgerStore::post`].
    fn adjust_balance(&self, number: &str, delta: Decimal) -> Result<Account>;

    /// Apply postings and append one transaction per posting, all or nothing
    ///
    /// Every account must exist, every amount must be whole cents and no
    /// resulting balance may be negative. On failure no balance changes and
    /// no transaction is written. Accounts are locked in ascending
    /// account-number order. Returns the records and the balances they
    /// produced.
    fn post(&self, postings: &[Posting]) -> Result<Posted>;

    // === Transactions ===

    /// Transactions of one account, oldest first
    fn transactions_for_account(&self, number: &str) -> Result<Vec<Transaction>>;

    /// Transactions attributed to a user, oldest first
    fn transactions_for_user(&self, user_id: Uuid) -> Result<Vec<Transaction>>;

    /// Whole transaction log, oldest first
    fn list_transactions(&self) -> Result<Vec<Transaction>>;
}

/// User and session storage
pub trait UserStore: Send + Sync {
    /// Persist a new user. Fails with `Conflict` if the email is taken.
    fn save_user(&self, user: &User) -> Result<()>;

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    fn list_users(&self) -> Result<Vec<User>>;

    fn save_session(&self, session: &Session) -> Result<()>;

    fn find_session(&self, token_hash: &str) -> Result<Option<Session>>;

    /// Returns true if a session was removed
    fn delete_session(&self, token_hash: &str) -> Result<bool>;
}
