//! DuckDB repository implementation
//!
//! A single connection sits behind a mutex, so every read and write is
//! serialized (single writer). Ledger postings run inside a database
//! transaction and are rolled back on any failure.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::{params, Connection, OptionalExt};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    money, Account, PasswordCredential, Posted, Posting, Role, Session, Transaction,
    TransactionKind, User,
};
use crate::ports::{LedgerStore, UserStore};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when the database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock on file")
}

const ACCOUNT_COLUMNS: &str =
    "account_id, account_number, balance_cents, user_id, created_at, updated_at";

const TRANSACTION_COLUMNS: &str = "transaction_id, account_id, account_number, user_id, \
     amount_cents, kind, transfer_id, counterparty, created_at";

const USER_COLUMNS: &str = "user_id, email, credential, role, created_at";

/// Raw account row, converted outside the row closure so parse errors surface as ours
struct AccountRow {
    id: String,
    number: String,
    balance_cents: i64,
    user_id: String,
    created_at: String,
    updated_at: String,
}

impl AccountRow {
    fn read(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            number: row.get(1)?,
            balance_cents: row.get(2)?,
            user_id: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_account(self) -> Result<Account> {
        Ok(Account {
            id: parse_uuid(&self.id)?,
            number: self.number,
            balance: money::from_cents(self.balance_cents),
            user_id: parse_uuid(&self.user_id)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct TransactionRow {
    id: String,
    account_id: String,
    account_number: String,
    user_id: Option<String>,
    amount_cents: i64,
    kind: String,
    transfer_id: Option<String>,
    counterparty: Option<String>,
    created_at: String,
}

impl TransactionRow {
    fn read(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            account_id: row.get(1)?,
            account_number: row.get(2)?,
            user_id: row.get(3)?,
            amount_cents: row.get(4)?,
            kind: row.get(5)?,
            transfer_id: row.get(6)?,
            counterparty: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_transaction(self) -> Result<Transaction> {
        Ok(Transaction {
            id: parse_uuid(&self.id)?,
            account_id: parse_uuid(&self.account_id)?,
            account_number: self.account_number,
            user_id: self.user_id.as_deref().map(parse_uuid).transpose()?,
            amount: money::from_cents(self.amount_cents),
            kind: self.kind.parse::<TransactionKind>()?,
            transfer_id: self.transfer_id.as_deref().map(parse_uuid).transpose()?,
            counterparty: self.counterparty,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

struct UserRow {
    id: String,
    email: String,
    credential: String,
    role: String,
    created_at: String,
}

impl UserRow {
    fn read(row: &duckdb::Row) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            credential: row.get(2)?,
            role: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn into_user(self) -> Result<User> {
        Ok(User {
            id: parse_uuid(&self.id)?,
            email: self.email,
            credential: serde_json::from_str::<PasswordCredential>(&self.credential)?,
            role: self.role.parse::<Role>()?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) the database file
    ///
    /// Opening is retried with exponential backoff when another process
    /// holds the file lock. Ledger mutations themselves are never retried.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[bankline] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::database(format!("Failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    /// Open a private in-memory database (tests, embedding)
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory_with_flags(config)?),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Path of the database file, if file-backed
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    /// Run pending schema migrations
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    fn query_accounts(&self, filter: &str, param: Option<&str>) -> Result<Vec<Account>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM bank_accounts {} ORDER BY created_at, account_number",
            ACCOUNT_COLUMNS, filter
        ))?;
        let rows = match param {
            Some(p) => stmt
                .query_map([p], AccountRow::read)?
                .collect::<duckdb::Result<Vec<_>>>()?,
            None => stmt
                .query_map([], AccountRow::read)?
                .collect::<duckdb::Result<Vec<_>>>()?,
        };
        rows.into_iter().map(AccountRow::into_account).collect()
    }

    fn query_transactions(&self, filter: &str, param: Option<&str>) -> Result<Vec<Transaction>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM bank_transactions {} ORDER BY seq",
            TRANSACTION_COLUMNS, filter
        ))?;
        let rows = match param {
            Some(p) => stmt
                .query_map([p], TransactionRow::read)?
                .collect::<duckdb::Result<Vec<_>>>()?,
            None => stmt
                .query_map([], TransactionRow::read)?
                .collect::<duckdb::Result<Vec<_>>>()?,
        };
        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }

    fn find_user_where(&self, column: &str, value: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM bank_users WHERE {} = ?", USER_COLUMNS, column),
                [value],
                UserRow::read,
            )
            .optional()?;
        row.map(UserRow::into_user).transpose()
    }
}

/// Load an account, apply a delta in cents and write it back
///
/// Runs on the caller's connection or open transaction; the caller holds
/// the connection mutex, which serializes all mutations.
fn adjust_cents(conn: &Connection, number: &str, delta: i64, now: &str) -> Result<Account> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {} FROM bank_accounts WHERE account_number = ?",
                ACCOUNT_COLUMNS
            ),
            [number],
            AccountRow::read,
        )
        .optional()?
        .ok_or_else(|| Error::not_found(format!("account {}", number)))?;

    let next = row
        .balance_cents
        .checked_add(delta)
        .ok_or_else(|| Error::invalid_amount("balance overflow"))?;
    if next < 0 {
        return Err(Error::insufficient_funds(number));
    }

    conn.execute(
        "UPDATE bank_accounts SET balance_cents = ?, updated_at = ? WHERE account_number = ?",
        params![next, now, number],
    )?;

    let mut account = row.into_account()?;
    account.balance = money::from_cents(next);
    account.updated_at = parse_timestamp(now)?;
    Ok(account)
}

fn insert_transaction(conn: &Connection, tx: &Transaction) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bank_transactions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            TRANSACTION_COLUMNS
        ),
        params![
            tx.id.to_string(),
            tx.account_id.to_string(),
            tx.account_number,
            tx.user_id.map(|id| id.to_string()),
            money::to_cents(tx.amount)?,
            tx.kind.as_str(),
            tx.transfer_id.map(|id| id.to_string()),
            tx.counterparty,
            format_timestamp(&tx.created_at),
        ],
    )?;
    Ok(())
}

impl LedgerStore for DuckDbRepository {
    fn save_account(&self, account: &Account) -> Result<()> {
        let conn = self.lock()?;
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM bank_accounts WHERE account_number = ?",
            [&account.number],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Err(Error::Conflict(format!(
                "account number {} already exists",
                account.number
            )));
        }

        conn.execute(
            &format!(
                "INSERT INTO bank_accounts ({}) VALUES (?, ?, ?, ?, ?, ?)",
                ACCOUNT_COLUMNS
            ),
            params![
                account.id.to_string(),
                account.number,
                money::to_cents(account.balance)?,
                account.user_id.to_string(),
                format_timestamp(&account.created_at),
                format_timestamp(&account.updated_at),
            ],
        )?;
        Ok(())
    }

    fn find_by_number(&self, number: &str) -> Result<Account> {
        self.query_accounts("WHERE account_number = ?", Some(number))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("account {}", number)))
    }

    fn accounts_for_user(&self, user_id: Uuid) -> Result<Vec<Account>> {
        self.query_accounts("WHERE user_id = ?", Some(&user_id.to_string()))
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        self.query_accounts("", None)
    }

    fn adjust_balance(&self, number: &str, delta: Decimal) -> Result<Account> {
        let delta = money::to_cents(delta)?;
        let now = format_timestamp(&Utc::now());
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let account = adjust_cents(&tx, number, delta, &now)?;
        tx.commit()?;
        Ok(account)
    }

    fn post(&self, postings: &[Posting]) -> Result<Posted> {
        let mut deltas: BTreeMap<&str, i64> = BTreeMap::new();
        for posting in postings {
            let cents = money::to_cents(posting.delta())?;
            let entry = deltas.entry(posting.account_number.as_str()).or_insert(0);
            *entry = entry
                .checked_add(cents)
                .ok_or_else(|| Error::invalid_amount("posting overflow"))?;
        }

        let now = Utc::now();
        let now_str = format_timestamp(&now);
        let mut conn = self.lock()?;
        // Dropping `tx` without commit rolls everything back
        let tx = conn.transaction()?;

        let mut accounts = Vec::with_capacity(deltas.len());
        for (number, delta) in &deltas {
            accounts.push(adjust_cents(&tx, number, *delta, &now_str)?);
        }
        let owners: HashMap<&str, (Uuid, Uuid)> = accounts
            .iter()
            .map(|a| (a.number.as_str(), (a.id, a.user_id)))
            .collect();

        let mut records = Vec::with_capacity(postings.len());
        for posting in postings {
            let (account_id, user_id) = owners[posting.account_number.as_str()];
            let mut record = posting.to_transaction(account_id, Some(user_id));
            record.created_at = now;
            insert_transaction(&tx, &record)?;
            records.push(record);
        }

        tx.commit()?;
        Ok(Posted {
            transactions: records,
            accounts,
        })
    }

    fn transactions_for_account(&self, number: &str) -> Result<Vec<Transaction>> {
        self.find_by_number(number)?;
        self.query_transactions("WHERE account_number = ?", Some(number))
    }

    fn transactions_for_user(&self, user_id: Uuid) -> Result<Vec<Transaction>> {
        self.query_transactions("WHERE user_id = ?", Some(&user_id.to_string()))
    }

    fn list_transactions(&self) -> Result<Vec<Transaction>> {
        self.query_transactions("", None)
    }
}

impl UserStore for DuckDbRepository {
    fn save_user(&self, user: &User) -> Result<()> {
        let conn = self.lock()?;
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM bank_users WHERE email = ?",
            [&user.email],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Err(Error::Conflict("email already exists".to_string()));
        }

        conn.execute(
            &format!("INSERT INTO bank_users ({}) VALUES (?, ?, ?, ?, ?)", USER_COLUMNS),
            params![
                user.id.to_string(),
                user.email,
                serde_json::to_string(&user.credential)?,
                user.role.as_str(),
                format_timestamp(&user.created_at),
            ],
        )?;
        Ok(())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_user_where("email", &User::normalize_email(email))
    }

    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.find_user_where("user_id", &id.to_string())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM bank_users ORDER BY created_at",
            USER_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], UserRow::read)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        rows.into_iter().map(UserRow::into_user).collect()
    }

    fn save_session(&self, session: &Session) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO bank_sessions (token_hash, user_id, created_at, expires_at)
             VALUES (?, ?, ?, ?)",
            params![
                session.token_hash,
                session.user_id.to_string(),
                format_timestamp(&session.created_at),
                format_timestamp(&session.expires_at),
            ],
        )?;
        Ok(())
    }

    fn find_session(&self, token_hash: &str) -> Result<Option<Session>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT token_hash, user_id, created_at, expires_at
                 FROM bank_sessions WHERE token_hash = ?",
                [token_hash],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(token_hash, user_id, created_at, expires_at)| {
            Ok(Session {
                token_hash,
                user_id: parse_uuid(&user_id)?,
                created_at: parse_timestamp(&created_at)?,
                expires_at: parse_timestamp(&expires_at)?,
            })
        })
        .transpose()
    }

    fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM bank_sessions WHERE token_hash = ?",
            [token_hash],
        )?;
        Ok(deleted > 0)
    }
}

/// Timestamps are stored as RFC 3339 text with microseconds, which sorts correctly
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::database(format!("invalid timestamp '{}': {}", s, e)))
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::database(format!("invalid id '{}': {}", s, e)))
}
