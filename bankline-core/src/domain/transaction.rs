//! Transaction domain model
//!
//! Transactions are the append-only audit trail of the ledger. Each balance
//! change is paired with exactly one transaction of matching amount and kind.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::Account;
use super::money;
use super::result::Error;

/// Kind of balance change recorded by a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    TransferIn,
    TransferOut,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::TransferIn => "transfer-in",
            TransactionKind::TransferOut => "transfer-out",
        }
    }

    /// True if this kind adds money to the account
    pub fn is_credit(&self) -> bool {
        matches!(self, TransactionKind::Deposit | TransactionKind::TransferIn)
    }

    /// Signed balance change for a positive amount of this kind
    pub fn signed(&self, amount: Decimal) -> Decimal {
        if self.is_credit() {
            amount
        } else {
            -amount
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionKind::Deposit),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            "transfer-in" => Ok(TransactionKind::TransferIn),
            "transfer-out" => Ok(TransactionKind::TransferOut),
            other => Err(Error::validation(format!(
                "unknown transaction kind: {}",
                other
            ))),
        }
    }
}

/// A single immutable ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub account_number: String,
    /// Owner of the account at the time of posting
    pub user_id: Option<Uuid>,
    /// Always positive; the direction comes from `kind`
    pub amount: Decimal,
    pub kind: TransactionKind,
    /// Shared by both legs of a transfer
    pub transfer_id: Option<Uuid>,
    /// The other account of a transfer
    pub counterparty: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        account_id: Uuid,
        account_number: impl Into<String>,
        user_id: Option<Uuid>,
        amount: Decimal,
        kind: TransactionKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            account_number: account_number.into(),
            user_id,
            amount: money::with_scale(amount),
            kind,
            transfer_id: None,
            counterparty: None,
            created_at: Utc::now(),
        }
    }

    /// Signed effect of this transaction on its account balance
    pub fn signed_amount(&self) -> Decimal {
        self.kind.signed(self.amount)
    }
}

/// A requested balance change, applied by the ledger store
///
/// `post` applies a batch of postings atomically and records one
/// transaction for each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub account_number: String,
    /// Positive amount; the direction comes from `kind`
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub transfer_id: Option<Uuid>,
    pub counterparty: Option<String>,
}

impl Posting {
    pub fn new(account_number: impl Into<String>, amount: Decimal, kind: TransactionKind) -> Self {
        Self {
            account_number: account_number.into(),
            amount,
            kind,
            transfer_id: None,
            counterparty: None,
        }
    }

    /// Link this posting to one leg of a transfer
    pub fn with_transfer(mut self, transfer_id: Uuid, counterparty: impl Into<String>) -> Self {
        self.transfer_id = Some(transfer_id);
        self.counterparty = Some(counterparty.into());
        self
    }

    /// Signed balance change of this posting
    pub fn delta(&self) -> Decimal {
        self.kind.signed(self.amount)
    }

    /// Build the transaction record for this posting once applied
    pub fn to_transaction(&self, account_id: Uuid, user_id: Option<Uuid>) -> Transaction {
        let mut tx = Transaction::new(
            account_id,
            self.account_number.clone(),
            user_id,
            self.amount,
            self.kind,
        );
        tx.transfer_id = self.transfer_id;
        tx.counterparty = self.counterparty.clone();
        tx
    }
}

/// Outcome of a successful `post`
///
/// Balances are read inside the same atomic unit that wrote the records, so
/// they are exactly the balances these transactions left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posted {
    /// One record per posting, in posting order
    pub transactions: Vec<Transaction>,
    /// Every touched account after the change, in ascending number order
    pub accounts: Vec<Account>,
}

impl Posted {
    /// The post-commit state of one touched account
    pub fn account(&self, number: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.number == number)
    }
}
