//! Transfer engine - deposits, withdrawals and transfers
//!
//! The engine validates requests and hands balance changes to the ledger
//! store as postings. The store applies them atomically together with their
//! transaction records, so a failed operation leaves no partial state.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{money, BalanceView, Posting, Transaction, TransactionKind};
use crate::ports::LedgerStore;

/// A single-account movement and the balance it left behind
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    pub transaction: Transaction,
    pub balance: BalanceView,
}

/// Outcome of a completed transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub transfer_id: Uuid,
    /// The `transfer-out` record on the source account
    pub from: Transaction,
    /// The `transfer-in` record on the destination account
    pub to: Transaction,
}

/// Orchestrates money movement on top of a [`LedgerStore`]
pub struct TransferEngine {
    ledger: Arc<dyn LedgerStore>,
}

impl TransferEngine {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Credit an account and record a `deposit`
    pub fn deposit(&self, number: &str, amount: Decimal) -> Result<Movement> {
        let amount = money::validate_amount(amount)?;
        let posting = Posting::new(number, amount, TransactionKind::Deposit);
        self.post_single(posting)
    }

    /// Debit an account and record a `withdrawal`
    pub fn withdraw(&self, number: &str, amount: Decimal) -> Result<Movement> {
        let amount = money::validate_amount(amount)?;
        let posting = Posting::new(number, amount, TransactionKind::Withdrawal);
        self.post_single(posting)
    }

    /// Move money between two accounts
    ///
    /// Checks run in order: amount, same account, both accounts exist,
    /// funds. Both legs are applied in one atomic posting.
    pub fn transfer(&self, from: &str, to: &str, amount: Decimal) -> Result<TransferReceipt> {
        let amount = money::validate_amount(amount)?;
        if from == to {
            return Err(Error::SameAccountTransfer);
        }
        self.ledger.find_by_number(from)?;
        self.ledger.find_by_number(to)?;

        let transfer_id = Uuid::new_v4();
        let postings = [
            Posting::new(from, amount, TransactionKind::TransferOut).with_transfer(transfer_id, to),
            Posting::new(to, amount, TransactionKind::TransferIn).with_transfer(transfer_id, from),
        ];
        let mut records = self.ledger.post(&postings)?.transactions.into_iter();
        match (records.next(), records.next()) {
            (Some(out_leg), Some(in_leg)) => Ok(TransferReceipt {
                transfer_id,
                from: out_leg,
                to: in_leg,
            }),
            _ => Err(Error::database("ledger returned an incomplete transfer")),
        }
    }

    /// Current balance of an account, formatted with two decimals
    pub fn get_balance(&self, number: &str) -> Result<BalanceView> {
        let account = self.ledger.find_by_number(number)?;
        Ok(BalanceView::from(&account))
    }

    fn post_single(&self, posting: Posting) -> Result<Movement> {
        let posted = self.ledger.post(std::slice::from_ref(&posting))?;
        let balance = posted.account(&posting.account_number).map(BalanceView::from);
        match (posted.transactions.into_iter().next(), balance) {
            (Some(transaction), Some(balance)) => Ok(Movement {
                transaction,
                balance,
            }),
            _ => Err(Error::database("ledger returned an incomplete posting")),
        }
    }
}
