//! Status service - ledger summaries

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::money;
use crate::domain::result::Result;
use crate::ports::{LedgerStore, UserStore};

/// Status service for ledger summaries
pub struct StatusService {
    ledger: Arc<dyn LedgerStore>,
    users: Arc<dyn UserStore>,
}

impl StatusService {
    pub fn new(ledger: Arc<dyn LedgerStore>, users: Arc<dyn UserStore>) -> Self {
        Self { ledger, users }
    }

    /// Get overall status summary
    pub fn get_status(&self) -> Result<StatusSummary> {
        let accounts = self.ledger.list_accounts()?;
        let transactions = self.ledger.list_transactions()?;
        let total_users = self.users.list_users()?.len() as i64;

        let total_holdings: Decimal = accounts.iter().map(|a| a.balance).sum();

        Ok(StatusSummary {
            total_users,
            total_accounts: accounts.len() as i64,
            total_transactions: transactions.len() as i64,
            total_holdings: money::format_amount(total_holdings),
            date_range: DateRange {
                earliest: transactions.iter().map(|t| t.created_at).min().map(|d| d.to_rfc3339()),
                latest: transactions.iter().map(|t| t.created_at).max().map(|d| d.to_rfc3339()),
            },
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_users: i64,
    pub total_accounts: i64,
    pub total_transactions: i64,
    /// Sum of all account balances
    pub total_holdings: String,
    pub date_range: DateRange,
}

#[derive(Debug, Serialize)]
pub struct DateRange {
    pub earliest: Option<String>,
    pub latest: Option<String>,
}
