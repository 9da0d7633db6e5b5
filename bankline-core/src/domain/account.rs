//! Account domain model

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money;

/// Default prefix for generated account numbers
pub const DEFAULT_NUMBER_PREFIX: &str = "ACC-";

/// Length of the random part of an account number
const NUMBER_SUFFIX_LEN: usize = 9;

const NUMBER_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A bank account owned by a user
///
/// The balance is only ever changed by the ledger store on behalf of the
/// transfer engine and never drops below zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    /// Unique, human-facing account number
    pub number: String,
    pub balance: Decimal,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new, empty account
    pub fn new(number: impl Into<String>, user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            number: number.into(),
            balance: money::from_cents(0),
            user_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Generate a random account number, e.g. `ACC-k3x9q0a7b`
    pub fn generate_number(prefix: &str) -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..NUMBER_SUFFIX_LEN)
            .map(|_| NUMBER_ALPHABET[rng.gen_range(0..NUMBER_ALPHABET.len())] as char)
            .collect();
        format!("{}{}", prefix, suffix)
    }

    /// Balance formatted with two decimals
    pub fn formatted_balance(&self) -> String {
        money::format_amount(self.balance)
    }
}

/// Public view of an account balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub account_number: String,
    pub balance: String,
}

impl From<&Account> for BalanceView {
    fn from(account: &Account) -> Self {
        Self {
            account_number: account.number.clone(),
            balance: account.formatted_balance(),
        }
    }
}
