//! Account service - opening and looking up accounts

use std::sync::Arc;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, User};
use crate::ports::LedgerStore;

const MAX_NUMBER_ATTEMPTS: usize = 5;

pub struct AccountService {
    ledger: Arc<dyn LedgerStore>,
    number_prefix: String,
}

impl AccountService {
    pub fn new(ledger: Arc<dyn LedgerStore>, number_prefix: impl Into<String>) -> Self {
        Self {
            ledger,
            number_prefix: number_prefix.into(),
        }
    }

    /// Open an empty account for a user
    ///
    /// Numbers are random; a collision is retried with a fresh number.
    pub fn open_account(&self, owner: &User) -> Result<Account> {
        let mut last_err = None;
        for _ in 0..MAX_NUMBER_ATTEMPTS {
            let account = Account::new(Account::generate_number(&self.number_prefix), owner.id);
            match self.ledger.save_account(&account) {
                Ok(()) => return Ok(account),
                Err(err @ Error::Conflict(_)) => last_err = Some(err),
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::Conflict("could not allocate account number".into())))
    }

    pub fn accounts_for(&self, owner: &User) -> Result<Vec<Account>> {
        self.ledger.accounts_for_user(owner.id)
    }

    /// Look up an account the user may act on
    ///
    /// Admins may act on any account. For anyone else, an account owned by
    /// another user is reported as forbidden.
    pub fn find_owned(&self, number: &str, user: &User) -> Result<Account> {
        let account = self.ledger.find_by_number(number)?;
        if account.user_id != user.id && !user.is_admin() {
            return Err(Error::forbidden(format!("account {} belongs to another user", number)));
        }
        Ok(account)
    }
}
