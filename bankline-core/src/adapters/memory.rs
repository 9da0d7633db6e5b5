//! In-memory store implementation
//!
//! Each account sits behind its own mutex, so mutations on one account are
//! serialized while unrelated accounts proceed in parallel. Multi-account
//! postings lock in ascending account-number order.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{money, Account, Posted, Posting, Session, Transaction, User};
use crate::ports::{LedgerStore, UserStore};

fn poisoned<T>(_: T) -> Error {
    Error::database("lock poisoned")
}

/// In-memory ledger and user store
#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<String, Arc<Mutex<Account>>>>,
    transactions: Mutex<Vec<Transaction>>,
    users: RwLock<Vec<User>>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn account_handle(&self, number: &str) -> Result<Arc<Mutex<Account>>> {
        let accounts = self.accounts.read().map_err(poisoned)?;
        accounts
            .get(number)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("account {}", number)))
    }

    fn snapshot<F>(&self, filter: F) -> Result<Vec<Account>>
    where
        F: Fn(&Account) -> bool,
    {
        let handles: Vec<_> = self
            .accounts
            .read()
            .map_err(poisoned)?
            .values()
            .cloned()
            .collect();
        let mut accounts = Vec::with_capacity(handles.len());
        for handle in handles {
            let account = handle.lock().map_err(poisoned)?;
            if filter(&account) {
                accounts.push(account.clone());
            }
        }
        accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.number.cmp(&b.number)));
        Ok(accounts)
    }

    fn transactions_where<F>(&self, filter: F) -> Result<Vec<Transaction>>
    where
        F: Fn(&Transaction) -> bool,
    {
        let log = self.transactions.lock().map_err(poisoned)?;
        Ok(log.iter().filter(|tx| filter(tx)).cloned().collect())
    }
}

/// Compute the new balance in cents, refusing to go below zero
fn apply_delta(account: &Account, delta: i64) -> Result<Decimal> {
    let next = money::to_cents(account.balance)?
        .checked_add(delta)
        .ok_or_else(|| Error::invalid_amount("balance overflow"))?;
    if next < 0 {
        return Err(Error::insufficient_funds(&account.number));
    }
    Ok(money::from_cents(next))
}

impl LedgerStore for MemoryStore {
    fn save_account(&self, account: &Account) -> Result<()> {
        let mut accounts = self.accounts.write().map_err(poisoned)?;
        if accounts.contains_key(&account.number) {
            return Err(Error::Conflict(format!(
                "account number {} already exists",
                account.number
            )));
        }
        accounts.insert(account.number.clone(), Arc::new(Mutex::new(account.clone())));
        Ok(())
    }

    fn find_by_number(&self, number: &str) -> Result<Account> {
        let handle = self.account_handle(number)?;
        let account = handle.lock().map_err(poisoned)?;
        Ok(account.clone())
    }

    fn accounts_for_user(&self, user_id: Uuid) -> Result<Vec<Account>> {
        self.snapshot(|a| a.user_id == user_id)
    }

    fn list_accounts(&self) -> Result<Vec<Account>> {
        self.snapshot(|_| true)
    }

    fn adjust_balance(&self, number: &str, delta: Decimal) -> Result<Account> {
        let delta = money::to_cents(delta)?;
        let handle = self.account_handle(number)?;
        let mut account = handle.lock().map_err(poisoned)?;
        account.balance = apply_delta(&account, delta)?;
        account.updated_at = Utc::now();
        Ok(account.clone())
    }

    fn post(&self, postings: &[Posting]) -> Result<Posted> {
        // Net delta per account; BTreeMap gives the global lock order
        let mut deltas: BTreeMap<&str, i64> = BTreeMap::new();
        for posting in postings {
            let cents = money::to_cents(posting.delta())?;
            let entry = deltas.entry(posting.account_number.as_str()).or_insert(0);
            *entry = entry
                .checked_add(cents)
                .ok_or_else(|| Error::invalid_amount("posting overflow"))?;
        }

        let handles = deltas
            .keys()
            .map(|number| self.account_handle(number))
            .collect::<Result<Vec<_>>>()?;
        let mut guards: Vec<MutexGuard<'_, Account>> = Vec::with_capacity(handles.len());
        for handle in &handles {
            guards.push(handle.lock().map_err(poisoned)?);
        }

        // Check every leg before touching any balance
        let mut next_balances = Vec::with_capacity(guards.len());
        for (guard, delta) in guards.iter().zip(deltas.values()) {
            next_balances.push(apply_delta(guard, *delta)?);
        }

        let now = Utc::now();
        let owners: HashMap<String, (Uuid, Uuid)> = guards
            .iter()
            .map(|a| (a.number.clone(), (a.id, a.user_id)))
            .collect();
        for (guard, balance) in guards.iter_mut().zip(next_balances) {
            guard.balance = balance;
            guard.updated_at = now;
        }

        let records: Vec<Transaction> = postings
            .iter()
            .map(|posting| {
                let (account_id, user_id) = owners[&posting.account_number];
                posting.to_transaction(account_id, Some(user_id))
            })
            .collect();

        // Appended while the account locks are still held
        self.transactions
            .lock()
            .map_err(poisoned)?
            .extend(records.iter().cloned());
        Ok(Posted {
            transactions: records,
            accounts: guards.iter().map(|guard| (**guard).clone()).collect(),
        })
    }

    fn transactions_for_account(&self, number: &str) -> Result<Vec<Transaction>> {
        self.account_handle(number)?;
        self.transactions_where(|tx| tx.account_number == number)
    }

    fn transactions_for_user(&self, user_id: Uuid) -> Result<Vec<Transaction>> {
        self.transactions_where(|tx| tx.user_id == Some(user_id))
    }

    fn list_transactions(&self) -> Result<Vec<Transaction>> {
        self.transactions_where(|_| true)
    }
}

impl UserStore for MemoryStore {
    fn save_user(&self, user: &User) -> Result<()> {
        let mut users = self.users.write().map_err(poisoned)?;
        if users.iter().any(|u| u.email == user.email) {
            return Err(Error::Conflict("email already exists".to_string()));
        }
        users.push(user.clone());
        Ok(())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = User::normalize_email(email);
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.users.read().map_err(poisoned)?.clone())
    }

    fn save_session(&self, session: &Session) -> Result<()> {
        self.sessions
            .lock()
            .map_err(poisoned)?
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    fn find_session(&self, token_hash: &str) -> Result<Option<Session>> {
        Ok(self.sessions.lock().map_err(poisoned)?.get(token_hash).cloned())
    }

    fn delete_session(&self, token_hash: &str) -> Result<bool> {
        Ok(self
            .sessions
            .lock()
            .map_err(poisoned)?
            .remove(token_hash)
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransactionKind;

    fn store_with(accounts: &[(&str, i64)]) -> MemoryStore {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        for (number, cents) in accounts {
            let mut account = Account::new(*number, owner);
            account.balance = money::from_cents(*cents);
            store.save_account(&account).unwrap();
        }
        store
    }

    #[test]
    fn test_duplicate_account_number_conflicts() {
        let store = store_with(&[("ACC-1", 0)]);
        let err = store
            .save_account(&Account::new("ACC-1", Uuid::new_v4()))
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[test]
    fn test_adjust_balance_refuses_negative() {
        let store = store_with(&[("ACC-1", 1000)]);
        let err = store.adjust_balance("ACC-1", Decimal::new(-1001, 2)).unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
        assert_eq!(store.find_by_number("ACC-1").unwrap().balance, money::from_cents(1000));

        let account = store.adjust_balance("ACC-1", Decimal::new(-1000, 2)).unwrap();
        assert!(account.balance.is_zero());
    }

    #[test]
    fn test_adjust_balance_unknown_account() {
        let store = MemoryStore::new();
        let err = store.adjust_balance("nope", Decimal::ONE).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_post_is_all_or_nothing() {
        let store = store_with(&[("A", 1000), ("B", 0)]);
        let postings = vec![
            Posting::new("B", Decimal::new(2000, 2), TransactionKind::TransferIn),
            Posting::new("A", Decimal::new(2000, 2), TransactionKind::TransferOut),
        ];
        let err = store.post(&postings).unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientFunds { ref account_number } if account_number == "A"
        ));
        assert_eq!(store.find_by_number("A").unwrap().balance, money::from_cents(1000));
        assert!(store.find_by_number("B").unwrap().balance.is_zero());
        assert!(store.list_transactions().unwrap().is_empty());
    }

    #[test]
    fn test_post_records_one_transaction_per_posting() {
        let store = store_with(&[("A", 1000), ("B", 0)]);
        let postings = vec![
            Posting::new("A", Decimal::new(400, 2), TransactionKind::TransferOut),
            Posting::new("B", Decimal::new(400, 2), TransactionKind::TransferIn),
        ];
        let posted = store.post(&postings).unwrap();
        assert_eq!(posted.transactions.len(), 2);
        assert_eq!(posted.account("A").unwrap().balance, money::from_cents(600));
        assert_eq!(posted.account("B").unwrap().balance, money::from_cents(400));
        assert_eq!(store.find_by_number("A").unwrap().balance, money::from_cents(600));
        assert_eq!(store.find_by_number("B").unwrap().balance, money::from_cents(400));
        assert_eq!(store.transactions_for_account("A").unwrap().len(), 1);
        let b_log = store.transactions_for_account("B").unwrap();
        assert_eq!(b_log[0].kind, TransactionKind::TransferIn);
    }

    #[test]
    fn test_post_unknown_account_changes_nothing() {
        let store = store_with(&[("A", 1000)]);
        let postings = vec![
            Posting::new("A", Decimal::new(100, 2), TransactionKind::TransferOut),
            Posting::new("ghost", Decimal::new(100, 2), TransactionKind::TransferIn),
        ];
        assert!(matches!(store.post(&postings), Err(Error::NotFound(_))));
        assert_eq!(store.find_by_number("A").unwrap().balance, money::from_cents(1000));
    }

    #[test]
    fn test_sessions() {
        let store = MemoryStore::new();
        let session = Session::new("h", Uuid::new_v4(), 1).unwrap();
        store.save_session(&session).unwrap();
        assert_eq!(store.find_session("h").unwrap(), Some(session));
        assert!(store.delete_session("h").unwrap());
        assert!(!store.delete_session("h").unwrap());
    }
}
