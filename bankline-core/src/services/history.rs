//! Transaction history queries

use std::sync::Arc;

use crate::domain::result::Result;
use crate::domain::Transaction;
use crate::ports::LedgerStore;

/// Read-only view over the transaction log
pub struct HistoryService {
    ledger: Arc<dyn LedgerStore>,
}

impl HistoryService {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    /// All transactions on accounts owned by a user, newest first
    pub fn for_user(&self, user_id: uuid::Uuid, limit: Option<usize>) -> Result<Vec<Transaction>> {
        let records = self.ledger.transactions_for_user(user_id)?;
        Ok(newest_first(records, limit))
    }

    /// Transactions on one account, newest first
    pub fn for_account(&self, number: &str, limit: Option<usize>) -> Result<Vec<Transaction>> {
        let records = self.ledger.transactions_for_account(number)?;
        Ok(newest_first(records, limit))
    }
}

// Stores return records in append order, so reversing is enough.
fn newest_first(mut records: Vec<Transaction>, limit: Option<usize>) -> Vec<Transaction> {
    records.reverse();
    if let Some(limit) = limit {
        records.truncate(limit);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::domain::result::Error;
    use crate::domain::{Account, TransactionKind};
    use crate::services::TransferEngine;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn test_history_is_newest_first() {
        let store = Arc::new(MemoryStore::new());
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.save_account(&Account::new("A", alice)).unwrap();
        store.save_account(&Account::new("B", bob)).unwrap();

        let engine = TransferEngine::new(store.clone());
        engine.deposit("A", Decimal::new(100, 0)).unwrap();
        engine.withdraw("A", Decimal::new(10, 0)).unwrap();
        engine.transfer("A", "B", Decimal::new(5, 0)).unwrap();

        let history = HistoryService::new(store);
        let alice_log = history.for_user(alice, None).unwrap();
        let kinds: Vec<_> = alice_log.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TransactionKind::TransferOut,
                TransactionKind::Withdrawal,
                TransactionKind::Deposit
            ]
        );

        let bob_log = history.for_user(bob, None).unwrap();
        assert_eq!(bob_log.len(), 1);
        assert_eq!(bob_log[0].kind, TransactionKind::TransferIn);

        assert_eq!(history.for_account("A", Some(1)).unwrap().len(), 1);
        assert!(matches!(history.for_account("Z", None), Err(Error::NotFound(_))));
    }
}
