//! Doctor service - ledger health checks
//!
//! Every balance must equal the signed sum of its account's transaction log,
//! and every transfer must consist of a matching out/in pair.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::money;
use crate::domain::result::Result;
use crate::domain::{Transaction, TransactionKind};
use crate::ports::LedgerStore;

/// Doctor service for health checks
pub struct DoctorService {
    ledger: Arc<dyn LedgerStore>,
}

impl DoctorService {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        Self { ledger }
    }

    /// Run all health checks
    pub fn run_checks(&self) -> Result<DoctorResult> {
        let accounts = self.ledger.list_accounts()?;
        let transactions = self.ledger.list_transactions()?;
        let mut checks = BTreeMap::new();

        // Balances vs. log
        let mut log_sums: HashMap<&str, Decimal> = HashMap::new();
        for tx in &transactions {
            *log_sums
                .entry(tx.account_number.as_str())
                .or_insert(Decimal::ZERO) += tx.signed_amount();
        }
        let mismatched: Vec<serde_json::Value> = accounts
            .iter()
            .filter_map(|a| {
                let logged = log_sums.get(a.number.as_str()).copied().unwrap_or(Decimal::ZERO);
                (logged != a.balance).then(|| {
                    json!({
                        "account_number": a.number,
                        "balance": money::format_amount(a.balance),
                        "log_total": money::format_amount(logged),
                    })
                })
            })
            .collect();
        checks.insert(
            "balance_matches_log".to_string(),
            CheckResult::from_findings(
                mismatched,
                "error",
                "All balances match their transaction logs".to_string(),
                |n| format!("{} account(s) disagree with their transaction log", n),
            ),
        );

        // Negative balances
        let negative: Vec<serde_json::Value> = accounts
            .iter()
            .filter(|a| a.balance < Decimal::ZERO)
            .map(|a| {
                json!({"account_number": a.number, "balance": money::format_amount(a.balance)})
            })
            .collect();
        checks.insert(
            "no_negative_balances".to_string(),
            CheckResult::from_findings(
                negative,
                "error",
                "No negative balances".to_string(),
                |n| format!("{} account(s) have a negative balance", n),
            ),
        );

        // Orphaned transactions
        let known: HashSet<&str> = accounts.iter().map(|a| a.number.as_str()).collect();
        let orphaned: Vec<serde_json::Value> = transactions
            .iter()
            .filter(|tx| !known.contains(tx.account_number.as_str()))
            .map(|tx| json!({"transaction_id": tx.id, "account_number": tx.account_number}))
            .collect();
        checks.insert(
            "orphaned_transactions".to_string(),
            CheckResult::from_findings(
                orphaned,
                "error",
                "No orphaned transactions found".to_string(),
                |n| format!("{} transaction(s) reference missing accounts", n),
            ),
        );

        // Transfer pairs
        checks.insert(
            "transfer_pairs".to_string(),
            CheckResult::from_findings(
                unpaired_transfers(&transactions),
                "warning",
                "Every transfer has matching legs".to_string(),
                |n| format!("{} transfer(s) have missing or mismatched legs", n),
            ),
        );

        let passed = checks.values().filter(|c| c.status == "pass").count() as i64;
        let warnings = checks.values().filter(|c| c.status == "warning").count() as i64;
        let errors = checks.values().filter(|c| c.status == "error").count() as i64;

        Ok(DoctorResult {
            checks,
            summary: DoctorSummary { passed, warnings, errors },
        })
    }
}

fn unpaired_transfers(transactions: &[Transaction]) -> Vec<serde_json::Value> {
    let mut legs: BTreeMap<Uuid, Vec<&Transaction>> = BTreeMap::new();
    for tx in transactions {
        if let Some(transfer_id) = tx.transfer_id {
            legs.entry(transfer_id).or_default().push(tx);
        }
    }
    legs.into_iter()
        .filter(|(_, legs)| {
            let outs: Vec<_> = legs
                .iter()
                .filter(|t| t.kind == TransactionKind::TransferOut)
                .collect();
            let ins: Vec<_> = legs
                .iter()
                .filter(|t| t.kind == TransactionKind::TransferIn)
                .collect();
            let paired = legs.len() == 2 && outs.len() == 1 && ins.len() == 1;
            !(paired && outs[0].amount == ins[0].amount)
        })
        .map(|(transfer_id, legs)| json!({"transfer_id": transfer_id, "legs": legs.len()}))
        .collect()
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub checks: BTreeMap<String, CheckResult>,
    pub summary: DoctorSummary,
}

impl DoctorResult {
    pub fn is_healthy(&self) -> bool {
        self.summary.errors == 0
    }
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

impl CheckResult {
    fn from_findings(
        findings: Vec<serde_json::Value>,
        severity: &str,
        ok_message: String,
        failure: impl Fn(usize) -> String,
    ) -> Self {
        if findings.is_empty() {
            Self {
                status: "pass".to_string(),
                message: ok_message,
                details: None,
            }
        } else {
            Self {
                status: severity.to_string(),
                message: failure(findings.len()),
                details: Some(findings),
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub passed: i64,
    pub warnings: i64,
    pub errors: i64,
}
