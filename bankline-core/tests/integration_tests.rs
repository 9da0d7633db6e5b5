//! Integration tests for bankline-core
//!
//! These run the public handlers and services against a real DuckDB file in
//! a temporary data directory.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use tempfile::TempDir;

use bankline_core::api::{
    self, AmountRequest, HistoryQuery, LoginRequest, RegisterRequest, TransferRequest,
};
use bankline_core::services::MigrationService;
use bankline_core::{BanklineContext, EntryPoint, TransactionKind};

// ============================================================================
// Test Helpers
// ============================================================================

/// Settings with cheap password hashing so tests stay fast
fn write_settings(dir: &Path) {
    std::fs::write(
        dir.join("settings.json"),
        r#"{
            "auth": {
                "adminEmails": ["ops@bank.io"],
                "argon2": {"timeCost": 1, "memoryCost": 1024, "parallelism": 1, "hashLen": 32}
            },
            "accounts": {"numberPrefix": "TST-"}
        }"#,
    )
    .unwrap();
}

fn open_context(dir: &Path) -> BanklineContext {
    BanklineContext::new(dir, EntryPoint::Embedded).expect("Failed to open context")
}

fn setup() -> (TempDir, BanklineContext) {
    let temp_dir = TempDir::new().unwrap();
    write_settings(temp_dir.path());
    let ctx = open_context(temp_dir.path());
    (temp_dir, ctx)
}

const PASSWORD: &str = "s3cret-password";

/// Register and log in, returning the Authorization header value
fn signup(ctx: &BanklineContext, email: &str) -> String {
    api::register(
        ctx,
        &RegisterRequest {
            email: email.to_string(),
            password: PASSWORD.to_string(),
        },
    )
    .unwrap();
    let login = api::login(
        ctx,
        &LoginRequest {
            email: email.to_string(),
            password: PASSWORD.to_string(),
        },
    )
    .unwrap();
    format!("Bearer {}", login.body.token)
}

fn open_account(ctx: &BanklineContext, auth: &str) -> String {
    api::create_account(ctx, Some(auth)).unwrap().body.account_number
}

fn amount(number: &str, value: &str) -> AmountRequest {
    AmountRequest {
        account_number: number.to_string(),
        amount: Decimal::from_str(value).unwrap(),
    }
}

// ============================================================================
// Money movement
// ============================================================================

#[test]
fn test_deposit_withdraw_transfer_on_duckdb() {
    let (_dir, ctx) = setup();
    let alice = signup(&ctx, "alice@bank.io");
    let bob = signup(&ctx, "bob@bank.io");
    let a = open_account(&ctx, &alice);
    let b = open_account(&ctx, &bob);
    assert!(a.starts_with("TST-"));

    api::deposit(&ctx, Some(&alice), &amount(&a, "100")).unwrap();
    api::withdraw(&ctx, Some(&alice), &amount(&a, "40")).unwrap();
    assert_eq!(api::get_balance(&ctx, Some(&alice), &a).unwrap().body.balance, "60.00");

    let a_log = ctx.ledger.transactions_for_account(&a).unwrap();
    assert_eq!(a_log.len(), 2);

    let receipt = api::transfer(
        &ctx,
        Some(&alice),
        &TransferRequest {
            from_account_number: a.clone(),
            to_account_number: b.clone(),
            amount: Decimal::from_str("50").unwrap(),
        },
    )
    .unwrap()
    .body;
    assert_eq!(receipt.from.transfer_id, receipt.to.transfer_id);
    assert_eq!(api::get_balance(&ctx, Some(&alice), &a).unwrap().body.balance, "10.00");
    assert_eq!(api::get_balance(&ctx, Some(&bob), &b).unwrap().body.balance, "50.00");
    assert_eq!(ctx.ledger.list_transactions().unwrap().len(), 4);
}

#[test]
fn test_failed_transfer_leaves_no_trace_on_duckdb() {
    let (_dir, ctx) = setup();
    let alice = signup(&ctx, "alice@bank.io");
    let a = open_account(&ctx, &alice);
    let b = open_account(&ctx, &alice);
    api::deposit(&ctx, Some(&alice), &amount(&a, "20")).unwrap();

    let err = api::transfer(
        &ctx,
        Some(&alice),
        &TransferRequest {
            from_account_number: a.clone(),
            to_account_number: b.clone(),
            amount: Decimal::from_str("20.01").unwrap(),
        },
    )
    .unwrap_err();
    assert_eq!(err.kind, "insufficient_funds");

    assert_eq!(ctx.ledger.find_by_number(&a).unwrap().balance, Decimal::new(2000, 2));
    assert!(ctx.ledger.find_by_number(&b).unwrap().balance.is_zero());
    assert_eq!(ctx.ledger.list_transactions().unwrap().len(), 1);
}

#[test]
fn test_sub_cent_and_non_positive_amounts_rejected() {
    let (_dir, ctx) = setup();
    let alice = signup(&ctx, "alice@bank.io");
    let a = open_account(&ctx, &alice);

    for raw in ["0", "-1", "0.001"] {
        let err = api::deposit(&ctx, Some(&alice), &amount(&a, raw)).unwrap_err();
        assert_eq!(err.kind, "invalid_amount", "amount {}", raw);
    }
    assert!(ctx.ledger.list_transactions().unwrap().is_empty());
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_ledger_and_sessions_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    write_settings(temp_dir.path());

    let (alice, a) = {
        let ctx = open_context(temp_dir.path());
        let alice = signup(&ctx, "alice@bank.io");
        let a = open_account(&ctx, &alice);
        api::deposit(&ctx, Some(&alice), &amount(&a, "12.34")).unwrap();
        (alice, a)
    };

    // Reopening runs no migration twice and keeps the data
    for _ in 0..3 {
        let ctx = open_context(temp_dir.path());
        assert_eq!(api::get_balance(&ctx, Some(&alice), &a).unwrap().body.balance, "12.34");
    }
}

#[test]
fn test_migrations_are_fully_applied() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = open_context(temp_dir.path());
    drop(ctx);

    let conn = duckdb::Connection::open(temp_dir.path().join("bankline.duckdb")).unwrap();
    assert!(MigrationService::new(&conn).get_pending().unwrap().is_empty());
}

#[test]
fn test_history_newest_first_on_duckdb() {
    let (_dir, ctx) = setup();
    let alice = signup(&ctx, "alice@bank.io");
    let a = open_account(&ctx, &alice);
    api::deposit(&ctx, Some(&alice), &amount(&a, "5")).unwrap();
    api::withdraw(&ctx, Some(&alice), &amount(&a, "1")).unwrap();
    api::deposit(&ctx, Some(&alice), &amount(&a, "2")).unwrap();

    let history = api::history(&ctx, Some(&alice), &HistoryQuery::default()).unwrap().body;
    let kinds: Vec<_> = history.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![TransactionKind::Deposit, TransactionKind::Withdrawal, TransactionKind::Deposit]
    );
    assert_eq!(history[0].amount, Decimal::new(200, 2));
}

// ============================================================================
// Users, status, doctor, logging
// ============================================================================

#[test]
fn test_admin_from_settings() {
    let (_dir, ctx) = setup();
    let ops = signup(&ctx, "ops@bank.io");
    let alice = signup(&ctx, "alice@bank.io");

    assert_eq!(api::list_users(&ctx, Some(&ops)).unwrap().body.len(), 2);
    assert_eq!(api::list_users(&ctx, Some(&alice)).unwrap_err().status, 403);
}

#[test]
fn test_status_and_doctor() {
    let (_dir, ctx) = setup();
    let alice = signup(&ctx, "alice@bank.io");
    let a = open_account(&ctx, &alice);
    let b = open_account(&ctx, &alice);
    api::deposit(&ctx, Some(&alice), &amount(&a, "30")).unwrap();
    api::transfer(
        &ctx,
        Some(&alice),
        &TransferRequest {
            from_account_number: a,
            to_account_number: b,
            amount: Decimal::from_str("10").unwrap(),
        },
    )
    .unwrap();

    let status = ctx.status_service.get_status().unwrap();
    assert_eq!(status.total_users, 1);
    assert_eq!(status.total_accounts, 2);
    assert_eq!(status.total_transactions, 3);
    assert_eq!(status.total_holdings, "30.00");

    assert!(ctx.doctor_service.run_checks().unwrap().is_healthy());
}

#[test]
fn test_event_log_never_contains_user_data() {
    let (_dir, ctx) = setup();
    let alice = signup(&ctx, "alice@bank.io");
    let a = open_account(&ctx, &alice);
    api::deposit(&ctx, Some(&alice), &amount(&a, "77.77")).unwrap();
    let _ = api::withdraw(&ctx, Some(&alice), &amount(&a, "1000")).unwrap_err();

    let logger = ctx.logger.as_ref().expect("logging enabled by default");
    let entries = logger.get_recent(100).unwrap();
    assert!(entries.iter().any(|e| e.event == "deposit"));
    assert!(entries.iter().any(|e| {
        e.event == "withdraw_failed" && e.error_kind.as_deref() == Some("insufficient_funds")
    }));

    let dump = serde_json::to_string(&entries).unwrap();
    for secret in ["alice@bank.io", a.as_str(), "77.77", PASSWORD, alice.as_str()] {
        assert!(!dump.contains(secret), "log leaked {}", secret);
    }
}
