//! Handler functions
//!
//! Protected handlers run [`authorize`] first, then the ownership check,
//! then the core operation. Outcomes are logged by event name and error
//! kind only.

use crate::domain::result::{Error, Result};
use crate::domain::{BalanceView, Transaction, User, UserProfile};
use crate::services::{LogEvent, LoginToken, Movement, TransferReceipt};
use crate::BanklineContext;

use super::{
    AccountSummary, AmountRequest, ApiResponse, ErrorBody, HandlerResult, HistoryQuery,
    LoginRequest, LogoutResponse, RegisterRequest, TransferRequest,
};

/// Resolve an `Authorization` header value to the calling user
pub fn authorize(ctx: &BanklineContext, authorization: Option<&str>) -> Result<User> {
    let token = bearer_token(authorization)?;
    ctx.user_service.authenticate(token)
}

fn bearer_token(authorization: Option<&str>) -> Result<&str> {
    let header = authorization
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| Error::unauthorized("missing Authorization header"))?;
    match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => {
            let token = token.trim();
            if token.is_empty() {
                return Err(Error::unauthorized("expected a Bearer token"));
            }
            Ok(token)
        }
        _ => Err(Error::unauthorized("expected a Bearer token")),
    }
}

/// Log the outcome and convert errors into response bodies
fn respond<T>(
    ctx: &BanklineContext,
    event: &str,
    result: Result<T>,
    wrap: fn(T) -> ApiResponse<T>,
) -> HandlerResult<T> {
    match result {
        Ok(body) => {
            ctx.log(LogEvent::new(event));
            Ok(wrap(body))
        }
        Err(err) => {
            // Domain messages can name accounts, so only 5xx text is kept
            let message = if err.status_code() >= 500 {
                err.to_string()
            } else {
                err.kind().to_string()
            };
            ctx.log(LogEvent::new(format!("{}_failed", event)).with_error(err.kind(), message));
            Err(ErrorBody::from(&err))
        }
    }
}

pub fn register(ctx: &BanklineContext, req: &RegisterRequest) -> HandlerResult<UserProfile> {
    let result = ctx.user_service.register(&req.email, &req.password);
    respond(ctx, "register", result, ApiResponse::created)
}

pub fn login(ctx: &BanklineContext, req: &LoginRequest) -> HandlerResult<LoginToken> {
    let result = ctx.user_service.login(&req.email, &req.password);
    respond(ctx, "login", result, ApiResponse::ok)
}

pub fn logout(ctx: &BanklineContext, authorization: Option<&str>) -> HandlerResult<LogoutResponse> {
    let result = bearer_token(authorization)
        .and_then(|token| ctx.user_service.logout(token))
        .map(|revoked| LogoutResponse { revoked });
    respond(ctx, "logout", result, ApiResponse::ok)
}

pub fn me(ctx: &BanklineContext, authorization: Option<&str>) -> HandlerResult<UserProfile> {
    let result = authorize(ctx, authorization).map(|user| UserProfile::from(&user));
    respond(ctx, "me", result, ApiResponse::ok)
}

pub fn list_users(
    ctx: &BanklineContext,
    authorization: Option<&str>,
) -> HandlerResult<Vec<UserProfile>> {
    let result = authorize(ctx, authorization).and_then(|user| ctx.user_service.list_users(&user));
    respond(ctx, "list_users", result, ApiResponse::ok)
}

pub fn create_account(
    ctx: &BanklineContext,
    authorization: Option<&str>,
) -> HandlerResult<AccountSummary> {
    let result = authorize(ctx, authorization)
        .and_then(|user| ctx.account_service.open_account(&user))
        .map(|account| AccountSummary::from(&account));
    respond(ctx, "create_account", result, ApiResponse::created)
}

pub fn list_accounts(
    ctx: &BanklineContext,
    authorization: Option<&str>,
) -> HandlerResult<Vec<AccountSummary>> {
    let result = authorize(ctx, authorization)
        .and_then(|user| ctx.account_service.accounts_for(&user))
        .map(|accounts| accounts.iter().map(AccountSummary::from).collect());
    respond(ctx, "list_accounts", result, ApiResponse::ok)
}

pub fn get_balance(
    ctx: &BanklineContext,
    authorization: Option<&str>,
    account_number: &str,
) -> HandlerResult<BalanceView> {
    let result = authorize(ctx, authorization)
        .and_then(|user| ctx.account_service.find_owned(account_number, &user))
        .map(|account| BalanceView::from(&account));
    respond(ctx, "get_balance", result, ApiResponse::ok)
}

/// Deposits into any existing account are allowed
pub fn deposit(
    ctx: &BanklineContext,
    authorization: Option<&str>,
    req: &AmountRequest,
) -> HandlerResult<Movement> {
    let result = authorize(ctx, authorization)
        .and_then(|_| ctx.transfer_engine.deposit(&req.account_number, req.amount));
    respond(ctx, "deposit", result, ApiResponse::ok)
}

pub fn withdraw(
    ctx: &BanklineContext,
    authorization: Option<&str>,
    req: &AmountRequest,
) -> HandlerResult<Movement> {
    let result = authorize(ctx, authorization).and_then(|user| {
        ctx.account_service.find_owned(&req.account_number, &user)?;
        ctx.transfer_engine.withdraw(&req.account_number, req.amount)
    });
    respond(ctx, "withdraw", result, ApiResponse::ok)
}

pub fn transfer(
    ctx: &BanklineContext,
    authorization: Option<&str>,
    req: &TransferRequest,
) -> HandlerResult<TransferReceipt> {
    let result = authorize(ctx, authorization).and_then(|user| {
        ctx.account_service.find_owned(&req.from_account_number, &user)?;
        ctx.transfer_engine
            .transfer(&req.from_account_number, &req.to_account_number, req.amount)
    });
    respond(ctx, "transfer", result, ApiResponse::ok)
}

/// Caller's history, or one owned account's history when a number is given
pub fn history(
    ctx: &BanklineContext,
    authorization: Option<&str>,
    query: &HistoryQuery,
) -> HandlerResult<Vec<Transaction>> {
    let result = authorize(ctx, authorization).and_then(|user| match &query.account_number {
        Some(number) => {
            ctx.account_service.find_owned(number, &user)?;
            ctx.history_service.for_account(number, query.limit)
        }
        None => ctx.history_service.for_user(user.id, query.limit),
    });
    respond(ctx, "history", result, ApiResponse::ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::Argon2Params;
    use rust_decimal::Decimal;

    fn config() -> Config {
        Config {
            admin_emails: vec!["root@bank.io".to_string()],
            argon2: Argon2Params {
                time_cost: 1,
                memory_cost: 1024,
                parallelism: 1,
                hash_len: 32,
            },
            ..Config::default()
        }
    }

    fn context() -> BanklineContext {
        BanklineContext::in_memory(config())
    }

    fn signup(ctx: &BanklineContext, email: &str) -> String {
        register(
            ctx,
            &RegisterRequest {
                email: email.to_string(),
                password: "password123".to_string(),
            },
        )
        .unwrap();
        let token = login(
            ctx,
            &LoginRequest {
                email: email.to_string(),
                password: "password123".to_string(),
            },
        )
        .unwrap()
        .body
        .token;
        format!("Bearer {}", token)
    }

    fn open(ctx: &BanklineContext, auth: &str) -> String {
        create_account(ctx, Some(auth)).unwrap().body.account_number
    }

    fn amount(number: &str, value: i64) -> AmountRequest {
        AmountRequest {
            account_number: number.to_string(),
            amount: Decimal::new(value, 0),
        }
    }

    #[test]
    fn test_auth_step_runs_first() {
        let ctx = context();
        for header in [None, Some(""), Some("Basic abc"), Some("Bearer "), Some("Bearer nope")] {
            let err = me(&ctx, header).unwrap_err();
            assert_eq!(err.status, 401);
            assert_eq!(err.kind, "unauthorized");
        }
        let err = deposit(&ctx, None, &amount("ACC-1", 0)).unwrap_err();
        assert_eq!(err.kind, "unauthorized");
    }

    #[test]
    fn test_login_with_unrepresentable_session_expiry_fails_cleanly() {
        let ctx = BanklineContext::in_memory(Config {
            session_ttl_minutes: 10_000_000_000_000,
            ..config()
        });
        let request = RegisterRequest {
            email: "a@b.io".to_string(),
            password: "password123".to_string(),
        };
        register(&ctx, &request).unwrap();

        let err = login(
            &ctx,
            &LoginRequest {
                email: request.email.clone(),
                password: request.password.clone(),
            },
        )
        .unwrap_err();
        assert_eq!(err.status, 500);
        assert_eq!(err.kind, "config");
    }

    #[test]
    fn test_register_returns_created() {
        let ctx = context();
        let response = register(
            &ctx,
            &RegisterRequest {
                email: "a@b.io".to_string(),
                password: "password123".to_string(),
            },
        )
        .unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.body.email, "a@b.io");
    }

    #[test]
    fn test_full_money_flow() {
        let ctx = context();
        let alice = signup(&ctx, "alice@bank.io");
        let bob = signup(&ctx, "bob@bank.io");
        let a = open(&ctx, &alice);
        let b = open(&ctx, &bob);

        let dep = deposit(&ctx, Some(&alice), &amount(&a, 100)).unwrap();
        assert_eq!(dep.body.balance.balance, "100.00");

        let wd = withdraw(&ctx, Some(&alice), &amount(&a, 40)).unwrap();
        assert_eq!(wd.body.balance.balance, "60.00");

        let receipt = transfer(
            &ctx,
            Some(&alice),
            &TransferRequest {
                from_account_number: a.clone(),
                to_account_number: b.clone(),
                amount: Decimal::new(50, 0),
            },
        )
        .unwrap();
        assert_eq!(receipt.body.from.account_number, a);

        assert_eq!(get_balance(&ctx, Some(&alice), &a).unwrap().body.balance, "10.00");
        assert_eq!(get_balance(&ctx, Some(&bob), &b).unwrap().body.balance, "50.00");

        let alice_history = history(&ctx, Some(&alice), &HistoryQuery::default()).unwrap();
        assert_eq!(alice_history.body.len(), 3);
        let bob_history = history(&ctx, Some(&bob), &HistoryQuery::default()).unwrap();
        assert_eq!(bob_history.body.len(), 1);
    }

    #[test]
    fn test_ownership_rules() {
        let ctx = context();
        let alice = signup(&ctx, "alice@bank.io");
        let mallory = signup(&ctx, "mallory@bank.io");
        let admin = signup(&ctx, "root@bank.io");
        let a = open(&ctx, &alice);
        let m = open(&ctx, &mallory);

        // Anyone may deposit into an existing account
        deposit(&ctx, Some(&mallory), &amount(&a, 20)).unwrap();

        assert_eq!(withdraw(&ctx, Some(&mallory), &amount(&a, 5)).unwrap_err().status, 403);
        assert_eq!(get_balance(&ctx, Some(&mallory), &a).unwrap_err().status, 403);
        let err = transfer(
            &ctx,
            Some(&mallory),
            &TransferRequest {
                from_account_number: a.clone(),
                to_account_number: m,
                amount: Decimal::new(5, 0),
            },
        )
        .unwrap_err();
        assert_eq!(err.kind, "forbidden");
        let query = HistoryQuery {
            account_number: Some(a.clone()),
            limit: None,
        };
        assert_eq!(history(&ctx, Some(&mallory), &query).unwrap_err().status, 403);

        assert_eq!(get_balance(&ctx, Some(&admin), &a).unwrap().body.balance, "20.00");
        assert_eq!(list_users(&ctx, Some(&admin)).unwrap().body.len(), 3);
        assert_eq!(list_users(&ctx, Some(&alice)).unwrap_err().status, 403);
    }

    #[test]
    fn test_ledger_errors_map_to_statuses() {
        let ctx = context();
        let alice = signup(&ctx, "alice@bank.io");
        let a = open(&ctx, &alice);

        let err = deposit(&ctx, Some(&alice), &amount(&a, -5)).unwrap_err();
        assert_eq!((err.status, err.kind.as_str()), (400, "invalid_amount"));

        let err = withdraw(&ctx, Some(&alice), &amount(&a, 1)).unwrap_err();
        assert_eq!((err.status, err.kind.as_str()), (422, "insufficient_funds"));

        let err = deposit(&ctx, Some(&alice), &amount("ACC-missing", 1)).unwrap_err();
        assert_eq!((err.status, err.kind.as_str()), (404, "not_found"));

        let err = transfer(
            &ctx,
            Some(&alice),
            &TransferRequest {
                from_account_number: a.clone(),
                to_account_number: a,
                amount: Decimal::new(1, 0),
            },
        )
        .unwrap_err();
        assert_eq!((err.status, err.kind.as_str()), (400, "same_account_transfer"));
    }

    #[test]
    fn test_logout_revokes_token() {
        let ctx = context();
        let alice = signup(&ctx, "alice@bank.io");
        assert!(logout(&ctx, Some(&alice)).unwrap().body.revoked);
        assert_eq!(me(&ctx, Some(&alice)).unwrap_err().status, 401);
    }
}
