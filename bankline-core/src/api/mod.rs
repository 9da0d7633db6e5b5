//! Request handlers
//!
//! Transport-agnostic handler functions. A caller (HTTP server, CLI, test)
//! passes the raw `Authorization` header value and a deserialized body, and
//! gets back either a status-coded response or an [`ErrorBody`].

pub mod handlers;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::result::Error;
use crate::domain::Account;

pub use handlers::*;

/// Successful handler output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub body: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(body: T) -> Self {
        Self { status: 200, body }
    }

    pub fn created(body: T) -> Self {
        Self { status: 201, body }
    }
}

/// Error body returned for any failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    /// Stable snake_case kind, e.g. `insufficient_funds`
    pub kind: String,
    pub message: String,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        // Internal failures are not described to callers
        let message = if err.status_code() >= 500 {
            "internal error".to_string()
        } else {
            err.to_string()
        };
        Self {
            status: err.status_code(),
            kind: err.kind().to_string(),
            message,
        }
    }
}

pub type HandlerResult<T> = std::result::Result<ApiResponse<T>, ErrorBody>;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of deposit and withdraw requests
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountRequest {
    pub account_number: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from_account_number: String,
    pub to_account_number: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    /// Restrict to one owned account
    pub account_number: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub account_number: String,
    pub balance: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            account_number: account.number.clone(),
            balance: account.formatted_balance(),
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoutResponse {
    pub revoked: bool,
}
