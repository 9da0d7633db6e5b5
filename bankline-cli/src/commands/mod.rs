//! CLI command implementations

pub mod account;
pub mod doctor;
pub mod history;
pub mod logs;
pub mod money;
pub mod status;
pub mod user;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use bankline_core::api::ErrorBody;
use bankline_core::{BanklineContext, EntryPoint};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const SESSION_FILE: &str = "session.json";

/// Get the bankline directory from environment or default
pub fn get_bankline_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("BANKLINE_DIR") {
        PathBuf::from(dir)
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".bankline")
    }
}

/// Open the bankline context, creating the data directory if needed
pub fn get_context() -> Result<BanklineContext> {
    let bankline_dir = get_bankline_dir();
    BanklineContext::new(&bankline_dir, EntryPoint::Cli)
        .with_context(|| format!("Failed to open bankline data in {:?}", bankline_dir))
}

/// Login state kept between invocations. Holds the bearer token itself;
/// the ledger database only ever sees its digest.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSession {
    pub token: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

fn session_path() -> PathBuf {
    get_bankline_dir().join(SESSION_FILE)
}

pub fn save_session(session: &SavedSession) -> Result<()> {
    let path = session_path();
    std::fs::write(&path, serde_json::to_string_pretty(session)?)
        .with_context(|| format!("Failed to write {:?}", path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

pub fn load_session() -> Result<Option<SavedSession>> {
    let path = session_path();
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)?;
    let session = serde_json::from_str(&content)
        .context("Corrupt session file, run `bl user logout`")?;
    Ok(Some(session))
}

pub fn clear_session() -> Result<()> {
    let path = session_path();
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

/// `Authorization` header value for the current login
///
/// BANKLINE_TOKEN takes precedence over the saved session.
pub fn auth_header() -> Result<Option<String>> {
    if let Ok(token) = std::env::var("BANKLINE_TOKEN") {
        return Ok(Some(format!("Bearer {}", token)));
    }
    Ok(load_session()?.map(|s| format!("Bearer {}", s.token)))
}

/// Convert a handler error body into a CLI error
pub fn api_error(err: ErrorBody) -> anyhow::Error {
    match err.kind.as_str() {
        "unauthorized" => anyhow!("{} (run `bl user login`)", err.message),
        _ => anyhow!("{} [{}]", err.message, err.kind),
    }
}

/// Parse a user-supplied amount like `12.50`
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim()).with_context(|| format!("Not a valid amount: {}", raw))
}
