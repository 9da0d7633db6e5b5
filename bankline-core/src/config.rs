//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "auth": { "sessionTtlMinutes": 60, "adminEmails": [], "argon2": { ... } },
//!   "accounts": { "numberPrefix": "ACC-" },
//!   "logging": { "enabled": true }
//! }
//! ```
//! Unknown keys are preserved when the file is saved.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};
use crate::domain::{Argon2Params, DEFAULT_NUMBER_PREFIX};

const SETTINGS_FILE: &str = "settings.json";

/// Default session lifetime in minutes
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 60;

/// Longest accepted session lifetime: one year
pub const MAX_SESSION_TTL_MINUTES: i64 = 60 * 24 * 365;

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    auth: AuthSettings,
    #[serde(default)]
    accounts: AccountSettings,
    #[serde(default)]
    logging: LoggingSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_ttl_minutes: Option<i64>,
    #[serde(default)]
    admin_emails: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    argon2: Option<Argon2Params>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    number_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoggingSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,
}

/// Bankline configuration (resolved view of settings)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub session_ttl_minutes: i64,
    /// Users registering with one of these emails become admins
    pub admin_emails: Vec<String>,
    pub argon2: Argon2Params,
    pub account_number_prefix: String,
    pub logging_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_ttl_minutes: DEFAULT_SESSION_TTL_MINUTES,
            admin_emails: Vec::new(),
            argon2: Argon2Params::default(),
            account_number_prefix: DEFAULT_NUMBER_PREFIX.to_string(),
            logging_enabled: true,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "1" | "yes" | "TRUE" | "YES" => Some(true),
        "false" | "0" | "no" | "FALSE" | "NO" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// Environment overrides:
    /// - BANKLINE_SESSION_TTL_MINUTES
    /// - BANKLINE_LOGGING (true/false)
    pub fn load(bankline_dir: &Path) -> Result<Self> {
        let raw = Self::read_settings(bankline_dir)?;
        let defaults = Config::default();

        let mut session_ttl_minutes = raw
            .auth
            .session_ttl_minutes
            .unwrap_or(defaults.session_ttl_minutes);
        if let Ok(value) = std::env::var("BANKLINE_SESSION_TTL_MINUTES") {
            session_ttl_minutes = value.trim().parse().map_err(|_| {
                Error::Config(format!("BANKLINE_SESSION_TTL_MINUTES is not a number: {}", value))
            })?;
        }
        if session_ttl_minutes <= 0 {
            return Err(Error::Config(
                "session lifetime must be at least one minute".to_string(),
            ));
        }
        if session_ttl_minutes > MAX_SESSION_TTL_MINUTES {
            return Err(Error::Config(format!(
                "session lifetime must be at most {} minutes, got {}",
                MAX_SESSION_TTL_MINUTES, session_ttl_minutes
            )));
        }

        let logging_enabled = std::env::var("BANKLINE_LOGGING")
            .ok()
            .and_then(|v| parse_bool(&v))
            .or(raw.logging.enabled)
            .unwrap_or(defaults.logging_enabled);

        let account_number_prefix = raw
            .accounts
            .number_prefix
            .unwrap_or(defaults.account_number_prefix);

        Ok(Self {
            session_ttl_minutes,
            admin_emails: raw
                .auth
                .admin_emails
                .iter()
                .map(|e| e.trim().to_lowercase())
                .collect(),
            argon2: raw.auth.argon2.unwrap_or(defaults.argon2),
            account_number_prefix,
            logging_enabled,
        })
    }

    /// Save config to the data directory, keeping keys we don't manage
    pub fn save(&self, bankline_dir: &Path) -> Result<()> {
        let mut settings = Self::read_settings(bankline_dir)?;

        settings.auth.session_ttl_minutes = Some(self.session_ttl_minutes);
        settings.auth.admin_emails = self.admin_emails.clone();
        settings.auth.argon2 = Some(self.argon2.clone());
        settings.accounts.number_prefix = Some(self.account_number_prefix.clone());
        settings.logging.enabled = Some(self.logging_enabled);

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(bankline_dir.join(SETTINGS_FILE), content)?;
        Ok(())
    }

    fn read_settings(bankline_dir: &Path) -> Result<SettingsFile> {
        let settings_path = bankline_dir.join(SETTINGS_FILE);
        if !settings_path.exists() {
            return Ok(SettingsFile::default());
        }
        let content = std::fs::read_to_string(&settings_path)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("invalid {}: {}", SETTINGS_FILE, e)))
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.account_number_prefix, "ACC-");
        assert_eq!(config.argon2, Argon2Params::default());
        assert!(config.admin_emails.is_empty());
    }

    #[test]
    fn test_load_settings_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{
                "auth": {
                    "adminEmails": [" Root@Bank.io "],
                    "argon2": {"timeCost": 1, "memoryCost": 1024, "parallelism": 1, "hashLen": 32}
                },
                "accounts": {"numberPrefix": "BNK-"},
                "theme": "dark"
            }"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.account_number_prefix, "BNK-");
        assert_eq!(config.argon2.memory_cost, 1024);
        assert!(config.is_admin_email("root@bank.io"));
        assert!(!config.is_admin_email("user@bank.io"));
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("settings.json"), r#"{"theme": "dark"}"#).unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        config.account_number_prefix = "X-".to_string();
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw["accounts"]["numberPrefix"], "X-");
    }

    #[test]
    fn test_invalid_settings_file_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("settings.json"), "{not json").unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_session_ttl_bounds() {
        let dir = tempdir().unwrap();
        let settings = dir.path().join("settings.json");

        std::fs::write(&settings, r#"{"auth": {"sessionTtlMinutes": 10000000000000}}"#).unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::Config(_))));

        std::fs::write(&settings, r#"{"auth": {"sessionTtlMinutes": 0}}"#).unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::Config(_))));

        let max = format!(r#"{{"auth": {{"sessionTtlMinutes": {}}}}}"#, MAX_SESSION_TTL_MINUTES);
        std::fs::write(&settings, max).unwrap();
        assert_eq!(
            Config::load(dir.path()).unwrap().session_ttl_minutes,
            MAX_SESSION_TTL_MINUTES
        );
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
