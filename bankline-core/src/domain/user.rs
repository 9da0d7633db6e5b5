//! User and session domain models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::credentials::PasswordCredential;
use super::result::Error;

/// Role of a registered user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(Error::validation(format!("unknown role: {}", other))),
        }
    }
}

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub credential: PasswordCredential,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, credential: PasswordCredential) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: Self::normalize_email(&email.into()),
            credential,
            role: Role::User,
            created_at: Utc::now(),
        }
    }

    /// Emails are compared case-insensitively
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Minimal shape check: one `@` with text on both sides and a dot in the domain
    pub fn validate_email(email: &str) -> Result<(), &'static str> {
        let email = email.trim();
        if email.is_empty() {
            return Err("email cannot be empty");
        }
        match email.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && domain.contains('.') && !domain.contains('@') =>
            {
                Ok(())
            }
            _ => Err("email is not valid"),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Public profile of a user, without credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// A login session. Only the hash of the bearer token is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token_hash: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Start a session that expires `ttl_minutes` from now
    ///
    /// Fails with `Config` if the expiry is not a representable time.
    pub fn new(
        token_hash: impl Into<String>,
        user_id: Uuid,
        ttl_minutes: i64,
    ) -> Result<Self, Error> {
        let now = Utc::now();
        let expires_at = Duration::try_minutes(ttl_minutes)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| {
                Error::Config(format!("session lifetime out of range: {} minutes", ttl_minutes))
            })?;
        Ok(Self {
            token_hash: token_hash.into(),
            user_id,
            created_at: now,
            expires_at,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
