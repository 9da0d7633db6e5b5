//! User service - registration, login and session tokens
//!
//! Passwords are stretched with Argon2id and stored as PHC strings.
//! Session tokens are random and opaque; only their SHA-256 digest is stored.

use std::sync::Arc;

use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Version};
use chrono::Utc;
use rand::rngs::OsRng;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::domain::result::{Error, Result};
use crate::domain::{Argon2Params, PasswordCredential, Role, Session, User, UserProfile};
use crate::ports::UserStore;

const MIN_PASSWORD_LEN: usize = 8;
const TOKEN_LEN: usize = 32;
const INVALID_LOGIN: &str = "invalid email or password";

/// Issued on successful login
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginToken {
    pub token: String,
    pub expires_at: chrono::DateTime<Utc>,
    pub user: UserProfile,
}

/// Service for user accounts and sessions
pub struct UserService {
    store: Arc<dyn UserStore>,
    config: Config,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, config: Config) -> Self {
        Self { store, config }
    }

    /// Register a new user
    ///
    /// Emails listed in `auth.adminEmails` receive the admin role.
    pub fn register(&self, email: &str, password: &str) -> Result<UserProfile> {
        User::validate_email(email).map_err(Error::validation)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.store.find_user_by_email(email)?.is_some() {
            return Err(Error::Conflict("email already registered".to_string()));
        }

        let credential = hash_password(password, &self.config.argon2)?;
        let mut user = User::new(email, credential);
        if self.config.is_admin_email(&user.email) {
            user.role = Role::Admin;
        }
        self.store.save_user(&user)?;
        Ok(UserProfile::from(&user))
    }

    /// Exchange credentials for a session token
    ///
    /// Unknown email and wrong password fail identically.
    pub fn login(&self, email: &str, password: &str) -> Result<LoginToken> {
        let user = self
            .store
            .find_user_by_email(email)?
            .ok_or_else(|| Error::unauthorized(INVALID_LOGIN))?;
        if !verify_password(password, &user.credential)? {
            return Err(Error::unauthorized(INVALID_LOGIN));
        }

        let token_bytes: [u8; TOKEN_LEN] = rand::thread_rng().gen();
        let token = hex::encode(token_bytes);
        let session = Session::new(
            token_digest(&token),
            user.id,
            self.config.session_ttl_minutes,
        )?;
        self.store.save_session(&session)?;

        Ok(LoginToken {
            token,
            expires_at: session.expires_at,
            user: UserProfile::from(&user),
        })
    }

    /// Resolve a bearer token to its user
    pub fn authenticate(&self, token: &str) -> Result<User> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::unauthorized("missing token"));
        }
        let digest = token_digest(token);
        let session = self
            .store
            .find_session(&digest)?
            .ok_or_else(|| Error::unauthorized("invalid token"))?;
        if session.is_expired(Utc::now()) {
            self.store.delete_session(&digest)?;
            return Err(Error::unauthorized("session expired"));
        }
        self.store
            .find_user_by_id(session.user_id)?
            .ok_or_else(|| Error::unauthorized("invalid token"))
    }

    /// Invalidate a token. Returns false if it was not active.
    pub fn logout(&self, token: &str) -> Result<bool> {
        self.store.delete_session(&token_digest(token.trim()))
    }

    /// All users; admins only
    pub fn list_users(&self, requesting: &User) -> Result<Vec<UserProfile>> {
        if !requesting.is_admin() {
            return Err(Error::forbidden("admin role required"));
        }
        Ok(self.store.list_users()?.iter().map(UserProfile::from).collect())
    }
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn hasher(params: &Argon2Params) -> Result<Argon2<'static>> {
    let argon2_params = argon2::Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(params.hash_len as usize),
    )
    .map_err(|e| Error::Config(format!("invalid argon2 params: {}", e)))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params))
}

fn hash_password(password: &str, params: &Argon2Params) -> Result<PasswordCredential> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher(params)?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Config(format!("password hashing failed: {}", e)))?;
    Ok(PasswordCredential::new(hash.to_string()))
}

/// Check a password against a stored hash, using the parameters kept in it
fn verify_password(password: &str, credential: &PasswordCredential) -> Result<bool> {
    let parsed = PasswordHash::new(&credential.phc)
        .map_err(|e| Error::database(format!("corrupt password hash: {}", e)))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(Error::database(format!("password check failed: {}", e))),
    }
}
