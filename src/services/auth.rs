//! Username/password authentication and roles.
//!
//! Passwords are stored as `pbkdf2$<iterations>$<salt hex>$<hash hex>` using
//! PBKDF2-HMAC-SHA256 with a random 16-byte salt. The iteration count is
//! part of the stored string, so it can be raised without invalidating
//! existing hashes.

use axum::http::StatusCode;
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::services::session::bytes_to_hex;

const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Member,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Member => "MEMBER",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ADMIN" => Some(Self::Admin),
            "MEMBER" => Some(Self::Member),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("username is required")]
    UsernameRequired,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("username already taken")]
    UsernameTaken,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::UsernameRequired => "username_required",
            Self::WeakPassword => "weak_password",
            Self::UsernameTaken => "username_taken",
            Self::Database(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::UsernameRequired | Self::WeakPassword => StatusCode::BAD_REQUEST,
            Self::UsernameTaken => StatusCode::CONFLICT,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// =============================================================================
// PASSWORDS
// =============================================================================

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LEN] {
    let mut key = [0u8; HASH_LEN];
    // Output length is fixed and valid for HMAC-SHA256.
    let _ = pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, iterations, &mut key);
    key
}

fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Hash a password for storage.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_LEN] = rand::rng().random();
    let key = derive(password, &salt, PBKDF2_ITERATIONS);
    format!("pbkdf2${PBKDF2_ITERATIONS}${}${}", bytes_to_hex(&salt), bytes_to_hex(&key))
}

/// Check a password against a stored hash. Malformed hashes never verify.
#[must_use]
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some("pbkdf2"), Some(iterations), Some(salt), Some(hash), None) =
        (parts.next(), parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let (Ok(iterations), Some(salt), Some(expected)) =
        (iterations.parse::<u32>(), hex_to_bytes(salt), hex_to_bytes(hash))
    else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    constant_time_eq(&derive(password, &salt, iterations), &expected)
}

// =============================================================================
// USERS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub id: Uuid,
    pub username: String,
    pub name: Option<String>,
    pub role: Role,
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> UserRow {
    UserRow {
        id: row.get("id"),
        username: row.get("username"),
        name: row.get("name"),
        role: Role::parse(row.get::<&str, _>("role")).unwrap_or(Role::Member),
    }
}

/// Create a user with a hashed password.
///
/// # Errors
///
/// Returns a validation error for a blank username or short password,
/// [`AuthError::UsernameTaken`] on a duplicate, or a database error.
pub async fn create_user(
    pool: &PgPool,
    username: &str,
    name: Option<&str>,
    password: &str,
    role: Role,
) -> Result<UserRow, AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::UsernameRequired);
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }

    let row = sqlx::query(
        "INSERT INTO users (username, name, password_hash, role)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (username) DO NOTHING
         RETURNING id, username, name, role",
    )
    .bind(username)
    .bind(name)
    .bind(hash_password(password))
    .bind(role.as_str())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(user_from_row).ok_or(AuthError::UsernameTaken)
}

/// Look up a user by username.
pub async fn find_user_by_username(pool: &PgPool, username: &str) -> Result<Option<UserRow>, sqlx::Error> {
    let row = sqlx::query("SELECT id, username, name, role FROM users WHERE username = $1")
        .bind(username.trim())
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(user_from_row))
}

/// Check credentials and return the user.
///
/// # Errors
///
/// Returns [`AuthError::InvalidCredentials`] for an unknown user or wrong
/// password; both look the same to the caller.
pub async fn login(pool: &PgPool, username: &str, password: &str) -> Result<UserRow, AuthError> {
    let row = sqlx::query("SELECT id, username, name, role, password_hash FROM users WHERE username = $1")
        .bind(username.trim())
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Err(AuthError::InvalidCredentials);
    };
    let stored: String = row.get("password_hash");
    if !verify_password(password, &stored) {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(user_from_row(&row))
}

/// Create the configured admin if the username is free. Existing accounts
/// are left alone, including their password.
///
/// # Errors
///
/// Returns an error if the insert fails for a reason other than a taken
/// username.
pub async fn bootstrap_admin(pool: &PgPool, username: &str, password: &str) -> Result<bool, AuthError> {
    match create_user(pool, username, None, password, Role::Admin).await {
        Ok(user) => {
            tracing::info!(user_id = %user.id, username = %user.username, "bootstrapped admin account");
            Ok(true)
        }
        Err(AuthError::UsernameTaken) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
