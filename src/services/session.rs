//! Session token management.
//!
//! Sessions are opaque 32-byte hex tokens stored in `sessions` with an
//! expiry. The token travels in the `session_token` cookie; validation
//! joins to `users` so every request sees the current role.

use std::fmt::Write;
use std::time::Duration;

use rand::Rng;
use sqlx::{PgPool, Row};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::auth::Role;

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Generate a cryptographically random 32-byte hex token.
#[must_use]
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// User row returned from session validation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub username: String,
    pub name: Option<String>,
    pub role: Role,
}

impl SessionUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Create a session for the given user, returning the token.
pub async fn create_session(pool: &PgPool, user_id: Uuid, ttl_hours: i64) -> Result<String, sqlx::Error> {
    let token = generate_token();
    sqlx::query(
        "INSERT INTO sessions (token, user_id, expires_at)
         VALUES ($1, $2, now() + make_interval(hours => $3::int))",
    )
    .bind(&token)
    .bind(user_id)
    .bind(ttl_hours)
    .execute(pool)
    .await?;
    Ok(token)
}

/// Validate a session token and return the associated user.
pub async fn validate_session(pool: &PgPool, token: &str) -> Result<Option<SessionUser>, sqlx::Error> {
    let row = sqlx::query(
        r"SELECT u.id, u.username, u.name, u.role
          FROM sessions s
          JOIN users u ON u.id = s.user_id
          WHERE s.token = $1 AND s.expires_at > now()",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| SessionUser {
        id: r.get("id"),
        username: r.get("username"),
        name: r.get("name"),
        role: Role::parse(r.get::<&str, _>("role")).unwrap_or(Role::Member),
    }))
}

/// Delete a session by token.
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(())
}

/// Drop expired sessions. Returns how many were removed.
pub async fn purge_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= now()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Periodically drop expired sessions.
pub fn spawn_session_sweeper(pool: PgPool, every: Duration) -> JoinHandle<()> {
    info!(interval_secs = every.as_secs(), "session sweeper configured");
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(every).await;
            match purge_expired(&pool).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "purged expired sessions"),
                Err(error) => warn!(%error, "session purge failed"),
            }
        }
    })
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
