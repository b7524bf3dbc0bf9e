//! Moodboard service.
//!
//! A step always has an implicit first board, the unassigned bucket, shown
//! as "Concept 1". Named moodboards are numbered after it, so the board at
//! `order_index` n is created as "Concept {n + 2}".

use std::collections::HashMap;

use axum::http::StatusCode;
use canvas::doc::PlacedAsset;
use serde::Serialize;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::services::asset;

#[derive(Debug, thiserror::Error)]
pub enum MoodboardError {
    #[error("step not found: {0}")]
    StepNotFound(Uuid),
    #[error("moodboard not found: {0}")]
    NotFound(Uuid),
    #[error("moodboard name is required")]
    NameRequired,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for MoodboardError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::StepNotFound(_) | Self::NotFound(_) => "not_found",
            Self::NameRequired => "name_required",
            Self::Database(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::StepNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::NameRequired => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodboardRow {
    pub id: Uuid,
    pub step_id: Uuid,
    pub name: String,
    pub content: Option<String>,
    pub order: i32,
    pub locked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MoodboardWithAssets {
    #[serde(flatten)]
    pub board: MoodboardRow,
    pub assets: Vec<PlacedAsset>,
}

/// Sparse moodboard update.
#[derive(Debug, Clone, Default)]
pub struct MoodboardChanges {
    pub name: Option<String>,
    pub content: Option<String>,
    pub locked: Option<bool>,
}

/// Display name of the board created at `order`.
#[must_use]
pub fn concept_name(order: i32) -> String {
    format!("Concept {}", order.saturating_add(2))
}

const MOODBOARD_COLUMNS: &str = "id, step_id, name, content, order_index, locked";

fn moodboard_from_row(row: &sqlx::postgres::PgRow) -> MoodboardRow {
    MoodboardRow {
        id: row.get("id"),
        step_id: row.get("step_id"),
        name: row.get("name"),
        content: row.get("content"),
        order: row.get("order_index"),
        locked: row.get("locked"),
    }
}

/// Named moodboards of a step in order, each with its images newest first.
///
/// # Errors
///
/// Returns a database error if a query fails.
pub async fn list_moodboards(pool: &PgPool, step_id: Uuid) -> Result<Vec<MoodboardWithAssets>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {MOODBOARD_COLUMNS} FROM moodboards WHERE step_id = $1 ORDER BY order_index ASC"
    ))
    .bind(step_id)
    .fetch_all(pool)
    .await?;

    let mut by_board: HashMap<Uuid, Vec<PlacedAsset>> = HashMap::new();
    for (moodboard_id, placed) in asset::list_step_images(pool, step_id).await? {
        if let Some(moodboard_id) = moodboard_id {
            by_board.entry(moodboard_id).or_default().push(placed);
        }
    }

    Ok(rows
        .iter()
        .map(moodboard_from_row)
        .map(|board| {
            let assets = by_board.remove(&board.id).unwrap_or_default();
            MoodboardWithAssets { board, assets }
        })
        .collect())
}

/// Append a new, empty moodboard to a step.
///
/// # Errors
///
/// Returns [`MoodboardError::StepNotFound`] or a database error.
pub async fn create_moodboard(pool: &PgPool, step_id: Uuid) -> Result<MoodboardRow, MoodboardError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM steps WHERE id = $1)")
        .bind(step_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(MoodboardError::StepNotFound(step_id));
    }

    let max_order: Option<i32> = sqlx::query_scalar("SELECT MAX(order_index) FROM moodboards WHERE step_id = $1")
        .bind(step_id)
        .fetch_one(pool)
        .await?;
    let order = max_order.map_or(0, |m| m.saturating_add(1));

    let row = sqlx::query(&format!(
        "INSERT INTO moodboards (step_id, name, order_index) VALUES ($1, $2, $3) RETURNING {MOODBOARD_COLUMNS}"
    ))
    .bind(step_id)
    .bind(concept_name(order))
    .bind(order)
    .fetch_one(pool)
    .await?;

    let board = moodboard_from_row(&row);
    info!(%step_id, moodboard_id = %board.id, name = %board.name, "moodboard created");
    Ok(board)
}

/// Rename, re-describe, or lock/unlock a moodboard on `step_id`.
///
/// # Errors
///
/// Returns [`MoodboardError::NameRequired`] for a blank name,
/// [`MoodboardError::NotFound`], or a database error.
pub async fn update_moodboard(
    pool: &PgPool,
    step_id: Uuid,
    moodboard_id: Uuid,
    changes: MoodboardChanges,
) -> Result<MoodboardRow, MoodboardError> {
    let name = match changes.name.as_deref().map(str::trim) {
        Some("") => return Err(MoodboardError::NameRequired),
        other => other,
    };

    let row = sqlx::query(&format!(
        "UPDATE moodboards SET
            name = COALESCE($3, name),
            content = COALESCE($4, content),
            locked = COALESCE($5, locked),
            updated_at = now()
         WHERE id = $1 AND step_id = $2
         RETURNING {MOODBOARD_COLUMNS}"
    ))
    .bind(moodboard_id)
    .bind(step_id)
    .bind(name)
    .bind(changes.content.as_deref())
    .bind(changes.locked)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(moodboard_from_row).ok_or(MoodboardError::NotFound(moodboard_id))
}

/// Delete a moodboard and its assets. Returns the blob keys of the removed
/// assets; the caller deletes those after the rows are gone.
///
/// # Errors
///
/// Returns [`MoodboardError::NotFound`] or a database error.
pub async fn delete_moodboard(pool: &PgPool, step_id: Uuid, moodboard_id: Uuid) -> Result<Vec<String>, MoodboardError> {
    let mut tx = pool.begin().await?;
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM moodboards WHERE id = $1 AND step_id = $2)")
        .bind(moodboard_id)
        .bind(step_id)
        .fetch_one(tx.as_mut())
        .await?;
    if !exists {
        return Err(MoodboardError::NotFound(moodboard_id));
    }

    let keys: Vec<String> = sqlx::query_scalar("DELETE FROM assets WHERE moodboard_id = $1 RETURNING blob_key")
        .bind(moodboard_id)
        .fetch_all(tx.as_mut())
        .await?;
    sqlx::query("DELETE FROM moodboards WHERE id = $1")
        .bind(moodboard_id)
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;

    info!(%step_id, %moodboard_id, assets = keys.len(), "moodboard deleted");
    Ok(keys)
}

#[cfg(test)]
#[path = "moodboard_test.rs"]
mod tests;
