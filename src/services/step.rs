//! Step service: ordered steps of a project and the full step read view.
//!
//! DESIGN
//! ======
//! Step order is a dense 1-based sequence per project. Create appends,
//! delete closes the gap, move swaps with the adjacent step. Moving past
//! either end is a no-op, not an error.

use axum::http::StatusCode;
use canvas::doc::PlacedAsset;
use serde::Serialize;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::services::asset::{self, FileAsset};
use crate::services::comment::{self, CommentRow};
use crate::services::moodboard::{self, MoodboardWithAssets};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("project not found: {0}")]
    ProjectNotFound(Uuid),
    #[error("step not found: {0}")]
    NotFound(Uuid),
    #[error("step title is required")]
    TitleRequired,
    #[error("invalid direction: {0}")]
    InvalidDirection(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for StepError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ProjectNotFound(_) | Self::NotFound(_) => "not_found",
            Self::TitleRequired => "title_required",
            Self::InvalidDirection(_) => "invalid_direction",
            Self::Database(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::ProjectNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::TitleRequired | Self::InvalidDirection(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Parse `up` / `down`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::InvalidDirection`] for anything else.
    pub fn parse(raw: &str) -> Result<Self, StepError> {
        match raw.trim() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            _ => Err(StepError::InvalidDirection(raw.to_owned())),
        }
    }

    /// Order index of the neighbor to swap with.
    #[must_use]
    pub fn neighbor_of(self, order: i32) -> i32 {
        match self {
            Self::Up => order.saturating_sub(1),
            Self::Down => order.saturating_add(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub content: String,
    pub order: i32,
}

/// A step with its boards, loose images, and file attachments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDetail {
    #[serde(flatten)]
    pub step: StepRow,
    pub moodboards: Vec<MoodboardWithAssets>,
    pub unassigned_assets: Vec<PlacedAsset>,
    pub files: Vec<FileAsset>,
}

/// Everything needed to render one step, plus its client comments.
#[derive(Debug, Clone)]
pub struct StepView {
    pub detail: StepDetail,
    pub comments: Vec<CommentRow>,
}

/// Default title of the step at `order`.
#[must_use]
pub fn step_title(order: i32) -> String {
    format!("Step {order}")
}

const STEP_COLUMNS: &str = "id, project_id, title, COALESCE(content, '') AS content, order_index";

fn step_from_row(row: &sqlx::postgres::PgRow) -> StepRow {
    StepRow {
        id: row.get("id"),
        project_id: row.get("project_id"),
        title: row.get("title"),
        content: row.get("content"),
        order: row.get("order_index"),
    }
}

// =============================================================================
// CRUD
// =============================================================================

/// Append a step to a project.
///
/// # Errors
///
/// Returns [`StepError::ProjectNotFound`] or a database error.
pub async fn create_step(pool: &PgPool, project_id: Uuid) -> Result<StepRow, StepError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
        .bind(project_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(StepError::ProjectNotFound(project_id));
    }

    let max_order: Option<i32> = sqlx::query_scalar("SELECT MAX(order_index) FROM steps WHERE project_id = $1")
        .bind(project_id)
        .fetch_one(pool)
        .await?;
    let order = max_order.unwrap_or(0).saturating_add(1);

    let row = sqlx::query(&format!(
        "INSERT INTO steps (project_id, order_index, title, content)
         VALUES ($1, $2, $3, '')
         RETURNING {STEP_COLUMNS}"
    ))
    .bind(project_id)
    .bind(order)
    .bind(step_title(order))
    .fetch_one(pool)
    .await?;

    let step = step_from_row(&row);
    info!(%project_id, step_id = %step.id, order, "step created");
    Ok(step)
}

/// Load one step of a project.
///
/// # Errors
///
/// Returns [`StepError::NotFound`] if the step is not part of the project,
/// or a database error.
pub async fn get_step(pool: &PgPool, project_id: Uuid, step_id: Uuid) -> Result<StepRow, StepError> {
    let row = sqlx::query(&format!("SELECT {STEP_COLUMNS} FROM steps WHERE id = $1 AND project_id = $2"))
        .bind(step_id)
        .bind(project_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(step_from_row).ok_or(StepError::NotFound(step_id))
}

/// Set a step's title and/or content.
///
/// # Errors
///
/// Returns [`StepError::TitleRequired`] for a blank title,
/// [`StepError::NotFound`], or a database error.
pub async fn update_step(
    pool: &PgPool,
    project_id: Uuid,
    step_id: Uuid,
    title: Option<&str>,
    content: Option<&str>,
) -> Result<StepRow, StepError> {
    let title = match title.map(str::trim) {
        Some("") => return Err(StepError::TitleRequired),
        other => other,
    };

    let row = sqlx::query(&format!(
        "UPDATE steps SET
            title = COALESCE($3, title),
            content = COALESCE($4, content),
            updated_at = now()
         WHERE id = $1 AND project_id = $2
         RETURNING {STEP_COLUMNS}"
    ))
    .bind(step_id)
    .bind(project_id)
    .bind(title)
    .bind(content)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(step_from_row).ok_or(StepError::NotFound(step_id))
}

/// Delete a step with its boards and assets, then close the gap in the
/// project's order. Returns the blob keys of the removed assets.
///
/// # Errors
///
/// Returns [`StepError::NotFound`] or a database error.
pub async fn delete_step(pool: &PgPool, project_id: Uuid, step_id: Uuid) -> Result<Vec<String>, StepError> {
    let mut tx = pool.begin().await?;
    let order: Option<i32> = sqlx::query_scalar("SELECT order_index FROM steps WHERE id = $1 AND project_id = $2")
        .bind(step_id)
        .bind(project_id)
        .fetch_optional(tx.as_mut())
        .await?;
    let Some(order) = order else {
        return Err(StepError::NotFound(step_id));
    };

    let keys: Vec<String> = sqlx::query_scalar("DELETE FROM assets WHERE step_id = $1 RETURNING blob_key")
        .bind(step_id)
        .fetch_all(tx.as_mut())
        .await?;
    sqlx::query("DELETE FROM steps WHERE id = $1")
        .bind(step_id)
        .execute(tx.as_mut())
        .await?;
    sqlx::query("UPDATE steps SET order_index = order_index - 1 WHERE project_id = $1 AND order_index > $2")
        .bind(project_id)
        .bind(order)
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;

    info!(%project_id, %step_id, assets = keys.len(), "step deleted");
    Ok(keys)
}

/// Swap a step with its neighbor. Returns false when there is no neighbor
/// in that direction.
///
/// # Errors
///
/// Returns [`StepError::NotFound`] or a database error.
pub async fn move_step(pool: &PgPool, project_id: Uuid, step_id: Uuid, direction: Direction) -> Result<bool, StepError> {
    let mut tx = pool.begin().await?;
    let order: Option<i32> = sqlx::query_scalar("SELECT order_index FROM steps WHERE id = $1 AND project_id = $2")
        .bind(step_id)
        .bind(project_id)
        .fetch_optional(tx.as_mut())
        .await?;
    let Some(order) = order else {
        return Err(StepError::NotFound(step_id));
    };

    let target = direction.neighbor_of(order);
    let neighbor: Option<Uuid> = sqlx::query_scalar("SELECT id FROM steps WHERE project_id = $1 AND order_index = $2")
        .bind(project_id)
        .bind(target)
        .fetch_optional(tx.as_mut())
        .await?;
    let Some(neighbor) = neighbor else {
        return Ok(false);
    };

    for (id, new_order) in [(step_id, -1), (neighbor, order), (step_id, target)] {
        sqlx::query("UPDATE steps SET order_index = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(new_order)
            .execute(tx.as_mut())
            .await?;
    }
    tx.commit().await?;

    info!(%project_id, %step_id, from = order, to = target, "step moved");
    Ok(true)
}

// =============================================================================
// READ VIEW
// =============================================================================

/// Split a step's images into the unassigned bucket; moodboard images are
/// already attached to their boards.
fn unassigned(images: Vec<(Option<Uuid>, PlacedAsset)>) -> Vec<PlacedAsset> {
    images
        .into_iter()
        .filter_map(|(moodboard_id, placed)| moodboard_id.is_none().then_some(placed))
        .collect()
}

/// Load the full read view of a step of `project_id`.
///
/// # Errors
///
/// Returns [`StepError::NotFound`] or a database error.
pub async fn load_step_view(pool: &PgPool, project_id: Uuid, step_id: Uuid) -> Result<StepView, StepError> {
    let step = get_step(pool, project_id, step_id).await?;
    let moodboards = moodboard::list_moodboards(pool, step_id).await?;
    let unassigned_assets = unassigned(asset::list_step_images(pool, step_id).await?);
    let files = asset::list_files(pool, step_id).await?;
    let comments = comment::list_comments(pool, step_id).await?;
    Ok(StepView { detail: StepDetail { step, moodboards, unassigned_assets, files }, comments })
}

#[cfg(test)]
#[path = "step_test.rs"]
mod tests;
