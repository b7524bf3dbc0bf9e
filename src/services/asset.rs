//! Asset service: uploads, board listings, layout patches, deletion.
//!
//! DESIGN
//! ======
//! An asset belongs to a step and, when it is an image, to one board of that
//! step: a named moodboard or the step's unassigned bucket
//! (`moodboard_id IS NULL`). Layout columns are whatever the last patch
//! wrote; the server does not re-snap or re-clamp, since the canvas
//! controller already did.
//!
//! ERROR HANDLING
//! ==============
//! Uploads store every blob first, then insert all rows in one transaction;
//! if either stage fails the stored blobs are removed. Deletes remove rows
//! before blobs. A blob delete failure leaves an orphaned object but never
//! fails the request.

use axum::http::StatusCode;
use canvas::consts::{DEFAULT_ASSET_HEIGHT, DEFAULT_ASSET_WIDTH};
use canvas::doc::{AssetPatch, PlacedAsset};
use canvas::grid::{BoardBounds, Grid};
use canvas::upload::AssetType;
use rand::Rng;
use serde::Serialize;
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::services::blob::{self, BlobError, BlobStore, StoredBlob};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("invalid asset type: {0}")]
    InvalidType(String),
    #[error("no file provided")]
    FileRequired,
    #[error("step not found: {0}")]
    StepNotFound(Uuid),
    #[error("moodboard not found: {0}")]
    MoodboardNotFound(Uuid),
    #[error("asset not found: {0}")]
    NotFound(Uuid),
    #[error("board is locked")]
    BoardLocked,
    #[error("patch contains no allowed field")]
    NoValidFields,
    #[error(transparent)]
    Storage(#[from] BlobError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for AssetError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidType(_) => "invalid_type",
            Self::FileRequired => "file_required",
            Self::StepNotFound(_) | Self::MoodboardNotFound(_) | Self::NotFound(_) => "not_found",
            Self::BoardLocked => "board_locked",
            Self::NoValidFields => "no_valid_fields",
            Self::Storage(e) => e.error_code(),
            Self::Database(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidType(_) | Self::FileRequired | Self::NoValidFields => StatusCode::BAD_REQUEST,
            Self::StepNotFound(_) | Self::MoodboardNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BoardLocked => StatusCode::LOCKED,
            Self::Storage(e) => e.status(),
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// One file received in an upload request.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A non-image attachment, listed per step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAsset {
    pub id: Uuid,
    pub url: String,
    pub filename: String,
}

/// Parse the multipart `type` field.
///
/// # Errors
///
/// Returns [`AssetError::InvalidType`] for anything but `IMAGE` or `FILE`.
pub fn parse_kind(raw: &str) -> Result<AssetType, AssetError> {
    AssetType::parse(raw.trim()).ok_or_else(|| AssetError::InvalidType(raw.to_owned()))
}

pub(crate) const ASSET_COLUMNS: &str = "id, url, filename, position_x, position_y, width, height, \
                                        rotation, z_index, description, show_description";

pub(crate) fn asset_from_row(row: &sqlx::postgres::PgRow) -> PlacedAsset {
    PlacedAsset {
        id: row.get("id"),
        url: row.get("url"),
        filename: row.get("filename"),
        position_x: row.get("position_x"),
        position_y: row.get("position_y"),
        width: row.get("width"),
        height: row.get("height"),
        rotation: row.get("rotation"),
        z_index: row.get("z_index"),
        description: row.get("description"),
        show_description: row.get("show_description"),
    }
}

// =============================================================================
// PLACEMENT
// =============================================================================

/// Pick a grid-aligned top-left corner for a default-sized image, uniformly
/// over every slot where it fits inside the board.
pub(crate) fn random_position<R: Rng>(rng: &mut R, grid: &Grid, bounds: &BoardBounds) -> (i32, i32) {
    let cols = grid.slots(bounds.width, DEFAULT_ASSET_WIDTH).max(1);
    let rows = grid.slots(bounds.height, DEFAULT_ASSET_HEIGHT).max(1);
    (rng.random_range(0..cols) * grid.size, rng.random_range(0..rows) * grid.size)
}

/// Stacking orders for `count` new images on a board whose current top is
/// `current_max`. Uploads land above everything, in upload order.
pub(crate) fn stacking_orders(current_max: i32, count: usize) -> Vec<i32> {
    let base = current_max.max(0);
    (1..=count).map(|i| base.saturating_add(i32::try_from(i).unwrap_or(i32::MAX))).collect()
}

// =============================================================================
// UPLOAD
// =============================================================================

async fn ensure_step(pool: &PgPool, step_id: Uuid) -> Result<(), AssetError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM steps WHERE id = $1)")
        .bind(step_id)
        .fetch_one(pool)
        .await?;
    if exists { Ok(()) } else { Err(AssetError::StepNotFound(step_id)) }
}

/// Reject edits to a moodboard that is missing from the step or locked.
async fn ensure_board_editable(pool: &PgPool, step_id: Uuid, moodboard_id: Uuid) -> Result<(), AssetError> {
    let locked: Option<bool> = sqlx::query_scalar("SELECT locked FROM moodboards WHERE id = $1 AND step_id = $2")
        .bind(moodboard_id)
        .bind(step_id)
        .fetch_optional(pool)
        .await?;
    match locked {
        None => Err(AssetError::MoodboardNotFound(moodboard_id)),
        Some(true) => Err(AssetError::BoardLocked),
        Some(false) => Ok(()),
    }
}

fn staged_keys(staged: &[(String, StoredBlob)]) -> Vec<String> {
    staged.iter().map(|(_, stored)| stored.key.clone()).collect()
}

/// Advisory lock name for one board's stacking order. The unassigned bucket
/// of a step is its own board.
pub(crate) fn board_lock_key(step_id: Uuid, moodboard_id: Option<Uuid>) -> String {
    match moodboard_id {
        Some(moodboard_id) => format!("assets:{step_id}:{moodboard_id}"),
        None => format!("assets:{step_id}:unassigned"),
    }
}

/// Insert rows for already-stored blobs in one transaction. Concurrent
/// uploads to the same board serialize on an advisory lock, so each batch
/// reads the top after the previous one committed.
async fn insert_staged(
    pool: &PgPool,
    step_id: Uuid,
    kind: AssetType,
    moodboard_id: Option<Uuid>,
    staged: &[(String, StoredBlob)],
) -> Result<Vec<Uuid>, AssetError> {
    let positions: Vec<(i32, i32)> = {
        let mut rng = rand::rng();
        let (grid, bounds) = (Grid::default(), BoardBounds::default());
        staged.iter().map(|_| random_position(&mut rng, &grid, &bounds)).collect()
    };

    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(board_lock_key(step_id, moodboard_id))
        .execute(tx.as_mut())
        .await?;

    let current_max: i32 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(z_index), 0) FROM assets
         WHERE step_id = $1 AND moodboard_id IS NOT DISTINCT FROM $2 AND kind = 'IMAGE'",
    )
    .bind(step_id)
    .bind(moodboard_id)
    .fetch_one(tx.as_mut())
    .await?;
    let orders = stacking_orders(current_max, staged.len());

    let mut ids = Vec::with_capacity(staged.len());
    for (((filename, stored), (x, y)), z) in staged.iter().zip(positions).zip(orders) {
        let (x, y, z) = if kind == AssetType::Image { (x, y, z) } else { (0, 0, 1) };
        let id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO assets (step_id, moodboard_id, kind, url, blob_key, filename,
                                 position_x, position_y, width, height, z_index)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING id",
        )
        .bind(step_id)
        .bind(moodboard_id)
        .bind(kind.as_str())
        .bind(&stored.url)
        .bind(&stored.key)
        .bind(filename)
        .bind(x)
        .bind(y)
        .bind(DEFAULT_ASSET_WIDTH)
        .bind(DEFAULT_ASSET_HEIGHT)
        .bind(z)
        .fetch_one(tx.as_mut())
        .await?;
        ids.push(id);
    }
    tx.commit().await?;
    Ok(ids)
}

/// Store a batch of uploaded files on a step.
///
/// Images go to `moodboard_id` (or the unassigned bucket) at a random grid
/// slot, default size, stacked above everything already there. Files ignore
/// the moodboard. Empty files are skipped. Returns the new asset ids in
/// upload order.
///
/// # Errors
///
/// Returns [`AssetError::FileRequired`] if no non-empty file remains,
/// [`AssetError::StepNotFound`], [`AssetError::MoodboardNotFound`],
/// [`AssetError::BoardLocked`], a storage error, or a database error.
pub async fn upload_assets(
    pool: &PgPool,
    blobs: &dyn BlobStore,
    step_id: Uuid,
    kind: AssetType,
    moodboard_id: Option<Uuid>,
    files: Vec<IncomingFile>,
) -> Result<Vec<Uuid>, AssetError> {
    let files: Vec<IncomingFile> = files.into_iter().filter(|f| !f.bytes.is_empty()).collect();
    if files.is_empty() {
        return Err(AssetError::FileRequired);
    }
    ensure_step(pool, step_id).await?;

    let moodboard_id = if kind == AssetType::Image { moodboard_id } else { None };
    if let Some(moodboard_id) = moodboard_id {
        ensure_board_editable(pool, step_id, moodboard_id).await?;
    }

    let mut staged: Vec<(String, StoredBlob)> = Vec::with_capacity(files.len());
    for file in files {
        match blobs.put(&file.filename, &file.content_type, file.bytes).await {
            Ok(stored) => staged.push((file.filename, stored)),
            Err(e) => {
                blob::delete_all(blobs, &staged_keys(&staged)).await;
                return Err(e.into());
            }
        }
    }

    let ids = match insert_staged(pool, step_id, kind, moodboard_id, &staged).await {
        Ok(ids) => ids,
        Err(e) => {
            warn!(%step_id, count = staged.len(), "asset insert failed; removing stored blobs");
            blob::delete_all(blobs, &staged_keys(&staged)).await;
            return Err(e);
        }
    };

    info!(%step_id, ?moodboard_id, kind = kind.as_str(), count = ids.len(), "assets uploaded");
    Ok(ids)
}

// =============================================================================
// READS
// =============================================================================

/// Image assets of one board, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_board(pool: &PgPool, step_id: Uuid, moodboard_id: Option<Uuid>) -> Result<Vec<PlacedAsset>, AssetError> {
    let rows = sqlx::query(&format!(
        "SELECT {ASSET_COLUMNS} FROM assets
         WHERE step_id = $1 AND moodboard_id IS NOT DISTINCT FROM $2 AND kind = 'IMAGE'
         ORDER BY created_at DESC"
    ))
    .bind(step_id)
    .bind(moodboard_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(asset_from_row).collect())
}

/// Every image on a step, tagged with its moodboard, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_step_images(pool: &PgPool, step_id: Uuid) -> Result<Vec<(Option<Uuid>, PlacedAsset)>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT moodboard_id, {ASSET_COLUMNS} FROM assets
         WHERE step_id = $1 AND kind = 'IMAGE'
         ORDER BY created_at DESC"
    ))
    .bind(step_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(|row| (row.get("moodboard_id"), asset_from_row(row))).collect())
}

/// File attachments of a step, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_files(pool: &PgPool, step_id: Uuid) -> Result<Vec<FileAsset>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, String, String)>(
        "SELECT id, url, filename FROM assets WHERE step_id = $1 AND kind = 'FILE' ORDER BY created_at DESC",
    )
    .bind(step_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, url, filename)| FileAsset { id, url, filename })
        .collect())
}

// =============================================================================
// LAYOUT
// =============================================================================

/// Apply a sparse layout update to an asset on `step_id`. An empty
/// description clears it. Last write wins.
///
/// # Errors
///
/// Returns [`AssetError::NoValidFields`] for an empty patch,
/// [`AssetError::NotFound`] if the asset is not on the step,
/// [`AssetError::BoardLocked`] if its moodboard is locked, or a database
/// error.
pub async fn patch_layout(
    pool: &PgPool,
    step_id: Uuid,
    asset_id: Uuid,
    patch: &AssetPatch,
) -> Result<PlacedAsset, AssetError> {
    if patch.is_empty() {
        return Err(AssetError::NoValidFields);
    }

    let locked: Option<bool> = sqlx::query_scalar(
        "SELECT COALESCE(m.locked, FALSE)
         FROM assets a
         LEFT JOIN moodboards m ON m.id = a.moodboard_id
         WHERE a.id = $1 AND a.step_id = $2",
    )
    .bind(asset_id)
    .bind(step_id)
    .fetch_optional(pool)
    .await?;
    match locked {
        None => return Err(AssetError::NotFound(asset_id)),
        Some(true) => return Err(AssetError::BoardLocked),
        Some(false) => {}
    }

    let row = sqlx::query(&format!(
        "UPDATE assets SET
            position_x = COALESCE($3, position_x),
            position_y = COALESCE($4, position_y),
            width = COALESCE($5, width),
            height = COALESCE($6, height),
            rotation = COALESCE($7, rotation),
            z_index = COALESCE($8, z_index),
            description = CASE WHEN $9 THEN NULLIF($10, '') ELSE description END,
            show_description = COALESCE($11, show_description)
         WHERE id = $1 AND step_id = $2
         RETURNING {ASSET_COLUMNS}"
    ))
    .bind(asset_id)
    .bind(step_id)
    .bind(patch.position_x)
    .bind(patch.position_y)
    .bind(patch.width)
    .bind(patch.height)
    .bind(patch.rotation)
    .bind(patch.z_index)
    .bind(patch.description.is_some())
    .bind(patch.description.as_deref())
    .bind(patch.show_description)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(asset_from_row).ok_or(AssetError::NotFound(asset_id))
}

// =============================================================================
// DELETE
// =============================================================================

/// Delete an asset on `step_id`, then its blob.
///
/// # Errors
///
/// Returns [`AssetError::NotFound`] if the asset is not on the step, or a
/// database error. Blob failures are logged only.
pub async fn delete_asset(pool: &PgPool, blobs: &dyn BlobStore, step_id: Uuid, asset_id: Uuid) -> Result<(), AssetError> {
    let key: Option<String> =
        sqlx::query_scalar("DELETE FROM assets WHERE id = $1 AND step_id = $2 RETURNING blob_key")
            .bind(asset_id)
            .bind(step_id)
            .fetch_optional(pool)
            .await?;
    let Some(key) = key else {
        return Err(AssetError::NotFound(asset_id));
    };

    if let Err(error) = blobs.delete(&key).await {
        warn!(%asset_id, %key, %error, "blob delete failed; leaving orphan");
    }
    info!(%step_id, %asset_id, "asset deleted");
    Ok(())
}

#[cfg(test)]
#[path = "asset_test.rs"]
mod tests;
