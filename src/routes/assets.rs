//! Asset and moodboard routes under `/api/admin/step/:step_id`.
//!
//! These are the endpoints the canvas persistence and upload adapters talk
//! to: a multipart upload, the board listing used for full refreshes, the
//! sparse layout patch, and delete.

use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use canvas::doc::AssetPatch;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::auth::AdminUser;
use crate::services::asset::{self, IncomingFile};
use crate::services::blob;
use crate::services::moodboard::{self, MoodboardChanges};
use crate::state::AppState;

/// Request body cap for uploads.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Fields collected from the upload form.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    pub(crate) kind: Option<String>,
    pub(crate) moodboard_id: Option<Uuid>,
    pub(crate) files: Vec<IncomingFile>,
}

/// Parse an optional UUID form value. Blank means absent.
pub(crate) fn parse_optional_id(raw: &str) -> Result<Option<Uuid>, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    Uuid::parse_str(raw).map(Some).map_err(|_| ApiError::bad_request("invalid_moodboard_id"))
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(|_| ApiError::bad_request("invalid_form"))? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "type" => {
                form.kind = Some(field.text().await.map_err(|_| ApiError::bad_request("invalid_form"))?);
            }
            "moodboardId" => {
                let raw = field.text().await.map_err(|_| ApiError::bad_request("invalid_form"))?;
                form.moodboard_id = parse_optional_id(&raw)?;
            }
            "files" | "file" => {
                let filename = field.file_name().unwrap_or("file").to_owned();
                let content_type = field.content_type().unwrap_or("application/octet-stream").to_owned();
                let bytes = field.bytes().await.map_err(|_| ApiError::bad_request("invalid_form"))?;
                form.files.push(IncomingFile { filename, content_type, bytes: bytes.to_vec() });
            }
            _ => {}
        }
    }
    Ok(form)
}

// =============================================================================
// ASSETS
// =============================================================================

/// `POST /api/admin/step/:step_id/assets`: multipart upload of one or more
/// files (`type`, optional `moodboardId`, repeated `files` / single `file`).
pub async fn upload(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(step_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let form = read_upload_form(multipart).await?;
    let kind = asset::parse_kind(form.kind.as_deref().unwrap_or_default())?;
    asset::upload_assets(&state.pool, state.blobs.as_ref(), step_id, kind, form.moodboard_id, form.files).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BoardQuery {
    pub moodboard_id: Option<String>,
}

/// `GET /api/admin/step/:step_id/assets?moodboardId=`: images of one board.
pub async fn list_board(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(step_id): Path<Uuid>,
    Query(query): Query<BoardQuery>,
) -> Result<Json<Value>, ApiError> {
    let moodboard_id = parse_optional_id(query.moodboard_id.as_deref().unwrap_or_default())?;
    let assets = asset::list_board(&state.pool, step_id, moodboard_id).await?;
    Ok(Json(json!({ "assets": assets })))
}

/// `PATCH /api/admin/step/:step_id/assets/:asset_id/position`: apply the
/// allow-listed layout fields. Unknown fields are ignored.
pub async fn patch_position(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((step_id, asset_id)): Path<(Uuid, Uuid)>,
    Json(patch): Json<AssetPatch>,
) -> Result<Json<Value>, ApiError> {
    let updated = asset::patch_layout(&state.pool, step_id, asset_id, &patch).await?;
    Ok(Json(json!({ "ok": true, "asset": updated })))
}

/// `DELETE /api/admin/step/:step_id/assets/:asset_id`
pub async fn delete(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((step_id, asset_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    asset::delete_asset(&state.pool, state.blobs.as_ref(), step_id, asset_id).await?;
    Ok(Json(json!({ "ok": true })))
}

// =============================================================================
// MOODBOARDS
// =============================================================================

/// `GET /api/admin/step/:step_id/moodboards`
pub async fn list_moodboards(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(step_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let moodboards = moodboard::list_moodboards(&state.pool, step_id).await?;
    Ok(Json(json!({ "moodboards": moodboards })))
}

/// `POST /api/admin/step/:step_id/moodboards`
pub async fn create_moodboard(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(step_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let board = moodboard::create_moodboard(&state.pool, step_id).await?;
    Ok(Json(json!({ "ok": true, "moodboard": board })))
}

#[derive(Deserialize, Default)]
pub struct UpdateMoodboardBody {
    pub name: Option<String>,
    pub content: Option<String>,
    pub locked: Option<bool>,
}

/// `PATCH /api/admin/step/:step_id/moodboards/:moodboard_id`
pub async fn update_moodboard(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((step_id, moodboard_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateMoodboardBody>,
) -> Result<Json<Value>, ApiError> {
    let changes = MoodboardChanges { name: body.name, content: body.content, locked: body.locked };
    let board = moodboard::update_moodboard(&state.pool, step_id, moodboard_id, changes).await?;
    Ok(Json(json!({ "ok": true, "moodboard": board })))
}

/// `DELETE /api/admin/step/:step_id/moodboards/:moodboard_id`: remove the
/// board and its assets, then their blobs.
pub async fn delete_moodboard(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((step_id, moodboard_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    let keys = moodboard::delete_moodboard(&state.pool, step_id, moodboard_id).await?;
    blob::delete_all(state.blobs.as_ref(), &keys).await;
    Ok(Json(json!({ "ok": true })))
}

#[cfg(test)]
#[path = "assets_test.rs"]
mod tests;
