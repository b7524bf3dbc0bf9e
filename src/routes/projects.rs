//! Project, membership, and step routes.
//!
//! Reads (`/api/projects`, `/api/project/...`) are open to any member of
//! the project. Everything under `/api/admin/` needs the ADMIN role.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::auth::{AdminUser, AuthUser};
use crate::services::blob;
use crate::services::project::{self, NewProject, ProjectChanges};
use crate::services::step::{self, Direction};
use crate::state::AppState;

// =============================================================================
// READS
// =============================================================================

/// `GET /api/projects`: projects visible to the caller.
pub async fn list_projects(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Value>, ApiError> {
    let projects = project::list_projects(&state.pool, &auth.user).await?;
    Ok(Json(json!({ "projects": projects })))
}

/// `GET /api/project/:id`: project with ordered steps.
pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let detail = project::get_project(&state.pool, project_id, &auth.user).await?;
    Ok(Json(json!({ "project": detail })))
}

/// `GET /api/project/:id/step/:step_id`: full read view of one step.
pub async fn get_step(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, step_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    let project = project::require_access(&state.pool, project_id, &auth.user).await?;
    let view = step::load_step_view(&state.pool, project_id, step_id).await?;
    Ok(Json(json!({
        "project": project,
        "step": view.detail,
        "comments": view.comments,
    })))
}

// =============================================================================
// PROJECTS
// =============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectBody {
    #[serde(default)]
    pub name: String,
    pub client_name: Option<String>,
    pub client_code: Option<String>,
}

/// `POST /api/admin/projects`: create a project seeded with `Step 1`.
pub async fn create_project(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(body): Json<CreateProjectBody>,
) -> Result<Json<Value>, ApiError> {
    let input = NewProject { name: body.name, client_name: body.client_name, client_code: body.client_code };
    let project = project::create_project(&state.pool, admin.id, input).await?;
    Ok(Json(json!({ "ok": true, "project": project })))
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectBody {
    pub name: Option<String>,
    pub status: Option<String>,
    pub client_name: Option<String>,
    pub client_code: Option<String>,
}

/// `PATCH /api/admin/project/:id`: rename, archive, or change client access.
pub async fn update_project(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(project_id): Path<Uuid>,
    Json(body): Json<UpdateProjectBody>,
) -> Result<Json<Value>, ApiError> {
    let changes = ProjectChanges {
        name: body.name,
        status: body.status,
        client_name: body.client_name,
        client_code: body.client_code,
    };
    let project = project::update_project(&state.pool, project_id, changes).await?;
    Ok(Json(json!({ "ok": true, "project": project })))
}

// =============================================================================
// MEMBERS
// =============================================================================

#[derive(Deserialize)]
pub struct AddMemberBody {
    #[serde(default)]
    pub username: String,
}

/// `POST /api/admin/project/:id/members`: add a member by username.
pub async fn add_member(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(project_id): Path<Uuid>,
    Json(body): Json<AddMemberBody>,
) -> Result<Json<Value>, ApiError> {
    let member = project::add_member(&state.pool, project_id, &body.username).await?;
    Ok(Json(json!({ "ok": true, "member": member })))
}

/// `DELETE /api/admin/project/:id/members/:member_id`: remove a membership.
pub async fn remove_member(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((project_id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    project::remove_member(&state.pool, project_id, member_id).await?;
    Ok(Json(json!({ "ok": true })))
}

// =============================================================================
// STEPS
// =============================================================================

/// `POST /api/admin/project/:id/steps`: append a step.
pub async fn create_step(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let step = step::create_step(&state.pool, project_id).await?;
    Ok(Json(json!({ "ok": true, "step": step })))
}

#[derive(Deserialize, Default)]
pub struct UpdateStepBody {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// `PATCH /api/admin/project/:id/steps/:step_id`: edit title or content.
pub async fn update_step(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((project_id, step_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateStepBody>,
) -> Result<Json<Value>, ApiError> {
    let step =
        step::update_step(&state.pool, project_id, step_id, body.title.as_deref(), body.content.as_deref()).await?;
    Ok(Json(json!({ "ok": true, "step": step })))
}

/// `DELETE /api/admin/project/:id/steps/:step_id`: delete a step and its
/// assets, then their blobs.
pub async fn delete_step(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((project_id, step_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    let keys = step::delete_step(&state.pool, project_id, step_id).await?;
    blob::delete_all(state.blobs.as_ref(), &keys).await;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct MoveStepBody {
    #[serde(default)]
    pub direction: String,
}

/// `POST /api/admin/project/:id/steps/:step_id/move`: swap with a neighbor.
pub async fn move_step(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((project_id, step_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<MoveStepBody>,
) -> Result<Json<Value>, ApiError> {
    let direction = Direction::parse(&body.direction)?;
    let moved = step::move_step(&state.pool, project_id, step_id, direction).await?;
    Ok(Json(json!({ "ok": true, "moved": moved })))
}

#[cfg(test)]
#[path = "projects_test.rs"]
mod tests;
