//! Client portal routes.
//!
//! Clients have no account. They present the project's access code in the
//! `x-client-code` header and get a read-only view plus the ability to
//! comment. Code verification and rejected header codes share one rate
//! limit per remote address.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, FromRequestParts, Path, State};
use axum::http::request::Parts;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::ApiError;
use crate::services::comment;
use crate::services::project::{self, ProjectError, ProjectRow};
use crate::services::step;
use crate::state::AppState;

pub const CLIENT_CODE_HEADER: &str = "x-client-code";

/// Access code taken from the `x-client-code` header. Missing or blank is 401.
pub struct ClientCode(pub String);

impl<S: Send + Sync> FromRequestParts<S> for ClientCode {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let code = parts
            .headers
            .get(CLIENT_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();
        if code.is_empty() {
            return Err(ApiError::unauthorized());
        }
        Ok(Self(code.to_owned()))
    }
}

/// Resolve the project for a header-presented code. Rejected codes count
/// against the same per-address window as `verify`.
async fn client_project(
    state: &AppState,
    addr: SocketAddr,
    project_id: Uuid,
    code: &str,
) -> Result<ProjectRow, ApiError> {
    let remote = addr.ip().to_string();
    state.verify_limiter.check(&remote)?;

    match project::require_client_access(&state.pool, project_id, code).await {
        Ok(project) => Ok(project),
        Err(ProjectError::Forbidden(_)) => {
            tracing::warn!(%project_id, remote = %addr.ip(), "client code rejected");
            state.verify_limiter.check_and_record(&remote)?;
            Err(ApiError::forbidden())
        }
        Err(e) => Err(e.into()),
    }
}

fn public_project(project: &ProjectRow) -> Value {
    json!({ "id": project.id, "name": project.name, "clientName": project.client_name })
}

#[derive(Deserialize)]
pub struct VerifyBody {
    #[serde(default)]
    pub code: String,
}

/// `POST /api/client/verify`: exchange an access code for its project.
pub async fn verify(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<Value>, ApiError> {
    state.verify_limiter.check_and_record(&addr.ip().to_string())?;

    let code = body.code.trim();
    if code.is_empty() {
        return Err(ApiError::bad_request("code_required"));
    }

    let Some(project) = project::find_by_client_code(&state.pool, code).await? else {
        tracing::info!(remote = %addr.ip(), "unknown client code");
        return Err(ApiError::new(axum::http::StatusCode::NOT_FOUND, "invalid_code"));
    };
    Ok(Json(json!({
        "projectId": project.id,
        "projectName": project.name,
        "clientName": project.client_name,
    })))
}

/// `GET /api/client/project/:id`: project name and step list.
pub async fn get_project(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ClientCode(code): ClientCode,
    Path(project_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let project = client_project(&state, addr, project_id, &code).await?;
    let steps = project::list_steps(&state.pool, project_id).await?;

    let mut body = public_project(&project);
    body["steps"] = json!(steps);
    Ok(Json(json!({ "project": body })))
}

/// `GET /api/client/project/:id/step/:step_id`: read-only boards and
/// comments, newest first.
pub async fn get_step(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ClientCode(code): ClientCode,
    Path((project_id, step_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, ApiError> {
    let project = client_project(&state, addr, project_id, &code).await?;
    let view = step::load_step_view(&state.pool, project_id, step_id).await?;
    let detail = view.detail;

    Ok(Json(json!({
        "project": public_project(&project),
        "step": {
            "id": detail.step.id,
            "title": detail.step.title,
            "content": detail.step.content,
            "moodboards": detail.moodboards,
            "unassignedAssets": detail.unassigned_assets,
        },
        "comments": view.comments,
    })))
}

#[derive(Deserialize)]
pub struct CommentBody {
    #[serde(default)]
    pub content: String,
}

/// `POST /api/client/project/:id/step/:step_id/comments`
pub async fn create_comment(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ClientCode(code): ClientCode,
    Path((project_id, step_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<CommentBody>,
) -> Result<Json<Value>, ApiError> {
    let project = client_project(&state, addr, project_id, &code).await?;
    let author = comment::author_for(project.client_name.as_deref());
    let created = comment::create_comment(&state.pool, project_id, step_id, &body.content, &author).await?;
    Ok(Json(json!({ "comment": created })))
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
