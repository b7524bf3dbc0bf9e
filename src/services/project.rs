//! Project service: projects, memberships, and client access codes.
//!
//! DESIGN
//! ======
//! Admins see and edit every project. Members only see projects they have a
//! membership row for, and only through read routes. The client access code
//! is a separate, session-less way in: whoever holds the code can read the
//! project and leave comments.

use axum::http::StatusCode;
use serde::Serialize;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::services::session::SessionUser;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("project not found: {0}")]
    NotFound(Uuid),
    #[error("no access to project {0}")]
    Forbidden(Uuid),
    #[error("project name is required")]
    NameRequired,
    #[error("invalid project status: {0}")]
    InvalidStatus(String),
    #[error("client code already used by another project")]
    ClientCodeTaken,
    #[error("username is required")]
    UsernameRequired,
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("member not found: {0}")]
    MemberNotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for ProjectError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::MemberNotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::NameRequired => "name_required",
            Self::InvalidStatus(_) => "invalid_status",
            Self::ClientCodeTaken => "client_code_taken",
            Self::UsernameRequired => "username_required",
            Self::UserNotFound(_) => "user_not_found",
            Self::Database(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) | Self::MemberNotFound(_) | Self::UserNotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NameRequired | Self::InvalidStatus(_) | Self::UsernameRequired => StatusCode::BAD_REQUEST,
            Self::ClientCodeTaken => StatusCode::CONFLICT,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProjectStatus {
    Active,
    Archived,
}

impl ProjectStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Archived => "ARCHIVED",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ACTIVE" => Some(Self::Active),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRow {
    pub id: Uuid,
    pub name: String,
    pub status: ProjectStatus,
    pub client_name: Option<String>,
    /// Only ever rendered to admins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSummary {
    pub id: Uuid,
    pub title: String,
    pub order: i32,
    pub comment_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub name: Option<String>,
}

/// A project with its ordered steps, and its members for admins.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: ProjectRow,
    pub steps: Vec<StepSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<MemberRow>>,
}

/// Fields accepted when creating a project.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub client_name: Option<String>,
    pub client_code: Option<String>,
}

/// Sparse project update. `Some("")` on a client field clears it.
#[derive(Debug, Clone, Default)]
pub struct ProjectChanges {
    pub name: Option<String>,
    pub status: Option<String>,
    pub client_name: Option<String>,
    pub client_code: Option<String>,
}

/// `ProjectChanges` after trimming and validation. The outer `Option` says
/// whether the column is touched, the inner one whether it becomes NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ValidatedChanges {
    pub(crate) name: Option<String>,
    pub(crate) status: Option<ProjectStatus>,
    pub(crate) client_name: Option<Option<String>>,
    pub(crate) client_code: Option<Option<String>>,
}

fn blank_to_none(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_owned()) }
}

pub(crate) fn validate_name(raw: &str) -> Result<String, ProjectError> {
    blank_to_none(raw).ok_or(ProjectError::NameRequired)
}

pub(crate) fn validate_changes(changes: ProjectChanges) -> Result<ValidatedChanges, ProjectError> {
    let name = changes.name.as_deref().map(validate_name).transpose()?;
    let status = changes
        .status
        .map(|raw| ProjectStatus::parse(raw.trim()).ok_or(ProjectError::InvalidStatus(raw)))
        .transpose()?;
    Ok(ValidatedChanges {
        name,
        status,
        client_name: changes.client_name.as_deref().map(blank_to_none),
        client_code: changes.client_code.as_deref().map(blank_to_none),
    })
}

fn map_unique_violation(err: sqlx::Error) -> ProjectError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => ProjectError::ClientCodeTaken,
        _ => ProjectError::Database(err),
    }
}

fn project_from_row(row: &sqlx::postgres::PgRow) -> ProjectRow {
    ProjectRow {
        id: row.get("id"),
        name: row.get("name"),
        status: ProjectStatus::parse(row.get::<&str, _>("status")).unwrap_or(ProjectStatus::Active),
        client_name: row.get("client_name"),
        client_code: row.get("client_code"),
    }
}

const PROJECT_COLUMNS: &str = "id, name, status, client_name, client_code";

// =============================================================================
// CRUD
// =============================================================================

/// Create a project. The creator becomes a member and the project starts
/// with a single empty step, `Step 1`.
///
/// # Errors
///
/// Returns [`ProjectError::NameRequired`] for a blank name,
/// [`ProjectError::ClientCodeTaken`] for a duplicate code, or a database
/// error.
pub async fn create_project(pool: &PgPool, creator_id: Uuid, input: NewProject) -> Result<ProjectRow, ProjectError> {
    let name = validate_name(&input.name)?;
    let client_name = input.client_name.as_deref().and_then(blank_to_none);
    let client_code = input.client_code.as_deref().and_then(blank_to_none);

    let mut tx = pool.begin().await?;
    let row = sqlx::query(&format!(
        "INSERT INTO projects (name, client_name, client_code)
         VALUES ($1, $2, $3)
         RETURNING {PROJECT_COLUMNS}"
    ))
    .bind(&name)
    .bind(client_name.as_deref())
    .bind(client_code.as_deref())
    .fetch_one(tx.as_mut())
    .await
    .map_err(map_unique_violation)?;
    let project = project_from_row(&row);

    sqlx::query("INSERT INTO project_members (project_id, user_id) VALUES ($1, $2)")
        .bind(project.id)
        .bind(creator_id)
        .execute(tx.as_mut())
        .await?;

    sqlx::query("INSERT INTO steps (project_id, order_index, title, content) VALUES ($1, 1, 'Step 1', '')")
        .bind(project.id)
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;

    info!(project_id = %project.id, %creator_id, "project created");
    Ok(project)
}

/// List the projects a user can see, newest first. Admins see all of them.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_projects(pool: &PgPool, user: &SessionUser) -> Result<Vec<ProjectRow>, ProjectError> {
    let rows = if user.is_admin() {
        sqlx::query(&format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at DESC"))
            .fetch_all(pool)
            .await?
    } else {
        sqlx::query(
            "SELECT p.id, p.name, p.status, p.client_name, NULL::text AS client_code
             FROM projects p
             JOIN project_members m ON m.project_id = p.id
             WHERE m.user_id = $1
             ORDER BY p.created_at DESC",
        )
        .bind(user.id)
        .fetch_all(pool)
        .await?
    };
    Ok(rows.iter().map(project_from_row).collect())
}

/// Load a project the user may read. Members without a membership row get
/// [`ProjectError::Forbidden`]; the client code is hidden from them.
///
/// # Errors
///
/// Returns [`ProjectError::NotFound`], [`ProjectError::Forbidden`], or a
/// database error.
pub async fn require_access(pool: &PgPool, project_id: Uuid, user: &SessionUser) -> Result<ProjectRow, ProjectError> {
    let row = sqlx::query(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"))
        .bind(project_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ProjectError::NotFound(project_id))?;
    let mut project = project_from_row(&row);

    if user.is_admin() {
        return Ok(project);
    }

    let is_member: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM project_members WHERE project_id = $1 AND user_id = $2)")
            .bind(project_id)
            .bind(user.id)
            .fetch_one(pool)
            .await?;
    if !is_member {
        return Err(ProjectError::Forbidden(project_id));
    }
    project.client_code = None;
    Ok(project)
}

/// Steps of a project in display order, with their comment counts.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_steps(pool: &PgPool, project_id: Uuid) -> Result<Vec<StepSummary>, ProjectError> {
    let rows = sqlx::query_as::<_, (Uuid, String, i32, i64)>(
        "SELECT s.id, s.title, s.order_index,
                (SELECT COUNT(*) FROM comments c WHERE c.step_id = s.id)
         FROM steps s
         WHERE s.project_id = $1
         ORDER BY s.order_index ASC",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, title, order, comment_count)| StepSummary { id, title, order, comment_count })
        .collect())
}

/// Project, ordered steps, and (for admins) the member list.
///
/// # Errors
///
/// Same as [`require_access`].
pub async fn get_project(pool: &PgPool, project_id: Uuid, user: &SessionUser) -> Result<ProjectDetail, ProjectError> {
    let project = require_access(pool, project_id, user).await?;
    let steps = list_steps(pool, project_id).await?;
    let members = if user.is_admin() { Some(list_members(pool, project_id).await?) } else { None };
    Ok(ProjectDetail { project, steps, members })
}

/// Apply a sparse update.
///
/// # Errors
///
/// Returns a validation error, [`ProjectError::ClientCodeTaken`],
/// [`ProjectError::NotFound`], or a database error.
pub async fn update_project(
    pool: &PgPool,
    project_id: Uuid,
    changes: ProjectChanges,
) -> Result<ProjectRow, ProjectError> {
    let changes = validate_changes(changes)?;

    let row = sqlx::query(&format!(
        "UPDATE projects SET
            name = COALESCE($2, name),
            status = COALESCE($3, status),
            client_name = CASE WHEN $4 THEN $5 ELSE client_name END,
            client_code = CASE WHEN $6 THEN $7 ELSE client_code END,
            updated_at = now()
         WHERE id = $1
         RETURNING {PROJECT_COLUMNS}"
    ))
    .bind(project_id)
    .bind(changes.name.as_deref())
    .bind(changes.status.map(ProjectStatus::as_str))
    .bind(changes.client_name.is_some())
    .bind(changes.client_name.flatten())
    .bind(changes.client_code.is_some())
    .bind(changes.client_code.flatten())
    .fetch_optional(pool)
    .await
    .map_err(map_unique_violation)?;

    row.as_ref().map(project_from_row).ok_or(ProjectError::NotFound(project_id))
}

// =============================================================================
// MEMBERS
// =============================================================================

/// Members of a project, by username.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_members(pool: &PgPool, project_id: Uuid) -> Result<Vec<MemberRow>, ProjectError> {
    let rows = sqlx::query_as::<_, (Uuid, Uuid, String, Option<String>)>(
        "SELECT m.id, u.id, u.username, u.name
         FROM project_members m
         JOIN users u ON u.id = m.user_id
         WHERE m.project_id = $1
         ORDER BY u.username ASC",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, user_id, username, name)| MemberRow { id, user_id, username, name })
        .collect())
}

/// Add a user to a project by username. Adding an existing member is a
/// no-op that returns the existing membership.
///
/// # Errors
///
/// Returns [`ProjectError::UsernameRequired`], [`ProjectError::UserNotFound`],
/// [`ProjectError::NotFound`], or a database error.
pub async fn add_member(pool: &PgPool, project_id: Uuid, username: &str) -> Result<MemberRow, ProjectError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ProjectError::UsernameRequired);
    }

    let user = sqlx::query_as::<_, (Uuid, String, Option<String>)>(
        "SELECT id, username, name FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ProjectError::UserNotFound(username.to_owned()))?;

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
        .bind(project_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(ProjectError::NotFound(project_id));
    }

    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO project_members (project_id, user_id) VALUES ($1, $2)
         ON CONFLICT (project_id, user_id) DO UPDATE SET project_id = EXCLUDED.project_id
         RETURNING id",
    )
    .bind(project_id)
    .bind(user.0)
    .fetch_one(pool)
    .await?;

    info!(%project_id, user_id = %user.0, "member added");
    Ok(MemberRow { id, user_id: user.0, username: user.1, name: user.2 })
}

/// Remove a membership by its id.
///
/// # Errors
///
/// Returns [`ProjectError::MemberNotFound`] if no such membership exists on
/// the project, or a database error.
pub async fn remove_member(pool: &PgPool, project_id: Uuid, member_id: Uuid) -> Result<(), ProjectError> {
    let result = sqlx::query("DELETE FROM project_members WHERE id = $1 AND project_id = $2")
        .bind(member_id)
        .bind(project_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ProjectError::MemberNotFound(member_id));
    }
    Ok(())
}

// =============================================================================
// CLIENT ACCESS
// =============================================================================

/// Find the project a client code unlocks. Blank codes never match.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn find_by_client_code(pool: &PgPool, code: &str) -> Result<Option<ProjectRow>, ProjectError> {
    let code = code.trim();
    if code.is_empty() {
        return Ok(None);
    }
    let row = sqlx::query(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE client_code = $1"))
        .bind(code)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(project_from_row))
}

/// Load a project for a client, checking the presented code.
///
/// # Errors
///
/// Returns [`ProjectError::Forbidden`] when the project is missing or the
/// code does not match; the two are indistinguishable to the caller.
pub async fn require_client_access(pool: &PgPool, project_id: Uuid, code: &str) -> Result<ProjectRow, ProjectError> {
    let row = sqlx::query(&format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"))
        .bind(project_id)
        .fetch_optional(pool)
        .await?;
    match row.as_ref().map(project_from_row) {
        Some(project) if project.client_code.as_deref() == Some(code.trim()) && !code.trim().is_empty() => Ok(project),
        _ => Err(ProjectError::Forbidden(project_id)),
    }
}

#[cfg(test)]
#[path = "project_test.rs"]
mod tests;
