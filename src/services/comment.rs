//! Client comments on a step.

use axum::http::StatusCode;
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::ErrorCode;

/// Author recorded when the project has no client name.
pub const DEFAULT_AUTHOR: &str = "Client";

#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error("comment content is required")]
    ContentRequired,
    #[error("step not found: {0}")]
    StepNotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for CommentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ContentRequired => "content_required",
            Self::StepNotFound(_) => "not_found",
            Self::Database(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::ContentRequired => StatusCode::BAD_REQUEST,
            Self::StepNotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRow {
    pub id: Uuid,
    pub content: String,
    pub author: String,
    /// RFC 3339, UTC.
    pub created_at: String,
}

/// Author name for a project's comments.
#[must_use]
pub fn author_for(client_name: Option<&str>) -> String {
    client_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_AUTHOR)
        .to_owned()
}

const CREATED_AT: &str = r#"to_char(created_at AT TIME ZONE 'UTC', 'YYYY-MM-DD"T"HH24:MI:SS.MS"Z"') AS created_at"#;

/// Comments on a step, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_comments(pool: &PgPool, step_id: Uuid) -> Result<Vec<CommentRow>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (Uuid, String, String, String)>(&format!(
        "SELECT id, content, author, {CREATED_AT}
         FROM comments
         WHERE step_id = $1
         ORDER BY comments.created_at DESC"
    ))
    .bind(step_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(id, content, author, created_at)| CommentRow { id, content, author, created_at })
        .collect())
}

/// Add a comment to a step of `project_id`.
///
/// # Errors
///
/// Returns [`CommentError::ContentRequired`] for blank content,
/// [`CommentError::StepNotFound`] if the step is not part of the project, or
/// a database error.
pub async fn create_comment(
    pool: &PgPool,
    project_id: Uuid,
    step_id: Uuid,
    content: &str,
    author: &str,
) -> Result<CommentRow, CommentError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(CommentError::ContentRequired);
    }

    let row = sqlx::query_as::<_, (Uuid, String, String, String)>(&format!(
        "INSERT INTO comments (project_id, step_id, content, author)
         SELECT $1, $2, $3, $4
         WHERE EXISTS (SELECT 1 FROM steps WHERE id = $2 AND project_id = $1)
         RETURNING id, content, author, {CREATED_AT}"
    ))
    .bind(project_id)
    .bind(step_id)
    .bind(content)
    .bind(author)
    .fetch_optional(pool)
    .await?;

    let Some((id, content, author, created_at)) = row else {
        return Err(CommentError::StepNotFound(step_id));
    };
    info!(%project_id, %step_id, comment_id = %id, "comment added");
    Ok(CommentRow { id, content, author, created_at })
}

#[cfg(test)]
#[path = "comment_test.rs"]
mod tests;
