//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the JSON API for admins and members (session
//! cookie), the client portal (access-code header), and, with the local
//! blob backend, the uploaded files themselves under the public base path.

pub mod assets;
pub mod auth;
pub mod client;
pub mod projects;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::BlobConfig;
use crate::state::AppState;

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/projects", get(projects::list_projects))
        .route("/api/project/{id}", get(projects::get_project))
        .route("/api/project/{id}/step/{step_id}", get(projects::get_step))
        .route("/api/admin/projects", post(projects::create_project))
        .route("/api/admin/project/{id}", patch(projects::update_project))
        .route("/api/admin/project/{id}/members", post(projects::add_member))
        .route("/api/admin/project/{id}/members/{member_id}", delete(projects::remove_member))
        .route("/api/admin/project/{id}/steps", post(projects::create_step))
        .route(
            "/api/admin/project/{id}/steps/{step_id}",
            patch(projects::update_step).delete(projects::delete_step),
        )
        .route("/api/admin/project/{id}/steps/{step_id}/move", post(projects::move_step))
        .route(
            "/api/admin/step/{step_id}/assets",
            get(assets::list_board)
                .post(assets::upload)
                .layer(DefaultBodyLimit::max(assets::MAX_UPLOAD_BYTES)),
        )
        .route("/api/admin/step/{step_id}/assets/{asset_id}", delete(assets::delete))
        .route("/api/admin/step/{step_id}/assets/{asset_id}/position", patch(assets::patch_position))
        .route(
            "/api/admin/step/{step_id}/moodboards",
            get(assets::list_moodboards).post(assets::create_moodboard),
        )
        .route(
            "/api/admin/step/{step_id}/moodboards/{moodboard_id}",
            patch(assets::update_moodboard).delete(assets::delete_moodboard),
        )
        .route("/api/client/verify", post(client::verify))
        .route("/api/client/project/{id}", get(client::get_project))
        .route("/api/client/project/{id}/step/{step_id}", get(client::get_step))
        .route("/api/client/project/{id}/step/{step_id}/comments", post(client::create_comment))
        .route("/healthz", get(healthz))
}

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = api_routes();
    if let Some((mount, dir)) = upload_mount(&state.config.blob) {
        router = router.nest_service(&mount, ServeDir::new(dir));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Path to serve local uploads from, when the public base is a path on
/// this server rather than an external URL.
pub(crate) fn upload_mount(blob: &BlobConfig) -> Option<(String, std::path::PathBuf)> {
    let BlobConfig::Local { dir, public_base } = blob else {
        return None;
    };
    let mount = public_base.trim_end_matches('/');
    (mount.starts_with('/') && mount.len() > 1).then(|| (mount.to_owned(), dir.clone()))
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
