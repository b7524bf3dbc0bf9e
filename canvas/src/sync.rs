//! Persistence Adapter: client side of the asset layout endpoints.
//!
//! The controller never waits on this module. Hosts hand the `Action`s a
//! mutation produced to [`dispatch`] (or [`spawn_dispatch`] to detach it) and
//! move on. Failures are logged and counted, never retried or rolled back;
//! the next full `load_board` reconciles local state with the server.

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use serde::Deserialize;

use crate::controller::Action;
use crate::doc::{AssetId, AssetPatch, BoardKey, PlacedAsset};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid session token header: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("server rejected request ({status}): {code}")]
    Rejected { status: u16, code: String },
}

impl SyncError {
    /// Server error code, when the server answered at all.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Server-side store for one board's asset layout.
#[async_trait]
pub trait AssetPersistence: Send + Sync {
    /// Write a sparse layout/metadata update. Returns the stored record.
    async fn patch_asset(
        &self,
        board: &BoardKey,
        asset_id: AssetId,
        patch: &AssetPatch,
    ) -> Result<PlacedAsset, SyncError>;

    async fn delete_asset(&self, board: &BoardKey, asset_id: AssetId) -> Result<(), SyncError>;

    /// Full read of a board, used for reconciliation.
    async fn load_board(&self, board: &BoardKey) -> Result<Vec<PlacedAsset>, SyncError>;
}

// =============================================================================
// HTTP
// =============================================================================

/// [`AssetPersistence`] over the server's admin asset routes, authenticated
/// with the `session_token` cookie.
#[derive(Clone)]
pub struct HttpPersistence {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PatchResponse {
    asset: PlacedAsset,
}

#[derive(Deserialize)]
struct BoardResponse {
    assets: Vec<PlacedAsset>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpPersistence {
    /// Build a client for `base_url` carrying the given session token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the HTTP
    /// client cannot be built.
    pub fn new(base_url: &str, session_token: &str) -> Result<Self, SyncError> {
        let client = session_client(session_token)?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    fn assets_url(&self, board: &BoardKey) -> String {
        format!("{}/api/admin/step/{}/assets", self.base_url, board.step_id)
    }
}

/// Build a reqwest client that sends the session cookie on every request.
///
/// # Errors
///
/// Returns an error if the token is not a valid header value or the HTTP
/// client cannot be built.
pub fn session_client(session_token: &str) -> Result<reqwest::Client, SyncError> {
    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_str(&format!("session_token={session_token}"))?);
    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

/// Read the `{error}` code from a non-success response. Falls back to the
/// status reason when the body is not the server's error shape.
pub(crate) async fn rejection_code(response: reqwest::Response) -> (u16, Option<String>) {
    let status = response.status();
    let code = match response.json::<ErrorBody>().await {
        Ok(body) => Some(body.error),
        Err(_) => None,
    };
    (status.as_u16(), code)
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, SyncError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let reason = response.status().canonical_reason().unwrap_or("error");
    let (status, code) = rejection_code(response).await;
    let code = code.unwrap_or_else(|| reason.to_owned());
    Err(SyncError::Rejected { status, code })
}

#[async_trait]
impl AssetPersistence for HttpPersistence {
    async fn patch_asset(
        &self,
        board: &BoardKey,
        asset_id: AssetId,
        patch: &AssetPatch,
    ) -> Result<PlacedAsset, SyncError> {
        let url = format!("{}/{asset_id}/position", self.assets_url(board));
        let response = self.client.patch(url).json(patch).send().await?;
        let body = check(response).await?.json::<PatchResponse>().await?;
        Ok(body.asset)
    }

    async fn delete_asset(&self, board: &BoardKey, asset_id: AssetId) -> Result<(), SyncError> {
        let url = format!("{}/{asset_id}", self.assets_url(board));
        let response = self.client.delete(url).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn load_board(&self, board: &BoardKey) -> Result<Vec<PlacedAsset>, SyncError> {
        let mut request = self.client.get(self.assets_url(board));
        if let Some(moodboard_id) = board.moodboard_id {
            request = request.query(&[("moodboardId", moodboard_id.to_string())]);
        }
        let body = check(request.send().await?).await?.json::<BoardResponse>().await?;
        Ok(body.assets)
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Outcome counts for one batch of actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub applied: usize,
    pub failed: usize,
}

/// Send `actions` in order. Each failure is logged and counted; later actions
/// still go out.
pub async fn dispatch<P>(persistence: &P, board: BoardKey, actions: Vec<Action>) -> SyncReport
where
    P: AssetPersistence + ?Sized,
{
    let mut report = SyncReport::default();
    for action in actions {
        let result = match &action {
            Action::Persist { asset_id, patch } => {
                persistence.patch_asset(&board, *asset_id, patch).await.map(|_| ())
            }
            Action::Delete { asset_id } => persistence.delete_asset(&board, *asset_id).await,
        };
        match result {
            Ok(()) => report.applied += 1,
            Err(error) => {
                report.failed += 1;
                tracing::warn!(?action, step_id = %board.step_id, %error, "asset sync failed; next reload reconciles");
            }
        }
    }
    report
}

/// Fire-and-forget [`dispatch`] on the current tokio runtime.
pub fn spawn_dispatch(
    persistence: Arc<dyn AssetPersistence>,
    board: BoardKey,
    actions: Vec<Action>,
) -> tokio::task::JoinHandle<SyncReport> {
    tokio::spawn(async move { dispatch(persistence.as_ref(), board, actions).await })
}
