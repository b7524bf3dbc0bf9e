//! Upload Adapter: gathers files from a picker, a drop target or the
//! clipboard and posts them as one multipart request.

#[cfg(test)]
#[path = "upload_test.rs"]
mod upload_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::controller::BoardController;
use crate::sync::{AssetPersistence, SyncError, rejection_code, session_client};

/// Asset-type discriminator sent with every upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetType {
    Image,
    File,
}

impl AssetType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "IMAGE",
            Self::File => "FILE",
        }
    }

    /// Parse the wire discriminator. Anything else is not an asset type.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "IMAGE" => Some(Self::Image),
            "FILE" => Some(Self::File),
            _ => None,
        }
    }
}

/// Where a batch came from. Only affects error wording and naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Picker,
    DragDrop,
    Clipboard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// One typed clipboard entry as read from the host clipboard.
#[derive(Debug, Clone)]
pub struct ClipboardItem {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("no files selected")]
    NoFiles,
    #[error("no image found in clipboard")]
    NoImageInClipboard,
    #[error("clipboard unavailable")]
    ClipboardUnavailable,
    #[error("upload rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upload succeeded but refresh failed: {0}")]
    Refresh(#[from] SyncError),
    #[error("batch targets moodboard {target:?} but the open board is {open:?}")]
    BoardMismatch { target: Option<Uuid>, open: Option<Uuid> },
}

impl UploadError {
    /// Text shown next to the upload control.
    #[must_use]
    pub fn inline_message(&self) -> String {
        match self {
            Self::NoFiles => "Select at least one image".to_owned(),
            Self::NoImageInClipboard => "No image found in clipboard".to_owned(),
            Self::ClipboardUnavailable => {
                "Could not access clipboard. Try using the file picker.".to_owned()
            }
            Self::Rejected { message, .. } => message.clone(),
            Self::Http(_) | Self::Refresh(_) | Self::BoardMismatch { .. } => "Upload failed".to_owned(),
        }
    }
}

/// File extension for an image MIME subtype: `svg+xml` is `svg`.
fn clipboard_extension(subtype: &str) -> &str {
    subtype.split(['+', ';']).next().unwrap_or(subtype).trim()
}

/// Files gathered for a single multipart request.
#[derive(Debug, Clone)]
pub struct UploadBatch {
    kind: AssetType,
    source: Source,
    moodboard_id: Option<Uuid>,
    files: Vec<UploadFile>,
}

impl UploadBatch {
    #[must_use]
    pub fn new(kind: AssetType, source: Source) -> Self {
        Self { kind, source, moodboard_id: None, files: Vec::new() }
    }

    /// Target a named moodboard. Ignored for `FILE` batches.
    #[must_use]
    pub fn with_moodboard(mut self, moodboard_id: Option<Uuid>) -> Self {
        self.moodboard_id = moodboard_id;
        self
    }

    /// Add a file. `IMAGE` batches silently skip anything that is not an
    /// image; returns whether the file was kept.
    pub fn push(&mut self, file: UploadFile) -> bool {
        if self.kind == AssetType::Image && !file.is_image() {
            return false;
        }
        self.files.push(file);
        true
    }

    pub fn extend(&mut self, files: impl IntoIterator<Item = UploadFile>) -> usize {
        let mut kept = 0;
        for file in files {
            if self.push(file) {
                kept += 1;
            }
        }
        kept
    }

    /// Build an image batch from clipboard contents. The first image becomes
    /// `pasted-image-{now_ms}.{ext}`, later ones `pasted-image-{now_ms}-{n}.{ext}`.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::NoImageInClipboard`] when no entry is an image.
    pub fn from_clipboard(items: Vec<ClipboardItem>, now_ms: i64) -> Result<Self, UploadError> {
        let mut batch = Self::new(AssetType::Image, Source::Clipboard);
        for item in items {
            let Some(subtype) = item.mime_type.strip_prefix("image/") else {
                continue;
            };
            let ext = clipboard_extension(subtype);
            let name = match batch.files.len() {
                0 => format!("pasted-image-{now_ms}.{ext}"),
                n => format!("pasted-image-{now_ms}-{}.{ext}", n + 1),
            };
            batch.files.push(UploadFile { name, content_type: item.mime_type.clone(), bytes: item.bytes });
        }
        if batch.files.is_empty() {
            return Err(UploadError::NoImageInClipboard);
        }
        Ok(batch)
    }

    #[must_use]
    pub fn kind(&self) -> AssetType {
        self.kind
    }

    #[must_use]
    pub fn source(&self) -> Source {
        self.source
    }

    #[must_use]
    pub fn files(&self) -> &[UploadFile] {
        &self.files
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Moodboard id as sent on the wire: only images target a board.
    #[must_use]
    pub fn target_moodboard(&self) -> Option<Uuid> {
        match self.kind {
            AssetType::Image => self.moodboard_id,
            AssetType::File => None,
        }
    }

    fn into_form(self) -> Result<reqwest::multipart::Form, UploadError> {
        let mut form = reqwest::multipart::Form::new().text("type", self.kind.as_str());
        if let Some(moodboard_id) = self.target_moodboard() {
            form = form.text("moodboardId", moodboard_id.to_string());
        }
        for file in self.files {
            let part = reqwest::multipart::Part::bytes(file.bytes)
                .file_name(file.name)
                .mime_str(&file.content_type)?;
            form = form.part("files", part);
        }
        Ok(form)
    }
}

/// Posts batches to the step upload route with the session cookie.
#[derive(Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUploader {
    /// # Errors
    ///
    /// Returns an error if the session token is not a valid header value.
    pub fn new(base_url: &str, session_token: &str) -> Result<Self, SyncError> {
        let client = session_client(session_token)?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    /// Send one multipart request. No retry.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::NoFiles`] for an empty batch,
    /// [`UploadError::Rejected`] carrying the server's error code for a
    /// non-success status, or [`UploadError::Http`] on transport failure.
    pub async fn upload(&self, step_id: Uuid, batch: UploadBatch) -> Result<(), UploadError> {
        if batch.is_empty() {
            return Err(UploadError::NoFiles);
        }
        let count = batch.files.len();
        let kind = batch.kind;
        let url = format!("{}/api/admin/step/{step_id}/assets", self.base_url);
        let response = self.client.post(url).multipart(batch.into_form()?).send().await?;
        if !response.status().is_success() {
            let (status, code) = rejection_code(response).await;
            let message = code.unwrap_or_else(|| "Upload failed".to_owned());
            tracing::warn!(%step_id, status, %message, "upload rejected");
            return Err(UploadError::Rejected { status, message });
        }
        tracing::info!(%step_id, count, kind = kind.as_str(), "upload complete");
        Ok(())
    }
}

/// Upload a batch, then reload the board so server-placed assets appear.
///
/// An image batch must target the controller's own board, otherwise the
/// reload would miss the new assets.
///
/// # Errors
///
/// Returns [`UploadError::BoardMismatch`] before sending anything when an
/// image batch targets another board. Otherwise propagates the upload
/// failure, or [`UploadError::Refresh`] when the upload went through but
/// the reload did not.
pub async fn upload_and_refresh<P>(
    uploader: &HttpUploader,
    persistence: &P,
    controller: &mut BoardController,
    batch: UploadBatch,
) -> Result<(), UploadError>
where
    P: AssetPersistence + ?Sized,
{
    let open = controller.board().moodboard_id;
    if batch.kind == AssetType::Image && batch.target_moodboard() != open {
        return Err(UploadError::BoardMismatch { target: batch.target_moodboard(), open });
    }
    uploader.upload(controller.board().step_id, batch).await?;
    refresh(persistence, controller).await
}

/// Reload a controller from the server snapshot of its board.
///
/// # Errors
///
/// Returns [`UploadError::Refresh`] if the board cannot be read.
pub async fn refresh<P>(persistence: &P, controller: &mut BoardController) -> Result<(), UploadError>
where
    P: AssetPersistence + ?Sized,
{
    let assets = persistence.load_board(&controller.board()).await?;
    controller.reload(assets);
    Ok(())
}
