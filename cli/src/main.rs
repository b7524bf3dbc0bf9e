use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use canvas::controller::{Action, BoardController};
use canvas::doc::BoardKey;
use canvas::gesture::AssetView;
use canvas::sync::{self, AssetPersistence, HttpPersistence, SyncError};
use canvas::upload::{self, AssetType, ClipboardItem, HttpUploader, Source, UploadBatch, UploadError, UploadFile};
use canvas::view::{Point, Viewport};
use clap::{Args, Parser, Subcommand, ValueEnum};
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, SET_COOKIE};
use serde_json::{Value, json};
use uuid::Uuid;

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("missing session token; pass --session-token or set PROOFBOARD_SESSION_TOKEN")]
    MissingSessionToken,
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("server returned {status}: {message}")]
    ServerError { status: String, message: String },
    #[error("login response carried no session cookie")]
    NoSessionCookie,
    #[error("asset {0} is not on this board")]
    UnknownAsset(Uuid),
    #[error("board is locked")]
    ReadOnly,
    #[error("{failed} of {total} changes were not saved")]
    SyncFailed { failed: usize, total: usize },
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("{}", .0.inline_message())]
    Upload(#[from] UploadError),
    #[error("cannot read {path}: {source}")]
    ReadFile { path: String, source: io::Error },
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "proofboard-cli", about = "Proofboard moodboard CLI")]
struct Cli {
    #[arg(long, env = "PROOFBOARD_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "PROOFBOARD_SESSION_TOKEN")]
    session_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone)]
struct CliContext {
    base_url: String,
    session_token: Option<String>,
}

impl CliContext {
    fn token(&self) -> Result<&str, CliError> {
        self.session_token.as_deref().ok_or(CliError::MissingSessionToken)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    /// Log in and print the session token.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "PROOFBOARD_PASSWORD")]
        password: String,
    },
    Projects,
    /// Show a step with its boards, files and comments.
    Step { project_id: Uuid, step_id: Uuid },
    Upload(UploadArgs),
    Board(BoardArgs),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Image,
    File,
}

impl From<KindArg> for AssetType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Image => Self::Image,
            KindArg::File => Self::File,
        }
    }
}

#[derive(Args, Debug)]
struct UploadArgs {
    #[arg(long)]
    step: Uuid,

    /// Target moodboard for images; omit for the unassigned board.
    #[arg(long)]
    moodboard: Option<Uuid>,

    #[arg(long, value_enum, default_value_t = KindArg::Image)]
    kind: KindArg,

    /// Read one pasted image of this MIME type from stdin instead of files.
    #[arg(long, conflicts_with = "paths")]
    paste: Option<String>,

    paths: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct BoardArgs {
    #[arg(long)]
    step: Uuid,

    #[arg(long)]
    moodboard: Option<Uuid>,

    #[command(subcommand)]
    command: BoardSubcommand,
}

#[derive(Subcommand, Debug, Clone)]
enum BoardSubcommand {
    Show,
    /// Drop an asset at a raw position; the board snaps and clamps it.
    Move { asset: Uuid, x: f64, y: f64 },
    Resize { asset: Uuid, width: f64, height: f64 },
    /// Replay a pointer drag of `dx`,`dy` screen pixels on a board drawn
    /// `viewport_width` pixels wide.
    Drag {
        asset: Uuid,
        dx: f64,
        dy: f64,
        #[arg(long, default_value_t = 1400.0)]
        viewport_width: f64,
    },
    Raise { asset: Uuid },
    Describe { asset: Uuid, text: String },
    ToggleDescription {
        asset: Uuid,
        #[arg(action = clap::ArgAction::Set)]
        visible: bool,
    },
    Delete { asset: Uuid },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let cli = Cli::parse();
    let ctx = CliContext { base_url: cli.base_url, session_token: cli.session_token };

    match cli.command {
        Command::Ping => run_ping(&ctx).await,
        Command::Login { username, password } => run_login(&ctx, &username, &password).await,
        Command::Projects => {
            let json = api_request(&ctx, reqwest::Method::GET, "/api/projects", None).await?;
            print_json(&json)
        }
        Command::Step { project_id, step_id } => {
            let path = format!("/api/project/{project_id}/step/{step_id}");
            let json = api_request(&ctx, reqwest::Method::GET, &path, None).await?;
            print_json(&json)
        }
        Command::Upload(args) => run_upload(&ctx, args).await,
        Command::Board(args) => run_board(&ctx, args).await,
    }
}

async fn run_ping(cli: &CliContext) -> Result<(), CliError> {
    let response = reqwest::Client::new().get(cli.url("/healthz")).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError {
            status: format!("HTTP {}", status.as_u16()),
            message: "health check failed".to_owned(),
        });
    }
    println!("ok");
    Ok(())
}

async fn run_login(cli: &CliContext, username: &str, password: &str) -> Result<(), CliError> {
    let response = reqwest::Client::new()
        .post(cli.url("/api/auth/login"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        return Err(CliError::ServerError {
            status: format!("HTTP {}", status.as_u16()),
            message: body.to_string(),
        });
    }

    let token = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(session_token_from_set_cookie)
        .ok_or(CliError::NoSessionCookie)?;
    println!("{token}");
    Ok(())
}

async fn run_upload(cli: &CliContext, args: UploadArgs) -> Result<(), CliError> {
    let token = cli.token()?;
    let kind = AssetType::from(args.kind);
    let batch = match args.paste {
        Some(mime_type) => {
            let mut bytes = Vec::new();
            io::stdin()
                .read_to_end(&mut bytes)
                .map_err(|source| CliError::ReadFile { path: "<stdin>".to_owned(), source })?;
            UploadBatch::from_clipboard(vec![ClipboardItem { mime_type, bytes }], now_ms())?
        }
        None => {
            let mut batch = UploadBatch::new(kind, Source::Picker);
            for path in &args.paths {
                let file = read_upload_file(path).await?;
                if !batch.push(file) {
                    tracing::warn!(path = %path.display(), "skipping non-image file");
                }
            }
            batch
        }
    };
    let batch = batch.with_moodboard(args.moodboard);
    let count = batch.files().len();

    let uploader = HttpUploader::new(&cli.base_url, token)?;
    let persistence = HttpPersistence::new(&cli.base_url, token)?;
    let board = BoardKey { step_id: args.step, moodboard_id: batch.target_moodboard() };
    let mut controller = BoardController::new(board, Vec::new(), true);
    upload::upload_and_refresh(&uploader, &persistence, &mut controller, batch).await?;

    tracing::info!(count, "uploaded");
    print_assets(&controller)
}

async fn run_board(cli: &CliContext, args: BoardArgs) -> Result<(), CliError> {
    let token = cli.token()?;
    let persistence = HttpPersistence::new(&cli.base_url, token)?;
    let board = BoardKey { step_id: args.step, moodboard_id: args.moodboard };

    let editable = match args.moodboard {
        Some(moodboard_id) => {
            let path = format!("/api/admin/step/{}/moodboards", args.step);
            let listing = api_request(cli, reqwest::Method::GET, &path, None).await?;
            !board_is_locked(&listing, moodboard_id)
        }
        None => true,
    };

    let assets = persistence.load_board(&board).await?;
    let mut controller = BoardController::new(board, assets, editable);
    if matches!(args.command, BoardSubcommand::Show) {
        return print_assets(&controller);
    }

    let actions = plan_actions(&mut controller, &args.command)?;
    let total = actions.len();
    let report = sync::dispatch(&persistence, board, actions).await;
    if report.failed > 0 {
        return Err(CliError::SyncFailed { failed: report.failed, total });
    }

    upload::refresh(&persistence, &mut controller).await?;
    print_assets(&controller)
}

/// Apply one board command to the local controller and return what has to
/// be persisted.
fn plan_actions(controller: &mut BoardController, command: &BoardSubcommand) -> Result<Vec<Action>, CliError> {
    let asset = match command {
        BoardSubcommand::Show => return Ok(Vec::new()),
        BoardSubcommand::Move { asset, .. }
        | BoardSubcommand::Resize { asset, .. }
        | BoardSubcommand::Drag { asset, .. }
        | BoardSubcommand::Raise { asset }
        | BoardSubcommand::Describe { asset, .. }
        | BoardSubcommand::ToggleDescription { asset, .. }
        | BoardSubcommand::Delete { asset } => *asset,
    };
    if !controller.is_editable() {
        return Err(CliError::ReadOnly);
    }
    let Some(placed) = controller.asset(&asset).cloned() else {
        return Err(CliError::UnknownAsset(asset));
    };

    let actions = match command {
        BoardSubcommand::Show => Vec::new(),
        BoardSubcommand::Move { x, y, .. } => controller.apply_move(asset, *x, *y),
        BoardSubcommand::Resize { width, height, .. } => controller.apply_resize(asset, *width, *height),
        BoardSubcommand::Drag { dx, dy, viewport_width, .. } => {
            let viewport = Viewport::new(*viewport_width);
            let mut view = AssetView::new(true);
            view.begin_drag(&placed, Point::new(0.0, 0.0));
            view.pointer_move(Point::new(*dx, *dy), &viewport);
            match view.pointer_up() {
                Some(outcome) => controller.finish_gesture(outcome),
                None => Vec::new(),
            }
        }
        BoardSubcommand::Raise { .. } => controller.select_and_raise(asset),
        BoardSubcommand::Describe { text, .. } => controller.set_description(asset, text),
        BoardSubcommand::ToggleDescription { visible, .. } => {
            controller.set_description_visible(asset, *visible)
        }
        BoardSubcommand::Delete { .. } => controller.delete_asset(asset),
    };
    Ok(actions)
}

/// Whether `moodboard_id` is marked locked in a moodboard listing.
fn board_is_locked(listing: &Value, moodboard_id: Uuid) -> bool {
    let id = moodboard_id.to_string();
    listing
        .get("moodboards")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|board| board.get("id").and_then(Value::as_str) == Some(id.as_str()))
        .and_then(|board| board.get("locked"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Extract the token from one `Set-Cookie` header value.
fn session_token_from_set_cookie(header: &str) -> Option<String> {
    let pair = header.split(';').next()?.trim();
    let token = pair.strip_prefix("session_token=")?;
    if token.is_empty() { None } else { Some(token.to_owned()) }
}

fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

async fn read_upload_file(path: &Path) -> Result<UploadFile, CliError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| CliError::ReadFile { path: path.display().to_string(), source })?;
    let name = path
        .file_name()
        .map_or_else(|| "upload".to_owned(), |name| name.to_string_lossy().into_owned());
    Ok(UploadFile { name, content_type: content_type_for(path).to_owned(), bytes })
}

async fn api_request(
    cli: &CliContext,
    method: reqwest::Method,
    path: &str,
    body: Option<Value>,
) -> Result<Value, CliError> {
    let session_token = cli.token()?;

    let mut headers = HeaderMap::new();
    headers.insert(COOKIE, HeaderValue::from_str(&format!("session_token={session_token}"))?);

    let client = reqwest::Client::builder().default_headers(headers).build()?;
    let request = client.request(method, cli.url(path));
    let request = if let Some(json) = body { request.json(&json) } else { request };

    let response = request.send().await?;
    let status = response.status();
    let value = response.json::<Value>().await.unwrap_or(Value::Null);

    if !status.is_success() {
        return Err(CliError::ServerError {
            status: format!("HTTP {}", status.as_u16()),
            message: value.to_string(),
        });
    }

    Ok(value)
}

fn now_ms() -> i64 {
    let Ok(duration) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(duration.as_millis()).unwrap_or(0)
}

fn print_assets(controller: &BoardController) -> Result<(), CliError> {
    let snapshot = controller.snapshot();
    print_json(&json!({
        "stepId": snapshot.board.step_id,
        "moodboardId": snapshot.board.moodboard_id,
        "editable": controller.is_editable(),
        "assets": snapshot.assets,
    }))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
