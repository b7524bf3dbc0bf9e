use super::*;
use canvas::doc::{AssetPatch, PlacedAsset};

fn asset(id: Uuid, x: i32, y: i32) -> PlacedAsset {
    PlacedAsset {
        id,
        url: format!("/uploads/{id}.png"),
        filename: "mood.png".to_owned(),
        position_x: x,
        position_y: y,
        width: 150,
        height: 100,
        rotation: 0.0,
        z_index: 1,
        description: None,
        show_description: false,
    }
}

fn controller_with(id: Uuid, editable: bool) -> BoardController {
    let board = BoardKey::unassigned(Uuid::new_v4());
    BoardController::new(board, vec![asset(id, 100, 100)], editable)
}

// =============================================================================
// argument parsing
// =============================================================================

#[test]
fn cli_parses_board_move() {
    let step = Uuid::new_v4();
    let asset_id = Uuid::new_v4();
    let cli = Cli::try_parse_from([
        "proofboard-cli",
        "--session-token",
        "tok",
        "board",
        "--step",
        &step.to_string(),
        "move",
        &asset_id.to_string(),
        "420",
        "75",
    ])
    .expect("parse");

    assert_eq!(cli.session_token.as_deref(), Some("tok"));
    let Command::Board(args) = cli.command else {
        panic!("expected board command");
    };
    assert_eq!(args.step, step);
    assert_eq!(args.moodboard, None);
    let BoardSubcommand::Move { asset, x, y } = args.command else {
        panic!("expected move");
    };
    assert_eq!(asset, asset_id);
    assert!((x - 420.0).abs() < f64::EPSILON);
    assert!((y - 75.0).abs() < f64::EPSILON);
}

#[test]
fn cli_upload_defaults_to_images() {
    let step = Uuid::new_v4();
    let cli = Cli::try_parse_from(["proofboard-cli", "upload", "--step", &step.to_string(), "a.png", "b.jpg"])
        .expect("parse");
    let Command::Upload(args) = cli.command else {
        panic!("expected upload command");
    };
    assert_eq!(args.kind, KindArg::Image);
    assert_eq!(args.paths.len(), 2);
    assert_eq!(AssetType::from(args.kind), AssetType::Image);
    assert_eq!(AssetType::from(KindArg::File), AssetType::File);
}

#[test]
fn cli_rejects_paste_with_paths() {
    let step = Uuid::new_v4();
    let result = Cli::try_parse_from([
        "proofboard-cli",
        "upload",
        "--step",
        &step.to_string(),
        "--paste",
        "image/png",
        "a.png",
    ]);
    assert!(result.is_err());
}

#[test]
fn missing_token_is_reported() {
    let ctx = CliContext { base_url: "http://localhost:3000/".to_owned(), session_token: None };
    assert!(matches!(ctx.token(), Err(CliError::MissingSessionToken)));
    assert_eq!(ctx.url("/healthz"), "http://localhost:3000/healthz");
}

// =============================================================================
// helpers
// =============================================================================

#[test]
fn session_token_is_read_from_set_cookie() {
    assert_eq!(
        session_token_from_set_cookie("session_token=abc123; HttpOnly; SameSite=Lax; Path=/"),
        Some("abc123".to_owned())
    );
    assert_eq!(session_token_from_set_cookie("other=1; Path=/"), None);
    assert_eq!(session_token_from_set_cookie("session_token=; Max-Age=0"), None);
}

#[test]
fn content_type_follows_extension() {
    assert_eq!(content_type_for(Path::new("shot.PNG")), "image/png");
    assert_eq!(content_type_for(Path::new("photo.jpeg")), "image/jpeg");
    assert_eq!(content_type_for(Path::new("brief.pdf")), "application/pdf");
    assert_eq!(content_type_for(Path::new("archive")), "application/octet-stream");
}

#[test]
fn locked_flag_is_read_from_listing() {
    let locked = Uuid::new_v4();
    let open = Uuid::new_v4();
    let listing = json!({
        "moodboards": [
            { "id": locked.to_string(), "name": "Concept 2", "locked": true, "assets": [] },
            { "id": open.to_string(), "name": "Concept 3", "locked": false, "assets": [] },
        ]
    });
    assert!(board_is_locked(&listing, locked));
    assert!(!board_is_locked(&listing, open));
    assert!(!board_is_locked(&listing, Uuid::new_v4()));
    assert!(!board_is_locked(&Value::Null, locked));
}

// =============================================================================
// plan_actions
// =============================================================================

#[test]
fn move_snaps_and_clamps() {
    let id = Uuid::new_v4();
    let mut controller = controller_with(id, true);
    let actions = plan_actions(&mut controller, &BoardSubcommand::Move { asset: id, x: 1390.0, y: -20.0 })
        .expect("plan");
    assert_eq!(actions, vec![Action::Persist { asset_id: id, patch: AssetPatch::position(1250, 0) }]);
}

#[test]
fn drag_scales_screen_delta_by_viewport() {
    let id = Uuid::new_v4();
    let mut controller = controller_with(id, true);
    let command = BoardSubcommand::Drag { asset: id, dx: 60.0, dy: 30.0, viewport_width: 700.0 };
    let actions = plan_actions(&mut controller, &command).expect("plan");
    assert_eq!(actions, vec![Action::Persist { asset_id: id, patch: AssetPatch::position(200, 150) }]);
}

#[test]
fn delete_emits_delete_action() {
    let id = Uuid::new_v4();
    let mut controller = controller_with(id, true);
    let actions = plan_actions(&mut controller, &BoardSubcommand::Delete { asset: id }).expect("plan");
    assert_eq!(actions, vec![Action::Delete { asset_id: id }]);
    assert!(controller.asset(&id).is_none());
}

#[test]
fn locked_board_refuses_edits() {
    let id = Uuid::new_v4();
    let mut controller = controller_with(id, false);
    let result = plan_actions(&mut controller, &BoardSubcommand::Raise { asset: id });
    assert!(matches!(result, Err(CliError::ReadOnly)));
}

#[test]
fn unknown_asset_is_an_error() {
    let id = Uuid::new_v4();
    let mut controller = controller_with(id, true);
    let other = Uuid::new_v4();
    let result = plan_actions(&mut controller, &BoardSubcommand::Describe { asset: other, text: "x".to_owned() });
    assert!(matches!(result, Err(CliError::UnknownAsset(missing)) if missing == other));
}
