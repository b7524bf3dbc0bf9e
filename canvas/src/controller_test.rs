use uuid::Uuid;

use super::*;
use crate::view::Point;

fn asset_at(x: i32, y: i32, w: i32, h: i32, z: i32) -> PlacedAsset {
    PlacedAsset {
        id: Uuid::new_v4(),
        url: "https://blob.test/a.png".into(),
        filename: "a.png".into(),
        position_x: x,
        position_y: y,
        width: w,
        height: h,
        rotation: 0.0,
        z_index: z,
        description: None,
        show_description: false,
    }
}

fn board() -> BoardKey {
    BoardKey::unassigned(Uuid::new_v4())
}

fn controller_with(assets: Vec<PlacedAsset>) -> BoardController {
    BoardController::new(board(), assets, true)
}

fn persisted_patch(actions: &[Action]) -> &AssetPatch {
    match actions {
        [Action::Persist { patch, .. }] => patch,
        other => panic!("expected one persist action, got {other:?}"),
    }
}

// =============================================================
// Move
// =============================================================

#[test]
fn move_snaps_to_nearest_cell() {
    let a = asset_at(0, 0, 150, 100, 1);
    let id = a.id;
    let mut c = controller_with(vec![a]);

    let actions = c.apply_move(id, 172.0, 88.0);
    assert_eq!(persisted_patch(&actions), &AssetPatch::position(150, 100));
    let stored = c.asset(&id).unwrap();
    assert_eq!((stored.position_x, stored.position_y), (150, 100));
}

#[test]
fn move_past_right_edge_clamps_inside_board() {
    let a = asset_at(0, 0, 150, 100, 1);
    let id = a.id;
    let mut c = controller_with(vec![a]);

    let actions = c.apply_move(id, 1380.0, 600.0);
    assert_eq!(persisted_patch(&actions), &AssetPatch::position(1250, 550));
}

#[test]
fn move_to_negative_clamps_to_origin() {
    let a = asset_at(200, 200, 150, 100, 1);
    let id = a.id;
    let mut c = controller_with(vec![a]);

    let actions = c.apply_move(id, -80.0, -10.0);
    assert_eq!(persisted_patch(&actions), &AssetPatch::position(0, 0));
}

#[test]
fn move_results_stay_aligned_and_inside_for_all_drops() {
    let a = asset_at(0, 0, 200, 150, 1);
    let id = a.id;
    let mut c = controller_with(vec![a]);
    let bounds = BoardBounds::default();
    let grid = Grid::default();

    let mut raw_x = -300.0;
    while raw_x < 1800.0 {
        let mut raw_y = -300.0;
        while raw_y < 1000.0 {
            c.apply_move(id, raw_x, raw_y);
            let s = c.asset(&id).unwrap();
            assert!(grid.is_aligned(s.position_x), "x {} from {raw_x}", s.position_x);
            assert!(grid.is_aligned(s.position_y), "y {} from {raw_y}", s.position_y);
            assert!(bounds.contains(s.position_x, s.position_y, s.width, s.height));
            raw_y += 37.0;
        }
        raw_x += 41.0;
    }
}

#[test]
fn move_is_idempotent_on_snapped_positions() {
    let a = asset_at(0, 0, 150, 100, 1);
    let id = a.id;
    let mut c = controller_with(vec![a]);

    c.apply_move(id, 523.0, 277.0);
    let first = c.asset(&id).cloned().unwrap();
    let actions = c.apply_move(id, f64::from(first.position_x), f64::from(first.position_y));
    assert_eq!(
        persisted_patch(&actions),
        &AssetPatch::position(first.position_x, first.position_y)
    );
    assert_eq!(c.asset(&id), Some(&first));
}

#[test]
fn move_unknown_asset_is_ignored() {
    let mut c = controller_with(vec![asset_at(0, 0, 150, 100, 1)]);
    assert!(c.apply_move(Uuid::new_v4(), 100.0, 100.0).is_empty());
}

// =============================================================
// Resize
// =============================================================

#[test]
fn resize_snaps_extents() {
    let a = asset_at(0, 0, 150, 100, 1);
    let id = a.id;
    let mut c = controller_with(vec![a]);

    let actions = c.apply_resize(id, 172.0, 88.0);
    assert_eq!(persisted_patch(&actions), &AssetPatch::size(150, 100));
}

#[test]
fn resize_never_goes_below_one_cell() {
    let a = asset_at(0, 0, 150, 100, 1);
    let id = a.id;
    let mut c = controller_with(vec![a]);

    let actions = c.apply_resize(id, 10.0, -40.0);
    assert_eq!(persisted_patch(&actions), &AssetPatch::size(50, 50));
}

#[test]
fn resize_does_not_reclamp_position() {
    // Growing an asset near the edge may overflow the board. The next move
    // pulls it back in.
    let a = asset_at(1250, 550, 150, 100, 1);
    let id = a.id;
    let mut c = controller_with(vec![a]);

    c.apply_resize(id, 300.0, 200.0);
    let s = c.asset(&id).unwrap();
    assert_eq!((s.position_x, s.position_y), (1250, 550));
    assert!(!BoardBounds::default().contains(s.position_x, s.position_y, s.width, s.height));

    let actions = c.apply_move(id, 1250.0, 550.0);
    assert_eq!(persisted_patch(&actions), &AssetPatch::position(1100, 450));
}

// =============================================================
// Selection and stacking
// =============================================================

#[test]
fn raise_uses_one_above_highest() {
    let a = asset_at(0, 0, 150, 100, 3);
    let b = asset_at(0, 0, 150, 100, 7);
    let id_a = a.id;
    let mut c = controller_with(vec![a, b]);

    let actions = c.select_and_raise(id_a);
    assert_eq!(persisted_patch(&actions), &AssetPatch::z_index(8));
    assert_eq!(c.selection(), Some(id_a));
    assert_eq!(c.max_z_index(), 8);
}

#[test]
fn latest_raise_is_topmost() {
    let a = asset_at(0, 0, 150, 100, 1);
    let b = asset_at(0, 0, 150, 100, 1);
    let (id_a, id_b) = (a.id, b.id);
    let mut c = controller_with(vec![a, b]);

    c.select_and_raise(id_a);
    c.select_and_raise(id_b);
    c.select_and_raise(id_a);

    let snapshot = c.snapshot();
    assert_eq!(snapshot.assets.last().map(|x| x.id), Some(id_a));
    let za = c.asset(&id_a).unwrap().z_index;
    let zb = c.asset(&id_b).unwrap().z_index;
    assert!(za > zb);
}

#[test]
fn raise_on_empty_or_zero_board_starts_at_two() {
    let a = asset_at(0, 0, 150, 100, 0);
    let id = a.id;
    let mut c = controller_with(vec![a]);
    assert_eq!(c.max_z_index(), 1);

    let actions = c.select_and_raise(id);
    assert_eq!(persisted_patch(&actions), &AssetPatch::z_index(2));
}

#[test]
fn deselect_clears_selection() {
    let a = asset_at(0, 0, 150, 100, 1);
    let id = a.id;
    let mut c = controller_with(vec![a]);
    c.select_and_raise(id);
    c.deselect();
    assert_eq!(c.selection(), None);
}

// =============================================================
// Metadata
// =============================================================

#[test]
fn description_and_visibility_persist() {
    let a = asset_at(0, 0, 150, 100, 1);
    let id = a.id;
    let mut c = controller_with(vec![a]);

    let actions = c.set_description(id, "warm tones");
    assert_eq!(persisted_patch(&actions).description.as_deref(), Some("warm tones"));
    let actions = c.set_description_visible(id, true);
    assert_eq!(persisted_patch(&actions).show_description, Some(true));

    let s = c.asset(&id).unwrap();
    assert_eq!(s.description.as_deref(), Some("warm tones"));
    assert!(s.show_description);
}

#[test]
fn clearing_a_description_matches_the_stored_null() {
    let a = asset_at(0, 0, 150, 100, 1);
    let id = a.id;
    let mut c = controller_with(vec![a]);
    c.set_description(id, "warm tones");

    let actions = c.set_description(id, "");
    assert_eq!(persisted_patch(&actions).description.as_deref(), Some(""));
    assert_eq!(c.asset(&id).unwrap().description, None);
}

// =============================================================
// Delete and reload
// =============================================================

#[test]
fn delete_removes_locally_and_emits_delete() {
    let a = asset_at(0, 0, 150, 100, 1);
    let id = a.id;
    let mut c = controller_with(vec![a]);
    c.select_and_raise(id);

    let actions = c.delete_asset(id);
    assert_eq!(actions, vec![Action::Delete { asset_id: id }]);
    assert!(c.asset(&id).is_none());
    assert_eq!(c.selection(), None);
    assert!(c.delete_asset(id).is_empty());
}

#[test]
fn reload_restores_server_state_after_failed_delete() {
    let a = asset_at(100, 100, 150, 100, 4);
    let id = a.id;
    let server_copy = a.clone();
    let mut c = controller_with(vec![a]);

    c.delete_asset(id);
    c.reload(vec![server_copy.clone()]);
    assert_eq!(c.asset(&id), Some(&server_copy));
    assert_eq!(c.max_z_index(), 4);
}

#[test]
fn reload_drops_selection_of_vanished_asset() {
    let a = asset_at(0, 0, 150, 100, 1);
    let id = a.id;
    let mut c = controller_with(vec![a]);
    c.select_and_raise(id);

    c.reload(Vec::new());
    assert_eq!(c.selection(), None);
    assert!(c.snapshot().assets.is_empty());
}

// =============================================================
// Read-only
// =============================================================

#[test]
fn read_only_controller_ignores_mutations() {
    let a = asset_at(0, 0, 150, 100, 1);
    let id = a.id;
    let before = a.clone();
    let mut c = BoardController::new(board(), vec![a], false);

    assert!(c.apply_move(id, 500.0, 500.0).is_empty());
    assert!(c.apply_resize(id, 500.0, 500.0).is_empty());
    assert!(c.select_and_raise(id).is_empty());
    assert!(c.set_description(id, "x").is_empty());
    assert!(c.set_description_visible(id, true).is_empty());
    assert!(c.delete_asset(id).is_empty());
    assert_eq!(c.asset(&id), Some(&before));
    assert!(!c.is_editable());
}

// =============================================================
// Gesture hand-off
// =============================================================

#[test]
fn finished_drag_goes_through_move_pipeline() {
    let a = asset_at(0, 0, 150, 100, 1);
    let id = a.id;
    let mut c = controller_with(vec![a.clone()]);
    let mut view = crate::gesture::AssetView::new(true);
    let viewport = crate::view::Viewport::new(700.0);

    assert!(view.begin_drag(&a, Point::new(10.0, 10.0)));
    view.pointer_move(Point::new(700.0, 310.0), &viewport);
    let outcome = view.pointer_up().unwrap();

    let actions = c.finish_gesture(outcome);
    assert_eq!(persisted_patch(&actions), &AssetPatch::position(1250, 550));
}

#[test]
fn custom_geometry_is_respected() {
    let a = asset_at(0, 0, 20, 20, 1);
    let id = a.id;
    let mut c = controller_with(vec![a])
        .with_geometry(Grid::new(10), BoardBounds { width: 100, height: 100 });

    let actions = c.apply_move(id, 94.0, 13.0);
    assert_eq!(persisted_patch(&actions), &AssetPatch::position(80, 10));
}
