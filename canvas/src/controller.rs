//! Canvas Controller: the session-local owner of one board's layout.
//!
//! DESIGN
//! ======
//! Every mutation is applied to the local store first and then returned as
//! `Action`s for the host to persist. Nothing here waits on the network; the
//! host dispatches actions fire-and-forget (see [`crate::sync`]) and the
//! next full `reload` reconciles whatever did not stick.
//!
//! Quantization lives only here. Moves snap to the grid and clamp so the
//! whole asset stays on the board; resizes snap and floor at one cell but
//! leave the position alone, so a resize may push an asset past the board
//! edge.

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;

use crate::consts::DEFAULT_Z_INDEX;
use crate::doc::{AssetId, AssetPatch, AssetStore, BoardKey, PlacedAsset};
use crate::gesture::GestureOutcome;
use crate::grid::{BoardBounds, Grid};

/// Persistence requests produced by controller mutations.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Write these layout/metadata fields for one asset.
    Persist { asset_id: AssetId, patch: AssetPatch },
    /// Delete one asset and its stored file.
    Delete { asset_id: AssetId },
}

/// Immutable, draw-ordered copy of a board's assets.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    pub board: BoardKey,
    pub assets: Vec<PlacedAsset>,
    pub selected: Option<AssetId>,
}

pub struct BoardController {
    board: BoardKey,
    store: AssetStore,
    grid: Grid,
    bounds: BoardBounds,
    selected: Option<AssetId>,
    max_z: i32,
    editable: bool,
}

impl BoardController {
    /// Build a controller over a server snapshot. A read-only controller
    /// (client view, locked board) ignores every mutation.
    #[must_use]
    pub fn new(board: BoardKey, assets: Vec<PlacedAsset>, editable: bool) -> Self {
        let mut controller = Self {
            board,
            store: AssetStore::new(),
            grid: Grid::default(),
            bounds: BoardBounds::default(),
            selected: None,
            max_z: DEFAULT_Z_INDEX,
            editable,
        };
        controller.reload(assets);
        controller
    }

    /// Override the grid and board extent (tests, alternate layouts).
    #[must_use]
    pub fn with_geometry(mut self, grid: Grid, bounds: BoardBounds) -> Self {
        self.grid = grid;
        self.bounds = bounds;
        self
    }

    // --- Reconciliation ---

    /// Replace local state with a fresh server snapshot.
    ///
    /// Any optimistic change the server did not accept disappears here. The
    /// selection survives only if the selected asset still exists.
    pub fn reload(&mut self, assets: Vec<PlacedAsset>) {
        self.store.load_snapshot(assets);
        self.max_z = self.store.max_z_index().unwrap_or(DEFAULT_Z_INDEX).max(DEFAULT_Z_INDEX);
        if let Some(id) = self.selected
            && self.store.get(&id).is_none()
        {
            self.selected = None;
        }
    }

    // --- Layout ---

    /// Snap a raw drop position to the grid and clamp it inside the board.
    pub fn apply_move(&mut self, id: AssetId, raw_x: f64, raw_y: f64) -> Vec<Action> {
        if !self.editable {
            return Vec::new();
        }
        let Some(asset) = self.store.get(&id) else {
            return Vec::new();
        };
        let (x, y) = self.bounds.clamp_position(
            &self.grid,
            self.grid.snap(raw_x),
            self.grid.snap(raw_y),
            asset.width,
            asset.height,
        );
        self.commit(id, AssetPatch::position(x, y))
    }

    /// Snap a raw size to the grid, never below one cell. Position is not
    /// re-clamped.
    pub fn apply_resize(&mut self, id: AssetId, raw_w: f64, raw_h: f64) -> Vec<Action> {
        if !self.editable || self.store.get(&id).is_none() {
            return Vec::new();
        }
        let patch = AssetPatch::size(self.grid.snap_extent(raw_w), self.grid.snap_extent(raw_h));
        self.commit(id, patch)
    }

    /// Route a finished Asset View gesture to the matching layout operation.
    pub fn finish_gesture(&mut self, outcome: GestureOutcome) -> Vec<Action> {
        match outcome {
            GestureOutcome::Moved { id, raw_x, raw_y } => self.apply_move(id, raw_x, raw_y),
            GestureOutcome::Resized { id, raw_w, raw_h } => self.apply_resize(id, raw_w, raw_h),
        }
    }

    // --- Selection ---

    /// Select an asset and raise it above every sibling.
    ///
    /// The stacking order is one more than the highest value handed out so
    /// far, so the most recent call always wins.
    pub fn select_and_raise(&mut self, id: AssetId) -> Vec<Action> {
        if !self.editable || self.store.get(&id).is_none() {
            return Vec::new();
        }
        self.selected = Some(id);
        self.max_z = self.max_z.saturating_add(1);
        self.commit(id, AssetPatch::z_index(self.max_z))
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    // --- Metadata ---

    pub fn set_description(&mut self, id: AssetId, text: &str) -> Vec<Action> {
        if !self.editable || self.store.get(&id).is_none() {
            return Vec::new();
        }
        let patch = AssetPatch { description: Some(text.to_owned()), ..Default::default() };
        self.commit(id, patch)
    }

    pub fn set_description_visible(&mut self, id: AssetId, visible: bool) -> Vec<Action> {
        if !self.editable || self.store.get(&id).is_none() {
            return Vec::new();
        }
        let patch = AssetPatch { show_description: Some(visible), ..Default::default() };
        self.commit(id, patch)
    }

    // --- Deletion ---

    /// Remove an asset locally and request its deletion. A failed delete is
    /// never rolled back here; the next reload restores it.
    pub fn delete_asset(&mut self, id: AssetId) -> Vec<Action> {
        if !self.editable || self.store.remove(&id).is_none() {
            return Vec::new();
        }
        self.selected = None;
        vec![Action::Delete { asset_id: id }]
    }

    // --- Queries ---

    #[must_use]
    pub fn board(&self) -> BoardKey {
        self.board
    }

    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.editable
    }

    #[must_use]
    pub fn selection(&self) -> Option<AssetId> {
        self.selected
    }

    #[must_use]
    pub fn asset(&self, id: &AssetId) -> Option<&PlacedAsset> {
        self.store.get(id)
    }

    /// Highest stacking order handed out in this session.
    #[must_use]
    pub fn max_z_index(&self) -> i32 {
        self.max_z
    }

    #[must_use]
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            board: self.board,
            assets: self.store.sorted_assets().into_iter().cloned().collect(),
            selected: self.selected,
        }
    }

    fn commit(&mut self, id: AssetId, patch: AssetPatch) -> Vec<Action> {
        if !self.store.apply_patch(&id, &patch) {
            return Vec::new();
        }
        vec![Action::Persist { asset_id: id, patch }]
    }
}
