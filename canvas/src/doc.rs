//! Document model: placed assets, sparse layout updates, and the board store.
//!
//! This module defines what sits on a moodboard (`PlacedAsset`), a sparse
//! update type for the allow-listed layout fields (`AssetPatch`), the key
//! naming one board (`BoardKey`), and the in-memory store that caches a
//! board's assets for one editing session (`AssetStore`).
//!
//! The server is the source of truth. The store is a client-side cache that
//! is optimistically mutated and periodically replaced wholesale by
//! `load_snapshot`.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consts::{DEFAULT_ASSET_HEIGHT, DEFAULT_ASSET_WIDTH, DEFAULT_Z_INDEX};

/// Unique identifier for an uploaded asset.
pub type AssetId = Uuid;

/// Names one board: the unassigned bucket of a step, or a named moodboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoardKey {
    /// Step that owns the board.
    pub step_id: Uuid,
    /// Named moodboard, or `None` for the step's unassigned bucket.
    pub moodboard_id: Option<Uuid>,
}

impl BoardKey {
    /// The implicit unassigned bucket of a step.
    #[must_use]
    pub fn unassigned(step_id: Uuid) -> Self {
        Self { step_id, moodboard_id: None }
    }

    /// A named moodboard within a step.
    #[must_use]
    pub fn moodboard(step_id: Uuid, moodboard_id: Uuid) -> Self {
        Self { step_id, moodboard_id: Some(moodboard_id) }
    }
}

/// An uploaded image placed on a board, as stored on the server and on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedAsset {
    /// Unique identifier for this asset.
    pub id: AssetId,
    /// Public URL of the stored image.
    pub url: String,
    /// Original file name.
    pub filename: String,
    /// Left edge in layout units.
    #[serde(default)]
    pub position_x: i32,
    /// Top edge in layout units.
    #[serde(default)]
    pub position_y: i32,
    /// Width in layout units.
    #[serde(default = "default_width")]
    pub width: i32,
    /// Height in layout units.
    #[serde(default = "default_height")]
    pub height: i32,
    /// Rotation in degrees. Stored, not yet driven by any gesture.
    #[serde(default)]
    pub rotation: f64,
    /// Stacking order; higher values draw on top.
    #[serde(default = "default_z_index")]
    pub z_index: i32,
    /// Optional caption text.
    #[serde(default)]
    pub description: Option<String>,
    /// Whether the caption is rendered.
    #[serde(default)]
    pub show_description: bool,
}

fn default_width() -> i32 {
    DEFAULT_ASSET_WIDTH
}

fn default_height() -> i32 {
    DEFAULT_ASSET_HEIGHT
}

fn default_z_index() -> i32 {
    DEFAULT_Z_INDEX
}

/// Sparse update for a placed asset. Only present fields are applied.
///
/// The field set mirrors the server's allow-list exactly; nothing else can
/// be expressed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_x: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_y: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_description: Option<bool>,
}

impl AssetPatch {
    /// A position-only update.
    #[must_use]
    pub fn position(x: i32, y: i32) -> Self {
        Self { position_x: Some(x), position_y: Some(y), ..Default::default() }
    }

    /// A size-only update.
    #[must_use]
    pub fn size(width: i32, height: i32) -> Self {
        Self { width: Some(width), height: Some(height), ..Default::default() }
    }

    /// A stacking-order update.
    #[must_use]
    pub fn z_index(z_index: i32) -> Self {
        Self { z_index: Some(z_index), ..Default::default() }
    }

    /// Returns `true` when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// In-memory store of one board's placed assets.
#[derive(Debug, Default)]
pub struct AssetStore {
    assets: HashMap<AssetId, PlacedAsset>,
}

impl AssetStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { assets: HashMap::new() }
    }

    /// Insert or replace an asset.
    pub fn insert(&mut self, asset: PlacedAsset) {
        self.assets.insert(asset.id, asset);
    }

    /// Remove an asset by id, returning it if it was present.
    pub fn remove(&mut self, id: &AssetId) -> Option<PlacedAsset> {
        self.assets.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &AssetId) -> Option<&PlacedAsset> {
        self.assets.get(id)
    }

    /// Apply a sparse update. Returns false if the asset doesn't exist.
    pub fn apply_patch(&mut self, id: &AssetId, patch: &AssetPatch) -> bool {
        let Some(asset) = self.assets.get_mut(id) else {
            return false;
        };
        if let Some(x) = patch.position_x {
            asset.position_x = x;
        }
        if let Some(y) = patch.position_y {
            asset.position_y = y;
        }
        if let Some(w) = patch.width {
            asset.width = w;
        }
        if let Some(h) = patch.height {
            asset.height = h;
        }
        if let Some(r) = patch.rotation {
            asset.rotation = r;
        }
        if let Some(z) = patch.z_index {
            asset.z_index = z;
        }
        // An empty description clears the caption, matching what the server stores.
        if let Some(ref description) = patch.description {
            asset.description = (!description.is_empty()).then(|| description.clone());
        }
        if let Some(show) = patch.show_description {
            asset.show_description = show;
        }
        true
    }

    /// Replace all assets with a full snapshot.
    pub fn load_snapshot(&mut self, assets: Vec<PlacedAsset>) {
        self.assets.clear();
        for asset in assets {
            self.assets.insert(asset.id, asset);
        }
    }

    /// Return all assets sorted by `(z_index, id)` for draw order.
    #[must_use]
    pub fn sorted_assets(&self) -> Vec<&PlacedAsset> {
        let mut assets: Vec<&PlacedAsset> = self.assets.values().collect();
        assets.sort_by(|a, b| a.z_index.cmp(&b.z_index).then_with(|| a.id.cmp(&b.id)));
        assets
    }

    /// Highest stacking order on the board, if any asset exists.
    #[must_use]
    pub fn max_z_index(&self) -> Option<i32> {
        self.assets.values().map(|a| a.z_index).max()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
