//! Shared numeric constants for the canvas crate.
//!
//! Every board and every client rendering it share one logical coordinate
//! space. Percentage-based layout on the rendering side depends on these
//! values never differing between participants.

// ── Board ───────────────────────────────────────────────────────

/// Logical board width in layout units (28 grid cells).
pub const BOARD_WIDTH: i32 = 1400;

/// Logical board height in layout units (13 grid cells).
pub const BOARD_HEIGHT: i32 = 650;

// ── Grid ────────────────────────────────────────────────────────

/// Edge length of one square grid cell in layout units.
pub const GRID_SIZE: i32 = 50;

// ── Asset defaults ──────────────────────────────────────────────

/// Width assigned to a freshly uploaded image.
pub const DEFAULT_ASSET_WIDTH: i32 = 150;

/// Height assigned to a freshly uploaded image.
pub const DEFAULT_ASSET_HEIGHT: i32 = 100;

/// Stacking order floor. An empty board still treats 1 as the current top.
pub const DEFAULT_Z_INDEX: i32 = 1;
