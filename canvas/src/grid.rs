//! Grid quantization and board containment.
//!
//! The grid is never persisted. It only quantizes incoming real-valued
//! positions and sizes so that every stored layout value is a whole
//! multiple of the cell size.

#[cfg(test)]
#[path = "grid_test.rs"]
mod grid_test;

use crate::consts::{BOARD_HEIGHT, BOARD_WIDTH, GRID_SIZE};

/// Square-cell grid used to quantize layout values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    /// Cell edge length in layout units. Always positive.
    pub size: i32,
}

impl Default for Grid {
    fn default() -> Self {
        Self { size: GRID_SIZE }
    }
}

impl Grid {
    /// Build a grid with the given cell size. Non-positive sizes fall back to
    /// [`GRID_SIZE`].
    #[must_use]
    pub fn new(size: i32) -> Self {
        if size > 0 { Self { size } } else { Self::default() }
    }

    /// Snap a raw value to the nearest grid multiple.
    ///
    /// Ties round toward positive infinity (`25 -> 50`, `-25 -> 0`), never
    /// truncate. Non-finite input snaps to zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn snap(&self, raw: f64) -> i32 {
        if !raw.is_finite() {
            return 0;
        }
        let size = f64::from(self.size);
        let cells = (raw / size + 0.5).floor();
        let snapped = cells * size;
        snapped.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
    }

    /// Snap a width or height. The result is never smaller than one cell.
    #[must_use]
    pub fn snap_extent(&self, raw: f64) -> i32 {
        self.snap(raw).max(self.size)
    }

    /// Round an integer value down to a grid multiple.
    #[must_use]
    pub fn floor(&self, value: i32) -> i32 {
        value.div_euclid(self.size) * self.size
    }

    /// Whether `value` sits exactly on a grid line.
    #[must_use]
    pub fn is_aligned(&self, value: i32) -> bool {
        value.rem_euclid(self.size) == 0
    }

    /// Number of grid-aligned top-left positions available to an item of
    /// `size` inside `extent`. Zero when the item does not fit.
    #[must_use]
    pub fn slots(&self, extent: i32, size: i32) -> i32 {
        let room = extent - size;
        if room < 0 { 0 } else { room / self.size + 1 }
    }
}

/// Logical board extent. Assets must stay fully inside it after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardBounds {
    pub width: i32,
    pub height: i32,
}

impl Default for BoardBounds {
    fn default() -> Self {
        Self { width: BOARD_WIDTH, height: BOARD_HEIGHT }
    }
}

impl BoardBounds {
    /// Clamp an already snapped position so the box `(x, y, w, h)` lies
    /// within the board.
    ///
    /// The upper bound is itself rounded down to the grid, so a clamped
    /// value stays aligned. An asset larger than the board pins to 0.
    #[must_use]
    pub fn clamp_position(&self, grid: &Grid, x: i32, y: i32, w: i32, h: i32) -> (i32, i32) {
        let max_x = grid.floor(self.width - w).max(0);
        let max_y = grid.floor(self.height - h).max(0);
        (x.min(max_x).max(0), y.min(max_y).max(0))
    }

    /// Whether the box lies entirely inside the board.
    #[must_use]
    pub fn contains(&self, x: i32, y: i32, w: i32, h: i32) -> bool {
        x >= 0 && y >= 0 && x + w <= self.width && y + h <= self.height
    }
}
