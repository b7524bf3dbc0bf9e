#[cfg(test)]
#[path = "view_test.rs"]
mod view_test;

use crate::consts::{BOARD_HEIGHT, BOARD_WIDTH, GRID_SIZE};
use crate::doc::PlacedAsset;

/// A point in screen space (CSS pixels) or logical board space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// How large the board is currently drawn on screen.
///
/// The board always keeps the `BOARD_WIDTH : BOARD_HEIGHT` aspect ratio, so
/// the rendered width alone determines the scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Rendered board width in CSS pixels.
    pub rendered_width: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { rendered_width: f64::from(BOARD_WIDTH) }
    }
}

impl Viewport {
    #[must_use]
    pub fn new(rendered_width: f64) -> Self {
        Self { rendered_width }
    }

    /// Screen pixels per logical unit. Falls back to 1.0 for a board that has
    /// not been laid out yet.
    #[must_use]
    pub fn scale(&self) -> f64 {
        if self.rendered_width.is_finite() && self.rendered_width > 0.0 {
            self.rendered_width / f64::from(BOARD_WIDTH)
        } else {
            1.0
        }
    }

    /// Rendered board height in CSS pixels.
    #[must_use]
    pub fn rendered_height(&self) -> f64 {
        f64::from(BOARD_HEIGHT) * self.scale()
    }

    /// Convert a screen-space delta into logical units.
    #[must_use]
    pub fn screen_delta_to_logical(&self, dx: f64, dy: f64) -> Point {
        let scale = self.scale();
        Point { x: dx / scale, y: dy / scale }
    }
}

/// Layout expressed as percentages of the board, for responsive rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Convert an asset's logical layout into board percentages.
#[must_use]
pub fn percent_rect(asset: &PlacedAsset) -> PercentRect {
    let bw = f64::from(BOARD_WIDTH);
    let bh = f64::from(BOARD_HEIGHT);
    PercentRect {
        left: f64::from(asset.position_x) / bw * 100.0,
        top: f64::from(asset.position_y) / bh * 100.0,
        width: f64::from(asset.width) / bw * 100.0,
        height: f64::from(asset.height) / bh * 100.0,
    }
}

/// Grid overlay cell size as `(width %, height %)` of the board.
#[must_use]
pub fn grid_cell_percent() -> (f64, f64) {
    let cell = f64::from(GRID_SIZE);
    (cell / f64::from(BOARD_WIDTH) * 100.0, cell / f64::from(BOARD_HEIGHT) * 100.0)
}
