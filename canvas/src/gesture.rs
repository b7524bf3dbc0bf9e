//! Asset View: pointer gestures on a single placed asset.
//!
//! A gesture starts on pointer-down over an asset (drag) or over its resize
//! handle (resize). `GestureState` carries everything needed to turn each
//! later pointer position into a logical-unit preview, independent of how
//! wide the board is currently rendered. On pointer-up the final unsnapped
//! value is handed to the controller, which owns all quantization; the view
//! never snaps.

#[cfg(test)]
#[path = "gesture_test.rs"]
mod gesture_test;

use crate::doc::{AssetId, PlacedAsset};
use crate::view::{Point, Viewport};

/// Active gesture, tracked between pointer-down and pointer-up.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum GestureState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// The user is moving an asset.
    Dragging {
        id: AssetId,
        /// Screen position of the pointer at gesture start.
        start_screen: Point,
        /// Asset x at gesture start, in layout units.
        start_x: f64,
        /// Asset y at gesture start, in layout units.
        start_y: f64,
        /// Current unsnapped position.
        preview: Point,
    },
    /// The user is resizing an asset from its bottom-right handle.
    Resizing {
        id: AssetId,
        start_screen: Point,
        start_w: f64,
        start_h: f64,
        /// Current unsnapped size, `x` = width, `y` = height.
        preview: Point,
    },
}

/// Final value of a finished gesture, still unsnapped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutcome {
    Moved { id: AssetId, raw_x: f64, raw_y: f64 },
    Resized { id: AssetId, raw_w: f64, raw_h: f64 },
}

/// Gesture interpreter for the assets of one board.
#[derive(Debug, Clone, Default)]
pub struct AssetView {
    state: GestureState,
    editable: bool,
}

impl AssetView {
    /// Create an interpreter. A read-only view never starts a gesture.
    #[must_use]
    pub fn new(editable: bool) -> Self {
        Self { state: GestureState::Idle, editable }
    }

    #[must_use]
    pub fn state(&self) -> &GestureState {
        &self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state != GestureState::Idle
    }

    /// Start moving `asset`. Returns false if the view is read-only.
    pub fn begin_drag(&mut self, asset: &PlacedAsset, screen: Point) -> bool {
        if !self.editable {
            return false;
        }
        let start = Point::new(f64::from(asset.position_x), f64::from(asset.position_y));
        self.state = GestureState::Dragging {
            id: asset.id,
            start_screen: screen,
            start_x: start.x,
            start_y: start.y,
            preview: start,
        };
        true
    }

    /// Start resizing `asset`. Returns false if the view is read-only.
    pub fn begin_resize(&mut self, asset: &PlacedAsset, screen: Point) -> bool {
        if !self.editable {
            return false;
        }
        let start = Point::new(f64::from(asset.width), f64::from(asset.height));
        self.state = GestureState::Resizing {
            id: asset.id,
            start_screen: screen,
            start_w: start.x,
            start_h: start.y,
            preview: start,
        };
        true
    }

    /// Track a pointer move. Returns the new unsnapped preview (position for
    /// a drag, size for a resize), or `None` when idle.
    pub fn pointer_move(&mut self, screen: Point, viewport: &Viewport) -> Option<Point> {
        match &mut self.state {
            GestureState::Idle => None,
            GestureState::Dragging { start_screen, start_x, start_y, preview, .. } => {
                let delta = viewport.screen_delta_to_logical(screen.x - start_screen.x, screen.y - start_screen.y);
                *preview = Point::new(*start_x + delta.x, *start_y + delta.y);
                Some(*preview)
            }
            GestureState::Resizing { start_screen, start_w, start_h, preview, .. } => {
                let delta = viewport.screen_delta_to_logical(screen.x - start_screen.x, screen.y - start_screen.y);
                *preview = Point::new(*start_w + delta.x, *start_h + delta.y);
                Some(*preview)
            }
        }
    }

    /// Finish the gesture and hand back its unsnapped result.
    pub fn pointer_up(&mut self) -> Option<GestureOutcome> {
        match std::mem::take(&mut self.state) {
            GestureState::Idle => None,
            GestureState::Dragging { id, preview, .. } => {
                Some(GestureOutcome::Moved { id, raw_x: preview.x, raw_y: preview.y })
            }
            GestureState::Resizing { id, preview, .. } => {
                Some(GestureOutcome::Resized { id, raw_w: preview.x, raw_h: preview.y })
            }
        }
    }

    /// Drop the gesture without producing an outcome.
    pub fn cancel(&mut self) {
        self.state = GestureState::Idle;
    }
}
