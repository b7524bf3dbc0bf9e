//! Moodboard canvas core.
//!
//! A board is a fixed 1400 x 650 logical space on a 50-unit grid. This crate
//! owns the local, optimistic copy of one board: gestures are interpreted in
//! logical units, quantized by the controller, applied locally, and emitted
//! as [`controller::Action`]s that the host persists through
//! [`sync::AssetPersistence`]. The server remains the source of truth; a full
//! reload reconciles anything that did not stick.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`controller`] | Canvas Controller: snap, clamp, raise, describe, delete |
//! | [`doc`] | Placed asset types, sparse patches, and the in-memory store |
//! | [`gesture`] | Asset View: drag/resize state machine in logical units |
//! | [`view`] | Viewport scale and percentage layout |
//! | [`grid`] | Grid snapping and board containment |
//! | [`sync`] | Persistence Adapter over HTTP and action dispatch |
//! | [`upload`] | Upload Adapter: picker, drop, and clipboard batches |
//! | [`consts`] | Board and grid constants |

pub mod consts;
pub mod controller;
pub mod doc;
pub mod gesture;
pub mod grid;
pub mod sync;
pub mod upload;
pub mod view;

#[cfg(test)]
#[path = "http_stub_test.rs"]
mod http_stub;
