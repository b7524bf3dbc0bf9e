//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on request parsing and access checks.

pub mod asset;
pub mod auth;
pub mod blob;
pub mod comment;
pub mod moodboard;
pub mod project;
pub mod session;
pub mod step;
