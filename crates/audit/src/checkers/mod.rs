//! Bundled checkers.
//!
//! Each checker watches for a single property over the first
//! [`FRAME_BUDGET`] frames and declares completion once that many frame
//! boundaries have passed. The engine's frame ceiling still applies on top.

pub mod colour_count;
pub mod high_hue;
pub mod vsync_without_vblank;

pub use colour_count::ColourCountChecker;
pub use high_hue::HighHueChecker;
pub use vsync_without_vblank::VsyncWithoutVblankChecker;

/// Frames a checker observes before it has seen enough.
pub const FRAME_BUDGET: u64 = 60;
