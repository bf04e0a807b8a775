//! Deterministic, headless simulator of a two-dimensional cell tissue.
//!
//! Cells carry position, polarity, and per-chemical concentration/diffusion
//! state; an ordered rule list drives chemistry, division, and movement,
//! while a pluggable nearest-neighbor-search backend (square grid, spatial
//! sorting, or an exact k-d tree) resolves short-range diffusion, polarity
//! gradients, and collision each step.

pub mod cell;
pub mod chemical;
pub mod error;
pub mod geometry;
pub mod nns;
pub mod pattern;
pub mod rule;
pub mod simulation;
pub mod statistics;
pub mod step;

pub use error::{Result, SimError};
pub use simulation::Simulation;
pub use step::Engine;

/// Initializes `tracing` for binaries embedding this crate. Mirrors the
/// teacher's `setup_logging` convenience wrapper around
/// `tracing_subscriber::fmt`.
pub fn setup_logging(level: Option<String>) {
    let filter = level.unwrap_or_else(|| "info".to_string());
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
