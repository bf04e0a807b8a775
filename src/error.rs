//! Fatal, configuration-class errors (spec.md §7).
//!
//! Capacity exhaustion and numerical drift are *not* represented here — both
//! are deliberate soft failures (a skipped division, a clamp) handled in-band
//! by the engine itself, never surfaced as a `Result`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("pattern file '{path}' could not be read: {source}")]
    PatternRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("pattern file '{path}' is malformed: {source}")]
    PatternParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("pattern references unknown chemical index {index} (n_chemicals={n_chemicals})")]
    UnknownChemical { index: usize, n_chemicals: usize },

    #[error("chemical count {0} exceeds MAX_CHEMICALS ({1})")]
    TooManyChemicals(usize, usize),
}

pub type Result<T> = std::result::Result<T, SimError>;
