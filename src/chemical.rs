//! Chemical descriptors (spec.md §3).

use serde::Deserialize;

/// A single chemical species: its name, clamp ceiling, and whether diffusion
/// for it is isotropic or polarity-weighted.
#[derive(Clone, Debug, Deserialize)]
pub struct Chemical {
    pub name: String,
    pub limit: f32,
    #[serde(default)]
    pub anisotropic: bool,
}

impl Chemical {
    pub fn new(name: impl Into<String>, limit: f32, anisotropic: bool) -> Self {
        Chemical {
            name: name.into(),
            limit,
            anisotropic,
        }
    }
}
