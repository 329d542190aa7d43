use serde::{Deserialize, Serialize};

use crate::error::ConvertError;
use crate::ply::PlyFormat;

/// Samples per unit of surface area used when the caller does not choose one.
pub const DEFAULT_DENSITY: f32 = 1.0;

/// Upper bound on samples planned for one conversion.
pub const DEFAULT_MAX_SAMPLES: u64 = 100_000_000;

/// Conversion settings. Maps to the `[conversion]` table of the CLI settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Target samples per unit area (must be > 0).
    pub density: f32,
    /// Global multiplier applied to every splat scale (must be > 0).
    pub scale_multiplier: f32,
    /// Output schema.
    pub format: PlyFormat,
    /// Seed for reproducible sampling; `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Downscale textures larger than this on either side.
    pub max_texture_size: Option<u32>,
    /// Worker threads; `None` uses the global rayon pool.
    pub threads: Option<usize>,
    /// Write a zero-vertex file instead of failing when nothing was generated.
    pub allow_empty: bool,
    /// Refuse conversions that would plan more samples than this.
    pub max_samples: u64,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            density: DEFAULT_DENSITY,
            scale_multiplier: 1.0,
            format: PlyFormat::Standard,
            seed: None,
            max_texture_size: None,
            threads: None,
            allow_empty: false,
            max_samples: DEFAULT_MAX_SAMPLES,
        }
    }
}

impl ConvertOptions {
    /// Check numeric ranges before any work is done.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if !(self.density.is_finite() && self.density > 0.0) {
            return Err(ConvertError::InvalidDensity(self.density));
        }
        if !(self.scale_multiplier.is_finite() && self.scale_multiplier > 0.0) {
            return Err(ConvertError::InvalidScaleMultiplier(self.scale_multiplier));
        }
        Ok(())
    }
}
