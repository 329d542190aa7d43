use std::path::PathBuf;

use mesh2splat_assets::AssetError;

/// Errors that can occur while converting a mesh or serializing splats.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("I/O error on '{0}': {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("sampling density must be a finite positive number, got {0}")]
    InvalidDensity(f32),

    #[error("scale multiplier must be a finite positive number, got {0}")]
    InvalidScaleMultiplier(f32),

    #[error("triangle {triangle} is degenerate: no usable normal")]
    DegenerateGeometry { triangle: usize },

    #[error("conversion would need {requested} samples, limit is {limit}")]
    SampleBudgetExceeded { requested: u64, limit: u64 },

    #[error("splat buffer is empty")]
    EmptyBuffer,

    #[error("unsupported PLY format flag {0}")]
    UnsupportedFormat(u32),

    #[error("malformed PLY: {0}")]
    MalformedPly(String),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}
