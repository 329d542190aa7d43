//! mesh2splat Convert - mesh to Gaussian splat pipeline
//!
//! Samples the surface of a loaded scene at a target density, turns every
//! sample into a flat oriented Gaussian and writes the result as binary PLY.
//!
//! ```no_run
//! use mesh2splat_convert::{convert, PlyFormat};
//!
//! let ok = convert("model.glb", "model.ply", 10.0, PlyFormat::Standard);
//! ```

mod buffer;
mod config;
mod converter;
mod error;
mod ply;
mod sampler;
mod synth;

pub use buffer::{GaussianData, SplatBuffer};
pub use config::{ConvertOptions, DEFAULT_DENSITY, DEFAULT_MAX_SAMPLES};
pub use converter::{build_splats, convert, try_convert, ConversionStats, Converter};
pub use error::ConvertError;
pub use ply::{
    header, read_ply, read_ply_from, write_ply, write_ply_to, PlyFormat, PlyWriteOptions,
    PLY_FORMAT_PBR, PLY_FORMAT_STANDARD,
};
pub use sampler::{uniform_barycentric, SamplePoint, SurfaceSampler};
pub use synth::{tangent_extent, tangent_frame, SplatSynthesizer, MIN_SCALE, NORMAL_AXIS_RATIO};
