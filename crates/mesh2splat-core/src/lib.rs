//! mesh2splat Core - Shared types for mesh to Gaussian splat conversion
//!
//! This crate provides the value types used throughout the converter:
//! - Mathematical primitives (re-exported from glam)
//! - Triangles with barycentric interpolation helpers
//! - Splats, colors and PBR channels

pub mod geometry;
pub mod types;

pub use geometry::{Barycentric, Triangle, LENGTH_EPSILON, MAX_TEX_COORD_SETS};
pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};
pub use types::{Bounds, Color, PbrChannels, Splat};
