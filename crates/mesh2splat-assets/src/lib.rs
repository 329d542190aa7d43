//! mesh2splat Assets - glTF scene loading
//!
//! Flattens glTF 2.0 documents (.gltf or .glb) into world-space triangles,
//! a material table and decoded textures for the conversion pipeline.

mod error;
mod gltf_loader;
mod material;
mod mesh;
mod texture;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use error::AssetError;
pub use gltf_loader::{load_scene, load_scene_with, LoadOptions};
pub use material::{MaterialAsset, TextureRef};
pub use mesh::SceneAsset;
pub use texture::TextureAsset;
