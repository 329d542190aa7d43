use glam::{Vec3, Vec4};

/// Reference from a material slot to a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRef {
    /// Index into `SceneAsset::textures`
    pub image: usize,
    /// TEXCOORD set used to address the texture
    pub tex_coord: usize,
}

/// Metallic-roughness material, as described by glTF 2.0.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialAsset {
    pub name: String,
    /// Linear RGBA multiplier for the base color
    pub base_color_factor: Vec4,
    pub base_color_texture: Option<TextureRef>,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    /// Roughness in the green channel, metalness in blue
    pub metallic_roughness_texture: Option<TextureRef>,
    pub emissive_factor: Vec3,
    pub emissive_texture: Option<TextureRef>,
    /// Ambient occlusion in the red channel
    pub occlusion_texture: Option<TextureRef>,
    pub occlusion_strength: f32,
}

impl Default for MaterialAsset {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            base_color_factor: Vec4::ONE,
            base_color_texture: None,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            metallic_roughness_texture: None,
            emissive_factor: Vec3::ZERO,
            emissive_texture: None,
            occlusion_texture: None,
            occlusion_strength: 1.0,
        }
    }
}

impl MaterialAsset {
    /// A flat-colored material without textures.
    pub fn flat(name: impl Into<String>, base_color_factor: Vec4) -> Self {
        Self {
            name: name.into(),
            base_color_factor,
            ..Default::default()
        }
    }
}
