use mesh2splat_core::{Bounds, Triangle};

use crate::material::MaterialAsset;
use crate::texture::TextureAsset;

/// A flattened glTF scene: world-space triangles plus the tables they index into.
#[derive(Debug, Clone, Default)]
pub struct SceneAsset {
    /// Triangles in document order (scene nodes depth-first, then primitives)
    pub triangles: Vec<Triangle>,
    /// Materials; the last entry is the built-in default material
    pub materials: Vec<MaterialAsset>,
    /// Decoded images by glTF image index; `None` where decoding failed
    pub textures: Vec<Option<TextureAsset>>,
}

impl SceneAsset {
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Material for a triangle, falling back to the default entry for bad indices.
    pub fn material(&self, index: usize) -> Option<&MaterialAsset> {
        self.materials.get(index).or_else(|| self.materials.last())
    }

    pub fn texture(&self, index: usize) -> Option<&TextureAsset> {
        self.textures.get(index).and_then(Option::as_ref)
    }

    /// Sum of all triangle areas
    pub fn surface_area(&self) -> f64 {
        self.triangles.iter().map(|t| t.area() as f64).sum()
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds::EMPTY;
        for p in self.triangles.iter().flat_map(|t| t.positions) {
            bounds.include(p);
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn material_falls_back_to_default() {
        let scene = SceneAsset {
            materials: vec![MaterialAsset::default()],
            ..Default::default()
        };
        assert_eq!(scene.material(5).map(|m| m.name.as_str()), Some("Default"));
    }

    #[test]
    fn surface_area_and_bounds() {
        let scene = SceneAsset {
            triangles: vec![
                Triangle::from_positions(Vec3::ZERO, Vec3::X, Vec3::Y),
                Triangle::from_positions(Vec3::ZERO, Vec3::X * 2.0, Vec3::Z * 2.0),
            ],
            ..Default::default()
        };
        assert!((scene.surface_area() - 2.5).abs() < 1e-6);
        let bounds = scene.bounds();
        assert_eq!(bounds.min, Vec3::ZERO);
        assert_eq!(bounds.max, Vec3::new(2.0, 1.0, 2.0));
    }
}
