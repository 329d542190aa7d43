//! Value types shared by the loader, the conversion pipeline and the PLY codec

use glam::{Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// RGBA color with floating point components (0.0 to 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    /// Create a color from RGB values (alpha = 1.0)
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color from RGBA values
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a color from 8-bit channels
    pub fn from_rgba8(rgba: [u8; 4]) -> Self {
        Self::rgba(
            rgba[0] as f32 / 255.0,
            rgba[1] as f32 / 255.0,
            rgba[2] as f32 / 255.0,
            rgba[3] as f32 / 255.0,
        )
    }

    /// Quantize to 8-bit channels, rounding to nearest and clamping to [0, 255]
    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |c: f32| {
            if c.is_nan() {
                0
            } else {
                (c.clamp(0.0, 1.0) * 255.0).round() as u8
            }
        };
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// Convert to an array [r, g, b, a]
    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_vec4(v: Vec4) -> Self {
        Self::rgba(v.x, v.y, v.z, v.w)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Physically based shading channels carried by PBR-format splats
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PbrChannels {
    /// Perceptual roughness in [0, 1]
    pub roughness: f32,
    /// Metalness in [0, 1]
    pub metallic: f32,
    /// Emitted radiance, linear RGB
    pub emissive: Vec3,
}

impl Default for PbrChannels {
    /// glTF factor defaults: fully rough, fully metallic, no emission.
    fn default() -> Self {
        Self {
            roughness: 1.0,
            metallic: 1.0,
            emissive: Vec3::ZERO,
        }
    }
}

/// One Gaussian splat.
///
/// Scale components are strictly positive; rotation and normal are unit length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Splat {
    pub position: Vec3,
    pub color: Color,
    /// Standard deviation along each local axis (x, y tangent; z along the normal)
    pub scale: Vec3,
    /// Local-to-world rotation; local +Z maps onto `normal`
    pub rotation: Quat,
    pub normal: Vec3,
    pub pbr: Option<PbrChannels>,
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    /// An inverted box that any point will expand
    pub const EMPTY: Bounds = Bounds {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn include(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_rgba8_round_trip() {
        for k in [0u8, 1, 127, 128, 254, 255] {
            let color = Color::from_rgba8([k, k, k, k]);
            assert_eq!(color.to_rgba8(), [k, k, k, k]);
        }
    }

    #[test]
    fn test_color_quantize_clamps() {
        let color = Color::rgba(-0.5, 1.5, f32::NAN, 0.5);
        assert_eq!(color.to_rgba8(), [0, 255, 0, 128]);
    }

    #[test]
    fn test_bounds_include() {
        let mut bounds = Bounds::EMPTY;
        assert!(bounds.is_empty());
        bounds.include(Vec3::new(1.0, -1.0, 0.0));
        bounds.include(Vec3::new(-2.0, 3.0, 0.5));
        assert_eq!(bounds.min, Vec3::new(-2.0, -1.0, 0.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 3.0, 0.5));
        assert_eq!(bounds.size(), Vec3::new(3.0, 4.0, 0.5));
    }
}
