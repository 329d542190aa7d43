//! Gaussian parameter synthesis from surface samples
//!
//! Every splat is a flat, surfel-like Gaussian lying in the triangle's tangent
//! plane: local +Z follows the surface normal, local +X follows the triangle's
//! reference edge, and the two tangent axes share one isotropic extent.

use glam::{Mat3, Quat, Vec3, Vec4};
use mesh2splat_assets::{SceneAsset, TextureRef};
use mesh2splat_core::{Barycentric, Color, PbrChannels, Splat, Triangle, LENGTH_EPSILON};

use crate::error::ConvertError;
use crate::sampler::SamplePoint;

/// Smallest extent any splat axis may have.
pub const MIN_SCALE: f32 = 1e-7;

/// Extent along the normal relative to the tangent extent.
pub const NORMAL_AXIS_RATIO: f32 = 0.1;

/// Builds splats for samples of one scene.
#[derive(Debug, Clone, Copy)]
pub struct SplatSynthesizer<'a> {
    scene: &'a SceneAsset,
    scale_multiplier: f32,
    with_pbr: bool,
}

impl<'a> SplatSynthesizer<'a> {
    pub fn new(scene: &'a SceneAsset, scale_multiplier: f32, with_pbr: bool) -> Self {
        Self {
            scene,
            scale_multiplier,
            with_pbr,
        }
    }

    /// Produce the splat for one sample of `triangle`, which received
    /// `samples_on_triangle` samples in total.
    ///
    /// Fails only when neither the vertex normals nor the face yield a normal.
    pub fn synthesize(
        &self,
        sample: &SamplePoint,
        triangle: &Triangle,
        samples_on_triangle: usize,
    ) -> Result<Splat, ConvertError> {
        let bary = &sample.bary;

        let normal = triangle
            .normal_at(bary)
            .or_else(|| triangle.face_normal())
            .ok_or(ConvertError::DegenerateGeometry {
                triangle: sample.triangle,
            })?;

        let sigma = tangent_extent(triangle.area(), samples_on_triangle, self.scale_multiplier);
        let scale = Vec3::new(
            sigma,
            sigma,
            (sigma * NORMAL_AXIS_RATIO).max(MIN_SCALE),
        );

        Ok(Splat {
            position: triangle.point_at(bary),
            color: self.color(triangle, bary),
            scale,
            rotation: tangent_frame(normal, triangle),
            normal,
            pbr: self.with_pbr.then(|| self.pbr(triangle, bary)),
        })
    }

    fn sample_slot(&self, slot: Option<TextureRef>, triangle: &Triangle, bary: &Barycentric) -> Option<Vec4> {
        let slot = slot?;
        let texture = self.scene.texture(slot.image)?;
        let uv = triangle.uv_at(slot.tex_coord, bary)?;
        texture.sample(uv).filter(|t| t.is_finite())
    }

    fn color(&self, triangle: &Triangle, bary: &Barycentric) -> Color {
        let Some(material) = self.scene.material(triangle.material) else {
            return Color::WHITE;
        };

        let mut rgba = material.base_color_factor;
        if let Some(texel) = self.sample_slot(material.base_color_texture, triangle, bary) {
            rgba *= texel;
        }
        if let Some(vertex) = triangle.color_at(bary).filter(|c| c.is_finite()) {
            rgba *= vertex;
        }
        if let Some(ao) = self.sample_slot(material.occlusion_texture, triangle, bary) {
            let occlusion = 1.0 + material.occlusion_strength * (ao.x - 1.0);
            rgba = (rgba.truncate() * occlusion).extend(rgba.w);
        }

        if rgba.is_finite() {
            Color::from_vec4(rgba.clamp(Vec4::ZERO, Vec4::ONE))
        } else {
            Color::from_vec4(material.base_color_factor.clamp(Vec4::ZERO, Vec4::ONE))
        }
    }

    fn pbr(&self, triangle: &Triangle, bary: &Barycentric) -> PbrChannels {
        let Some(material) = self.scene.material(triangle.material) else {
            return PbrChannels::default();
        };

        let mut roughness = material.roughness_factor;
        let mut metallic = material.metallic_factor;
        if let Some(mr) = self.sample_slot(material.metallic_roughness_texture, triangle, bary) {
            roughness *= mr.y;
            metallic *= mr.z;
        }

        let mut emissive = material.emissive_factor;
        if let Some(texel) = self.sample_slot(material.emissive_texture, triangle, bary) {
            emissive *= texel.truncate();
        }

        PbrChannels {
            roughness: roughness.clamp(0.0, 1.0),
            metallic: metallic.clamp(0.0, 1.0),
            emissive: if emissive.is_finite() {
                emissive.max(Vec3::ZERO)
            } else {
                Vec3::ZERO
            },
        }
    }
}

/// Isotropic tangent-plane extent: `sqrt(area / samples) * multiplier`,
/// clamped to at least [`MIN_SCALE`].
pub fn tangent_extent(area: f32, samples: usize, scale_multiplier: f32) -> f32 {
    let spacing = (area / samples.max(1) as f32).sqrt();
    let spacing = if spacing.is_finite() {
        spacing.max(MIN_SCALE)
    } else {
        MIN_SCALE
    };
    (spacing * scale_multiplier).max(MIN_SCALE)
}

/// Right-handed rotation taking local +Z to `normal` and local +X to the
/// triangle's reference edge projected into the tangent plane. When no edge
/// is usable, the world axis least aligned with the normal stands in.
pub fn tangent_frame(normal: Vec3, triangle: &Triangle) -> Quat {
    let project = |v: Vec3| v - normal * v.dot(normal);

    let tangent = triangle
        .reference_edge()
        .map(project)
        .filter(|t| t.length() > LENGTH_EPSILON.sqrt())
        .unwrap_or_else(|| project(least_aligned_axis(normal)))
        .normalize();
    let bitangent = normal.cross(tangent);

    Quat::from_mat3(&Mat3::from_cols(tangent, bitangent, normal)).normalize()
}

fn least_aligned_axis(n: Vec3) -> Vec3 {
    let a = n.abs();
    if a.x <= a.y && a.x <= a.z {
        Vec3::X
    } else if a.y <= a.z {
        Vec3::Y
    } else {
        Vec3::Z
    }
}
