//! Triangle and barycentric math

use glam::{Vec2, Vec3, Vec4};

/// Number of texture coordinate sets carried per triangle (TEXCOORD_0, TEXCOORD_1)
pub const MAX_TEX_COORD_SETS: usize = 2;

/// Lengths below this are treated as zero when normalizing.
pub const LENGTH_EPSILON: f32 = 1e-12;

/// Barycentric weights of a point within a triangle, `u + v + w == 1`.
/// `u` weighs vertex 0, `v` vertex 1 and `w` vertex 2.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Barycentric {
    pub u: f32,
    pub v: f32,
    pub w: f32,
}

impl Barycentric {
    pub const CENTROID: Barycentric = Barycentric {
        u: 1.0 / 3.0,
        v: 1.0 / 3.0,
        w: 1.0 / 3.0,
    };

    pub fn new(u: f32, v: f32, w: f32) -> Self {
        Self { u, v, w }
    }

    pub fn vec3(&self, values: &[Vec3; 3]) -> Vec3 {
        values[0] * self.u + values[1] * self.v + values[2] * self.w
    }

    pub fn vec2(&self, values: &[Vec2; 3]) -> Vec2 {
        values[0] * self.u + values[1] * self.v + values[2] * self.w
    }

    pub fn vec4(&self, values: &[Vec4; 3]) -> Vec4 {
        values[0] * self.u + values[1] * self.v + values[2] * self.w
    }
}

/// A world-space triangle with its per-vertex attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub positions: [Vec3; 3],
    /// Per-vertex normals; all zero when the source had none
    pub normals: [Vec3; 3],
    /// UVs per texture coordinate set, indexed by set number
    pub tex_coords: [Option<[Vec2; 3]>; MAX_TEX_COORD_SETS],
    /// Per-vertex RGBA colors (COLOR_0)
    pub colors: Option<[Vec4; 3]>,
    /// Index into the scene's material table
    pub material: usize,
}

impl Triangle {
    /// A triangle with positions only, no attributes, using material 0.
    pub fn from_positions(p0: Vec3, p1: Vec3, p2: Vec3) -> Self {
        Self {
            positions: [p0, p1, p2],
            normals: [Vec3::ZERO; 3],
            tex_coords: [None; MAX_TEX_COORD_SETS],
            colors: None,
            material: 0,
        }
    }

    /// Unnormalized face normal, `(p1 - p0) x (p2 - p0)`; its length is twice the area.
    pub fn cross(&self) -> Vec3 {
        let [p0, p1, p2] = self.positions;
        (p1 - p0).cross(p2 - p0)
    }

    pub fn area(&self) -> f32 {
        0.5 * self.cross().length()
    }

    /// Unit face normal, or `None` for zero-area triangles
    pub fn face_normal(&self) -> Option<Vec3> {
        let n = self.cross();
        let len = n.length();
        (len > LENGTH_EPSILON && len.is_finite()).then(|| n / len)
    }

    pub fn point_at(&self, bary: &Barycentric) -> Vec3 {
        bary.vec3(&self.positions)
    }

    /// Interpolated vertex normal, normalized; `None` when the blend is zero-length.
    pub fn normal_at(&self, bary: &Barycentric) -> Option<Vec3> {
        let n = bary.vec3(&self.normals);
        let len = n.length();
        (len > LENGTH_EPSILON && len.is_finite()).then(|| n / len)
    }

    pub fn uv_at(&self, set: usize, bary: &Barycentric) -> Option<Vec2> {
        self.tex_coords
            .get(set)
            .copied()
            .flatten()
            .map(|uvs| bary.vec2(&uvs))
    }

    pub fn color_at(&self, bary: &Barycentric) -> Option<Vec4> {
        self.colors.as_ref().map(|c| bary.vec4(c))
    }

    /// First edge with usable length: p1-p0, then p2-p0, then p2-p1.
    pub fn reference_edge(&self) -> Option<Vec3> {
        let [p0, p1, p2] = self.positions;
        [p1 - p0, p2 - p0, p2 - p1]
            .into_iter()
            .find(|e| e.length() > LENGTH_EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_right_triangle() -> Triangle {
        Triangle::from_positions(Vec3::ZERO, Vec3::X, Vec3::Y)
    }

    #[test]
    fn test_area_and_face_normal() {
        let tri = unit_right_triangle();
        assert!((tri.area() - 0.5).abs() < 1e-6);
        assert_eq!(tri.face_normal(), Some(Vec3::Z));
    }

    #[test]
    fn test_degenerate_has_no_face_normal() {
        let tri = Triangle::from_positions(Vec3::ONE, Vec3::ONE, Vec3::ONE);
        assert_eq!(tri.area(), 0.0);
        assert!(tri.face_normal().is_none());
        assert!(tri.reference_edge().is_none());
    }

    #[test]
    fn test_barycentric_vertices() {
        let tri = unit_right_triangle();
        assert_eq!(tri.point_at(&Barycentric::new(1.0, 0.0, 0.0)), Vec3::ZERO);
        assert_eq!(tri.point_at(&Barycentric::new(0.0, 1.0, 0.0)), Vec3::X);
        assert_eq!(tri.point_at(&Barycentric::new(0.0, 0.0, 1.0)), Vec3::Y);
    }

    #[test]
    fn test_zero_normals_interpolate_to_none() {
        let tri = unit_right_triangle();
        assert!(tri.normal_at(&Barycentric::CENTROID).is_none());
    }

    #[test]
    fn test_missing_uv_set() {
        let mut tri = unit_right_triangle();
        tri.tex_coords[0] = Some([Vec2::ZERO, Vec2::X, Vec2::Y]);
        assert!(tri.uv_at(0, &Barycentric::CENTROID).is_some());
        assert!(tri.uv_at(1, &Barycentric::CENTROID).is_none());
        assert!(tri.uv_at(7, &Barycentric::CENTROID).is_none());
    }
}
