//! Column-oriented, append-only storage for generated splats

use glam::{Quat, Vec3};
use mesh2splat_core::{Color, PbrChannels, Splat};
use serde::{Deserialize, Serialize};

/// Splats from one conversion, stored one column per attribute.
///
/// Order is insertion order: triangle order, then sample order within a triangle.
/// Nothing is ever removed or reordered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplatBuffer {
    positions: Vec<Vec3>,
    colors: Vec<Color>,
    scales: Vec<Vec3>,
    rotations: Vec<Quat>,
    normals: Vec<Vec3>,
    /// Empty unless the buffer was created with PBR channels
    pbr: Vec<PbrChannels>,
    with_pbr: bool,
}

impl SplatBuffer {
    pub fn new(with_pbr: bool) -> Self {
        Self {
            with_pbr,
            ..Default::default()
        }
    }

    pub fn with_capacity(capacity: usize, with_pbr: bool) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            colors: Vec::with_capacity(capacity),
            scales: Vec::with_capacity(capacity),
            rotations: Vec::with_capacity(capacity),
            normals: Vec::with_capacity(capacity),
            pbr: Vec::with_capacity(if with_pbr { capacity } else { 0 }),
            with_pbr,
        }
    }

    /// Whether PBR channels are stored. Splats pushed without them get defaults.
    pub fn has_pbr(&self) -> bool {
        self.with_pbr
    }

    pub fn push(&mut self, splat: Splat) {
        self.positions.push(splat.position);
        self.colors.push(splat.color);
        self.scales.push(splat.scale);
        self.rotations.push(splat.rotation);
        self.normals.push(splat.normal);
        if self.with_pbr {
            self.pbr.push(splat.pbr.unwrap_or_default());
        }
    }

    /// Append all splats of `other`, preserving their order.
    pub fn append(&mut self, mut other: SplatBuffer) {
        if self.with_pbr && !other.with_pbr {
            other.pbr = vec![PbrChannels::default(); other.len()];
        }
        self.positions.append(&mut other.positions);
        self.colors.append(&mut other.colors);
        self.scales.append(&mut other.scales);
        self.rotations.append(&mut other.rotations);
        self.normals.append(&mut other.normals);
        if self.with_pbr {
            self.pbr.append(&mut other.pbr);
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Splat> {
        (index < self.len()).then(|| self.splat_at(index))
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Splat> + '_ {
        (0..self.len()).map(move |i| self.splat_at(i))
    }

    fn splat_at(&self, index: usize) -> Splat {
        Splat {
            position: self.positions[index],
            color: self.colors[index],
            scale: self.scales[index],
            rotation: self.rotations[index],
            normal: self.normals[index],
            pbr: self.pbr.get(index).copied(),
        }
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn scales(&self) -> &[Vec3] {
        &self.scales
    }

    pub fn rotations(&self) -> &[Quat] {
        &self.rotations
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// PBR channels; empty when the buffer carries none.
    pub fn pbr(&self) -> &[PbrChannels] {
        &self.pbr
    }

    /// Copy the columns out as plain arrays, indexed identically.
    pub fn gaussian_data(&self) -> GaussianData {
        GaussianData {
            positions: self.positions.iter().map(|v| v.to_array()).collect(),
            colors: self.colors.iter().map(|c| c.to_array()).collect(),
            scales: self.scales.iter().map(|v| v.to_array()).collect(),
            rotations: self.rotations.iter().map(|q| q.to_array()).collect(),
            normals: self.normals.iter().map(|v| v.to_array()).collect(),
        }
    }
}

impl Extend<Splat> for SplatBuffer {
    fn extend<T: IntoIterator<Item = Splat>>(&mut self, iter: T) {
        for splat in iter {
            self.push(splat);
        }
    }
}

/// Parallel arrays of splat attributes. Rotations are `[x, y, z, w]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GaussianData {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 4]>,
    pub scales: Vec<[f32; 3]>,
    pub rotations: Vec<[f32; 4]>,
    pub normals: Vec<[f32; 3]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splat(x: f32) -> Splat {
        Splat {
            position: Vec3::new(x, 0.0, 0.0),
            color: Color::rgb(0.5, 0.25, 1.0),
            scale: Vec3::splat(0.1),
            rotation: Quat::IDENTITY,
            normal: Vec3::Z,
            pbr: None,
        }
    }

    #[test]
    fn preserves_insertion_order() {
        let mut buffer = SplatBuffer::new(false);
        buffer.extend((0..5).map(|i| splat(i as f32)));
        assert_eq!(buffer.len(), 5);
        let xs: Vec<f32> = buffer.positions().iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn append_keeps_batches_in_order() {
        let mut a = SplatBuffer::new(false);
        a.push(splat(0.0));
        let mut b = SplatBuffer::new(false);
        b.push(splat(1.0));
        b.push(splat(2.0));
        a.append(b);
        assert_eq!(a.get(2).unwrap().position.x, 2.0);
        assert_eq!(a.iter().len(), 3);
    }

    #[test]
    fn pbr_column_is_filled_with_defaults() {
        let mut buffer = SplatBuffer::new(true);
        buffer.push(splat(0.0));
        let mut with = splat(1.0);
        with.pbr = Some(PbrChannels {
            roughness: 0.25,
            metallic: 0.0,
            emissive: Vec3::ONE,
        });
        buffer.push(with);
        assert_eq!(buffer.pbr().len(), 2);
        assert_eq!(buffer.pbr()[0], PbrChannels::default());
        assert_eq!(buffer.get(1).unwrap().pbr.unwrap().roughness, 0.25);
    }

    #[test]
    fn standard_buffer_drops_pbr() {
        let mut buffer = SplatBuffer::new(false);
        let mut with = splat(0.0);
        with.pbr = Some(PbrChannels::default());
        buffer.push(with);
        assert!(buffer.pbr().is_empty());
        assert!(buffer.get(0).unwrap().pbr.is_none());
    }

    #[test]
    fn gaussian_data_columns_align() {
        let mut buffer = SplatBuffer::new(false);
        buffer.extend((0..3).map(|i| splat(i as f32)));
        let data = buffer.gaussian_data();
        assert_eq!(data.positions.len(), 3);
        assert_eq!(data.rotations[1], [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(data.colors[2], [0.5, 0.25, 1.0, 1.0]);
    }
}
