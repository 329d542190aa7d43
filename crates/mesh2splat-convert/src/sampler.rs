//! Uniform surface sampling of triangles

use mesh2splat_core::{Barycentric, Triangle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::DEFAULT_MAX_SAMPLES;
use crate::error::ConvertError;

/// A barycentric sample on one triangle of the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub triangle: usize,
    pub bary: Barycentric,
}

/// Draws sample points on triangles at a fixed density (samples per unit area).
#[derive(Debug, Clone, Copy)]
pub struct SurfaceSampler {
    density: f32,
    seed: u64,
    max_samples: u64,
}

impl SurfaceSampler {
    /// Without a seed, one is drawn from OS entropy here and shared by every
    /// triangle of the run.
    pub fn new(density: f32, seed: Option<u64>) -> Result<Self, ConvertError> {
        if !(density.is_finite() && density > 0.0) {
            return Err(ConvertError::InvalidDensity(density));
        }
        let seed = seed.unwrap_or_else(|| StdRng::from_entropy().gen());
        Ok(Self {
            density,
            seed,
            max_samples: DEFAULT_MAX_SAMPLES,
        })
    }

    /// Cap on the samples a single run may plan.
    pub fn with_max_samples(mut self, max_samples: u64) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Number of samples for a triangle of the given area: `round(area * density)`,
    /// never fewer than one. Saturates at `u64::MAX`.
    pub fn sample_count(&self, area: f32) -> u64 {
        let expected = (area as f64 * self.density as f64).round();
        if expected.is_nan() || expected < 1.0 {
            1
        } else {
            expected as u64
        }
    }

    /// Total samples for `triangles`, or `SampleBudgetExceeded` once the sum
    /// passes the cap. Nothing is allocated here.
    pub fn plan(&self, triangles: &[Triangle]) -> Result<u64, ConvertError> {
        triangles.iter().try_fold(0u64, |total, triangle| {
            let requested = total.saturating_add(self.sample_count(triangle.area()));
            self.check_budget(requested)?;
            Ok(requested)
        })
    }

    fn check_budget(&self, requested: u64) -> Result<(), ConvertError> {
        if requested > self.max_samples {
            return Err(ConvertError::SampleBudgetExceeded {
                requested,
                limit: self.max_samples,
            });
        }
        Ok(())
    }

    /// Sample one triangle. A triangle receiving a single sample gets it at the
    /// centroid; otherwise samples are drawn uniformly over the surface.
    pub fn sample_triangle(
        &self,
        index: usize,
        triangle: &Triangle,
    ) -> Result<Vec<SamplePoint>, ConvertError> {
        let count = self.sample_count(triangle.area());
        self.check_budget(count)?;
        if count == 1 {
            return Ok(vec![SamplePoint {
                triangle: index,
                bary: Barycentric::CENTROID,
            }]);
        }

        let mut rng = self.rng_for(index);
        Ok((0..count)
            .map(|_| SamplePoint {
                triangle: index,
                bary: uniform_barycentric(&mut rng),
            })
            .collect())
    }

    /// Per-triangle generator so results do not depend on worker scheduling.
    fn rng_for(&self, index: usize) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }
}

/// Uniform point on a triangle: `r1 = sqrt(x1)`, `(1 - r1, r1 (1 - x2), r1 x2)`.
pub fn uniform_barycentric<R: Rng>(rng: &mut R) -> Barycentric {
    let r1 = rng.gen::<f32>().sqrt();
    let r2 = rng.gen::<f32>();
    let u = 1.0 - r1;
    let v = r1 * (1.0 - r2);
    Barycentric::new(u, v, 1.0 - u - v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh2splat_core::Vec3;

    fn triangle_with_area(area: f32) -> Triangle {
        // Right triangle with legs (2 * area, 1)
        Triangle::from_positions(Vec3::ZERO, Vec3::X * (2.0 * area), Vec3::Y)
    }

    #[test]
    fn rejects_invalid_density() {
        assert!(SurfaceSampler::new(0.0, None).is_err());
        assert!(SurfaceSampler::new(-1.0, None).is_err());
        assert!(SurfaceSampler::new(f32::INFINITY, None).is_err());
    }

    #[test]
    fn count_scales_with_area_and_density() {
        let sampler = SurfaceSampler::new(10.0, None).unwrap();
        assert_eq!(sampler.sample_count(0.5), 5);
        assert_eq!(sampler.sample_count(2.0), 20);
    }

    #[test]
    fn minimum_one_sample() {
        let sampler = SurfaceSampler::new(1.0, None).unwrap();
        assert_eq!(sampler.sample_count(0.0), 1);
        assert_eq!(sampler.sample_count(1e-9), 1);
        assert_eq!(sampler.sample_count(f32::NAN), 1);
    }

    #[test]
    fn count_non_decreasing_in_density() {
        let area = 0.37;
        let mut previous = 0;
        for step in 1..200 {
            let sampler = SurfaceSampler::new(step as f32 * 0.25, None).unwrap();
            let count = sampler.sample_count(area);
            assert!(count >= previous);
            previous = count;
        }
    }

    #[test]
    fn single_sample_lands_on_centroid() {
        let sampler = SurfaceSampler::new(1.0, None).unwrap();
        let samples = sampler.sample_triangle(3, &triangle_with_area(1.0)).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].triangle, 3);
        assert_eq!(samples[0].bary, Barycentric::CENTROID);
    }

    #[test]
    fn samples_are_valid_barycentrics() {
        let sampler = SurfaceSampler::new(100.0, Some(7)).unwrap();
        let samples = sampler.sample_triangle(0, &triangle_with_area(1.0)).unwrap();
        assert_eq!(samples.len(), 100);
        for s in samples {
            let b = s.bary;
            assert!(b.u >= 0.0 && b.v >= 0.0 && b.w >= -1e-6);
            assert!((b.u + b.v + b.w - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn seeded_sampling_is_reproducible() {
        let sampler = SurfaceSampler::new(50.0, Some(42)).unwrap();
        let tri = triangle_with_area(1.0);
        let draw = |index| sampler.sample_triangle(index, &tri).unwrap();
        assert_eq!(draw(5), draw(5));
        assert_ne!(draw(5), draw(6));
    }

    #[test]
    fn unseeded_sampler_is_stable_within_a_run() {
        let sampler = SurfaceSampler::new(50.0, None).unwrap();
        let tri = triangle_with_area(1.0);
        let draw = |index| sampler.sample_triangle(index, &tri).unwrap();
        assert_eq!(draw(2), draw(2));
        assert_ne!(draw(2), draw(3));
    }

    #[test]
    fn huge_triangle_exceeds_budget_without_allocating() {
        let sampler = SurfaceSampler::new(1000.0, Some(1)).unwrap();
        let tri = Triangle::from_positions(Vec3::ZERO, Vec3::X * 1e9, Vec3::Y * 1e9);
        assert!(sampler.sample_count(tri.area()) > DEFAULT_MAX_SAMPLES);
        assert!(matches!(
            sampler.sample_triangle(0, &tri),
            Err(ConvertError::SampleBudgetExceeded { limit: DEFAULT_MAX_SAMPLES, .. })
        ));
        assert!(sampler.plan(&[tri]).is_err());
    }

    #[test]
    fn plan_sums_counts_up_to_the_cap() {
        let sampler = SurfaceSampler::new(10.0, None).unwrap().with_max_samples(25);
        let tri = triangle_with_area(1.0);
        assert_eq!(sampler.plan(&vec![tri.clone(); 2]).unwrap(), 20);
        match sampler.plan(&vec![tri; 3]) {
            Err(ConvertError::SampleBudgetExceeded { requested, limit }) => {
                assert_eq!((requested, limit), (30, 25));
            }
            other => panic!("expected SampleBudgetExceeded, got: {:?}", other),
        }

        let sampler = sampler.with_max_samples(u64::MAX);
        let huge = Triangle::from_positions(Vec3::ZERO, Vec3::X * 1e30, Vec3::Y * 1e30);
        assert_eq!(sampler.plan(&[huge.clone(), huge]).unwrap(), u64::MAX);
    }
}
