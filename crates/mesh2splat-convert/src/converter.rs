use std::path::Path;
use std::time::Instant;

use mesh2splat_assets::{load_scene_with, LoadOptions, SceneAsset};
use mesh2splat_core::{Splat, Triangle};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::buffer::{GaussianData, SplatBuffer};
use crate::config::ConvertOptions;
use crate::error::ConvertError;
use crate::ply::{write_ply, PlyFormat, PlyWriteOptions};
use crate::sampler::SurfaceSampler;
use crate::synth::SplatSynthesizer;

/// Triangles handed to one worker at a time.
const BATCH_SIZE: usize = 256;

/// Summary of one conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionStats {
    pub triangles: usize,
    /// Triangles that produced no splat because no normal could be derived
    pub skipped_triangles: usize,
    pub splats: usize,
    pub surface_area: f64,
    pub bounds_min: [f32; 3],
    pub bounds_max: [f32; 3],
    pub elapsed_ms: u64,
}

/// Sample and synthesize every triangle of `scene`.
///
/// Returns the buffer (triangle order, then sample order) and the number of
/// skipped degenerate triangles.
pub fn build_splats(
    scene: &SceneAsset,
    options: &ConvertOptions,
    with_pbr: bool,
) -> Result<(SplatBuffer, usize), ConvertError> {
    options.validate()?;
    let sampler =
        SurfaceSampler::new(options.density, options.seed)?.with_max_samples(options.max_samples);
    let planned = sampler.plan(&scene.triangles)?;
    debug!("Planned {} samples over {} triangles", planned, scene.triangle_count());
    let synth = SplatSynthesizer::new(scene, options.scale_multiplier, with_pbr);

    let run = || -> Result<Vec<(SplatBuffer, usize)>, ConvertError> {
        scene
            .triangles
            .par_chunks(BATCH_SIZE)
            .enumerate()
            .map(|(batch, triangles)| {
                build_batch(&sampler, &synth, batch * BATCH_SIZE, triangles, with_pbr)
            })
            .collect()
    };

    let batches = match options.threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| ConvertError::ThreadPool(e.to_string()))?
            .install(run)?,
        None => run()?,
    };

    let total: usize = batches.iter().map(|(b, _)| b.len()).sum();
    let mut buffer = SplatBuffer::with_capacity(total, with_pbr);
    let mut skipped = 0;
    for (batch, batch_skipped) in batches {
        buffer.append(batch);
        skipped += batch_skipped;
    }
    Ok((buffer, skipped))
}

fn build_batch(
    sampler: &SurfaceSampler,
    synth: &SplatSynthesizer<'_>,
    first_index: usize,
    triangles: &[Triangle],
    with_pbr: bool,
) -> Result<(SplatBuffer, usize), ConvertError> {
    let mut buffer = SplatBuffer::new(with_pbr);
    let mut skipped = 0;

    for (offset, triangle) in triangles.iter().enumerate() {
        let index = first_index + offset;
        let samples = sampler.sample_triangle(index, triangle)?;
        let count = samples.len();
        let splats: Result<Vec<Splat>, ConvertError> = samples
            .iter()
            .map(|sample| synth.synthesize(sample, triangle, count))
            .collect();

        match splats {
            Ok(splats) => buffer.extend(splats),
            Err(e) => {
                debug!("Skipping triangle {}: {}", index, e);
                skipped += 1;
            }
        }
    }

    Ok((buffer, skipped))
}

/// Load `input` and turn it into splats without writing anything.
fn run_pipeline(
    input: &Path,
    options: &ConvertOptions,
    with_pbr: bool,
) -> Result<(SplatBuffer, ConversionStats), ConvertError> {
    let start = Instant::now();
    options.validate()?;

    let scene = load_scene_with(
        input,
        &LoadOptions {
            max_texture_size: options.max_texture_size,
        },
    )?;
    let (buffer, skipped) = build_splats(&scene, options, with_pbr)?;

    let bounds = scene.bounds();
    let (bounds_min, bounds_max) = if bounds.is_empty() {
        ([0.0; 3], [0.0; 3])
    } else {
        (bounds.min.to_array(), bounds.max.to_array())
    };

    let stats = ConversionStats {
        triangles: scene.triangle_count(),
        skipped_triangles: skipped,
        splats: buffer.len(),
        surface_area: scene.surface_area(),
        bounds_min,
        bounds_max,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Generated {} splats from {} triangles ({} skipped) in {} ms",
        stats.splats, stats.triangles, stats.skipped_triangles, stats.elapsed_ms
    );
    Ok((buffer, stats))
}

/// Convert `input` to a PLY file at `output`.
pub fn try_convert(
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
) -> Result<ConversionStats, ConvertError> {
    let (buffer, stats) = run_pipeline(input, options, options.format.is_pbr())?;
    write_ply(
        &buffer,
        output,
        options.format,
        PlyWriteOptions {
            allow_empty: options.allow_empty,
        },
    )?;
    Ok(stats)
}

/// One-shot conversion with default settings apart from density and format.
///
/// Returns `false` on any failure; the cause is logged.
pub fn convert(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    density: f32,
    format: PlyFormat,
) -> bool {
    let options = ConvertOptions {
        density,
        format,
        ..Default::default()
    };
    match try_convert(input.as_ref(), output.as_ref(), &options) {
        Ok(_) => true,
        Err(e) => {
            error!("Conversion of {} failed: {}", input.as_ref().display(), e);
            false
        }
    }
}

/// Stateful converter that keeps the splats of its last conversion.
///
/// Splats always carry PBR channels so they can be saved in either layout.
#[derive(Debug, Default)]
pub struct Converter {
    options: ConvertOptions,
    buffer: SplatBuffer,
    last_stats: Option<ConversionStats>,
}

impl Converter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConvertOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn set_scale_multiplier(&mut self, multiplier: f32) -> Result<(), ConvertError> {
        if !(multiplier.is_finite() && multiplier > 0.0) {
            return Err(ConvertError::InvalidScaleMultiplier(multiplier));
        }
        self.options.scale_multiplier = multiplier;
        Ok(())
    }

    pub fn scale_multiplier(&self) -> f32 {
        self.options.scale_multiplier
    }

    pub fn set_seed(&mut self, seed: Option<u64>) {
        self.options.seed = seed;
    }

    /// Replace the current splats with those generated from `input`.
    pub fn convert_to_gaussians(&mut self, input: impl AsRef<Path>, density: f32) -> bool {
        let input = input.as_ref();
        match self.try_convert_to_gaussians(input, density) {
            Ok(_) => true,
            Err(e) => {
                error!("Conversion of {} failed: {}", input.display(), e);
                false
            }
        }
    }

    /// Like [`Converter::convert_to_gaussians`], reporting the error. On failure
    /// the converter holds no splats.
    pub fn try_convert_to_gaussians(
        &mut self,
        input: &Path,
        density: f32,
    ) -> Result<&ConversionStats, ConvertError> {
        self.buffer = SplatBuffer::new(true);
        self.last_stats = None;

        let options = ConvertOptions {
            density,
            ..self.options.clone()
        };
        let (buffer, stats) = run_pipeline(input, &options, true)?;
        self.buffer = buffer;
        Ok(&*self.last_stats.insert(stats))
    }

    pub fn gaussian_count(&self) -> usize {
        self.buffer.len()
    }

    /// Write the current splats; `format_flag` is 0 for standard, 1 for PBR.
    pub fn save_to_ply(&self, output: impl AsRef<Path>, format_flag: u32) -> bool {
        let output = output.as_ref();
        let result = PlyFormat::from_flag(format_flag)
            .and_then(|format| self.try_save_to_ply(output, format));
        match result {
            Ok(()) => true,
            Err(e) => {
                error!("Saving {} failed: {}", output.display(), e);
                false
            }
        }
    }

    pub fn try_save_to_ply(&self, output: &Path, format: PlyFormat) -> Result<(), ConvertError> {
        write_ply(
            &self.buffer,
            output,
            format,
            PlyWriteOptions {
                allow_empty: self.options.allow_empty,
            },
        )
    }

    pub fn gaussian_data(&self) -> GaussianData {
        self.buffer.gaussian_data()
    }

    pub fn buffer(&self) -> &SplatBuffer {
        &self.buffer
    }

    pub fn last_stats(&self) -> Option<&ConversionStats> {
        self.last_stats.as_ref()
    }
}
