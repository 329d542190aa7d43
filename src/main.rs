//! mesh2splat - convert glTF/GLB meshes into 3D Gaussian splat PLY files
//!
//! Flags override the defaults stored in the settings file.

mod settings;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use mesh2splat_convert::{try_convert, ConvertOptions, PlyFormat};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "mesh2splat", version, about)]
struct Cli {
    /// Input .gltf or .glb file
    input: PathBuf,

    /// Output .ply file
    output: PathBuf,

    /// Samples per unit of surface area
    #[arg(long)]
    density: Option<f32>,

    /// Multiplier applied to every splat scale
    #[arg(long)]
    scale: Option<f32>,

    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Seed for reproducible sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Downscale textures larger than this on either side
    #[arg(long)]
    max_texture_size: Option<u32>,

    /// Refuse inputs that would need more samples than this
    #[arg(long)]
    max_samples: Option<u64>,

    /// Worker threads (defaults to one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Write an empty PLY instead of failing when no splats are produced
    #[arg(long)]
    allow_empty: bool,

    /// Print conversion statistics as JSON on stdout
    #[arg(long)]
    stats_json: bool,

    /// Store the effective options as the new defaults
    #[arg(long)]
    save_settings: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Standard,
    Pbr,
}

impl From<FormatArg> for PlyFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Standard => PlyFormat::Standard,
            FormatArg::Pbr => PlyFormat::Pbr,
        }
    }
}

impl Cli {
    /// Overlay the flags that were given onto `options`.
    fn apply(&self, options: &mut ConvertOptions) {
        if let Some(density) = self.density {
            options.density = density;
        }
        if let Some(scale) = self.scale {
            options.scale_multiplier = scale;
        }
        if let Some(format) = self.format {
            options.format = format.into();
        }
        if self.seed.is_some() {
            options.seed = self.seed;
        }
        if self.max_texture_size.is_some() {
            options.max_texture_size = self.max_texture_size;
        }
        if let Some(max_samples) = self.max_samples {
            options.max_samples = max_samples;
        }
        if self.threads.is_some() {
            options.threads = self.threads;
        }
        if self.allow_empty {
            options.allow_empty = true;
        }
    }

    fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

fn init_logging(default_level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level())?;

    let mut settings = Settings::load();
    cli.apply(&mut settings.conversion);
    settings
        .conversion
        .validate()
        .context("Invalid conversion options")?;

    if cli.save_settings {
        settings.save().context("Failed to save settings")?;
    }

    info!(
        "Converting {} -> {} (density {}, {} layout)",
        cli.input.display(),
        cli.output.display(),
        settings.conversion.density,
        settings.conversion.format.name()
    );

    let stats = try_convert(&cli.input, &cli.output, &settings.conversion)
        .with_context(|| format!("Failed to convert {}", cli.input.display()))?;

    if cli.stats_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}
