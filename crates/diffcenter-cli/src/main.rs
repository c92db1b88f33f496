//! diffcenter CLI — center a diffraction image and export radial profiles.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use ndarray::Array2;

use diffcenter::{CenteringConfig, CenteringResult};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "diffcenter")]
#[command(about = "Locate the center of a radially-symmetric diffraction image and export angle-integrated radial profiles")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the centering pipeline on an image.
    Process(ProcessArgs),
}

#[derive(Debug, Clone, Args)]
struct ProcessArgs {
    /// Path to the input image (TIFF or PNG, grayscale).
    #[arg(long)]
    image: PathBuf,

    /// Path to write the fit summary (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Path to write the radial profiles (tab-separated).
    #[arg(long)]
    profiles: Option<PathBuf>,

    /// Path to write the synthesized background (16-bit PNG, normalized).
    #[arg(long)]
    background_png: Option<PathBuf>,

    /// Low quantile for the validity mask.
    #[arg(long, default_value = "0.10")]
    quantile_low: f64,

    /// High quantile for the validity mask.
    #[arg(long, default_value = "0.95")]
    quantile_high: f64,

    /// Number of angular bins in the polar warp.
    #[arg(long, default_value = "360")]
    theta_bins: usize,

    /// Physical size of one pixel; scales the X column of exported profiles.
    #[arg(long, default_value = "1.0")]
    pixel_size: f64,
}

/// Fit summary written as JSON.
#[derive(serde::Serialize)]
struct ProcessSummary {
    /// Image dimensions [width, height].
    image_size: [usize; 2],
    /// Estimated center (y, x) in full-resolution pixels.
    center: [f64; 2],
    /// Fitted model parameters.
    params: diffcenter::FitParams,
    /// Subsampling stride the fit ran at.
    step: usize,
    /// Quantile bounds the mask was built from.
    quantiles: [f64; 2],
    /// Number of radius bins in the exported profiles.
    radius_bins: usize,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process(args) => run_process(&args),
    }
}

fn run_process(args: &ProcessArgs) -> CliResult<()> {
    tracing::info!("Loading image: {}", args.image.display());
    let img = load_gray_image(&args.image)?;
    let (h, w) = img.dim();
    tracing::info!("Image size: {}x{}", w, h);

    let config = CenteringConfig {
        quantile_low: args.quantile_low,
        quantile_high: args.quantile_high,
        theta_bins: args.theta_bins,
        ..Default::default()
    };

    let result = diffcenter::process(&img, &config)?;
    tracing::info!(
        "Center: ({:.2}, {:.2}), exponent {:.3}",
        result.center[0],
        result.center[1],
        result.params.exponent
    );

    let summary = ProcessSummary {
        image_size: [w, h],
        center: result.center,
        params: result.params,
        step: result.step,
        quantiles: [args.quantile_low, args.quantile_high],
        radius_bins: result.profiles.raw.len(),
    };
    let json = serde_json::to_string_pretty(&summary)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!("Summary written to {}", args.out.display());

    if let Some(path) = &args.profiles {
        write_profiles(path, &result, args.pixel_size)?;
        tracing::info!("Profiles written to {}", path.display());
    }

    if let Some(path) = &args.background_png {
        write_background_png(path, &result.background)?;
        tracing::info!("Background written to {}", path.display());
    }

    Ok(())
}

/// Decode a grayscale image into a float array (row, col).
fn load_gray_image(path: &Path) -> CliResult<Array2<f64>> {
    let img = image::open(path).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", path.display(), e).into()
    })?;
    let gray = img.to_luma32f();
    let (w, h) = gray.dimensions();
    Ok(Array2::from_shape_fn((h as usize, w as usize), |(i, j)| {
        gray.get_pixel(j as u32, i as u32)[0] as f64
    }))
}

/// Tab-separated profile table: radius (scaled by pixel size), masked
/// profile, background profile, flattened profile.
fn write_profiles(path: &Path, result: &CenteringResult, pixel_size: f64) -> CliResult<()> {
    let mut out = std::io::BufWriter::new(std::fs::File::create(path)?);
    writeln!(out, "X\tY\tY_bkg\tY_flattened")?;
    let profiles = &result.profiles;
    for i in 0..profiles.raw.len() {
        writeln!(
            out,
            "{:.6}\t{:.6}\t{:.6}\t{:.6}",
            i as f64 * pixel_size,
            profiles.raw[i],
            profiles.background[i],
            profiles.flattened[i]
        )?;
    }
    Ok(())
}

/// Normalize the background to the full 16-bit range and save as PNG.
fn write_background_png(path: &Path, background: &Array2<f64>) -> CliResult<()> {
    let finite = background.iter().copied().filter(|v| v.is_finite());
    let max = finite.fold(f64::MIN, f64::max);
    if max <= 0.0 || !max.is_finite() {
        return Err("background has no positive finite values".into());
    }

    let (h, w) = background.dim();
    let mut buf = image::ImageBuffer::<image::Luma<u16>, Vec<u16>>::new(w as u32, h as u32);
    for (x, y, px) in buf.enumerate_pixels_mut() {
        let v = background[[y as usize, x as usize]];
        let scaled = if v.is_finite() {
            (v / max * f64::from(u16::MAX)).clamp(0.0, f64::from(u16::MAX))
        } else {
            0.0
        };
        *px = image::Luma([scaled as u16]);
    }
    buf.save(path)?;
    Ok(())
}
