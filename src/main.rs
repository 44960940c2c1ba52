use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::warn;

use volslice::convert::{ConvertOptions, convert, convert_directory};
use volslice::enums::SliceMode;
use volslice::intensity::WindowSpec;

#[derive(Parser)]
#[command(name = "volslice")]
#[command(about = "Extract a single slice from a NIfTI or MetaImage volume as PNG, TIFF or NPY")]
#[command(version)]
struct Cli {
    /// Input volume (.nii, .nii.gz, .mha, .mhd) or a directory of volumes
    input: PathBuf,

    /// Output image file (.png, .tiff/.tif, .npy) or a directory in batch mode
    output: PathBuf,

    /// Index of the slice to extract (default: middle slice)
    #[arg(long, conflicts_with = "mode")]
    slice_index: Option<usize>,

    /// Slice selection: "middle", "max", "mean" or a slice index
    #[arg(long)]
    mode: Option<SliceMode>,

    /// Size of the output image (square unless --no-square)
    #[arg(long)]
    output_size: Option<u32>,

    /// Do not pad the slice onto a square canvas (1:1 aspect ratio)
    #[arg(long)]
    no_square: bool,

    /// Normalize pixel values to 0-255 (8-bit output)
    #[arg(long)]
    normalize: bool,

    /// Window center for intensity windowing
    #[arg(long)]
    window_center: Option<f64>,

    /// Window width for intensity windowing
    #[arg(long)]
    window_width: Option<f64>,

    /// Output extension for batch (directory) conversion
    #[arg(long, default_value = "png")]
    batch_ext: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let window = match (cli.window_center, cli.window_width) {
        (Some(center), Some(width)) => Some(WindowSpec { center, width }),
        (None, None) => None,
        _ => {
            warn!("windowing needs both --window-center and --window-width; ignoring");
            None
        }
    };
    let mode = cli
        .slice_index
        .map(SliceMode::Fixed)
        .or(cli.mode)
        .unwrap_or_default();
    let options = ConvertOptions {
        mode,
        window,
        normalize: cli.normalize,
        square: !cli.no_square,
        output_size: cli.output_size,
    };

    if cli.input.is_dir() {
        let summary = convert_directory(&cli.input, &cli.output, &cli.batch_ext, &options)
            .with_context(|| format!("converting directory {}", cli.input.display()))?;
        if summary.failed > 0 {
            bail!("{} file(s) failed to convert", summary.failed);
        }
    } else {
        convert(&cli.input, &cli.output, &options)
            .with_context(|| format!("converting {}", cli.input.display()))?;
    }
    Ok(())
}
