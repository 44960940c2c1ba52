//! The end-to-end conversion pipeline: load, select, adjust, encode.
//!
//! All knobs live in [`ConvertOptions`] so callers configure one request
//! instead of threading flags through every stage.

use crate::enums::{OutputFormat, SliceMode};
use crate::export::{self, ExportError};
use crate::intensity::{self, WindowSpec};
use crate::volume_loader::{LoadError, VolumeLoader};

use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    /// How the 2D plane is derived from the volume.
    pub mode: SliceMode,
    /// Optional intensity windowing, applied before any other adjustment.
    pub window: Option<WindowSpec>,
    /// Rescale the observed value range to 8-bit `[0, 255]`.
    pub normalize: bool,
    /// Pad the plane onto a centered square canvas.
    pub square: bool,
    /// Resample to this size (square, or aspect-preserving without `square`).
    pub output_size: Option<u32>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            mode: SliceMode::Middle,
            window: None,
            normalize: false,
            square: true,
            output_size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertOutcome {
    /// The output file was written.
    Written(PathBuf),
    /// The destination extension is not a supported container; nothing was
    /// written. Deliberately not an error.
    SkippedUnsupported,
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Convert one volume file into one 2D output file.
///
/// Raw `.npy` destinations receive the plane exactly as selected (windowed
/// when requested), skipping normalization, padding and resizing.
pub fn convert(
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
) -> Result<ConvertOutcome, ConvertError> {
    let Some(format) = OutputFormat::from_path(output) else {
        warn!(
            "unsupported output format for {}: use .png, .tiff/.tif or .npy; nothing written",
            output.display()
        );
        return Ok(ConvertOutcome::SkippedUnsupported);
    };

    info!("reading {}", input.display());
    let volume = VolumeLoader::load(input)?;
    let (depth, height, width) = volume.dim();
    info!(
        "volume dimensions: {width}x{height}x{depth}, {} voxels, spacing {:?}",
        volume.dtype_name(),
        volume.spacing()
    );

    if let Some(index) = volume.resolve_index(options.mode) {
        info!("extracting slice {index} of {depth}");
    }
    let plane = volume.select_plane(options.mode);
    let plane = match &options.window {
        Some(window) => intensity::apply_window(plane, window),
        None => plane,
    };

    match format {
        OutputFormat::Npy => {
            export::save_npy(&plane, output)?;
        }
        OutputFormat::Png | OutputFormat::Tiff => {
            let buffer = intensity::finalize(&plane, options.normalize);
            let buffer = if options.square {
                export::square_pad(buffer)
            } else {
                buffer
            };
            let buffer = match options.output_size {
                Some(size) => export::resize(buffer, size, !options.square),
                None => buffer,
            };
            if format == OutputFormat::Tiff {
                export::save_tiff(&buffer, output)?;
            } else {
                export::save_png(&buffer, output)?;
            }
        }
    }

    info!("saved {}", output.display());
    Ok(ConvertOutcome::Written(output.to_path_buf()))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Convert every recognized volume file in `input_dir` into `output_dir`,
/// sequentially and in name order. A file that fails is logged and counted;
/// it does not abort the rest of the batch.
pub fn convert_directory(
    input_dir: &Path,
    output_dir: &Path,
    output_ext: &str,
    options: &ConvertOptions,
) -> Result<BatchSummary, ConvertError> {
    let output_ext = output_ext.trim_start_matches('.');
    let mut inputs: Vec<PathBuf> = fs::read_dir(input_dir)
        .map_err(LoadError::from)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| VolumeLoader::recognizes(path))
        .collect();
    inputs.sort();

    let mut summary = BatchSummary::default();
    for input in &inputs {
        let output = output_dir.join(output_name(input, output_ext));
        match convert(input, &output, options) {
            Ok(ConvertOutcome::Written(_)) => summary.written += 1,
            Ok(ConvertOutcome::SkippedUnsupported) => summary.skipped += 1,
            Err(e) => {
                error!("{}: {e}", input.display());
                summary.failed += 1;
            }
        }
    }

    info!(
        "batch finished: {} written, {} skipped, {} failed of {} files",
        summary.written,
        summary.skipped,
        summary.failed,
        inputs.len()
    );
    Ok(summary)
}

/// Replace a volume container extension with the requested output extension.
fn output_name(input: &Path, ext: &str) -> String {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let lower = name.to_ascii_lowercase();
    let stem_len = [".nii.gz", ".nii", ".mha", ".mhd"]
        .iter()
        .find(|suffix| lower.ends_with(*suffix))
        .map(|suffix| name.len() - suffix.len())
        .unwrap_or(name.len());
    format!("{}.{}", &name[..stem_len], ext)
}
