use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

/// How a 2D plane is derived from the volume's depth axis.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SliceMode {
    /// A specific slice index, clamped to `[0, depth - 1]`.
    Fixed(usize),
    /// The slice at `depth / 2`.
    #[default]
    Middle,
    /// Element-wise maximum across the depth axis.
    MaxProjection,
    /// Element-wise mean across the depth axis, cast back to the storage type.
    MeanProjection,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized slice mode {0:?} (expected \"middle\", \"max\", \"mean\" or a slice index)")]
pub struct InvalidModeError(pub String);

impl FromStr for SliceMode {
    type Err = InvalidModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "middle" => Ok(Self::Middle),
            "max" => Ok(Self::MaxProjection),
            "mean" => Ok(Self::MeanProjection),
            other => other
                .parse::<usize>()
                .map(Self::Fixed)
                .map_err(|_| InvalidModeError(other.to_string())),
        }
    }
}

/// Output container, derived from the destination file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Raw numpy array, written verbatim after windowing.
    Npy,
    /// 8-bit grayscale after normalization, 16-bit otherwise.
    Png,
    /// 16-bit grayscale with LZW compression.
    Tiff,
}

impl OutputFormat {
    /// Recognize the output container from the path's extension.
    /// Returns `None` for anything that is not `.npy`, `.png`, `.tiff` or `.tif`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "npy" => Some(Self::Npy),
            "png" => Some(Self::Png),
            "tiff" | "tif" => Some(Self::Tiff),
            _ => None,
        }
    }
}
