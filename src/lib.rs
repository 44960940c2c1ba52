//! # volslice library
//!
//! This crate extracts single 2D slices and projections from volumetric
//! medical-image files and encodes them as PNG, TIFF or raw numpy arrays.

//!
//! Volumes can be loaded from NIfTI (`.nii`, `.nii.gz`) and MetaImage
//! (`.mha`, `.mhd`) containers; voxel data keeps its native storage type
//! in `(depth, height, width)` axis order. A plane is derived from the
//! volume in one of four ways:
//!  - a fixed slice index (clamped to the volume)
//!  - the middle slice
//!  - a maximum-intensity projection over the depth axis
//!  - a mean projection over the depth axis
//!
//! The plane can then be intensity-windowed, normalized to 8-bit, padded
//! onto a centered square canvas and resampled before encoding. Raw `.npy`
//! destinations always receive the plane exactly as selected (windowed if
//! requested) so downstream model pipelines see unmodified values.
//!
//! # Examples
//!
//! ## Converting the middle slice of a NIfTI volume to a normalized PNG
//!
//! ```no_run
//! # use volslice::convert::{convert, ConvertOptions};
//! # use std::path::Path;
//! let options = ConvertOptions {
//!     normalize: true,
//!     ..ConvertOptions::default()
//! };
//! convert(
//!     Path::new("scans/brain.nii.gz"),
//!     Path::new("out/brain.png"),
//!     &options,
//! )
//! .expect("should have converted the middle slice");
//! ```
//!
//! ## Loading a volume and selecting a projection by hand
//!
//! ```no_run
//! # use volslice::{enums::SliceMode, volume_loader::VolumeLoader};
//! let volume = VolumeLoader::load("scans/ct.mha")
//!     .expect("should have loaded the volume");
//! let plane = volume.select_plane(SliceMode::MaxProjection);
//! println!("projected to {:?} ({})", plane.dim(), plane.dtype_name());
//! ```

pub mod convert;
mod element;
pub mod enums;
pub mod export;
pub mod intensity;
mod mha;
pub mod plane;
pub mod volume;
pub mod volume_loader;
