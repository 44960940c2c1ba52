use crate::mha;
use crate::volume::{Volume, VolumeData};

use ndarray::{Array3, ArrayD, Axis, Ix3};
use nifti::error::NiftiError;
use nifti::volume::ndarray::IntoNdArray;
use nifti::{NiftiObject, NiftiType, ReaderOptions};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unrecognized volume container: {0} (expected .nii, .nii.gz, .mha or .mhd)")]
    UnrecognizedContainer(PathBuf),

    #[error("expected a 3-dimensional volume, got {0} dimensions")]
    Dimensionality(usize),

    #[error("unsupported voxel type: {0}")]
    UnsupportedVoxelType(String),

    #[error("malformed MetaImage header: {0}")]
    MalformedHeader(String),

    #[error("element data length mismatch: expected {expected} elements, got {actual}")]
    ElementCountMismatch { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] NiftiError),
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from a NIfTI or MetaImage file
    ///
    /// The container is recognized by extension. Voxel data is returned in
    /// `(depth, height, width)` axis order with its native storage type.
    ///
    /// # Errors
    ///
    /// Returns error if the path is unreadable, the extension is not a known
    /// container or the file is malformed
    pub fn load(path: impl AsRef<Path>) -> Result<Volume, LoadError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if name.ends_with(".nii") || name.ends_with(".nii.gz") {
            Self::load_nifti(path)
        } else if name.ends_with(".mha") || name.ends_with(".mhd") {
            mha::load(path)
        } else {
            Err(LoadError::UnrecognizedContainer(path.to_path_buf()))
        }
    }

    /// Whether the file name carries a recognized volume container extension.
    pub fn recognizes(path: &Path) -> bool {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        name.ends_with(".nii")
            || name.ends_with(".nii.gz")
            || name.ends_with(".mha")
            || name.ends_with(".mhd")
    }

    fn load_nifti(path: &Path) -> Result<Volume, LoadError> {
        let object = ReaderOptions::new().read_file(path)?;
        let header = object.header();
        let datatype = header.data_type()?;
        let spacing = (header.pixdim[1], header.pixdim[2], header.pixdim[3]);

        let volume = object.into_volume();
        let data = match datatype {
            NiftiType::Uint8 => VolumeData::Uint8(Self::to_zyx(volume.into_ndarray::<u8>()?)?),
            NiftiType::Int16 => VolumeData::Int16(Self::to_zyx(volume.into_ndarray::<i16>()?)?),
            NiftiType::Uint16 => VolumeData::Uint16(Self::to_zyx(volume.into_ndarray::<u16>()?)?),
            NiftiType::Int32 => VolumeData::Int32(Self::to_zyx(volume.into_ndarray::<i32>()?)?),
            NiftiType::Float32 => {
                VolumeData::Float32(Self::to_zyx(volume.into_ndarray::<f32>()?)?)
            }
            NiftiType::Float64 => {
                VolumeData::Float64(Self::to_zyx(volume.into_ndarray::<f64>()?)?)
            }
            other => return Err(LoadError::UnsupportedVoxelType(format!("{other:?}"))),
        };

        Ok(Volume::new(data, spacing))
    }

    /// Reorder a NIfTI `(x, y, z)` array into `(depth, height, width)`.
    /// Trailing singleton axes (single-timepoint 4D files) are dropped first.
    fn to_zyx<T: Clone>(array: ArrayD<T>) -> Result<Array3<T>, LoadError> {
        let mut array = array;
        while array.ndim() > 3 && array.shape()[array.ndim() - 1] == 1 {
            let last_axis = array.ndim() - 1;
            array = array.index_axis_move(Axis(last_axis), 0);
        }
        let ndim = array.ndim();
        let array = array
            .into_dimensionality::<Ix3>()
            .map_err(|_| LoadError::Dimensionality(ndim))?;
        if array.is_empty() {
            return Err(LoadError::MalformedHeader(
                "zero-sized volume".to_string(),
            ));
        }
        Ok(array.permuted_axes([2, 1, 0]).as_standard_layout().to_owned())
    }
}
