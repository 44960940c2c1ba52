use crate::element::Element;
use crate::enums::SliceMode;
use crate::plane::Plane;

use ndarray::{Array2, Array3, Axis, s};

/// Voxel data in `(depth, height, width)` axis order, tagged with its
/// storage type. The loaders produce whatever the source container stores.
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeData {
    Uint8(Array3<u8>),
    Int16(Array3<i16>),
    Uint16(Array3<u16>),
    Int32(Array3<i32>),
    Float32(Array3<f32>),
    Float64(Array3<f64>),
}

/// A 3D intensity volume loaded from a medical imaging container.
#[derive(Debug, Clone)]
pub struct Volume {
    data: VolumeData,
    spacing: (f32, f32, f32),
}

impl Volume {
    pub fn new(data: VolumeData, spacing: (f32, f32, f32)) -> Self {
        Self { data, spacing }
    }

    /// Get the dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        match &self.data {
            VolumeData::Uint8(a) => a.dim(),
            VolumeData::Int16(a) => a.dim(),
            VolumeData::Uint16(a) => a.dim(),
            VolumeData::Int32(a) => a.dim(),
            VolumeData::Float32(a) => a.dim(),
            VolumeData::Float64(a) => a.dim(),
        }
    }

    /// Voxel spacing `(x, y, z)` in millimeters, as declared by the container.
    pub fn spacing(&self) -> (f32, f32, f32) {
        self.spacing
    }

    pub fn dtype_name(&self) -> &'static str {
        match &self.data {
            VolumeData::Uint8(_) => "uint8",
            VolumeData::Int16(_) => "int16",
            VolumeData::Uint16(_) => "uint16",
            VolumeData::Int32(_) => "int32",
            VolumeData::Float32(_) => "float32",
            VolumeData::Float64(_) => "float64",
        }
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &VolumeData {
        &self.data
    }

    /// Resolve the slice index a mode selects, clamped to `[0, depth - 1]`.
    /// Projections have no single index and return `None`.
    pub fn resolve_index(&self, mode: SliceMode) -> Option<usize> {
        let depth = self.dim().0;
        match mode {
            SliceMode::Fixed(index) => Some(index.min(depth.saturating_sub(1))),
            SliceMode::Middle => Some(depth / 2),
            SliceMode::MaxProjection | SliceMode::MeanProjection => None,
        }
    }

    /// Derive a single 2D plane from the volume.
    ///
    /// Out-of-range fixed indices saturate to the nearest boundary slice
    /// instead of erroring.
    pub fn select_plane(&self, mode: SliceMode) -> Plane {
        match mode {
            SliceMode::Fixed(_) | SliceMode::Middle => {
                // resolve_index is Some for both of these modes
                let index = self.resolve_index(mode).unwrap_or(0);
                match &self.data {
                    VolumeData::Uint8(a) => Plane::Uint8(slice_at(a, index)),
                    VolumeData::Int16(a) => Plane::Int16(slice_at(a, index)),
                    VolumeData::Uint16(a) => Plane::Uint16(slice_at(a, index)),
                    VolumeData::Int32(a) => Plane::Int32(slice_at(a, index)),
                    VolumeData::Float32(a) => Plane::Float32(slice_at(a, index)),
                    VolumeData::Float64(a) => Plane::Float64(slice_at(a, index)),
                }
            }
            SliceMode::MaxProjection => match &self.data {
                VolumeData::Uint8(a) => Plane::Uint8(max_projection(a)),
                VolumeData::Int16(a) => Plane::Int16(max_projection(a)),
                VolumeData::Uint16(a) => Plane::Uint16(max_projection(a)),
                VolumeData::Int32(a) => Plane::Int32(max_projection(a)),
                VolumeData::Float32(a) => Plane::Float32(max_projection(a)),
                VolumeData::Float64(a) => Plane::Float64(max_projection(a)),
            },
            SliceMode::MeanProjection => match &self.data {
                VolumeData::Uint8(a) => Plane::Uint8(mean_projection(a)),
                VolumeData::Int16(a) => Plane::Int16(mean_projection(a)),
                VolumeData::Uint16(a) => Plane::Uint16(mean_projection(a)),
                VolumeData::Int32(a) => Plane::Int32(mean_projection(a)),
                VolumeData::Float32(a) => Plane::Float32(mean_projection(a)),
                VolumeData::Float64(a) => Plane::Float64(mean_projection(a)),
            },
        }
    }
}

fn slice_at<T: Element>(data: &Array3<T>, index: usize) -> Array2<T> {
    data.slice(s![index, .., ..]).to_owned()
}

fn max_projection<T: Element>(data: &Array3<T>) -> Array2<T> {
    let mut acc = data.index_axis(Axis(0), 0).to_owned();
    for slab in data.axis_iter(Axis(0)).skip(1) {
        acc.zip_mut_with(&slab, |a, &v| {
            if v > *a {
                *a = v;
            }
        });
    }
    acc
}

fn mean_projection<T: Element>(data: &Array3<T>) -> Array2<T> {
    let (depth, height, width) = data.dim();
    let mut acc = Array2::<f64>::zeros((height, width));
    for slab in data.axis_iter(Axis(0)) {
        acc.zip_mut_with(&slab, |a, &v| *a += v.to_f64());
    }
    acc.mapv(|sum| T::from_f64(sum / depth as f64))
}
