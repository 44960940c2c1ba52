use crate::element::Element;
use crate::plane::Plane;

use ndarray::Array2;

/// Clinically relevant display range, `center` ± `width / 2`.
///
/// The half-width is floored before it is applied, so odd widths round
/// asymmetrically. This matches the floor-division semantics of the
/// tooling this crate replaces and is relied on for compatibility testing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSpec {
    pub center: f64,
    pub width: f64,
}

impl WindowSpec {
    /// The clipping bounds `(center - floor(width / 2), center + floor(width / 2))`.
    pub fn bounds(&self) -> (f64, f64) {
        let half = (self.width / 2.0).floor();
        (self.center - half, self.center + half)
    }
}

/// Clip all plane values into the window's bounds. The storage type is
/// preserved; values already inside the window are untouched.
pub fn apply_window(plane: Plane, window: &WindowSpec) -> Plane {
    let (lo, hi) = window.bounds();
    match plane {
        Plane::Uint8(a) => Plane::Uint8(clip(a, lo, hi)),
        Plane::Int16(a) => Plane::Int16(clip(a, lo, hi)),
        Plane::Uint16(a) => Plane::Uint16(clip(a, lo, hi)),
        Plane::Int32(a) => Plane::Int32(clip(a, lo, hi)),
        Plane::Float32(a) => Plane::Float32(clip(a, lo, hi)),
        Plane::Float64(a) => Plane::Float64(clip(a, lo, hi)),
    }
}

fn clip<T: Element>(mut a: Array2<T>, lo: f64, hi: f64) -> Array2<T> {
    let lo_t = T::from_f64(lo);
    let hi_t = T::from_f64(hi);
    a.mapv_inplace(|v| {
        let f = v.to_f64();
        if f < lo {
            lo_t
        } else if f > hi {
            hi_t
        } else {
            v
        }
    });
    a
}

/// A plane adjusted for encoding: 8-bit after normalization, otherwise the
/// native bit depth with everything that is neither 16-bit-unsigned nor
/// 32-bit-float coerced up to 16-bit-unsigned.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    U8(Array2<u8>),
    U16(Array2<u16>),
    F32(Array2<f32>),
}

impl PixelBuffer {
    /// Dimensions as `(height, width)`.
    pub fn dim(&self) -> (usize, usize) {
        match self {
            Self::U8(a) => a.dim(),
            Self::U16(a) => a.dim(),
            Self::F32(a) => a.dim(),
        }
    }
}

/// Produce the buffer the encoder will receive.
///
/// With `normalize` the observed min/max are rescaled to `[0, 255]`; a
/// constant plane comes out all-zero instead of dividing by zero. Without
/// it, `uint16` and `float32` planes pass through unchanged and every other
/// storage type is re-cast to `uint16` element-wise.
pub fn finalize(plane: &Plane, normalize: bool) -> PixelBuffer {
    if normalize {
        let normalized = match plane {
            Plane::Uint8(a) => normalize_to_u8(a),
            Plane::Int16(a) => normalize_to_u8(a),
            Plane::Uint16(a) => normalize_to_u8(a),
            Plane::Int32(a) => normalize_to_u8(a),
            Plane::Float32(a) => normalize_to_u8(a),
            Plane::Float64(a) => normalize_to_u8(a),
        };
        return PixelBuffer::U8(normalized);
    }

    match plane {
        Plane::Uint16(a) => PixelBuffer::U16(a.clone()),
        Plane::Float32(a) => PixelBuffer::F32(a.clone()),
        Plane::Uint8(a) => PixelBuffer::U16(a.mapv(|v| v as u16)),
        Plane::Int16(a) => PixelBuffer::U16(a.mapv(|v| v as u16)),
        Plane::Int32(a) => PixelBuffer::U16(a.mapv(|v| v as u16)),
        Plane::Float64(a) => PixelBuffer::U16(a.mapv(|v| v as u16)),
    }
}

fn normalize_to_u8<T: Element>(a: &Array2<T>) -> Array2<u8> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in a.iter() {
        let f = v.to_f64();
        if f < lo {
            lo = f;
        }
        if f > hi {
            hi = f;
        }
    }
    if lo >= hi {
        // constant plane: nothing to stretch
        return Array2::zeros(a.dim());
    }
    a.mapv(|v| ((v.to_f64() - lo) / (hi - lo) * 255.0) as u8)
}
