use crate::element::Element;
use crate::intensity::PixelBuffer;
use crate::plane::Plane;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma};
use ndarray::{Array2, s};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use thiserror::Error;
use tiff::encoder::{TiffEncoder, colortype, compression::Lzw};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PNG encoding error: {0}")]
    Png(#[from] image::ImageError),

    #[error("TIFF encoding error: {0}")]
    Tiff(#[from] tiff::TiffError),
}

/// Center the buffer on a zero-filled square canvas of side `max(width, height)`.
/// The canvas keeps the buffer's storage type.
pub fn square_pad(buffer: PixelBuffer) -> PixelBuffer {
    match buffer {
        PixelBuffer::U8(a) => PixelBuffer::U8(pad_to_square(a)),
        PixelBuffer::U16(a) => PixelBuffer::U16(pad_to_square(a)),
        PixelBuffer::F32(a) => PixelBuffer::F32(pad_to_square(a)),
    }
}

fn pad_to_square<T: Element>(a: Array2<T>) -> Array2<T> {
    let (height, width) = a.dim();
    if height == width {
        return a;
    }
    let size = height.max(width);
    let mut canvas = Array2::from_elem((size, size), T::ZERO);
    let y0 = (size - height) / 2;
    let x0 = (size - width) / 2;
    canvas.slice_mut(s![y0..y0 + height, x0..x0 + width]).assign(&a);
    canvas
}

/// Resample the buffer with a Lanczos3 filter: to `size`×`size` when the
/// pipeline squared the canvas, else to an aspect-preserving rectangle whose
/// long side is `size`.
pub fn resize(buffer: PixelBuffer, size: u32, keep_aspect: bool) -> PixelBuffer {
    let (height, width) = buffer.dim();
    let (target_w, target_h) = if keep_aspect {
        aspect_target(width, height, size)
    } else {
        (size, size)
    };
    match buffer {
        PixelBuffer::U8(a) => PixelBuffer::U8(resample(a, target_w, target_h)),
        PixelBuffer::U16(a) => PixelBuffer::U16(resample(a, target_w, target_h)),
        PixelBuffer::F32(a) => PixelBuffer::F32(resample(a, target_w, target_h)),
    }
}

fn aspect_target(width: usize, height: usize, size: u32) -> (u32, u32) {
    let aspect = width as f64 / height as f64;
    if width > height {
        (size, ((size as f64 / aspect) as u32).max(1))
    } else {
        (((size as f64 * aspect) as u32).max(1), size)
    }
}

fn resample<T>(a: Array2<T>, target_w: u32, target_h: u32) -> Array2<T>
where
    T: Element + image::Primitive,
{
    let resized = imageops::resize(&image_from_array(a), target_w, target_h, FilterType::Lanczos3);
    array_from_image(resized)
}

/// Serialize the plane verbatim as a numpy `.npy` v1.0 array, creating
/// parent directories as needed. No geometry or bit-depth transform is
/// applied; this is the raw-array escape hatch for model pipelines.
pub fn save_npy(plane: &Plane, path: &Path) -> Result<(), ExportError> {
    ensure_parent_dir(path)?;
    let bytes = match plane {
        Plane::Uint8(a) => npy_bytes(a),
        Plane::Int16(a) => npy_bytes(a),
        Plane::Uint16(a) => npy_bytes(a),
        Plane::Int32(a) => npy_bytes(a),
        Plane::Float32(a) => npy_bytes(a),
        Plane::Float64(a) => npy_bytes(a),
    };
    fs::write(path, bytes)?;
    Ok(())
}

fn npy_bytes<T: Element>(a: &Array2<T>) -> Vec<u8> {
    let (height, width) = a.dim();
    let dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': ({}, {}), }}",
        T::NPY_DESCR,
        height,
        width
    );
    // magic + version + length field + header must align to 16 bytes
    let unpadded = 6 + 2 + 2 + dict.len() + 1;
    let pad = (16 - unpadded % 16) % 16;

    let mut out = Vec::with_capacity(unpadded + pad + height * width * size_of::<T>());
    out.extend_from_slice(b"\x93NUMPY");
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&((dict.len() + pad + 1) as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat_n(b' ', pad));
    out.push(b'\n');

    match a.as_slice() {
        Some(slice) => out.extend_from_slice(bytemuck::cast_slice(slice)),
        None => {
            for v in a.iter() {
                out.extend_from_slice(bytemuck::bytes_of(v));
            }
        }
    }
    out
}

/// Encode as PNG, preserving bit depth: `Luma8` for normalized buffers,
/// `Luma16` otherwise (float buffers are saturating-cast to 16-bit).
pub fn save_png(buffer: &PixelBuffer, path: &Path) -> Result<(), ExportError> {
    ensure_parent_dir(path)?;
    let image = match buffer {
        PixelBuffer::U8(a) => DynamicImage::ImageLuma8(image_from_array(a.clone())),
        PixelBuffer::U16(a) => DynamicImage::ImageLuma16(image_from_array(a.clone())),
        PixelBuffer::F32(a) => {
            DynamicImage::ImageLuma16(image_from_array(a.mapv(|v| v as u16)))
        }
    };
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Encode as 16-bit grayscale TIFF with LZW compression.
pub fn save_tiff(buffer: &PixelBuffer, path: &Path) -> Result<(), ExportError> {
    ensure_parent_dir(path)?;
    let (height, width) = buffer.dim();
    let data: Vec<u16> = match buffer {
        PixelBuffer::U8(a) => a.iter().map(|&v| v as u16).collect(),
        PixelBuffer::U16(a) => contiguous(a.clone()),
        PixelBuffer::F32(a) => a.iter().map(|&v| v as u16).collect(),
    };
    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    encoder.write_image_with_compression::<colortype::Gray16, _>(
        width as u32,
        height as u32,
        Lzw,
        &data,
    )?;
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn contiguous<T: Element>(a: Array2<T>) -> Vec<T> {
    if a.is_standard_layout() {
        a.into_raw_vec_and_offset().0
    } else {
        a.iter().copied().collect()
    }
}

fn image_from_array<T>(a: Array2<T>) -> ImageBuffer<Luma<T>, Vec<T>>
where
    T: Element + image::Primitive,
{
    let (height, width) = a.dim();
    ImageBuffer::from_raw(width as u32, height as u32, contiguous(a))
        .expect("pixel count matches plane dimensions")
}

fn array_from_image<T>(img: ImageBuffer<Luma<T>, Vec<T>>) -> Array2<T>
where
    T: Element + image::Primitive,
{
    let (width, height) = img.dimensions();
    Array2::from_shape_vec((height as usize, width as usize), img.into_raw())
        .expect("pixel count matches image dimensions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn square_padding_centers_the_content() {
        let plane = Array2::from_elem((60, 100), 9u16);
        let PixelBuffer::U16(canvas) = square_pad(PixelBuffer::U16(plane)) else {
            panic!("padding changed the storage type");
        };
        assert_eq!(canvas.dim(), (100, 100));
        // offsets are ((size - width) / 2, (size - height) / 2) = (0, 20)
        assert_eq!(canvas[[19, 0]], 0);
        assert_eq!(canvas[[20, 0]], 9);
        assert_eq!(canvas[[79, 99]], 9);
        assert_eq!(canvas[[80, 0]], 0);
    }

    #[test]
    fn square_padding_is_a_no_op_for_square_input() {
        let plane = Array2::from_elem((4, 4), 1u8);
        let PixelBuffer::U8(canvas) = square_pad(PixelBuffer::U8(plane.clone())) else {
            panic!("padding changed the storage type");
        };
        assert_eq!(canvas, plane);
    }

    #[test]
    fn resize_to_square_target() {
        let buffer = PixelBuffer::U16(Array2::from_elem((8, 8), 100u16));
        let resized = resize(buffer, 4, false);
        assert_eq!(resized.dim(), (4, 4));
    }

    #[test]
    fn resize_keeping_aspect_ratio() {
        let buffer = PixelBuffer::U8(Array2::from_elem((50, 100), 10u8));
        let resized = resize(buffer, 40, true);
        // landscape: long side becomes the target, short side follows 2:1
        assert_eq!(resized.dim(), (20, 40));
    }

    #[test]
    fn npy_bytes_carry_header_and_payload() {
        let plane = Plane::Int16(array![[1i16, 2], [3, 4]]);
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.npy");
        save_npy(&plane, &path).expect("npy written");

        let bytes = fs::read(&path).expect("npy readable");
        assert_eq!(&bytes[..6], b"\x93NUMPY");
        assert_eq!(&bytes[6..8], &[1, 0]);
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % 16, 0);
        let header = std::str::from_utf8(&bytes[10..10 + header_len]).expect("ascii header");
        assert!(header.contains("'descr': '<i2'"));
        assert!(header.contains("'shape': (2, 2)"));
        assert!(header.ends_with('\n'));
        // little-endian i16 payload in C order
        assert_eq!(&bytes[10 + header_len..], &[1, 0, 2, 0, 3, 0, 4, 0]);
    }

    #[test]
    fn npy_output_creates_parent_directories() {
        let plane = Plane::Uint8(array![[1u8]]);
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested/deeper/out.npy");
        save_npy(&plane, &path).expect("npy written");
        assert!(path.is_file());
    }

    #[test]
    fn png_roundtrip_preserves_16_bit_values() {
        let buffer = PixelBuffer::U16(array![[0u16, 300], [40000, 65535]]);
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("slice.png");
        save_png(&buffer, &path).expect("png written");

        let image = image::open(&path).expect("png readable").into_luma16();
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(0, 0).0[0], 0);
        assert_eq!(image.get_pixel(1, 0).0[0], 300);
        assert_eq!(image.get_pixel(0, 1).0[0], 40000);
        assert_eq!(image.get_pixel(1, 1).0[0], 65535);
    }

    #[test]
    fn tiff_roundtrip_preserves_16_bit_values() {
        let buffer = PixelBuffer::U16(array![[5u16, 10], [15, 20]]);
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("slice.tiff");
        save_tiff(&buffer, &path).expect("tiff written");

        let file = File::open(&path).expect("tiff readable");
        let mut decoder = tiff::decoder::Decoder::new(file).expect("tiff decoder");
        let image = decoder.read_image().expect("tiff image");
        match image {
            tiff::decoder::DecodingResult::U16(values) => {
                assert_eq!(values, vec![5, 10, 15, 20]);
            }
            other => panic!("expected 16-bit samples, got {other:?}"),
        }
    }
}
