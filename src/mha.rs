//! MetaImage (`.mha` / `.mhd`) reading.
//!
//! The container is an ASCII `Key = Value` header followed by raw element
//! data, either embedded (`ElementDataFile = LOCAL`) or in a sibling file.
//! Element data may be zlib-compressed and either byte order.

use crate::element::Element;
use crate::volume::{Volume, VolumeData};
use crate::volume_loader::LoadError;

use flate2::read::ZlibDecoder;
use ndarray::Array3;
use std::fs;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Default)]
struct MhaHeader {
    ndims: usize,
    dim_size: Vec<usize>,
    element_type: String,
    compressed: bool,
    big_endian: bool,
    spacing: Vec<f32>,
    channels: usize,
    data_file: String,
}

pub(crate) fn load(path: &Path) -> Result<Volume, LoadError> {
    let bytes = fs::read(path)?;
    let (header, data_offset) = parse_header(&bytes)?;

    let (depth, height, width) = match header.ndims {
        2 => (1, header.dim_size[1], header.dim_size[0]),
        3 => (header.dim_size[2], header.dim_size[1], header.dim_size[0]),
        other => {
            return Err(LoadError::MalformedHeader(format!(
                "NDims = {other} is not supported (expected 2 or 3)"
            )));
        }
    };
    if depth * height * width == 0 {
        return Err(LoadError::MalformedHeader(
            "zero-sized volume (DimSize contains 0)".to_string(),
        ));
    }

    let raw = read_element_data(path, &bytes[data_offset..], &header)?;
    let shape = (depth, height, width);
    let data = match header.element_type.to_ascii_uppercase().as_str() {
        "MET_UCHAR" => VolumeData::Uint8(build(raw, header.big_endian, shape)?),
        "MET_SHORT" => VolumeData::Int16(build(raw, header.big_endian, shape)?),
        "MET_USHORT" => VolumeData::Uint16(build(raw, header.big_endian, shape)?),
        "MET_INT" => VolumeData::Int32(build(raw, header.big_endian, shape)?),
        "MET_FLOAT" => VolumeData::Float32(build(raw, header.big_endian, shape)?),
        "MET_DOUBLE" => VolumeData::Float64(build(raw, header.big_endian, shape)?),
        other => return Err(LoadError::UnsupportedVoxelType(other.to_string())),
    };

    let spacing = (
        header.spacing.first().copied().unwrap_or(1.0),
        header.spacing.get(1).copied().unwrap_or(1.0),
        header.spacing.get(2).copied().unwrap_or(1.0),
    );
    Ok(Volume::new(data, spacing))
}

/// Parse header lines up to and including `ElementDataFile`, returning the
/// header and the offset where embedded element data starts.
fn parse_header(bytes: &[u8]) -> Result<(MhaHeader, usize), LoadError> {
    let mut header = MhaHeader {
        channels: 1,
        ..MhaHeader::default()
    };
    let mut pos = 0;

    loop {
        let rest = &bytes[pos..];
        let Some(eol) = rest.iter().position(|&b| b == b'\n') else {
            return Err(LoadError::MalformedHeader(
                "missing ElementDataFile entry".to_string(),
            ));
        };
        let line = std::str::from_utf8(&rest[..eol])
            .map_err(|_| LoadError::MalformedHeader("non-ASCII header line".to_string()))?;
        pos += eol + 1;

        let line = line.trim_end_matches('\r').trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(LoadError::MalformedHeader(format!(
                "expected `Key = Value`, got {line:?}"
            )));
        };
        let key = key.trim();
        let value = value.trim();

        match key.to_ascii_lowercase().as_str() {
            "objecttype" => {
                if !value.eq_ignore_ascii_case("image") {
                    return Err(LoadError::MalformedHeader(format!(
                        "ObjectType = {value} is not an image"
                    )));
                }
            }
            "ndims" => header.ndims = parse_value(key, value)?,
            "dimsize" => header.dim_size = parse_list(key, value)?,
            "elementtype" => header.element_type = value.to_string(),
            "elementspacing" | "elementsize" => header.spacing = parse_list(key, value)?,
            "compresseddata" => header.compressed = parse_bool(key, value)?,
            "binarydata" => {
                if !parse_bool(key, value)? {
                    return Err(LoadError::MalformedHeader(
                        "ASCII element data is not supported".to_string(),
                    ));
                }
            }
            "binarydatabyteordermsb" | "elementbyteordermsb" => {
                header.big_endian = parse_bool(key, value)?;
            }
            "elementnumberofchannels" => header.channels = parse_value(key, value)?,
            "elementdatafile" => {
                header.data_file = value.to_string();
                break;
            }
            // TransformMatrix, Offset, CenterOfRotation, AnatomicalOrientation,
            // CompressedDataSize and friends carry no pixel information
            _ => {}
        }
    }

    if header.dim_size.len() != header.ndims {
        return Err(LoadError::MalformedHeader(format!(
            "DimSize has {} entries but NDims = {}",
            header.dim_size.len(),
            header.ndims
        )));
    }
    if header.channels != 1 {
        return Err(LoadError::MalformedHeader(format!(
            "multi-channel element data ({} channels) is not supported",
            header.channels
        )));
    }

    Ok((header, pos))
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, LoadError> {
    value
        .parse()
        .map_err(|_| LoadError::MalformedHeader(format!("invalid {key} value {value:?}")))
}

fn parse_list<T: std::str::FromStr>(key: &str, value: &str) -> Result<Vec<T>, LoadError> {
    value
        .split_whitespace()
        .map(|token| parse_value(key, token))
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool, LoadError> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(LoadError::MalformedHeader(format!(
            "invalid {key} value {value:?}"
        )))
    }
}

fn read_element_data(
    path: &Path,
    embedded: &[u8],
    header: &MhaHeader,
) -> Result<Vec<u8>, LoadError> {
    let raw = match header.data_file.as_str() {
        "LOCAL" => embedded.to_vec(),
        "LIST" => {
            return Err(LoadError::MalformedHeader(
                "multi-file element data (LIST) is not supported".to_string(),
            ));
        }
        name if name.contains('%') => {
            return Err(LoadError::MalformedHeader(format!(
                "patterned element data files ({name}) are not supported"
            )));
        }
        name => fs::read(path.parent().unwrap_or(Path::new("")).join(name))?,
    };

    if header.compressed {
        let mut decompressed = Vec::new();
        ZlibDecoder::new(raw.as_slice()).read_to_end(&mut decompressed)?;
        Ok(decompressed)
    } else {
        Ok(raw)
    }
}

fn build<T: Element>(
    mut raw: Vec<u8>,
    big_endian: bool,
    shape: (usize, usize, usize),
) -> Result<Array3<T>, LoadError> {
    let elem_size = size_of::<T>();
    let expected = shape.0 * shape.1 * shape.2;
    if raw.len() != expected * elem_size {
        return Err(LoadError::ElementCountMismatch {
            expected,
            actual: raw.len() / elem_size,
        });
    }
    if big_endian && elem_size > 1 {
        for chunk in raw.chunks_exact_mut(elem_size) {
            chunk.reverse();
        }
    }
    let elements: Vec<T> = bytemuck::pod_collect_to_vec(&raw);
    Array3::from_shape_vec(shape, elements)
        .map_err(|e| LoadError::MalformedHeader(format!("element data shape mismatch: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    /// 3 slices of 4x4 int16 voxels, values 0..47, embedded uncompressed.
    fn ramp_mha() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(
            b"ObjectType = Image\n\
              NDims = 3\n\
              DimSize = 4 4 3\n\
              ElementType = MET_SHORT\n\
              ElementSpacing = 1 1 2.5\n\
              BinaryData = True\n\
              BinaryDataByteOrderMSB = False\n\
              ElementDataFile = LOCAL\n",
        );
        for v in 0..48i16 {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes
    }

    fn write_temp(bytes: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("volume.mha");
        fs::write(&path, bytes).expect("mha written");
        (dir, path)
    }

    #[test]
    fn loads_embedded_int16_volume() {
        let (_dir, path) = write_temp(&ramp_mha());
        let volume = load(&path).expect("mha loads");
        assert_eq!(volume.dim(), (3, 4, 4));
        assert_eq!(volume.dtype_name(), "int16");
        assert_eq!(volume.spacing(), (1.0, 1.0, 2.5));

        let VolumeData::Int16(data) = volume.data() else {
            panic!("expected int16 voxels");
        };
        assert_eq!(data[[0, 0, 0]], 0);
        assert_eq!(data[[1, 0, 0]], 16);
        assert_eq!(data[[2, 3, 3]], 47);
    }

    #[test]
    fn loads_zlib_compressed_element_data() {
        let mut payload = Vec::new();
        for v in 0..48i16 {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).expect("compresses");
        let compressed = encoder.finish().expect("compresses");

        let mut bytes = Vec::new();
        bytes.extend_from_slice(
            b"ObjectType = Image\n\
              NDims = 3\n\
              DimSize = 4 4 3\n\
              ElementType = MET_SHORT\n\
              CompressedData = True\n\
              BinaryData = True\n\
              ElementDataFile = LOCAL\n",
        );
        bytes.extend_from_slice(&compressed);

        let (_dir, path) = write_temp(&bytes);
        let volume = load(&path).expect("compressed mha loads");
        let VolumeData::Int16(data) = volume.data() else {
            panic!("expected int16 voxels");
        };
        assert_eq!(data[[2, 3, 3]], 47);
    }

    #[test]
    fn honors_msb_byte_order() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(
            b"ObjectType = Image\n\
              NDims = 2\n\
              DimSize = 2 1\n\
              ElementType = MET_USHORT\n\
              BinaryDataByteOrderMSB = True\n\
              ElementDataFile = LOCAL\n",
        );
        bytes.extend_from_slice(&0x0102u16.to_be_bytes());
        bytes.extend_from_slice(&0xFF00u16.to_be_bytes());

        let (_dir, path) = write_temp(&bytes);
        let volume = load(&path).expect("msb mha loads");
        // 2D images are promoted to depth-1 volumes
        assert_eq!(volume.dim(), (1, 1, 2));
        let VolumeData::Uint16(data) = volume.data() else {
            panic!("expected uint16 voxels");
        };
        assert_eq!(data[[0, 0, 0]], 0x0102);
        assert_eq!(data[[0, 0, 1]], 0xFF00);
    }

    #[test]
    fn reads_element_data_from_sibling_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut payload = Vec::new();
        for v in 0..4u8 {
            payload.push(v);
        }
        fs::write(dir.path().join("volume.raw"), &payload).expect("raw written");

        let header = b"ObjectType = Image\n\
              NDims = 2\n\
              DimSize = 2 2\n\
              ElementType = MET_UCHAR\n\
              ElementDataFile = volume.raw\n";
        let path = dir.path().join("volume.mhd");
        fs::write(&path, header).expect("mhd written");

        let volume = load(&path).expect("mhd + raw loads");
        assert_eq!(volume.dim(), (1, 2, 2));
    }

    #[test]
    fn truncated_element_data_is_a_count_mismatch() {
        let mut bytes = ramp_mha();
        bytes.truncate(bytes.len() - 10);
        let (_dir, path) = write_temp(&bytes);
        match load(&path) {
            Err(LoadError::ElementCountMismatch { expected, .. }) => assert_eq!(expected, 48),
            other => panic!("expected a count mismatch, got {other:?}"),
        }
    }

    #[test]
    fn unknown_element_type_is_rejected() {
        let bytes = b"ObjectType = Image\n\
              NDims = 2\n\
              DimSize = 1 1\n\
              ElementType = MET_COMPLEX\n\
              ElementDataFile = LOCAL\n"
            .to_vec();
        let (_dir, path) = write_temp(&bytes);
        assert!(matches!(
            load(&path),
            Err(LoadError::UnsupportedVoxelType(_))
        ));
    }

    #[test]
    fn header_without_data_file_entry_is_malformed() {
        let bytes = b"ObjectType = Image\nNDims = 3\n".to_vec();
        let (_dir, path) = write_temp(&bytes);
        assert!(matches!(load(&path), Err(LoadError::MalformedHeader(_))));
    }
}
