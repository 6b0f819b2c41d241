// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Uncompressed MetaImage (`.mha` / `.mhd`) volumes.
//!
//! A MetaImage file is a block of `Key = Value` header lines terminated by an
//! `ElementDataFile` line. With `ElementDataFile = LOCAL` (the usual `.mha` layout) the raw
//! samples follow the header directly; otherwise the value names a raw file next to the
//! header (the usual `.mhd` layout). Samples are stored with axis 0 varying fastest.

use std::fs;
use std::io;
use std::path::Path;

use log::debug;

use crate::error::ReadError;
use crate::image::{Image, MAX_DIMENSION};

/// Whether `path` has a MetaImage extension.
pub fn is_metaimage_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mha") || ext.eq_ignore_ascii_case("mhd"))
}

/// Scalar sample type of a MetaImage payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// `MET_UCHAR`
    UChar,
    /// `MET_CHAR`
    Char,
    /// `MET_USHORT`
    UShort,
    /// `MET_SHORT`
    Short,
    /// `MET_UINT`
    UInt,
    /// `MET_INT`
    Int,
    /// `MET_LONG_LONG`
    LongLong,
    /// `MET_ULONG_LONG`
    ULongLong,
    /// `MET_FLOAT`
    Float,
    /// `MET_DOUBLE`
    Double,
}

macro_rules! decode_as {
    ($ty:ty, $bytes:expr, $big_endian:expr) => {{
        let mut raw = [0_u8; size_of::<$ty>()];
        raw.copy_from_slice($bytes);
        if $big_endian {
            <$ty>::from_be_bytes(raw) as f64
        } else {
            <$ty>::from_le_bytes(raw) as f64
        }
    }};
}

macro_rules! encode_as {
    ($ty:ty, $value:expr, $big_endian:expr, $out:expr) => {{
        #[allow(
            clippy::cast_possible_truncation,
            reason = "float to integer casts saturate, which is the documented conversion"
        )]
        let value = $value as $ty;
        if $big_endian {
            $out.extend_from_slice(&value.to_be_bytes());
        } else {
            $out.extend_from_slice(&value.to_le_bytes());
        }
    }};
}

impl ElementType {
    /// The `ElementType` header tag.
    pub fn tag(self) -> &'static str {
        match self {
            Self::UChar => "MET_UCHAR",
            Self::Char => "MET_CHAR",
            Self::UShort => "MET_USHORT",
            Self::Short => "MET_SHORT",
            Self::UInt => "MET_UINT",
            Self::Int => "MET_INT",
            Self::LongLong => "MET_LONG_LONG",
            Self::ULongLong => "MET_ULONG_LONG",
            Self::Float => "MET_FLOAT",
            Self::Double => "MET_DOUBLE",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "MET_UCHAR" => Self::UChar,
            "MET_CHAR" => Self::Char,
            "MET_USHORT" => Self::UShort,
            "MET_SHORT" => Self::Short,
            "MET_UINT" => Self::UInt,
            "MET_INT" => Self::Int,
            "MET_LONG_LONG" => Self::LongLong,
            "MET_ULONG_LONG" => Self::ULongLong,
            "MET_FLOAT" => Self::Float,
            "MET_DOUBLE" => Self::Double,
            _ => return None,
        })
    }

    /// Bytes per sample.
    pub fn byte_size(self) -> usize {
        match self {
            Self::UChar | Self::Char => 1,
            Self::UShort | Self::Short => 2,
            Self::UInt | Self::Int | Self::Float => 4,
            Self::LongLong | Self::ULongLong | Self::Double => 8,
        }
    }

    fn decode(self, bytes: &[u8], big_endian: bool) -> f64 {
        match self {
            Self::UChar => f64::from(bytes[0]),
            Self::Char => f64::from(i8::from_ne_bytes([bytes[0]])),
            Self::UShort => decode_as!(u16, bytes, big_endian),
            Self::Short => decode_as!(i16, bytes, big_endian),
            Self::UInt => decode_as!(u32, bytes, big_endian),
            Self::Int => decode_as!(i32, bytes, big_endian),
            Self::LongLong => decode_as!(i64, bytes, big_endian),
            Self::ULongLong => decode_as!(u64, bytes, big_endian),
            Self::Float => decode_as!(f32, bytes, big_endian),
            Self::Double => {
                let mut raw = [0_u8; 8];
                raw.copy_from_slice(bytes);
                if big_endian {
                    f64::from_be_bytes(raw)
                } else {
                    f64::from_le_bytes(raw)
                }
            }
        }
    }

    fn encode(self, value: f64, big_endian: bool, out: &mut Vec<u8>) {
        match self {
            Self::UChar => encode_as!(u8, value, big_endian, out),
            Self::Char => encode_as!(i8, value, big_endian, out),
            Self::UShort => encode_as!(u16, value, big_endian, out),
            Self::Short => encode_as!(i16, value, big_endian, out),
            Self::UInt => encode_as!(u32, value, big_endian, out),
            Self::Int => encode_as!(i32, value, big_endian, out),
            Self::LongLong => encode_as!(i64, value, big_endian, out),
            Self::ULongLong => encode_as!(u64, value, big_endian, out),
            Self::Float => encode_as!(f32, value, big_endian, out),
            Self::Double if big_endian => out.extend_from_slice(&value.to_be_bytes()),
            Self::Double => out.extend_from_slice(&value.to_le_bytes()),
        }
    }
}

#[derive(Debug)]
struct Header {
    size: Vec<usize>,
    element_type: ElementType,
    big_endian: bool,
    /// Bytes to skip in an external data file; `None` means "take the trailing bytes".
    header_size: Option<usize>,
    data_file: String,
    /// Offset of the first byte after the `ElementDataFile` line.
    data_offset: usize,
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ReadError> {
    match value {
        "True" | "true" | "TRUE" | "1" => Ok(true),
        "False" | "false" | "FALSE" | "0" => Ok(false),
        _ => Err(ReadError::Header(format!("`{key}` expects True or False, got `{value}`"))),
    }
}

fn parse_header(bytes: &[u8]) -> Result<Header, ReadError> {
    let mut dimension = None::<usize>;
    let mut size = None::<Vec<usize>>;
    let mut element_type = None::<ElementType>;
    let mut big_endian = false;
    let mut header_size = Some(0_usize);

    let mut start = 0;
    while start < bytes.len() {
        let end = bytes[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(bytes.len(), |p| start + p);
        let line = String::from_utf8_lossy(&bytes[start..end]);
        let next = (end + 1).min(bytes.len());
        start = next;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(ReadError::Header(format!("expected `Key = Value`, got `{line}`")));
        };
        let (key, value) = (key.trim(), value.trim());

        match key {
            "NDims" => {
                let n = value
                    .parse()
                    .map_err(|_| ReadError::Header(format!("bad NDims `{value}`")))?;
                if !(1..=MAX_DIMENSION).contains(&n) {
                    return Err(ReadError::Dimension(n));
                }
                dimension = Some(n);
            }
            "DimSize" => {
                let extents = value
                    .split_whitespace()
                    .map(str::parse)
                    .collect::<Result<Vec<usize>, _>>()
                    .map_err(|_| ReadError::Header(format!("bad DimSize `{value}`")))?;
                size = Some(extents);
            }
            "ElementType" => {
                element_type = Some(
                    ElementType::from_tag(value)
                        .ok_or_else(|| ReadError::ElementType(value.to_owned()))?,
                );
            }
            "BinaryDataByteOrderMSB" | "ElementByteOrderMSB" => {
                big_endian = parse_bool(key, value)?;
            }
            "BinaryData" => {
                if !parse_bool(key, value)? {
                    return Err(ReadError::Header("ASCII pixel data is not supported".into()));
                }
            }
            "CompressedData" => {
                if parse_bool(key, value)? {
                    return Err(ReadError::Header("compressed pixel data is not supported".into()));
                }
            }
            "ElementNumberOfChannels" => {
                if value != "1" {
                    return Err(ReadError::Header(format!(
                        "only single-channel images are supported, got {value} channels"
                    )));
                }
            }
            "HeaderSize" => {
                header_size = match value.parse::<i64>() {
                    Ok(-1) => None,
                    Ok(n) => Some(
                        usize::try_from(n)
                            .map_err(|_| ReadError::Header(format!("bad HeaderSize `{value}`")))?,
                    ),
                    Err(_) => return Err(ReadError::Header(format!("bad HeaderSize `{value}`"))),
                };
            }
            "ElementDataFile" => {
                let dimension =
                    dimension.ok_or_else(|| ReadError::Header("missing NDims".into()))?;
                let size = size.ok_or_else(|| ReadError::Header("missing DimSize".into()))?;
                if size.len() != dimension {
                    return Err(ReadError::Header(format!(
                        "DimSize lists {} extents for {dimension} dimensions",
                        size.len()
                    )));
                }
                let element_type =
                    element_type.ok_or_else(|| ReadError::Header("missing ElementType".into()))?;
                return Ok(Header {
                    size,
                    element_type,
                    big_endian,
                    header_size,
                    data_file: value.to_owned(),
                    data_offset: next,
                });
            }
            // Spacing, origin, orientation and friends do not affect sample values.
            _ => {}
        }
    }
    Err(ReadError::Header("missing ElementDataFile".into()))
}

/// Reads a MetaImage volume.
pub fn read_metaimage(path: impl AsRef<Path>) -> Result<Image, ReadError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let header = parse_header(&bytes)?;

    let count = header
        .size
        .iter()
        .try_fold(1_usize, |acc, &extent| acc.checked_mul(extent));
    let expected = count
        .and_then(|count| count.checked_mul(header.element_type.byte_size()))
        .ok_or_else(|| ReadError::Header(format!("DimSize {:?} is too large", header.size)))?;

    let external;
    let payload: &[u8] = if header.data_file == "LOCAL" {
        &bytes[header.data_offset..]
    } else {
        let data_path = path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&header.data_file);
        debug!("reading MetaImage payload from `{}`", data_path.display());
        external = fs::read(&data_path)?;
        match header.header_size {
            Some(skip) => external.get(skip..).unwrap_or_default(),
            None => &external[external.len().saturating_sub(expected)..],
        }
    };

    if payload.len() < expected {
        return Err(ReadError::Truncated {
            expected,
            found: payload.len(),
        });
    }

    let element_size = header.element_type.byte_size();
    let samples = payload[..expected]
        .chunks_exact(element_size)
        .map(|chunk| header.element_type.decode(chunk, header.big_endian))
        .collect();
    Image::from_shape_vec(&header.size, samples)
}

/// Writes `image` as an uncompressed little-endian MetaImage.
///
/// A `.mhd` path gets its samples in a sibling `.raw` file; any other path gets a single
/// file with `ElementDataFile = LOCAL`. Samples are converted to `element_type` with Rust's
/// saturating float-to-integer casts.
pub fn write_metaimage(
    path: impl AsRef<Path>,
    image: &Image,
    element_type: ElementType,
) -> io::Result<()> {
    let path = path.as_ref();
    let detached = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mhd"));

    let mut payload = Vec::with_capacity(image.len() * element_type.byte_size());
    for sample in image.samples() {
        element_type.encode(sample, false, &mut payload);
    }

    let dim_size = image
        .size()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    let data_file = if detached {
        let raw = path.with_extension("raw");
        let name = raw
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "non UTF-8 data file name"))?
            .to_owned();
        fs::write(&raw, &payload)?;
        name
    } else {
        "LOCAL".to_owned()
    };

    let mut out = format!(
        "ObjectType = Image\nNDims = {}\nBinaryData = True\nBinaryDataByteOrderMSB = False\nCompressedData = False\nDimSize = {dim_size}\nElementType = {}\nElementDataFile = {data_file}\n",
        image.dimension(),
        element_type.tag(),
    )
    .into_bytes();
    if !detached {
        out.extend_from_slice(&payload);
    }
    fs::write(path, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn local_volume_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("volume.mha");
        let image = Image::from_fn(&[3, 4, 5], |i| (i[0] + 3 * i[1] + 12 * i[2]) as f64).unwrap();

        write_metaimage(&path, &image, ElementType::UShort).unwrap();
        let read = read_metaimage(&path).unwrap();
        assert_eq!(read, image);
    }

    #[test]
    fn detached_payload_is_found_next_to_the_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("volume.mhd");
        let image = Image::from_fn(&[2, 2, 2, 2], |i| i.iter().sum::<usize>() as f64 - 1.5).unwrap();

        write_metaimage(&path, &image, ElementType::Float).unwrap();
        assert!(dir.path().join("volume.raw").exists());
        assert_eq!(read_metaimage(&path).unwrap(), image);
    }

    #[test]
    fn honours_big_endian_payloads() {
        let mut bytes = b"NDims = 2\nDimSize = 2 1\nElementType = MET_SHORT\nBinaryDataByteOrderMSB = True\nElementDataFile = LOCAL\n".to_vec();
        bytes.extend_from_slice(&(-2_i16).to_be_bytes());
        bytes.extend_from_slice(&300_i16.to_be_bytes());

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("be.mha");
        fs::write(&path, bytes).unwrap();

        let image = read_metaimage(&path).unwrap();
        assert_eq!(image.samples(), vec![-2., 300.]);
    }

    #[test]
    fn short_payload_is_reported() {
        let mut bytes =
            b"NDims = 2\nDimSize = 2 2\nElementType = MET_UCHAR\nElementDataFile = LOCAL\n".to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.mha");
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            read_metaimage(&path),
            Err(ReadError::Truncated {
                expected: 4,
                found: 3
            })
        ));
    }

    #[test]
    fn header_problems_are_rejected() {
        let cases: [&[u8]; 5] = [
            b"NDims = 2\nDimSize = 2 2\nElementType = MET_UCHAR\nCompressedData = True\nElementDataFile = LOCAL\n",
            b"NDims = 2\nDimSize = 2 2\nElementType = MET_RGB\nElementDataFile = LOCAL\n",
            b"NDims = 3\nDimSize = 2 2\nElementType = MET_UCHAR\nElementDataFile = LOCAL\n",
            b"NDims = 7\nDimSize = 1 1 1 1 1 1 1\nElementType = MET_UCHAR\nElementDataFile = LOCAL\n",
            b"NDims = 2\nDimSize = 2 2\nElementType = MET_UCHAR\n",
        ];
        for header in cases {
            assert!(parse_header(header).is_err(), "{}", String::from_utf8_lossy(header));
        }
    }

    #[test]
    fn every_element_type_reads_back() {
        let dir = TempDir::new().unwrap();
        let image = Image::from_shape_vec(&[5, 1], vec![0., 1., 7., 100., 127.]).unwrap();
        for element_type in [
            ElementType::UChar,
            ElementType::Char,
            ElementType::UShort,
            ElementType::Short,
            ElementType::UInt,
            ElementType::Int,
            ElementType::LongLong,
            ElementType::ULongLong,
            ElementType::Float,
            ElementType::Double,
        ] {
            let path = dir.path().join(format!("{}.mha", element_type.tag()));
            write_metaimage(&path, &image, element_type).unwrap();
            let bytes = fs::read(&path).unwrap();
            let header = String::from_utf8_lossy(&bytes);
            assert!(
                header.contains(&format!("ElementType = {}\n", element_type.tag())),
                "{element_type:?}"
            );
            assert_eq!(read_metaimage(&path).unwrap(), image, "{element_type:?}");
        }
    }

    #[test]
    fn signed_samples_keep_their_sign() {
        let mut bytes =
            b"NDims = 1\nDimSize = 3\nElementType = MET_CHAR\nElementDataFile = LOCAL\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0x80, 0x05]);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("signed.mha");
        fs::write(&path, bytes).unwrap();
        assert_eq!(read_metaimage(&path).unwrap().samples(), vec![-1., -128., 5.]);
    }

    #[test]
    fn trailing_payload_of_a_detached_file() {
        let dir = TempDir::new().unwrap();
        // HeaderSize = -1: the samples are the last bytes of the file, after any preamble.
        fs::write(
            dir.path().join("tail.mhd"),
            "NDims = 2\nDimSize = 2 1\nElementType = MET_INT\nElementByteOrderMSB = True\nHeaderSize = -1\nElementDataFile = tail.raw\n",
        )
        .unwrap();
        let mut raw = b"some vendor preamble".to_vec();
        raw.extend_from_slice(&(-70_000_i32).to_be_bytes());
        raw.extend_from_slice(&123_456_i32.to_be_bytes());
        fs::write(dir.path().join("tail.raw"), raw).unwrap();

        let image = read_metaimage(dir.path().join("tail.mhd")).unwrap();
        assert_eq!(image.samples(), vec![-70_000., 123_456.]);
    }

    #[test]
    fn header_size_skips_a_fixed_preamble() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("skip.mhd"),
            "NDims = 1\nDimSize = 2\nElementType = MET_ULONG_LONG\nHeaderSize = 4\nElementDataFile = skip.raw\n",
        )
        .unwrap();
        let mut raw = vec![0xAA; 4];
        raw.extend_from_slice(&9_u64.to_le_bytes());
        raw.extend_from_slice(&(1_u64 << 40).to_le_bytes());
        // Trailing bytes past the payload are ignored.
        raw.extend_from_slice(&[0xBB; 3]);
        fs::write(dir.path().join("skip.raw"), raw).unwrap();

        let image = read_metaimage(dir.path().join("skip.mhd")).unwrap();
        assert_eq!(image.samples(), vec![9., (1_u64 << 40) as f64]);

        // A preamble longer than the file leaves nothing to read.
        fs::write(
            dir.path().join("skip.mhd"),
            "NDims = 1\nDimSize = 2\nElementType = MET_UINT\nHeaderSize = 400\nElementDataFile = skip.raw\n",
        )
        .unwrap();
        assert!(matches!(
            read_metaimage(dir.path().join("skip.mhd")),
            Err(ReadError::Truncated {
                expected: 8,
                found: 0
            })
        ));
    }

    #[test]
    fn recognises_extensions() {
        assert!(is_metaimage_path(Path::new("a/b.mha")));
        assert!(is_metaimage_path(Path::new("b.MHD")));
        assert!(!is_metaimage_path(Path::new("b.png")));
        assert!(!is_metaimage_path(Path::new("mha")));
    }
}
