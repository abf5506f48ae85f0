//! TIFF directory parsing and block decoding.
//!
//! Works on raw byte slices rather than `Read + Seek` so the COG reader can
//! feed it from HTTP range responses. Only classic TIFF (magic 42) is handled.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::collections::HashMap;
use std::io::Read;

use crate::error::{RasterError, Result};
use crate::grid::GeoTransform;

/// Byte order of the TIFF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffByteOrder {
    LittleEndian,
    BigEndian,
}

/// Well-known TIFF tag IDs.
pub mod tags {
    pub const IMAGE_WIDTH: u16 = 256;
    pub const IMAGE_LENGTH: u16 = 257;
    pub const BITS_PER_SAMPLE: u16 = 258;
    pub const COMPRESSION: u16 = 259;
    pub const PHOTOMETRIC: u16 = 262;
    pub const STRIP_OFFSETS: u16 = 273;
    pub const SAMPLES_PER_PIXEL: u16 = 277;
    pub const ROWS_PER_STRIP: u16 = 278;
    pub const STRIP_BYTE_COUNTS: u16 = 279;
    pub const PLANAR_CONFIG: u16 = 284;
    pub const PREDICTOR: u16 = 317;
    pub const TILE_WIDTH: u16 = 322;
    pub const TILE_LENGTH: u16 = 323;
    pub const TILE_OFFSETS: u16 = 324;
    pub const TILE_BYTE_COUNTS: u16 = 325;
    pub const SAMPLE_FORMAT: u16 = 339;
    pub const MODEL_PIXEL_SCALE: u16 = 33550;
    pub const MODEL_TIEPOINT: u16 = 33922;
    pub const MODEL_TRANSFORMATION: u16 = 34264;
    pub const GEO_KEY_DIRECTORY: u16 = 34735;
    pub const GDAL_NODATA: u16 = 42113;
}

/// TIFF field type IDs.
pub mod field_type {
    pub const BYTE: u16 = 1;
    pub const ASCII: u16 = 2;
    pub const SHORT: u16 = 3;
    pub const LONG: u16 = 4;
    pub const DOUBLE: u16 = 12;
    pub const LONG8: u16 = 16;
}

/// TIFF compression codes.
pub mod compression {
    pub const NONE: u16 = 1;
    pub const DEFLATE: u16 = 8;
    pub const ADOBE_DEFLATE: u16 = 32946;
}

/// TIFF sample format codes.
pub mod sample_format {
    pub const UNSIGNED_INT: u16 = 1;
    pub const SIGNED_INT: u16 = 2;
    pub const FLOAT: u16 = 3;
}

/// GeoKey IDs read from the GeoKeyDirectory.
mod geo_keys {
    pub const GEOGRAPHIC_TYPE: u16 = 2048;
    pub const PROJECTED_CS_TYPE: u16 = 3072;
    pub const USER_DEFINED: u16 = 32767;
}

/// Size in bytes of one value of a TIFF field type.
pub fn type_byte_size(type_id: u16) -> Option<usize> {
    match type_id {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 => Some(4),
        5 | 10 | 12 | 16 | 17 => Some(8),
        _ => None,
    }
}

/// Parsed TIFF header.
#[derive(Debug, Clone)]
pub struct TiffHeader {
    pub byte_order: TiffByteOrder,
    pub first_ifd_offset: u32,
}

/// A raw IFD entry before value resolution.
#[derive(Debug, Clone)]
pub struct RawTagEntry {
    pub tag: u16,
    pub type_id: u16,
    pub count: u32,
    /// File offset of the value when it does not fit in the entry.
    pub value_or_offset: u32,
    /// The four value bytes exactly as stored in the file.
    pub inline_bytes: [u8; 4],
}

impl RawTagEntry {
    /// Total byte size of the entry's value.
    pub fn value_size(&self) -> u64 {
        type_byte_size(self.type_id).unwrap_or(1) as u64 * self.count as u64
    }

    pub fn is_inline(&self) -> bool {
        self.value_size() <= 4
    }
}

/// One IFD as laid out in the file.
#[derive(Debug, Clone)]
pub struct RawIfd {
    pub entries: Vec<RawTagEntry>,
    pub next_ifd_offset: u32,
}

/// Parse the 8-byte TIFF header.
pub fn parse_header(data: &[u8]) -> Result<TiffHeader> {
    if data.len() < 8 {
        return Err(invalid("header too short"));
    }

    let byte_order = match (data[0], data[1]) {
        (b'I', b'I') => TiffByteOrder::LittleEndian,
        (b'M', b'M') => TiffByteOrder::BigEndian,
        _ => return Err(invalid("invalid byte order marker")),
    };

    match read_u16(byte_order, &data[2..4]) {
        42 => {}
        43 => return Err(RasterError::UnsupportedLayout("BigTIFF".into())),
        magic => return Err(invalid(&format!("expected magic 42, got {}", magic))),
    }

    Ok(TiffHeader {
        byte_order,
        first_ifd_offset: read_u32(byte_order, &data[4..8]),
    })
}

/// Number of bytes an IFD occupies, given at least its 2-byte entry count.
pub fn ifd_byte_len(byte_order: TiffByteOrder, data: &[u8]) -> Result<usize> {
    if data.len() < 2 {
        return Err(invalid("IFD too short"));
    }
    Ok(2 + read_u16(byte_order, &data[0..2]) as usize * 12 + 4)
}

/// Parse one IFD. `data` must start at the IFD offset.
pub fn parse_ifd(byte_order: TiffByteOrder, data: &[u8]) -> Result<RawIfd> {
    let needed = ifd_byte_len(byte_order, data)?;
    if data.len() < needed {
        return Err(invalid(&format!(
            "IFD needs {} bytes but only {} available",
            needed,
            data.len()
        )));
    }

    let entry_count = (needed - 6) / 12;
    let mut entries = Vec::with_capacity(entry_count);
    for i in 0..entry_count {
        let at = 2 + i * 12;
        let mut inline_bytes = [0u8; 4];
        inline_bytes.copy_from_slice(&data[at + 8..at + 12]);
        entries.push(RawTagEntry {
            tag: read_u16(byte_order, &data[at..at + 2]),
            type_id: read_u16(byte_order, &data[at + 2..at + 4]),
            count: read_u32(byte_order, &data[at + 4..at + 8]),
            value_or_offset: read_u32(byte_order, &data[at + 8..at + 12]),
            inline_bytes,
        });
    }

    Ok(RawIfd {
        entries,
        next_ifd_offset: read_u32(byte_order, &data[needed - 4..needed]),
    })
}

// ---------------------------------------------------------------------------
// Resolved IFD
// ---------------------------------------------------------------------------

/// An IFD whose tag values have been (or are being) resolved to bytes.
#[derive(Debug, Clone)]
pub struct Ifd {
    byte_order: TiffByteOrder,
    entries: HashMap<u16, RawTagEntry>,
    values: HashMap<u16, Vec<u8>>,
}

impl Ifd {
    /// Inline values are resolved immediately; the rest must be supplied
    /// through [`Ifd::set_value`].
    pub fn new(byte_order: TiffByteOrder, raw: Vec<RawTagEntry>) -> Self {
        let mut entries = HashMap::with_capacity(raw.len());
        let mut values = HashMap::new();
        for entry in raw {
            if entry.is_inline() {
                values.insert(entry.tag, entry.inline_bytes[..entry.value_size() as usize].to_vec());
            }
            entries.insert(entry.tag, entry);
        }
        Self {
            byte_order,
            entries,
            values,
        }
    }

    pub fn byte_order(&self) -> TiffByteOrder {
        self.byte_order
    }

    /// `(tag, file offset, byte length)` of every value still to be fetched.
    pub fn pending_values(&self) -> Vec<(u16, u64, u64)> {
        let mut pending: Vec<_> = self
            .entries
            .values()
            .filter(|e| !self.values.contains_key(&e.tag))
            .map(|e| (e.tag, e.value_or_offset as u64, e.value_size()))
            .collect();
        pending.sort_by_key(|&(_, offset, _)| offset);
        pending
    }

    pub fn set_value(&mut self, tag: u16, bytes: Vec<u8>) {
        self.values.insert(tag, bytes);
    }

    /// Integer values of a tag, widened to u64.
    pub fn u64s(&self, tag: u16) -> Option<Vec<u64>> {
        let entry = self.entries.get(&tag)?;
        let data = self.values.get(&tag)?;
        let order = self.byte_order;
        let values = match entry.type_id {
            field_type::BYTE => data.iter().map(|&b| b as u64).collect(),
            field_type::SHORT => data.chunks_exact(2).map(|c| read_u16(order, c) as u64).collect(),
            field_type::LONG => data.chunks_exact(4).map(|c| read_u32(order, c) as u64).collect(),
            field_type::LONG8 => data.chunks_exact(8).map(|c| read_u64(order, c)).collect(),
            _ => return None,
        };
        Some(values)
    }

    pub fn u64(&self, tag: u16) -> Option<u64> {
        self.u64s(tag)?.first().copied()
    }

    pub fn u16(&self, tag: u16) -> Option<u16> {
        self.u64(tag).map(|v| v as u16)
    }

    /// Floating point values of a tag (DOUBLE or FLOAT).
    pub fn f64s(&self, tag: u16) -> Option<Vec<f64>> {
        let entry = self.entries.get(&tag)?;
        let data = self.values.get(&tag)?;
        let order = self.byte_order;
        match entry.type_id {
            field_type::DOUBLE => Some(data.chunks_exact(8).map(|c| read_f64(order, c)).collect()),
            11 => Some(data.chunks_exact(4).map(|c| read_f32(order, c) as f64).collect()),
            _ => None,
        }
    }

    /// ASCII value up to the first NUL.
    pub fn ascii(&self, tag: u16) -> Option<String> {
        let entry = self.entries.get(&tag)?;
        if entry.type_id != field_type::ASCII {
            return None;
        }
        let data = self.values.get(&tag)?;
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        Some(String::from_utf8_lossy(&data[..end]).into_owned())
    }
}

// ---------------------------------------------------------------------------
// Image layout and georeferencing
// ---------------------------------------------------------------------------

/// Block structure and sample encoding of the full-resolution image.
///
/// Stripped images are described as blocks spanning the full width.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLayout {
    pub width: u32,
    pub height: u32,
    pub block_width: u32,
    pub block_height: u32,
    pub block_offsets: Vec<u64>,
    pub block_byte_counts: Vec<u64>,
    pub bits_per_sample: u16,
    pub sample_format: u16,
    pub compression: u16,
    pub predictor: u16,
    pub samples_per_pixel: u16,
}

impl ImageLayout {
    pub fn from_ifd(ifd: &Ifd) -> Result<Self> {
        let width = ifd
            .u64(tags::IMAGE_WIDTH)
            .ok_or_else(|| invalid("missing ImageWidth"))? as u32;
        let height = ifd
            .u64(tags::IMAGE_LENGTH)
            .ok_or_else(|| invalid("missing ImageLength"))? as u32;
        if width == 0 || height == 0 {
            return Err(invalid("empty image"));
        }

        let samples_per_pixel = ifd.u16(tags::SAMPLES_PER_PIXEL).unwrap_or(1);
        if samples_per_pixel != 1 {
            return Err(RasterError::UnsupportedLayout(format!(
                "{} samples per pixel",
                samples_per_pixel
            )));
        }

        let (block_width, block_height, block_offsets, block_byte_counts) =
            match ifd.u64s(tags::TILE_OFFSETS) {
                Some(offsets) => (
                    ifd.u64(tags::TILE_WIDTH).ok_or_else(|| invalid("missing TileWidth"))? as u32,
                    ifd.u64(tags::TILE_LENGTH).ok_or_else(|| invalid("missing TileLength"))? as u32,
                    offsets,
                    ifd.u64s(tags::TILE_BYTE_COUNTS)
                        .ok_or_else(|| invalid("missing TileByteCounts"))?,
                ),
                None => {
                    let offsets = ifd
                        .u64s(tags::STRIP_OFFSETS)
                        .ok_or_else(|| invalid("neither tiles nor strips"))?;
                    let rows_per_strip = ifd
                        .u64(tags::ROWS_PER_STRIP)
                        .map(|r| r.min(height as u64) as u32)
                        .unwrap_or(height);
                    (
                        width,
                        rows_per_strip,
                        offsets,
                        ifd.u64s(tags::STRIP_BYTE_COUNTS)
                            .ok_or_else(|| invalid("missing StripByteCounts"))?,
                    )
                }
            };

        if block_width == 0 || block_height == 0 {
            return Err(invalid("zero block size"));
        }

        let layout = Self {
            width,
            height,
            block_width,
            block_height,
            block_offsets,
            block_byte_counts,
            bits_per_sample: ifd.u16(tags::BITS_PER_SAMPLE).unwrap_or(1),
            sample_format: ifd.u16(tags::SAMPLE_FORMAT).unwrap_or(sample_format::UNSIGNED_INT),
            compression: ifd.u16(tags::COMPRESSION).unwrap_or(compression::NONE),
            predictor: ifd.u16(tags::PREDICTOR).unwrap_or(1),
            samples_per_pixel,
        };

        let expected = layout.blocks_across() as usize * layout.blocks_down() as usize;
        if layout.block_offsets.len() < expected || layout.block_byte_counts.len() < expected {
            return Err(invalid(&format!(
                "expected {} blocks, found {} offsets",
                expected,
                layout.block_offsets.len()
            )));
        }

        Ok(layout)
    }

    pub fn blocks_across(&self) -> u32 {
        self.width.div_ceil(self.block_width)
    }

    pub fn blocks_down(&self) -> u32 {
        self.height.div_ceil(self.block_height)
    }

    /// Block index and position within the decoded block of pixel (col, row).
    pub fn locate(&self, col: u32, row: u32) -> (usize, usize) {
        let block = (row / self.block_height) * self.blocks_across() + col / self.block_width;
        let local = (row % self.block_height) * self.block_width + col % self.block_width;
        (block as usize, local as usize)
    }

    /// Samples in one full block.
    pub fn block_len(&self) -> usize {
        self.block_width as usize * self.block_height as usize
    }
}

/// Georeferencing of the image.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoInfo {
    pub transform: GeoTransform,
    pub epsg: Option<u32>,
    pub nodata: Option<f64>,
}

impl GeoInfo {
    pub fn from_ifd(ifd: &Ifd) -> Result<Self> {
        Ok(Self {
            transform: geo_transform(ifd).ok_or_else(|| invalid("no georeferencing tags"))?,
            epsg: epsg_code(ifd),
            nodata: ifd
                .ascii(tags::GDAL_NODATA)
                .and_then(|s| s.trim().parse::<f64>().ok()),
        })
    }
}

fn geo_transform(ifd: &Ifd) -> Option<GeoTransform> {
    let scale = ifd.f64s(tags::MODEL_PIXEL_SCALE);
    let tiepoint = ifd.f64s(tags::MODEL_TIEPOINT);
    if let (Some(scale), Some(tie)) = (&scale, &tiepoint) {
        if scale.len() >= 2 && tie.len() >= 6 {
            return Some(GeoTransform::new(
                tie[3] - tie[0] * scale[0],
                tie[4] + tie[1] * scale[1],
                scale[0],
                -scale[1],
            ));
        }
    }

    // Row-major 4x4; rotation terms ignored
    let t = ifd.f64s(tags::MODEL_TRANSFORMATION)?;
    if t.len() >= 16 {
        return Some(GeoTransform::new(t[3], t[7], t[0], t[5]));
    }
    None
}

fn epsg_code(ifd: &Ifd) -> Option<u32> {
    let dir = ifd.u64s(tags::GEO_KEY_DIRECTORY)?;
    if dir.len() < 4 {
        return None;
    }
    let key_count = dir[3] as usize;

    let mut geographic = None;
    for key in dir[4..].chunks_exact(4).take(key_count) {
        let (id, location, value) = (key[0] as u16, key[1], key[3] as u32);
        if location != 0 || value == 0 || value == geo_keys::USER_DEFINED as u32 {
            continue;
        }
        match id {
            geo_keys::PROJECTED_CS_TYPE => return Some(value),
            geo_keys::GEOGRAPHIC_TYPE => geographic = Some(value),
            _ => {}
        }
    }
    geographic
}

// ---------------------------------------------------------------------------
// Block decoding
// ---------------------------------------------------------------------------

/// Inflate a block according to its compression code.
pub fn decompress(data: &[u8], compression_code: u16, expected_size: usize) -> Result<Vec<u8>> {
    match compression_code {
        compression::NONE => Ok(data.to_vec()),
        compression::DEFLATE | compression::ADOBE_DEFLATE => {
            // TIFF DEFLATE is a zlib stream; some writers emit raw deflate
            let mut out = Vec::with_capacity(expected_size);
            if flate2::read::ZlibDecoder::new(data).read_to_end(&mut out).is_ok() {
                return Ok(out);
            }
            out.clear();
            flate2::read::DeflateDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| RasterError::Decompress(format!("DEFLATE: {}", e)))?;
            Ok(out)
        }
        other => Err(RasterError::UnsupportedCompression(other)),
    }
}

/// Decode a compressed block into samples, undoing horizontal differencing.
pub fn decode_block(data: &[u8], layout: &ImageLayout, byte_order: TiffByteOrder) -> Result<Vec<f64>> {
    let bytes_per_sample = (layout.bits_per_sample as usize).div_ceil(8);
    let raw = decompress(data, layout.compression, layout.block_len() * bytes_per_sample)?;

    let bps = layout.bits_per_sample;
    let sf = layout.sample_format;
    let predictor = layout.predictor;
    let row_len = layout.block_width as usize;

    let unsupported = || RasterError::UnsupportedDataType { bps, sf, predictor };
    if predictor != 1 && (predictor != 2 || sf == sample_format::FLOAT) {
        return Err(unsupported());
    }
    let differenced = predictor == 2;

    let samples = match (bps, sf) {
        (8, sample_format::UNSIGNED_INT) => decode::<u8>(&raw, byte_order, row_len, differenced),
        (8, sample_format::SIGNED_INT) => decode::<i8>(&raw, byte_order, row_len, differenced),
        (16, sample_format::UNSIGNED_INT) => decode::<u16>(&raw, byte_order, row_len, differenced),
        (16, sample_format::SIGNED_INT) => decode::<i16>(&raw, byte_order, row_len, differenced),
        (32, sample_format::UNSIGNED_INT) => decode::<u32>(&raw, byte_order, row_len, differenced),
        (32, sample_format::SIGNED_INT) => decode::<i32>(&raw, byte_order, row_len, differenced),
        (32, sample_format::FLOAT) => decode::<f32>(&raw, byte_order, row_len, false),
        (64, sample_format::FLOAT) => decode::<f64>(&raw, byte_order, row_len, false),
        _ => return Err(unsupported()),
    };
    Ok(samples)
}

trait Sample: Copy {
    const SIZE: usize;
    fn read(order: TiffByteOrder, bytes: &[u8]) -> Self;
    fn accumulate(self, previous: Self) -> Self;
    fn to_f64(self) -> f64;
}

macro_rules! int_sample {
    ($t:ty, $read:ident) => {
        impl Sample for $t {
            const SIZE: usize = std::mem::size_of::<$t>();
            fn read(order: TiffByteOrder, bytes: &[u8]) -> Self {
                match order {
                    TiffByteOrder::LittleEndian => LittleEndian::$read(bytes),
                    TiffByteOrder::BigEndian => BigEndian::$read(bytes),
                }
            }
            fn accumulate(self, previous: Self) -> Self {
                self.wrapping_add(previous)
            }
            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

macro_rules! float_sample {
    ($t:ty, $read:ident) => {
        impl Sample for $t {
            const SIZE: usize = std::mem::size_of::<$t>();
            fn read(order: TiffByteOrder, bytes: &[u8]) -> Self {
                match order {
                    TiffByteOrder::LittleEndian => LittleEndian::$read(bytes),
                    TiffByteOrder::BigEndian => BigEndian::$read(bytes),
                }
            }
            fn accumulate(self, previous: Self) -> Self {
                self + previous
            }
            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

int_sample!(u16, read_u16);
int_sample!(i16, read_i16);
int_sample!(u32, read_u32);
int_sample!(i32, read_i32);
float_sample!(f32, read_f32);
float_sample!(f64, read_f64);

impl Sample for u8 {
    const SIZE: usize = 1;
    fn read(_: TiffByteOrder, bytes: &[u8]) -> Self {
        bytes[0]
    }
    fn accumulate(self, previous: Self) -> Self {
        self.wrapping_add(previous)
    }
    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Sample for i8 {
    const SIZE: usize = 1;
    fn read(_: TiffByteOrder, bytes: &[u8]) -> Self {
        bytes[0] as i8
    }
    fn accumulate(self, previous: Self) -> Self {
        self.wrapping_add(previous)
    }
    fn to_f64(self) -> f64 {
        self as f64
    }
}

fn decode<T: Sample>(raw: &[u8], order: TiffByteOrder, row_len: usize, differenced: bool) -> Vec<f64> {
    let mut values: Vec<T> = raw.chunks_exact(T::SIZE).map(|c| T::read(order, c)).collect();
    if differenced {
        for row in values.chunks_mut(row_len) {
            for i in 1..row.len() {
                row[i] = row[i].accumulate(row[i - 1]);
            }
        }
    }
    values.into_iter().map(Sample::to_f64).collect()
}

// ---- Byte order helpers ----

pub(crate) fn read_u16(order: TiffByteOrder, data: &[u8]) -> u16 {
    match order {
        TiffByteOrder::LittleEndian => LittleEndian::read_u16(data),
        TiffByteOrder::BigEndian => BigEndian::read_u16(data),
    }
}

fn read_u32(order: TiffByteOrder, data: &[u8]) -> u32 {
    match order {
        TiffByteOrder::LittleEndian => LittleEndian::read_u32(data),
        TiffByteOrder::BigEndian => BigEndian::read_u32(data),
    }
}

fn read_u64(order: TiffByteOrder, data: &[u8]) -> u64 {
    match order {
        TiffByteOrder::LittleEndian => LittleEndian::read_u64(data),
        TiffByteOrder::BigEndian => BigEndian::read_u64(data),
    }
}

fn read_f32(order: TiffByteOrder, data: &[u8]) -> f32 {
    match order {
        TiffByteOrder::LittleEndian => LittleEndian::read_f32(data),
        TiffByteOrder::BigEndian => BigEndian::read_f32(data),
    }
}

fn read_f64(order: TiffByteOrder, data: &[u8]) -> f64 {
    match order {
        TiffByteOrder::LittleEndian => LittleEndian::read_f64(data),
        TiffByteOrder::BigEndian => BigEndian::read_f64(data),
    }
}

fn invalid(reason: &str) -> RasterError {
    RasterError::InvalidTiff {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn entry(tag: u16, type_id: u16, count: u32, value: [u8; 4]) -> RawTagEntry {
        RawTagEntry {
            tag,
            type_id,
            count,
            value_or_offset: u32::from_le_bytes(value),
            inline_bytes: value,
        }
    }

    fn short(tag: u16, v: u16) -> RawTagEntry {
        let b = v.to_le_bytes();
        entry(tag, field_type::SHORT, 1, [b[0], b[1], 0, 0])
    }

    fn long(tag: u16, v: u32) -> RawTagEntry {
        entry(tag, field_type::LONG, 1, v.to_le_bytes())
    }

    #[test]
    fn test_parse_header() {
        let header = parse_header(&[b'I', b'I', 42, 0, 8, 0, 0, 0]).unwrap();
        assert_eq!(header.byte_order, TiffByteOrder::LittleEndian);
        assert_eq!(header.first_ifd_offset, 8);

        let header = parse_header(&[b'M', b'M', 0, 42, 0, 0, 0, 16]).unwrap();
        assert_eq!(header.byte_order, TiffByteOrder::BigEndian);
        assert_eq!(header.first_ifd_offset, 16);

        assert!(matches!(
            parse_header(&[b'I', b'I', 43, 0, 8, 0, 0, 0]),
            Err(RasterError::UnsupportedLayout(_))
        ));
        assert!(parse_header(&[b'X', b'X', 42, 0, 8, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_parse_ifd_one_entry() {
        let mut data = Vec::new();
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&256u16.to_le_bytes());
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&512u32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());

        let raw = parse_ifd(TiffByteOrder::LittleEndian, &data).unwrap();
        assert_eq!(raw.entries.len(), 1);
        assert_eq!(raw.next_ifd_offset, 0);
        assert!(raw.entries[0].is_inline());

        let ifd = Ifd::new(TiffByteOrder::LittleEndian, raw.entries);
        assert_eq!(ifd.u64(tags::IMAGE_WIDTH), Some(512));
        assert!(ifd.pending_values().is_empty());
    }

    #[test]
    fn test_big_endian_inline_short() {
        // SHORT 300 stored left-justified in a big-endian value field
        let e = RawTagEntry {
            tag: tags::IMAGE_WIDTH,
            type_id: field_type::SHORT,
            count: 1,
            value_or_offset: 0x012C_0000,
            inline_bytes: [0x01, 0x2C, 0, 0],
        };
        let ifd = Ifd::new(TiffByteOrder::BigEndian, vec![e]);
        assert_eq!(ifd.u16(tags::IMAGE_WIDTH), Some(300));
    }

    #[test]
    fn test_external_values_pending_until_set() {
        let scale = entry(tags::MODEL_PIXEL_SCALE, field_type::DOUBLE, 3, 100u32.to_le_bytes());
        let mut ifd = Ifd::new(TiffByteOrder::LittleEndian, vec![scale]);
        assert_eq!(ifd.pending_values(), vec![(tags::MODEL_PIXEL_SCALE, 100, 24)]);

        let bytes: Vec<u8> = [10.0f64, 10.0, 0.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        ifd.set_value(tags::MODEL_PIXEL_SCALE, bytes);
        assert_eq!(ifd.f64s(tags::MODEL_PIXEL_SCALE), Some(vec![10.0, 10.0, 0.0]));
    }

    #[test]
    fn test_layout_from_strips() {
        let ifd = Ifd::new(
            TiffByteOrder::LittleEndian,
            vec![
                short(tags::IMAGE_WIDTH, 5),
                short(tags::IMAGE_LENGTH, 3),
                short(tags::BITS_PER_SAMPLE, 64),
                short(tags::SAMPLE_FORMAT, sample_format::FLOAT),
                long(tags::STRIP_OFFSETS, 400),
                long(tags::STRIP_BYTE_COUNTS, 120),
            ],
        );
        let layout = ImageLayout::from_ifd(&ifd).unwrap();
        assert_eq!(layout.block_width, 5);
        assert_eq!(layout.block_height, 3);
        assert_eq!(layout.blocks_across(), 1);
        assert_eq!(layout.locate(4, 2), (0, 14));
        assert_eq!(layout.compression, compression::NONE);
    }

    #[test]
    fn test_layout_rejects_zero_tile_width() {
        let ifd = Ifd::new(
            TiffByteOrder::LittleEndian,
            vec![
                short(tags::IMAGE_WIDTH, 512),
                short(tags::IMAGE_LENGTH, 512),
                short(tags::TILE_WIDTH, 0),
                short(tags::TILE_LENGTH, 256),
                long(tags::TILE_OFFSETS, 400),
                long(tags::TILE_BYTE_COUNTS, 120),
            ],
        );
        assert!(matches!(
            ImageLayout::from_ifd(&ifd),
            Err(RasterError::InvalidTiff { .. })
        ));
    }

    #[test]
    fn test_layout_locate_tiles() {
        let layout = ImageLayout {
            width: 10,
            height: 10,
            block_width: 4,
            block_height: 4,
            block_offsets: vec![0; 9],
            block_byte_counts: vec![0; 9],
            bits_per_sample: 16,
            sample_format: sample_format::UNSIGNED_INT,
            compression: compression::NONE,
            predictor: 1,
            samples_per_pixel: 1,
        };
        assert_eq!(layout.blocks_across(), 3);
        assert_eq!(layout.blocks_down(), 3);
        assert_eq!(layout.locate(0, 0), (0, 0));
        assert_eq!(layout.locate(5, 1), (1, 5));
        assert_eq!(layout.locate(9, 9), (8, 5));
    }

    #[test]
    fn test_geokeys_projected_code() {
        let dir: Vec<u8> = [1u16, 1, 0, 3, 1024, 0, 1, 1, 1025, 0, 1, 1, 3072, 0, 1, 32631]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let mut ifd = Ifd::new(
            TiffByteOrder::LittleEndian,
            vec![entry(tags::GEO_KEY_DIRECTORY, field_type::SHORT, 16, 0u32.to_le_bytes())],
        );
        ifd.set_value(tags::GEO_KEY_DIRECTORY, dir);
        assert_eq!(epsg_code(&ifd), Some(32631));
    }

    #[test]
    fn test_decode_undoes_horizontal_differencing() {
        let original: [u16; 8] = [100, 110, 90, 65535, 7, 7, 9, 0];
        // Difference each 4-sample row
        let mut diffed = original;
        for row in diffed.chunks_mut(4) {
            for i in (1..row.len()).rev() {
                row[i] = row[i].wrapping_sub(row[i - 1]);
            }
        }
        let bytes: Vec<u8> = diffed.iter().flat_map(|v| v.to_le_bytes()).collect();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes).unwrap();
        let compressed = encoder.finish().unwrap();

        let layout = ImageLayout {
            width: 4,
            height: 2,
            block_width: 4,
            block_height: 2,
            block_offsets: vec![0],
            block_byte_counts: vec![compressed.len() as u64],
            bits_per_sample: 16,
            sample_format: sample_format::UNSIGNED_INT,
            compression: compression::DEFLATE,
            predictor: 2,
            samples_per_pixel: 1,
        };
        let decoded = decode_block(&compressed, &layout, TiffByteOrder::LittleEndian).unwrap();
        let expected: Vec<f64> = original.iter().map(|&v| v as f64).collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn test_float_predictor_rejected() {
        let layout = ImageLayout {
            width: 1,
            height: 1,
            block_width: 1,
            block_height: 1,
            block_offsets: vec![0],
            block_byte_counts: vec![4],
            bits_per_sample: 32,
            sample_format: sample_format::FLOAT,
            compression: compression::NONE,
            predictor: 3,
            samples_per_pixel: 1,
        };
        let result = decode_block(&[0, 0, 0, 0], &layout, TiffByteOrder::LittleEndian);
        assert!(matches!(result, Err(RasterError::UnsupportedDataType { predictor: 3, .. })));
    }

    #[test]
    fn test_decompress_raw_deflate_fallback() {
        let original = vec![42u8; 256];
        let mut encoder = flate2::write::DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&original).unwrap();
        let compressed = encoder.finish().unwrap();
        assert_eq!(decompress(&compressed, compression::DEFLATE, 256).unwrap(), original);
        assert!(matches!(
            decompress(&compressed, 5, 256),
            Err(RasterError::UnsupportedCompression(5))
        ));
    }
}
