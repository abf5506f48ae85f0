//! Single-band Float64 GeoTIFF encoding.
//!
//! Output is a classic little-endian TIFF with one DEFLATE strip and no
//! predictor, georeferenced through ModelPixelScale/ModelTiepoint and a
//! GeoKeyDirectory declaring the grid's EPSG code. PostGIS reads it with
//! `ST_FromGDALRaster`.

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use ndarray::ArrayView2;
use std::io::Write;

use crate::error::{RasterError, Result};
use crate::grid::TargetGrid;
use crate::tiff::{compression, field_type, sample_format, tags};

const HEADER_LEN: u32 = 8;

/// One IFD entry with its value already encoded little-endian.
struct Entry {
    tag: u16,
    type_id: u16,
    count: u32,
    data: Vec<u8>,
}

impl Entry {
    fn short(tag: u16, value: u16) -> Self {
        Self::shorts(tag, &[value])
    }

    fn shorts(tag: u16, values: &[u16]) -> Self {
        Self {
            tag,
            type_id: field_type::SHORT,
            count: values.len() as u32,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn long(tag: u16, value: u32) -> Self {
        Self {
            tag,
            type_id: field_type::LONG,
            count: 1,
            data: value.to_le_bytes().to_vec(),
        }
    }

    fn doubles(tag: u16, values: &[f64]) -> Self {
        Self {
            tag,
            type_id: field_type::DOUBLE,
            count: values.len() as u32,
            data: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn ascii(tag: u16, value: &str) -> Self {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        Self {
            tag,
            type_id: field_type::ASCII,
            count: data.len() as u32,
            data,
        }
    }

    fn is_inline(&self) -> bool {
        self.data.len() <= 4
    }
}

/// Encode a 2-D slice on `grid` as a GeoTIFF blob.
pub fn encode_geotiff(data: ArrayView2<f64>, grid: &TargetGrid, nodata: f64) -> Result<Vec<u8>> {
    let (rows, cols) = data.dim();
    if (rows, cols) != grid.shape() {
        return Err(RasterError::Encode(format!(
            "array shape {:?} does not match grid {:?}",
            (rows, cols),
            grid.shape()
        )));
    }

    let mut raw = Vec::with_capacity(rows * cols * 8);
    for v in data.iter() {
        raw.extend_from_slice(&v.to_le_bytes());
    }
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder.write_all(&raw).map_err(encode_err)?;
    let strip = encoder.finish().map_err(encode_err)?;

    let t = &grid.transform;
    let epsg = grid.crs.epsg();
    let epsg = u16::try_from(epsg)
        .map_err(|_| RasterError::Encode(format!("EPSG code {} does not fit a GeoKey", epsg)))?;

    // Sorted by tag; StripOffsets is patched once the layout is known
    let mut entries = vec![
        Entry::long(tags::IMAGE_WIDTH, cols as u32),
        Entry::long(tags::IMAGE_LENGTH, rows as u32),
        Entry::short(tags::BITS_PER_SAMPLE, 64),
        Entry::short(tags::COMPRESSION, compression::DEFLATE),
        Entry::short(tags::PHOTOMETRIC, 1),
        Entry::long(tags::STRIP_OFFSETS, 0),
        Entry::short(tags::SAMPLES_PER_PIXEL, 1),
        Entry::long(tags::ROWS_PER_STRIP, rows as u32),
        Entry::long(tags::STRIP_BYTE_COUNTS, strip.len() as u32),
        Entry::short(tags::PLANAR_CONFIG, 1),
        Entry::short(tags::PREDICTOR, 1),
        Entry::short(tags::SAMPLE_FORMAT, sample_format::FLOAT),
        Entry::doubles(tags::MODEL_PIXEL_SCALE, &[t.pixel_width, -t.pixel_height, 0.0]),
        Entry::doubles(tags::MODEL_TIEPOINT, &[0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0]),
        Entry::shorts(
            tags::GEO_KEY_DIRECTORY,
            &[
                1, 1, 0, 3, // version, revision, minor, key count
                1024, 0, 1, 1, // GTModelType = projected
                1025, 0, 1, 1, // GTRasterType = PixelIsArea
                3072, 0, 1, epsg, // ProjectedCSType
            ],
        ),
        Entry::ascii(tags::GDAL_NODATA, &format_nodata(nodata)),
    ];

    let ifd_len = 2 + entries.len() as u32 * 12 + 4;
    let mut next = HEADER_LEN + ifd_len;
    let mut offsets = Vec::with_capacity(entries.len());
    for entry in &entries {
        if entry.is_inline() {
            offsets.push(None);
        } else {
            offsets.push(Some(next));
            next += padded(entry.data.len() as u32);
        }
    }
    let strip_offset = next;
    if let Some(e) = entries.iter_mut().find(|e| e.tag == tags::STRIP_OFFSETS) {
        e.data = strip_offset.to_le_bytes().to_vec();
    }

    let mut out = Vec::with_capacity(strip_offset as usize + strip.len());
    out.extend_from_slice(b"II");
    out.write_u16::<LittleEndian>(42).map_err(encode_err)?;
    out.write_u32::<LittleEndian>(HEADER_LEN).map_err(encode_err)?;

    out.write_u16::<LittleEndian>(entries.len() as u16).map_err(encode_err)?;
    for (entry, offset) in entries.iter().zip(&offsets) {
        out.write_u16::<LittleEndian>(entry.tag).map_err(encode_err)?;
        out.write_u16::<LittleEndian>(entry.type_id).map_err(encode_err)?;
        out.write_u32::<LittleEndian>(entry.count).map_err(encode_err)?;
        match offset {
            Some(offset) => out.write_u32::<LittleEndian>(*offset).map_err(encode_err)?,
            None => {
                let mut value = [0u8; 4];
                value[..entry.data.len()].copy_from_slice(&entry.data);
                out.extend_from_slice(&value);
            }
        }
    }
    out.write_u32::<LittleEndian>(0).map_err(encode_err)?;

    for entry in entries.iter().filter(|e| !e.is_inline()) {
        out.extend_from_slice(&entry.data);
        if entry.data.len() % 2 == 1 {
            out.push(0);
        }
    }
    debug_assert_eq!(out.len() as u32, strip_offset);
    out.extend_from_slice(&strip);

    Ok(out)
}

/// GDAL writes integral nodata values without a fractional part.
fn format_nodata(nodata: f64) -> String {
    if nodata.fract() == 0.0 && nodata.abs() < 1e15 {
        format!("{}", nodata as i64)
    } else {
        format!("{}", nodata)
    }
}

fn padded(len: u32) -> u32 {
    len + len % 2
}

fn encode_err(e: std::io::Error) -> RasterError {
    RasterError::Encode(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cog::{CogReader, MemoryRangeSource};
    use crate::grid::GeoTransform;
    use crate::tiff::{self, Ifd};
    use etl_common::{Crs, NODATA};
    use ndarray::array;

    fn grid() -> TargetGrid {
        TargetGrid::new(Crs::Lambert93, GeoTransform::new(380000.0, 6570030.0, 10.0, -10.0), 4, 3)
    }

    fn sample() -> ndarray::Array2<f64> {
        array![
            [0.1, 0.2, 0.3, 0.4],
            [f64::NAN, -999.0, 0.75, 1.5],
            [-0.5, 0.0, 0.25, 0.9],
        ]
    }

    #[test]
    fn test_tags() {
        let blob = encode_geotiff(sample().view(), &grid(), NODATA).unwrap();
        let header = tiff::parse_header(&blob).unwrap();
        assert_eq!(header.first_ifd_offset, 8);

        let raw = tiff::parse_ifd(header.byte_order, &blob[8..]).unwrap();
        let sorted = raw.entries.windows(2).all(|w| w[0].tag < w[1].tag);
        assert!(sorted, "IFD entries must be sorted by tag");

        let mut ifd = Ifd::new(header.byte_order, raw.entries);
        for (tag, offset, size) in ifd.pending_values() {
            let (start, end) = (offset as usize, (offset + size) as usize);
            ifd.set_value(tag, blob[start..end].to_vec());
        }

        assert_eq!(ifd.u64(tags::BITS_PER_SAMPLE), Some(64));
        assert_eq!(ifd.u64(tags::COMPRESSION), Some(compression::DEFLATE as u64));
        assert_eq!(ifd.u64(tags::PREDICTOR), Some(1));
        assert_eq!(ifd.u64(tags::SAMPLE_FORMAT), Some(sample_format::FLOAT as u64));
        assert_eq!(ifd.ascii(tags::GDAL_NODATA).as_deref(), Some("-999"));
        assert_eq!(
            ifd.f64s(tags::MODEL_TIEPOINT),
            Some(vec![0.0, 0.0, 0.0, 380000.0, 6570030.0, 0.0])
        );
    }

    #[tokio::test]
    async fn test_reads_back() {
        let blob = encode_geotiff(sample().view(), &grid(), NODATA).unwrap();
        let reader = CogReader::open(MemoryRangeSource::new("blob", blob)).await.unwrap();

        assert_eq!(reader.epsg(), Some(2154));
        assert_eq!(reader.geo().nodata, Some(-999.0));
        assert_eq!(reader.geo().transform, grid().transform);
        assert_eq!(reader.layout().width, 4);
        assert_eq!(reader.layout().height, 3);

        let block = reader.read_block(0).await.unwrap();
        assert_eq!(block.len(), 12);
        assert_eq!(block[0], 0.1);
        assert!(block[4].is_nan());
        assert_eq!(block[5], -999.0);
        assert_eq!(block[7], 1.5);

        // Sampling masks the declared nodata
        let sampled = reader.sample_onto(&grid(), Crs::Lambert93).await.unwrap();
        assert!(sampled[[1, 1]].is_nan());
        assert_eq!(sampled[[2, 0]], -0.5);
    }

    #[test]
    fn test_shape_mismatch() {
        let data = ndarray::Array2::<f64>::zeros((2, 2));
        assert!(matches!(
            encode_geotiff(data.view(), &grid(), NODATA),
            Err(RasterError::Encode(_))
        ));
    }

    #[test]
    fn test_format_nodata() {
        assert_eq!(format_nodata(-999.0), "-999");
        assert_eq!(format_nodata(-0.5), "-0.5");
    }
}
