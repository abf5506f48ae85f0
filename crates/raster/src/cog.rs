//! Cloud-Optimized GeoTIFF access through byte-range reads.
//!
//! Only the full-resolution image (first IFD) is used; the tiles covering the
//! requested window are fetched one at a time and sampled by nearest
//! neighbour onto a [`TargetGrid`].

use async_trait::async_trait;
use bytes::Bytes;
use ndarray::Array2;
use reqwest::StatusCode;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, warn};

use etl_common::{backoff_delay, Crs};
use projection::CrsTransform;

use crate::error::{RasterError, Result};
use crate::grid::TargetGrid;
use crate::tiff::{self, GeoInfo, Ifd, ImageLayout, TiffByteOrder};

/// Initial read; usually covers the header, first IFD and GeoTIFF tags.
const HEADER_FETCH_SIZE: u64 = 64 * 1024;

/// Random access to the bytes of a remote or in-memory file.
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Read `length` bytes at `offset`. May return fewer bytes at end of file.
    async fn read_range(&self, offset: u64, length: u64) -> Result<Bytes>;
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Range requests against an HTTP(S) URL.
pub struct HttpRangeSource {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
    initial_backoff: Duration,
}

impl HttpRangeSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }

    pub fn with_retries(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }
}

#[async_trait]
impl RangeSource for HttpRangeSource {
    fn name(&self) -> &str {
        &self.url
    }

    async fn read_range(&self, offset: u64, length: u64) -> Result<Bytes> {
        if length == 0 {
            return Ok(Bytes::new());
        }
        let range = format!("bytes={}-{}", offset, offset + length - 1);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.initial_backoff, attempt);
                tokio::time::sleep(delay).await;
            }

            match self.client.get(&self.url).header("Range", &range).send().await {
                Ok(resp) if resp.status() == StatusCode::PARTIAL_CONTENT => {
                    return Ok(resp.bytes().await?);
                }
                Ok(resp) if resp.status().is_success() => {
                    return Err(RasterError::RangeNotSupported {
                        url: self.url.clone(),
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    let err = RasterError::Status {
                        url: self.url.clone(),
                        status: status.as_u16(),
                    };
                    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
                        return Err(err);
                    }
                    warn!(url = %self.url, status = status.as_u16(), attempt = attempt, "Range request failed, retrying");
                    last_err = Some(err);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!(url = %self.url, error = %e, attempt = attempt, "Range request failed, retrying");
                    last_err = Some(RasterError::Http(e));
                }
                Err(e) => return Err(RasterError::Http(e)),
            }
        }

        Err(last_err.unwrap_or_else(|| RasterError::Status {
            url: self.url.clone(),
            status: 0,
        }))
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// A file held in memory, e.g. an encoded blob read back for inspection.
pub struct MemoryRangeSource {
    name: String,
    data: Bytes,
}

impl MemoryRangeSource {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

#[async_trait]
impl RangeSource for MemoryRangeSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_range(&self, offset: u64, length: u64) -> Result<Bytes> {
        let len = self.data.len() as u64;
        if offset > len {
            return Err(RasterError::InvalidTiff {
                reason: format!("offset {} beyond end of {} ({} bytes)", offset, self.name, len),
            });
        }
        let end = offset.saturating_add(length).min(len);
        Ok(self.data.slice(offset as usize..end as usize))
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Reader over the full-resolution image of a (Cloud-Optimized) GeoTIFF.
pub struct CogReader<S> {
    source: S,
    byte_order: TiffByteOrder,
    layout: ImageLayout,
    geo: GeoInfo,
}

impl<S: RangeSource> CogReader<S> {
    /// Read the header and first IFD, resolving out-of-line tag values.
    pub async fn open(source: S) -> Result<Self> {
        let head = source.read_range(0, HEADER_FETCH_SIZE).await?;
        let header = tiff::parse_header(&head)?;
        let byte_order = header.byte_order;
        let ifd_offset = header.first_ifd_offset as u64;

        let count = fetch_or_slice(&source, &head, ifd_offset, 2).await?;
        let ifd_len = tiff::ifd_byte_len(byte_order, &count)? as u64;
        let ifd_bytes = fetch_or_slice(&source, &head, ifd_offset, ifd_len).await?;
        let raw = tiff::parse_ifd(byte_order, &ifd_bytes)?;

        let mut ifd = Ifd::new(byte_order, raw.entries);
        for (tag, offset, size) in ifd.pending_values() {
            let value = fetch_or_slice(&source, &head, offset, size).await?;
            ifd.set_value(tag, value.to_vec());
        }

        let layout = ImageLayout::from_ifd(&ifd)?;
        let geo = GeoInfo::from_ifd(&ifd)?;

        debug!(
            source = source.name(),
            width = layout.width,
            height = layout.height,
            block_width = layout.block_width,
            block_height = layout.block_height,
            epsg = ?geo.epsg,
            "Opened GeoTIFF"
        );

        Ok(Self {
            source,
            byte_order,
            layout,
            geo,
        })
    }

    pub fn layout(&self) -> &ImageLayout {
        &self.layout
    }

    pub fn geo(&self) -> &GeoInfo {
        &self.geo
    }

    /// EPSG code declared in the GeoKeyDirectory, if any.
    pub fn epsg(&self) -> Option<u32> {
        self.geo.epsg
    }

    /// Decoded samples of one tile or strip. Sparse blocks read as zeros.
    pub async fn read_block(&self, index: usize) -> Result<Vec<f64>> {
        let (offset, length) = match (
            self.layout.block_offsets.get(index),
            self.layout.block_byte_counts.get(index),
        ) {
            (Some(&offset), Some(&length)) => (offset, length),
            _ => {
                return Err(RasterError::InvalidTiff {
                    reason: format!("block {} out of range", index),
                })
            }
        };

        if length == 0 {
            return Ok(vec![0.0; self.layout.block_len()]);
        }

        let data = self.source.read_range(offset, length).await?;
        if (data.len() as u64) < length {
            return Err(RasterError::InvalidTiff {
                reason: format!("block {} truncated", index),
            });
        }
        tiff::decode_block(&data, &self.layout, self.byte_order)
    }

    /// Nearest-neighbour sample of the image onto `grid`.
    ///
    /// `source_crs` is the CRS of the image. Cells falling outside the image,
    /// or on the declared nodata value, are NaN.
    pub async fn sample_onto(&self, grid: &TargetGrid, source_crs: Crs) -> Result<Array2<f64>> {
        let (rows, cols) = grid.shape();
        let to_source = CrsTransform::new(grid.crs, source_crs);
        let width = self.layout.width as f64;
        let height = self.layout.height as f64;

        let mut lookups = Vec::with_capacity(rows * cols);
        let mut needed = BTreeSet::new();
        for row in 0..rows {
            for col in 0..cols {
                let (x, y) = grid.transform.pixel_center(col, row);
                let (sx, sy) = to_source.transform(x, y);
                let (fc, fr) = self.geo.transform.geo_to_pixel(sx, sy);

                if fc >= 0.0 && fr >= 0.0 && fc < width && fr < height {
                    let (block, local) = self.layout.locate(fc as u32, fr as u32);
                    needed.insert(block);
                    lookups.push(Some((block, local)));
                } else {
                    lookups.push(None);
                }
            }
        }

        debug!(source = self.source.name(), blocks = needed.len(), "Reading blocks");

        let mut blocks = HashMap::with_capacity(needed.len());
        for index in needed {
            blocks.insert(index, self.read_block(index).await?);
        }

        let nodata = self.geo.nodata;
        let mut out = Array2::from_elem((rows, cols), f64::NAN);
        for (cell, lookup) in out.iter_mut().zip(lookups) {
            let value = lookup.and_then(|(block, local)| blocks.get(&block)?.get(local).copied());
            if let Some(v) = value {
                if nodata != Some(v) {
                    *cell = v;
                }
            }
        }
        Ok(out)
    }
}

/// Slice from the initial read when possible, otherwise issue another range
/// request.
async fn fetch_or_slice<S: RangeSource>(source: &S, head: &Bytes, offset: u64, size: u64) -> Result<Bytes> {
    let end = offset + size;
    let bytes = if end <= head.len() as u64 {
        head.slice(offset as usize..end as usize)
    } else {
        source.read_range(offset, size).await?
    };

    if (bytes.len() as u64) < size {
        return Err(RasterError::InvalidTiff {
            reason: format!(
                "{} truncated: wanted {} bytes at {}, got {}",
                source.name(),
                size,
                offset,
                bytes.len()
            ),
        });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GeoTransform;
    use crate::tiff::{compression, field_type, sample_format, tags};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    /// Little-endian tiled uint16 image, DEFLATE + predictor 2, georeferenced
    /// in `epsg` with its top-left corner at `origin`.
    fn tiled_u16_tiff(
        width: u16,
        height: u16,
        tile: u16,
        epsg: u16,
        origin: (f64, f64),
        pixel: f64,
        value: impl Fn(u16, u16) -> u16,
    ) -> Vec<u8> {
        let across = width.div_ceil(tile);
        let down = height.div_ceil(tile);

        let mut tiles = Vec::new();
        for ty in 0..down {
            for tx in 0..across {
                let mut samples = Vec::new();
                for r in 0..tile {
                    let mut prev = 0u16;
                    for c in 0..tile {
                        let (col, row) = (tx * tile + c, ty * tile + r);
                        let v = if col < width && row < height { value(col, row) } else { 0 };
                        samples.extend_from_slice(&v.wrapping_sub(prev).to_le_bytes());
                        prev = v;
                    }
                }
                let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
                enc.write_all(&samples).unwrap();
                tiles.push(enc.finish().unwrap());
            }
        }

        let n_tiles = tiles.len() as u32;
        let scale: Vec<u8> = [pixel, pixel, 0.0].iter().flat_map(|v| v.to_le_bytes()).collect();
        let tie: Vec<u8> = [0.0f64, 0.0, 0.0, origin.0, origin.1, 0.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let keys: Vec<u8> = [1u16, 1, 0, 1, 3072, 0, 1, epsg]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();

        let entry_count = 14u16;
        let ext_start = 8 + 2 + entry_count as u32 * 12 + 4;
        let offsets_at = ext_start;
        let counts_at = offsets_at + 4 * n_tiles;
        let scale_at = counts_at + 4 * n_tiles;
        let tie_at = scale_at + 24;
        let keys_at = tie_at + 48;
        let data_at = keys_at + keys.len() as u32;

        let mut tile_offsets = Vec::new();
        let mut next = data_at;
        for t in &tiles {
            tile_offsets.push(next);
            next += t.len() as u32;
        }

        let mut out = vec![b'I', b'I', 42, 0];
        out.extend_from_slice(&8u32.to_le_bytes());
        out.extend_from_slice(&entry_count.to_le_bytes());
        let mut push = |tag: u16, ty: u16, count: u32, value: u32| {
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&ty.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            out.extend_from_slice(&value.to_le_bytes());
        };
        push(tags::IMAGE_WIDTH, field_type::LONG, 1, width as u32);
        push(tags::IMAGE_LENGTH, field_type::LONG, 1, height as u32);
        push(tags::BITS_PER_SAMPLE, field_type::SHORT, 1, 16);
        push(tags::COMPRESSION, field_type::SHORT, 1, compression::DEFLATE as u32);
        push(tags::SAMPLES_PER_PIXEL, field_type::SHORT, 1, 1);
        push(tags::PREDICTOR, field_type::SHORT, 1, 2);
        push(tags::TILE_WIDTH, field_type::LONG, 1, tile as u32);
        push(tags::TILE_LENGTH, field_type::LONG, 1, tile as u32);
        push(tags::TILE_OFFSETS, field_type::LONG, n_tiles, offsets_at);
        push(tags::TILE_BYTE_COUNTS, field_type::LONG, n_tiles, counts_at);
        push(tags::SAMPLE_FORMAT, field_type::SHORT, 1, sample_format::UNSIGNED_INT as u32);
        push(tags::MODEL_PIXEL_SCALE, field_type::DOUBLE, 3, scale_at);
        push(tags::MODEL_TIEPOINT, field_type::DOUBLE, 6, tie_at);
        push(tags::GEO_KEY_DIRECTORY, field_type::SHORT, 8, keys_at);
        out.extend_from_slice(&0u32.to_le_bytes());

        for o in &tile_offsets {
            out.extend_from_slice(&o.to_le_bytes());
        }
        for t in &tiles {
            out.extend_from_slice(&(t.len() as u32).to_le_bytes());
        }
        out.extend_from_slice(&scale);
        out.extend_from_slice(&tie);
        out.extend_from_slice(&keys);
        for t in &tiles {
            out.extend_from_slice(t);
        }
        out
    }

    #[tokio::test]
    async fn test_open_tiled_cog() {
        let data = tiled_u16_tiff(10, 6, 4, 32630, (600000.0, 5100000.0), 10.0, |c, r| r * 100 + c);
        let reader = CogReader::open(MemoryRangeSource::new("mem", data)).await.unwrap();

        assert_eq!(reader.epsg(), Some(32630));
        assert_eq!(reader.layout().width, 10);
        assert_eq!(reader.layout().blocks_across(), 3);
        assert_eq!(reader.layout().predictor, 2);
        assert_eq!(reader.geo().transform, GeoTransform::new(600000.0, 5100000.0, 10.0, -10.0));
        assert_eq!(reader.geo().nodata, None);
    }

    #[tokio::test]
    async fn test_read_block_undoes_predictor() {
        let data = tiled_u16_tiff(10, 6, 4, 32630, (600000.0, 5100000.0), 10.0, |c, r| r * 100 + c);
        let reader = CogReader::open(MemoryRangeSource::new("mem", data)).await.unwrap();

        // Second tile of the top row holds columns 4..8
        let block = reader.read_block(1).await.unwrap();
        assert_eq!(&block[0..4], &[4.0, 5.0, 6.0, 7.0]);
        assert_eq!(&block[4..8], &[104.0, 105.0, 106.0, 107.0]);
    }

    #[tokio::test]
    async fn test_sample_onto_same_grid() {
        let data = tiled_u16_tiff(10, 6, 4, 32630, (600000.0, 5100000.0), 10.0, |c, r| r * 100 + c);
        let reader = CogReader::open(MemoryRangeSource::new("mem", data)).await.unwrap();

        // Window offset by (2, 1) pixels and one column past the right edge
        let crs = Crs::from_epsg(32630).unwrap();
        let grid = TargetGrid::new(crs, GeoTransform::new(600020.0, 5099990.0, 10.0, -10.0), 9, 3);
        let sampled = reader.sample_onto(&grid, crs).await.unwrap();

        assert_eq!(sampled.dim(), (3, 9));
        assert_eq!(sampled[[0, 0]], 102.0);
        assert_eq!(sampled[[2, 7]], 309.0);
        assert!(sampled[[1, 8]].is_nan(), "outside the image should be NaN");
    }

    #[tokio::test]
    async fn test_sample_onto_reprojected_grid() {
        // 30 km x 30 km UTM 30N image around (-1.15, 46.18)
        let utm = Crs::from_epsg(32630).unwrap();
        let data = tiled_u16_tiff(500, 500, 256, 32630, (630000.0, 5130000.0), 60.0, |_, _| 1234);
        let reader = CogReader::open(MemoryRangeSource::new("mem", data)).await.unwrap();

        let bounds = etl_common::BoundingBox::new(-1.1530, 46.1815, -1.1500, 46.1835);
        let grid = TargetGrid::from_geographic_bounds(&bounds, Crs::Lambert93, 10.0).unwrap();
        let sampled = reader.sample_onto(&grid, utm).await.unwrap();

        assert!(sampled.iter().all(|&v| v == 1234.0), "every cell should hit the image");
    }

    #[tokio::test]
    async fn test_memory_source_clamps() {
        let source = MemoryRangeSource::new("mem", vec![1u8, 2, 3]);
        assert_eq!(source.read_range(1, 10).await.unwrap().as_ref(), &[2, 3]);
        assert!(source.read_range(4, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_open_rejects_garbage() {
        let result = CogReader::open(MemoryRangeSource::new("mem", vec![0u8; 16])).await;
        assert!(matches!(result, Err(RasterError::InvalidTiff { .. })));
    }
}
