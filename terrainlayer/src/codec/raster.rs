//! RGBA heightmap raster.

use super::{CodecError, HeightCodec, BYTES_PER_SAMPLE};

/// A heightmap stored as RGBA samples, one encoded height per sample.
///
/// Rows are in image order: row 0 is the northern edge of the tile and
/// column 0 its western edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeightRaster {
    width: u32,
    height: u32,
    samples: Vec<u8>,
}

impl HeightRaster {
    /// Creates a raster with every height set to `value`.
    pub fn filled(width: u32, height: u32, value: u32) -> Self {
        let [high, mid, low] = HeightCodec::encode_saturating(value);
        let count = width as usize * height as usize;
        let mut samples = Vec::with_capacity(count * BYTES_PER_SAMPLE);
        for _ in 0..count {
            samples.extend_from_slice(&[high, mid, low, 0]);
        }
        Self {
            width,
            height,
            samples,
        }
    }

    /// Wraps decoded RGBA pixels.
    pub fn from_rgba(width: u32, height: u32, samples: Vec<u8>) -> Result<Self, CodecError> {
        if width < 2 || height < 2 {
            return Err(CodecError::TooSmall { width, height });
        }
        let expected = width as usize * height as usize * BYTES_PER_SAMPLE;
        if samples.len() != expected {
            return Err(CodecError::SampleCount {
                width,
                height,
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, row-major from the north edge.
    pub fn as_bytes(&self) -> &[u8] {
        &self.samples
    }

    #[inline]
    fn offset(&self, row: u32, col: u32) -> usize {
        debug_assert!(row < self.height && col < self.width);
        (row as usize * self.width as usize + col as usize) * BYTES_PER_SAMPLE
    }

    /// Returns the encoded height at `row` (from north) and `col` (from west).
    #[inline]
    pub fn height_at(&self, row: u32, col: u32) -> u32 {
        let i = self.offset(row, col);
        HeightCodec::decode([self.samples[i], self.samples[i + 1], self.samples[i + 2]])
    }

    /// Stores an encoded height, saturating at the codec maximum.
    #[inline]
    pub fn set_height(&mut self, row: u32, col: u32, value: u32) {
        let i = self.offset(row, col);
        let [high, mid, low] = HeightCodec::encode_saturating(value);
        self.samples[i] = high;
        self.samples[i + 1] = mid;
        self.samples[i + 2] = low;
    }

    /// Iterates over all encoded heights in row-major order.
    pub fn heights(&self) -> impl Iterator<Item = u32> + '_ {
        self.samples
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|s| HeightCodec::decode([s[0], s[1], s[2]]))
    }
}
