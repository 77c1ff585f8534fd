//! Fixed-point height codec.
//!
//! Heightmap images carry one quantized elevation per pixel. The value is a
//! 24-bit unsigned integer packed big-endian into the red, green and blue
//! channels of an RGBA sample; the alpha channel is padding.
//!
//! ```text
//! sample:  [ R ][ G ][ B ][ A ]
//! value:    23..16 15..8 7..0  unused
//! ```
//!
//! The codec itself is lossless over `0..=MAX_ENCODED_HEIGHT`. Rounding of
//! interpolated heights happens in [`HeightCodec::quantize`], never in
//! [`HeightCodec::encode`] or [`HeightCodec::decode`].

mod raster;

pub use raster::HeightRaster;

use thiserror::Error;

/// Number of bits in an encoded height.
pub const HEIGHT_BITS: u32 = 24;

/// Largest value the codec can represent.
pub const MAX_ENCODED_HEIGHT: u32 = (1 << HEIGHT_BITS) - 1;

/// Bytes of a sample that carry the height.
pub const BYTES_PER_HEIGHT: usize = 3;

/// Bytes per raster sample (RGBA).
pub const BYTES_PER_SAMPLE: usize = 4;

/// Multiplier between successive height bytes.
pub const ELEMENT_MULTIPLIER: f64 = 256.0;

/// Errors raised by the codec and raster types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The value does not fit in 24 bits.
    #[error("Height {0} exceeds 24-bit range (max 16777215)")]
    OutOfRange(u32),

    /// The sample buffer does not match the raster dimensions.
    #[error("Expected {expected} bytes for {width}×{height} raster, got {actual}")]
    SampleCount {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// Interpolation needs at least two samples along each axis.
    #[error("Raster {width}×{height} is too small (minimum 2×2)")]
    TooSmall { width: u32, height: u32 },
}

/// 24-bit big-endian height codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeightCodec;

impl HeightCodec {
    /// Encodes a height into three big-endian bytes.
    pub fn encode(value: u32) -> Result<[u8; 3], CodecError> {
        if value > MAX_ENCODED_HEIGHT {
            return Err(CodecError::OutOfRange(value));
        }
        let [_, high, mid, low] = value.to_be_bytes();
        Ok([high, mid, low])
    }

    /// Encodes a height, saturating values above the 24-bit range.
    pub fn encode_saturating(value: u32) -> [u8; 3] {
        let [_, high, mid, low] = value.min(MAX_ENCODED_HEIGHT).to_be_bytes();
        [high, mid, low]
    }

    /// Decodes three big-endian bytes into a height.
    pub fn decode(bytes: [u8; 3]) -> u32 {
        u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
    }

    /// Rounds an interpolated height to the nearest encodable value.
    pub fn quantize(value: f64) -> u32 {
        if value.is_nan() || value <= 0.0 {
            return 0;
        }
        let rounded = value.round();
        if rounded >= MAX_ENCODED_HEIGHT as f64 {
            MAX_ENCODED_HEIGHT
        } else {
            rounded as u32
        }
    }
}
