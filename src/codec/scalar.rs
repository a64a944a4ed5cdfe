//! Scalar codec - fixed-width little-endian integers and floats.
//!
//! Every value on the wire is exactly 4 bytes:
//! - `i32`: little-endian two's complement
//! - `f32`: little-endian IEEE-754 single precision
//!
//! # Example
//!
//! ```
//! use gymwire::codec::ScalarCodec;
//!
//! let bytes = ScalarCodec::encode_i32(99999);
//! assert_eq!(ScalarCodec::decode_i32(bytes), 99999);
//!
//! let bytes = ScalarCodec::encode_f32(-1.5);
//! assert_eq!(ScalarCodec::decode_f32(bytes), -1.5);
//! ```

use bytes::{Buf, BufMut, BytesMut};

/// Size of every scalar on the wire.
pub const SCALAR_SIZE: usize = 4;

/// Codec for the two scalar types the protocol carries.
pub struct ScalarCodec;

impl ScalarCodec {
    #[inline]
    pub fn encode_i32(value: i32) -> [u8; SCALAR_SIZE] {
        value.to_le_bytes()
    }

    #[inline]
    pub fn decode_i32(bytes: [u8; SCALAR_SIZE]) -> i32 {
        i32::from_le_bytes(bytes)
    }

    #[inline]
    pub fn encode_f32(value: f32) -> [u8; SCALAR_SIZE] {
        value.to_le_bytes()
    }

    #[inline]
    pub fn decode_f32(bytes: [u8; SCALAR_SIZE]) -> f32 {
        f32::from_le_bytes(bytes)
    }

    /// Append an `i32` to an outgoing buffer.
    #[inline]
    pub fn put_i32(buf: &mut BytesMut, value: i32) {
        buf.put_i32_le(value);
    }

    /// Append an `f32` to an outgoing buffer.
    #[inline]
    pub fn put_f32(buf: &mut BytesMut, value: f32) {
        buf.put_f32_le(value);
    }

    /// Append a run of floats to an outgoing buffer, in order.
    pub fn put_f32_slice(buf: &mut BytesMut, values: &[f32]) {
        buf.reserve(values.len() * SCALAR_SIZE);
        for &v in values {
            buf.put_f32_le(v);
        }
    }

    /// Read one `i32` from the front of `buf`.
    ///
    /// # Panics
    ///
    /// Panics if fewer than 4 bytes remain. Callers size their reads through
    /// the transport, which never returns a short buffer.
    #[inline]
    pub fn get_i32(buf: &mut impl Buf) -> i32 {
        buf.get_i32_le()
    }

    /// Read one `f32` from the front of `buf`.
    ///
    /// # Panics
    ///
    /// Panics if fewer than 4 bytes remain.
    #[inline]
    pub fn get_f32(buf: &mut impl Buf) -> f32 {
        buf.get_f32_le()
    }

    /// Read `count` floats from the front of `buf` into `out`.
    pub fn get_f32_into(buf: &mut impl Buf, count: usize, out: &mut Vec<f32>) {
        out.reserve(count);
        for _ in 0..count {
            out.push(buf.get_f32_le());
        }
    }
}
