//! Codec module - value serialization for the wire.
//!
//! The protocol carries only two scalar types, both 4 bytes wide and
//! little-endian. There is no framing: messages are raw concatenations of
//! scalars whose layout both sides know in advance.
//!
//! - [`ScalarCodec`] - `i32` / `f32` encode and decode, plus buffer helpers
//!
//! # Design
//!
//! The codec is a marker struct with static methods rather than a trait
//! object, so call sites read as `ScalarCodec::encode_i32(..)`.

mod scalar;

pub use scalar::{ScalarCodec, SCALAR_SIZE};
