//! # Variable-Length Integer Encoding (RFC 9000 Section 16)
//!
//! The two most significant bits of the first byte select the length:
//! 00=1 byte, 01=2 bytes, 10=4 bytes, 11=8 bytes. The remaining bits hold
//! the value in network byte order.
//!
//! Encoding always picks the minimal length. Validation additionally rejects
//! values that would have fit a shorter encoding, so every accepted integer
//! has exactly one wire form.

#![forbid(unsafe_code)]

use crate::error::{Error, Result};

/// Variable-Length Integer (RFC 9000 Section 16)
pub type VarInt = u64;

/// Maximum value for VarInt (2^62 - 1)
pub const VARINT_MAX: VarInt = (1u64 << 62) - 1;

/// VarInt encoding and decoding utilities
///
/// All functions take an absolute position into the buffer and return
/// absolute positions, so callers can walk a header without re-slicing.
pub struct VarIntCodec;

impl VarIntCodec {
    /// Minimal encoded length for `value` (1, 2, 4 or 8).
    pub fn length_of(value: VarInt) -> usize {
        if value < 0x40 {
            1
        } else if value < 0x4000 {
            2
        } else if value < 0x4000_0000 {
            4
        } else {
            8
        }
    }

    /// Smallest value that requires an encoding of `len` bytes.
    fn min_value(len: usize) -> VarInt {
        match len {
            1 => 0,
            2 => 0x40,
            4 => 0x4000,
            _ => 0x4000_0000,
        }
    }

    /// Encoded length announced by a first byte.
    fn announced_len(first: u8) -> usize {
        1 << (first >> 6)
    }

    /// Check that a varint starting at `pos` fits in `buf` and is minimally
    /// encoded.
    ///
    /// Returns the position just past the varint.
    ///
    /// # Errors
    ///
    /// - `NotEnoughData`: the buffer ends inside the varint
    /// - `Malformed`: the value would fit in a shorter encoding
    pub fn validate(buf: &[u8], pos: usize) -> Result<usize> {
        let first = *buf.get(pos).ok_or(Error::NotEnoughData)?;
        let len = Self::announced_len(first);
        let end = pos.checked_add(len).ok_or(Error::NotEnoughData)?;
        if end > buf.len() {
            return Err(Error::NotEnoughData);
        }

        if Self::decode(buf, pos) < Self::min_value(len) {
            return Err(Error::Malformed);
        }
        Ok(end)
    }

    /// Read the varint at `pos`.
    ///
    /// The caller must have run [`VarIntCodec::validate`] over the same
    /// position. Any length class is decoded, minimal or not.
    pub fn decode(buf: &[u8], pos: usize) -> VarInt {
        let len = Self::announced_len(buf[pos]);
        buf[pos + 1..pos + len]
            .iter()
            .fold(VarInt::from(buf[pos] & 0x3f), |acc, &b| {
                (acc << 8) | VarInt::from(b)
            })
    }

    /// Position just past the varint at `pos`, without reading its value.
    pub fn skip(buf: &[u8], pos: usize) -> usize {
        pos + Self::announced_len(buf[pos])
    }

    /// Write `value` at `pos` using the minimal encoding.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// - `InvalidInput`: `value` exceeds [`VARINT_MAX`]
    /// - `BufferTooSmall`: fewer than `length_of(value)` bytes remain
    pub fn encode(value: VarInt, buf: &mut [u8], pos: usize) -> Result<usize> {
        if value > VARINT_MAX {
            return Err(Error::InvalidInput("varint exceeds 2^62 - 1"));
        }

        let len = Self::length_of(value);
        let end = pos + len;
        let out = buf.get_mut(pos..end).ok_or(Error::BufferTooSmall(end))?;

        out.copy_from_slice(&value.to_be_bytes()[8 - len..]);
        // Length tag in the two high bits: log2(len)
        out[0] |= (len.trailing_zeros() as u8) << 6;
        Ok(len)
    }
}
