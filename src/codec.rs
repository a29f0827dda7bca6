//! Integer and byte-string codec primitives.
//!
//! All multi-byte integers in the table format are little-endian.
//! Variable-length integers use the usual 7-bits-per-byte encoding with the
//! high bit as a continuation flag, least-significant group first.

use crate::error::{Error, Result};
use bytes::{BufMut, BytesMut};

/// Maximum encoded length of a varint32 (5 groups of 7 bits).
pub const MAX_VARINT32_LEN: usize = 5;

/// Maximum encoded length of a varint64 (10 groups of 7 bits).
pub const MAX_VARINT64_LEN: usize = 10;

/// Append a u32 as 4 little-endian bytes.
pub fn put_fixed32(dst: &mut BytesMut, value: u32) {
    dst.put_u32_le(value);
}

/// Append a u64 as 8 little-endian bytes.
pub fn put_fixed64(dst: &mut BytesMut, value: u64) {
    dst.put_u64_le(value);
}

/// Decode 4 little-endian bytes as a u32.
///
/// Callers guarantee `src` holds at least 4 bytes.
pub fn get_fixed32(src: &[u8]) -> u32 {
    u32::from_le_bytes(src[..4].try_into().unwrap())
}

/// Decode 8 little-endian bytes as a u64.
///
/// Callers guarantee `src` holds at least 8 bytes.
pub fn get_fixed64(src: &[u8]) -> u64 {
    u64::from_le_bytes(src[..8].try_into().unwrap())
}

/// Exact encoded byte count of `value` as a varint, without encoding it.
pub fn varint_length(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

/// Append a u32 in varint form.
pub fn put_varint32(dst: &mut BytesMut, value: u32) {
    put_varint64(dst, value as u64);
}

/// Append a u64 in varint form.
pub fn put_varint64(dst: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        dst.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    dst.put_u8(value as u8);
}

/// Decode a varint32 from the front of `src`.
///
/// Returns the value and the number of bytes consumed. Fails if the
/// continuation chain runs past the end of `src` or past the maximum
/// group count for a 32-bit value.
pub fn get_varint32(src: &[u8]) -> Result<(u32, usize)> {
    let (value, consumed) = decode_varint(src, MAX_VARINT32_LEN)?;
    if value > u32::MAX as u64 {
        return Err(Error::corruption("varint32 overflow"));
    }
    Ok((value as u32, consumed))
}

/// Decode a varint64 from the front of `src`.
///
/// Returns the value and the number of bytes consumed.
pub fn get_varint64(src: &[u8]) -> Result<(u64, usize)> {
    decode_varint(src, MAX_VARINT64_LEN)
}

fn decode_varint(src: &[u8], max_len: usize) -> Result<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in src.iter().enumerate() {
        if i >= max_len {
            return Err(Error::corruption("varint too long"));
        }
        value |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        shift += 7;
    }
    Err(Error::corruption("truncated varint"))
}

/// Append a length-prefixed byte string: varint32 length, then raw bytes.
pub fn put_length_prefixed_slice(dst: &mut BytesMut, value: &[u8]) {
    put_varint32(dst, value.len() as u32);
    dst.put_slice(value);
}

/// Decode a length-prefixed byte string from the front of `src`.
///
/// Returns the slice and the total number of bytes consumed (prefix
/// included). Fails if the declared length exceeds the remaining input.
pub fn get_length_prefixed_slice(src: &[u8]) -> Result<(&[u8], usize)> {
    let (len, prefix) = get_varint32(src)?;
    let len = len as usize;
    if src.len() < prefix + len {
        return Err(Error::corruption("length-prefixed slice truncated"));
    }
    Ok((&src[prefix..prefix + len], prefix + len))
}
