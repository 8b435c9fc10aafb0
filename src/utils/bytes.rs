//! Byte-slice utilities for bounds-oriented parsing.
//!
//! This module is intentionally tiny and *boring*: it provides a consistent way to read
//! primitives out of `&[u8]` at fixed offsets, with minimal overhead.
//!
//! There are two layers:
//! - **Option layer** (`read_*`): zero-cost helpers that return `Option<T>`.
//! - **Result layer** (`*_r`): wrappers that map `None` to
//!   `DeserializationError::UnexpectedEndOfStream`.
//!
//! Design notes:
//! - FEV data is little-endian, except for the header magic and the event flag word which are
//!   stored big-endian. Both flavours are provided here, the caller picks.
//! - Offsets are `usize` and are interpreted relative to the slice you pass in.

use crate::err::DeserializationError;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Read `N` raw bytes at `offset`.
///
/// Returns `None` if the range is out of bounds.
pub(crate) fn read_array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    let bytes: [u8; N] = buf.get(offset..end)?.try_into().ok()?;
    Some(bytes)
}

/// Read an `i16` (little-endian) at `offset`.
pub(crate) fn read_i16_le(buf: &[u8], offset: usize) -> Option<i16> {
    Some(LittleEndian::read_i16(&read_array::<2>(buf, offset)?))
}

/// Read a `u32` (little-endian) at `offset`.
pub(crate) fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    Some(LittleEndian::read_u32(&read_array::<4>(buf, offset)?))
}

/// Read a `u32` (big-endian) at `offset`.
pub(crate) fn read_u32_be(buf: &[u8], offset: usize) -> Option<u32> {
    Some(BigEndian::read_u32(&read_array::<4>(buf, offset)?))
}

/// Read an `i32` (little-endian) at `offset`.
pub(crate) fn read_i32_le(buf: &[u8], offset: usize) -> Option<i32> {
    Some(LittleEndian::read_i32(&read_array::<4>(buf, offset)?))
}

/// Read an IEEE-754 `f32` (little-endian) at `offset`.
pub(crate) fn read_f32_le(buf: &[u8], offset: usize) -> Option<f32> {
    Some(LittleEndian::read_f32(&read_array::<4>(buf, offset)?))
}

#[inline]
fn truncated(what: &'static str, offset: usize, need: usize, len: usize) -> DeserializationError {
    DeserializationError::UnexpectedEndOfStream {
        what,
        offset: offset as u64,
        need,
        have: len.saturating_sub(offset),
    }
}

pub(crate) fn slice_r<'a>(
    buf: &'a [u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], DeserializationError> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| truncated(what, offset, len, buf.len()))?;
    buf.get(offset..end)
        .ok_or_else(|| truncated(what, offset, len, buf.len()))
}

/// Read `N` raw bytes at `offset`, or return `DeserializationError::UnexpectedEndOfStream`.
pub(crate) fn read_array_r<const N: usize>(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<[u8; N], DeserializationError> {
    read_array::<N>(buf, offset).ok_or_else(|| truncated(what, offset, N, buf.len()))
}

pub(crate) fn read_i16_le_r(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<i16, DeserializationError> {
    read_i16_le(buf, offset).ok_or_else(|| truncated(what, offset, 2, buf.len()))
}

pub(crate) fn read_u32_le_r(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<u32, DeserializationError> {
    read_u32_le(buf, offset).ok_or_else(|| truncated(what, offset, 4, buf.len()))
}

pub(crate) fn read_u32_be_r(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<u32, DeserializationError> {
    read_u32_be(buf, offset).ok_or_else(|| truncated(what, offset, 4, buf.len()))
}

pub(crate) fn read_i32_le_r(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<i32, DeserializationError> {
    read_i32_le(buf, offset).ok_or_else(|| truncated(what, offset, 4, buf.len()))
}

pub(crate) fn read_f32_le_r(
    buf: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<f32, DeserializationError> {
    read_f32_le(buf, offset).ok_or_else(|| truncated(what, offset, 4, buf.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_both_endiannesses() {
        let buf = [0x46, 0x45, 0x56, 0x31];
        assert_eq!(read_u32_be(&buf, 0), Some(0x4645_5631));
        assert_eq!(read_u32_le(&buf, 0), Some(0x3156_4546));
    }

    #[test]
    fn test_out_of_bounds_reports_what_is_missing() {
        let buf = [0_u8; 6];
        match read_u32_le_r(&buf, 4, "count") {
            Err(DeserializationError::UnexpectedEndOfStream {
                what,
                offset,
                need,
                have,
            }) => {
                assert_eq!(what, "count");
                assert_eq!(offset, 4);
                assert_eq!(need, 4);
                assert_eq!(have, 2);
            }
            other => panic!("expected end of stream, got {:?}", other),
        }
    }

    #[test]
    fn test_offset_overflow_does_not_panic() {
        let buf = [0_u8; 4];
        assert!(slice_r(&buf, usize::MAX, 2, "overflow").is_err());
        assert_eq!(read_array::<4>(&buf, usize::MAX), None);
    }
}
