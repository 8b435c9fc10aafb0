use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::bytes;

use encoding::{DecoderTrap, EncodingRef};
use log::trace;

/// A lightweight, forward-only cursor over an immutable byte slice.
///
/// This is the slice/offset equivalent of `Cursor<&[u8]>`, intended for parsing where:
/// - the data is already in memory, and
/// - we want explicit bounds/offset control without IO-style error plumbing.
///
/// Reads are little-endian unless the method name says otherwise, and advance the cursor by
/// exactly the number of bytes consumed. A read that would run past the end of the buffer fails
/// with `UnexpectedEndOfStream` and leaves the position untouched.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    #[inline]
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    #[inline]
    pub(crate) fn position(&self) -> u64 {
        self.pos as u64
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Advance `n` bytes without interpreting them.
    #[inline]
    pub(crate) fn skip(&mut self, n: usize, what: &'static str) -> DeserializationResult<()> {
        let _ = bytes::slice_r(self.buf, self.pos, n, what)?;
        self.pos += n;
        Ok(())
    }

    #[inline]
    pub(crate) fn take_bytes(
        &mut self,
        len: usize,
        what: &'static str,
    ) -> DeserializationResult<&'a [u8]> {
        let out = bytes::slice_r(self.buf, self.pos, len, what)?;
        self.pos += len;
        Ok(out)
    }

    #[inline]
    pub(crate) fn array<const N: usize>(
        &mut self,
        what: &'static str,
    ) -> DeserializationResult<[u8; N]> {
        let v = bytes::read_array_r::<N>(self.buf, self.pos, what)?;
        self.pos += N;
        Ok(v)
    }

    #[inline]
    pub(crate) fn u32_named(&mut self, what: &'static str) -> DeserializationResult<u32> {
        let v = bytes::read_u32_le_r(self.buf, self.pos, what)?;
        self.pos += 4;
        Ok(v)
    }

    #[inline]
    pub(crate) fn u32_be_named(&mut self, what: &'static str) -> DeserializationResult<u32> {
        let v = bytes::read_u32_be_r(self.buf, self.pos, what)?;
        self.pos += 4;
        Ok(v)
    }

    #[inline]
    pub(crate) fn i32_named(&mut self, what: &'static str) -> DeserializationResult<i32> {
        let v = bytes::read_i32_le_r(self.buf, self.pos, what)?;
        self.pos += 4;
        Ok(v)
    }

    #[inline]
    pub(crate) fn i16_named(&mut self, what: &'static str) -> DeserializationResult<i16> {
        let v = bytes::read_i16_le_r(self.buf, self.pos, what)?;
        self.pos += 2;
        Ok(v)
    }

    #[inline]
    pub(crate) fn f32_named(&mut self, what: &'static str) -> DeserializationResult<f32> {
        let v = bytes::read_f32_le_r(self.buf, self.pos, what)?;
        self.pos += 4;
        Ok(v)
    }

    /// Read a `u32` count followed by that many bytes of text, decoded with `codec`.
    ///
    /// A zero length yields an empty string. Trailing NULs are trimmed; bytes the codec cannot
    /// map are replaced rather than rejected.
    pub(crate) fn len_prefixed_string(
        &mut self,
        codec: EncodingRef,
        what: &'static str,
    ) -> DeserializationResult<String> {
        let start = self.pos;
        let len = self.u32_named(what)?;
        if len == 0 {
            return Ok(String::new());
        }

        let len = usize::try_from(len).map_err(|_| DeserializationError::UnexpectedEndOfStream {
            what,
            offset: self.position(),
            need: usize::MAX,
            have: self.remaining(),
        })?;

        let raw = match self.take_bytes(len, what) {
            Ok(raw) => raw,
            Err(e) => {
                // Rewind so the cursor does not point into the middle of the length prefix.
                self.pos = start;
                return Err(e);
            }
        };

        trace!(
            "Offset `0x{offset:08x} ({offset})` read {what} string of len {len}",
            offset = start,
        );

        let decoded = codec
            .decode(raw, DecoderTrap::Replace)
            .unwrap_or_else(|_| String::from_utf8_lossy(raw).into_owned());

        Ok(decoded.trim_end_matches('\0').to_owned())
    }
}
