use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::ByteCursor;

use encoding::EncodingRef;
use log::trace;

/// `FEV1` read as a big-endian `u32`.
pub const FEV_MAGIC: u32 = u32::from_be_bytes(*b"FEV1");

/// Size of the opaque block between the magic and the bank name.
pub const FEV_HEADER_RESERVED_SIZE: usize = 280;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct FevFileHeader {
    pub bank_name: String,
}

impl FevFileHeader {
    pub(crate) fn from_cursor(
        cursor: &mut ByteCursor<'_>,
        ansi_codec: EncodingRef,
    ) -> DeserializationResult<FevFileHeader> {
        let magic = cursor.array::<4>("file header magic")?;
        if u32::from_be_bytes(magic) != FEV_MAGIC {
            return Err(DeserializationError::InvalidMagic { magic });
        }

        // unused
        cursor.skip(FEV_HEADER_RESERVED_SIZE, "file header reserved block")?;

        let bank_name = cursor.len_prefixed_string(ansi_codec, "bank name")?;
        trace!("Bank name: `{}`", bank_name);

        Ok(FevFileHeader { bank_name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding::all::ASCII;

    fn header_bytes(magic: &[u8; 4], name: &str) -> Vec<u8> {
        let mut buf = magic.to_vec();
        buf.extend_from_slice(&[0_u8; FEV_HEADER_RESERVED_SIZE]);
        buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf
    }

    #[test]
    fn test_parses_fev_file_header() {
        let buf = header_bytes(b"FEV1", "ui\0");
        let mut cursor = ByteCursor::new(&buf);

        assert_eq!(
            FevFileHeader::from_cursor(&mut cursor, ASCII).unwrap(),
            FevFileHeader {
                bank_name: "ui".to_owned()
            }
        );
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let buf = header_bytes(b"1VEF", "ui");
        let mut cursor = ByteCursor::new(&buf);

        assert!(matches!(
            FevFileHeader::from_cursor(&mut cursor, ASCII),
            Err(DeserializationError::InvalidMagic { magic }) if &magic == b"1VEF"
        ));
        assert_eq!(cursor.position(), 4);
    }

    #[test]
    fn test_short_reserved_block_is_end_of_stream() {
        let mut buf = b"FEV1".to_vec();
        buf.extend_from_slice(&[0_u8; 100]);
        let mut cursor = ByteCursor::new(&buf);

        assert!(matches!(
            FevFileHeader::from_cursor(&mut cursor, ASCII),
            Err(DeserializationError::UnexpectedEndOfStream { need: 280, have: 100, .. })
        ));
    }
}
