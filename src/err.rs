use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FevError>;
pub type DeserializationResult<T> = std::result::Result<T, DeserializationError>;
pub type SerializationResult<T> = std::result::Result<T, SerializationError>;

/// Errors raised while decoding a bank. Every variant is fatal: the decode is aborted and no
/// partial `Bank` is returned.
#[derive(Debug, Error)]
pub enum DeserializationError {
    #[error(
        "unexpected end of stream while reading {what} at offset {offset} (need {need} bytes, have {have})"
    )]
    UnexpectedEndOfStream {
        what: &'static str,
        offset: u64,
        need: usize,
        have: usize,
    },

    #[error("invalid FEV header magic, expected `FEV1`, found `{magic:02X?}`")]
    InvalidMagic { magic: [u8; 4] },

    #[error(
        "offset {offset}: event flag word `0x{flags:08x}` sets neither the 2D nor the 3D mode bit"
    )]
    InvalidEventMode { flags: u32, offset: u64 },

    #[error("offset {offset}: property `{name}` has an invalid type discriminant {value}")]
    InvalidPropertyType {
        value: u32,
        name: String,
        offset: u64,
    },

    #[error(
        "sound definition `{name}` references template {index}, but only {count} templates were decoded"
    )]
    TemplateIndexOutOfRange {
        name: String,
        index: u32,
        count: usize,
    },
}

impl DeserializationError {
    /// Offset of the input at which the error was detected, when it is known.
    pub fn offset(&self) -> Option<u64> {
        match self {
            DeserializationError::UnexpectedEndOfStream { offset, .. }
            | DeserializationError::InvalidEventMode { offset, .. }
            | DeserializationError::InvalidPropertyType { offset, .. } => Some(*offset),
            DeserializationError::InvalidMagic { .. } => Some(0),
            DeserializationError::TemplateIndexOutOfRange { .. } => None,
        }
    }
}

/// Errors related to Serialization
// Since `quick-xml` maintains the element stack for us, structural errors with the XML
// are reported alongside IO errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Writing to XML failed with: {0}")]
    XmlOutputError(#[from] quick_xml::Error),

    #[error("An I/O error has occurred while writing XML: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum FevError {
    #[error("Failed to open file {}: {source}", path.display())]
    FailedToOpenFile { source: io::Error, path: PathBuf },

    #[error("An I/O error has occurred: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to decode bank, caused by:\n\t{0}")]
    Deserialization(#[from] DeserializationError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

impl FevError {
    /// The decode error behind this error, if the failure happened while decoding.
    pub fn deserialization_error(&self) -> Option<&DeserializationError> {
        match self {
            FevError::Deserialization(e) => Some(e),
            _ => None,
        }
    }
}
