#![deny(unused_must_use)]
#![forbid(unsafe_code)]
// Don't allow dbg! prints in release.
#![cfg_attr(not(debug_assertions), deny(clippy::dbg_macro))]

pub use err::{
    DeserializationError, DeserializationResult, FevError, Result, SerializationError,
    SerializationResult,
};
pub use event_flags::EventFlags;
pub use fev_bank::{NodeKind, NodeVisit};
pub use fev_file_header::{FEV_HEADER_RESERVED_SIZE, FEV_MAGIC, FevFileHeader};
pub use fev_parser::{FevParser, NodeObserver, ParserSettings};
pub use guid::Guid;
pub use model::{
    Bank, Category, CategoryIter, Event, EventLayer, EventMode, PlayMode, Position3DType,
    ReverbDefinition, Rolloff3DType, SoundDefinition, StreamingType, WaveBank,
};
pub use property::{Property, PropertyMap, PropertyType};
pub use xml_output::{XmlOutput, write_bank_xml};

pub mod err;
pub mod event_flags;
pub mod fev_bank;
pub mod fev_file_header;
pub mod fev_parser;
pub mod guid;
pub mod model;
pub mod property;
pub mod xml_output;

mod utils;

pub use utils::hexdump_around;

// For tests, we only initialize logging once.
#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}
