use crate::err::{FevError, Result};
use crate::fev_bank::{BankDecoder, NodeVisit};
use crate::model::Bank;
use crate::utils::hexdump_around;
use crate::xml_output::write_bank_xml;

use encoding::EncodingRef;
use log::{Level, debug, log_enabled};
use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

/// Number of bytes shown on each side of a failing offset in debug logs.
const ERROR_CONTEXT_BYTES: usize = 64;

/// Callback invoked once for every tree node visited while decoding.
pub type NodeObserver = Arc<dyn Fn(&NodeVisit<'_>) + Send + Sync>;

#[derive(Clone)]
pub struct ParserSettings {
    /// Controls the number of threads used when converting several banks at once.
    num_threads: usize,
    /// Tab-indented XML output.
    indent: bool,
    /// Codec used to decode the length-prefixed strings of the bank.
    ansi_codec: EncodingRef,
    node_observer: Option<NodeObserver>,
}

impl fmt::Debug for ParserSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserSettings")
            .field("num_threads", &self.num_threads)
            .field("indent", &self.indent)
            .field("ansi_codec", &self.ansi_codec.name())
            .field("node_observer", &self.node_observer.is_some())
            .finish()
    }
}

impl Default for ParserSettings {
    fn default() -> Self {
        ParserSettings {
            num_threads: 0,
            indent: true,
            ansi_codec: encoding::all::ASCII,
            node_observer: None,
        }
    }
}

impl ParserSettings {
    pub fn new() -> Self {
        ParserSettings::default()
    }

    /// Sets the number of worker threads.
    /// `0` will let rayon decide.
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = if cfg!(feature = "multithreading") {
            num_threads
        } else {
            // Without rayon every bank is converted on the calling thread.
            1
        };
        self
    }

    pub fn indent(mut self, pretty: bool) -> Self {
        self.indent = pretty;
        self
    }

    pub fn ansi_codec(mut self, ansi_codec: EncodingRef) -> Self {
        self.ansi_codec = ansi_codec;
        self
    }

    pub fn node_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&NodeVisit<'_>) + Send + Sync + 'static,
    {
        self.node_observer = Some(Arc::new(observer));
        self
    }

    pub fn get_num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn should_indent(&self) -> bool {
        self.indent
    }

    pub fn get_ansi_codec(&self) -> EncodingRef {
        self.ansi_codec
    }

    pub(crate) fn get_node_observer(&self) -> Option<&NodeObserver> {
        self.node_observer.as_ref()
    }
}

/// Entry point for decoding a single FEV bank.
///
/// The whole input is held in memory; any file handle is released before decoding starts.
pub struct FevParser {
    data: Vec<u8>,
    config: Arc<ParserSettings>,
}

impl fmt::Debug for FevParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FevParser")
            .field("len", &self.data.len())
            .field("config", &self.config)
            .finish()
    }
}

impl FevParser {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| FevError::FailedToOpenFile {
            source,
            path: path.to_path_buf(),
        })?;

        debug!("Read {} bytes from {}", data.len(), path.display());
        Ok(FevParser::from_buffer(data))
    }

    pub fn from_buffer(buffer: Vec<u8>) -> Self {
        FevParser {
            data: buffer,
            config: Arc::new(ParserSettings::default()),
        }
    }

    pub fn from_read(mut reader: impl Read) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Ok(FevParser::from_buffer(data))
    }

    pub fn with_configuration(mut self, configuration: ParserSettings) -> Self {
        self.config = Arc::new(configuration);
        self
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.config
    }

    /// Decodes the whole bank. Any error aborts the decode, there is no partial result.
    pub fn parse_bank(&self) -> Result<Bank> {
        match BankDecoder::new(&self.data, &self.config).decode() {
            Ok(bank) => Ok(bank),
            Err(err) => {
                if log_enabled!(Level::Debug) {
                    if let Some(offset) = err.offset() {
                        debug!(
                            "Failed to decode bank at offset {}: {}\n{}",
                            offset,
                            err,
                            hexdump_around(&self.data, offset as usize, ERROR_CONTEXT_BYTES)
                        );
                    }
                }
                Err(err.into())
            }
        }
    }

    /// Decodes the bank and writes its XML projection to `writer`.
    pub fn dump_xml<W: Write>(&self, writer: W) -> Result<()> {
        let bank = self.parse_bank()?;
        write_bank_xml(&bank, &self.config, writer)?;
        Ok(())
    }

    pub fn to_xml_string(&self) -> Result<String> {
        let mut out = Vec::new();
        self.dump_xml(&mut out)?;
        // quick-xml only ever writes the UTF-8 we hand it.
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}
