use std::io;
use thiserror::Error;

/// Every failure the codec can report.
///
/// Offsets are absolute positions in the decompressed stream when the
/// failing routine knows them, otherwise positions inside the slice it was
/// handed (record payloads).  Interpreter passes wrap errors in
/// [`Zs2Error::InChunk`] so the chunk address is always available.
#[derive(Error, Debug)]
pub enum Zs2Error {
    #[error("Truncated data at 0x{offset:x}: need {needed} bytes, {available} available")]
    Truncated { offset: usize, needed: usize, available: usize },

    #[error("Malformed length field 0x{value:08x} at 0x{offset:x}: {reason}")]
    MalformedLength { offset: usize, value: u32, reason: &'static str },

    #[error("Unknown type tag 0x{tag:02x} at 0x{offset:x}")]
    UnknownTag { offset: usize, tag: u8 },

    #[error("Unknown array subtype 0x{subtype:02x} at 0x{offset:x}")]
    UnknownSubtype { offset: usize, subtype: u16 },

    #[error("Unknown data records for chunk type {name:?}")]
    UnknownRecordType { name: String },

    #[error("Brackets do not balance in format {format:?}")]
    UnbalancedBrackets { format: String },

    #[error("Unknown token {token:?} in format {format:?}")]
    UnknownToken { token: char, format: String },

    #[error("Too much data at 0x{offset:x}: {excess} bytes beyond {entries} declared entries")]
    ExcessData { offset: usize, entries: u32, excess: usize },

    #[error("Format {format:?} does not fit the supplied values: {detail}")]
    ValueCountMismatch { format: String, detail: String },

    #[error("Sections do not balance: {opened} opened, {closed} closed")]
    SectionImbalance { opened: usize, closed: usize },

    #[error("Failed single-precision interpretation of {value:?}")]
    PrecisionReconstructionFailed { value: f64 },

    #[error("File marker is missing. Found 0x{found:08X}, expected 0xDEADBEAF")]
    BadMagic { found: u32 },

    #[error("Unexpected extended binary header, first chunk at 0x{offset:x}; try debug mode")]
    ExtendedHeader { offset: usize },

    #[error("Cannot encode type code {0:?}")]
    UnknownTypeCode(String),

    #[error("Type {type_code} cannot hold value {found}")]
    ValueMismatch { type_code: String, found: String },

    #[error("Text {text:?} cannot be stored as {encoding}")]
    InvalidText { text: String, encoding: &'static str },

    #[error("Malformed markup at byte {offset}: {reason}")]
    Markup { offset: usize, reason: String },

    #[error("Chunk {name:?} at 0x{address:x}: {source}")]
    InChunk {
        address: usize,
        name:    String,
        #[source]
        source:  Box<Zs2Error>,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Zs2Error {
    /// Attach chunk context; already-wrapped errors are left alone.
    pub fn in_chunk(self, address: usize, name: &str) -> Self {
        match self {
            e @ Zs2Error::InChunk { .. } => e,
            e => Zs2Error::InChunk {
                address,
                name:   name.to_string(),
                source: Box::new(e),
            },
        }
    }

    pub(crate) fn truncated(offset: usize, needed: usize, data_len: usize) -> Self {
        Zs2Error::Truncated {
            offset,
            needed,
            available: data_len.saturating_sub(offset),
        }
    }
}

pub type Result<T> = std::result::Result<T, Zs2Error>;
