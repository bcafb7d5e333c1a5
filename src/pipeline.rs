//! End-to-end conversions between streams, chunk lists and JSON.

use log::{debug, warn};

use crate::assemble::chunks_to_raw;
use crate::error::Result;
use crate::interpret::{interpret, DecodeOptions};
use crate::markup;
use crate::scanner;
use crate::stream::{self, fingerprint};
use crate::tree;
use crate::value::DecodedChunk;

/// Scan and interpret a decompressed stream.
///
/// In debug mode a stream the strict scanner rejects is rescanned
/// heuristically; chunk boundaries found that way may be wrong.
pub fn decode_stream(data: &[u8], options: DecodeOptions) -> Result<Vec<DecodedChunk>> {
    stream::check(data, options.debug)?;
    let raw = match scanner::scan(data) {
        Ok(raw) => raw,
        Err(e) if options.debug => {
            warn!("strict scan failed ({e}); resynchronizing on chunk names");
            scanner::scan_debug(data)
        }
        Err(e) => return Err(e),
    };
    debug!("interpreting {} chunks up to {:?}", raw.len(), options.level);
    interpret(&raw, options)
}

pub fn encode_stream(chunks: &[DecodedChunk]) -> Result<Vec<u8>> {
    chunks_to_raw(chunks)
}

/// Fully decode `data` and render it as a JSON tree.
pub fn stream_to_json(data: &[u8], with_address: bool) -> Result<String> {
    let chunks = decode_stream(data, DecodeOptions::default())?;
    tree::to_json(&tree::build(&chunks, with_address)?)
}

pub fn json_to_stream(text: &str) -> Result<Vec<u8>> {
    encode_stream(&tree::flatten(&tree::from_json(text)?))
}

/// Fully decode `data` and render it as markup.
pub fn stream_to_xml(data: &[u8], with_address: bool) -> Result<String> {
    markup::to_xml(&decode_stream(data, DecodeOptions::default())?, with_address)
}

pub fn xml_to_stream(text: &str) -> Result<Vec<u8>> {
    encode_stream(&tree::flatten(&markup::from_xml(text)?))
}

/// Result of a decode/encode conversion cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub input_fingerprint:  String,
    pub output_fingerprint: String,
    pub json_len:           usize,
}

impl CycleReport {
    pub fn is_identical(&self) -> bool {
        self.input_fingerprint == self.output_fingerprint
    }
}

/// Convert a stream to JSON and back, comparing fingerprints of input and
/// output.
pub fn process_cycle(data: &[u8]) -> Result<CycleReport> {
    let input_fingerprint = fingerprint(data);
    let json = stream_to_json(data, false)?;
    let encoded = json_to_stream(&json)?;
    let report = CycleReport {
        input_fingerprint,
        output_fingerprint: fingerprint(&encoded),
        json_len: json.len(),
    };
    if !report.is_identical() {
        warn!(
            "conversion cycle changed the stream: {} -> {}",
            report.input_fingerprint, report.output_fingerprint
        );
    }
    Ok(report)
}
