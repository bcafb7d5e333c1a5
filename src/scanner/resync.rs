//! Heuristic chunk finder for streams the strict scanner rejects.
//!
//! A chunk name is a length byte followed by that many printable ASCII
//! characters.  The resync scanner looks for the next such run after every
//! name and treats everything in between as payload.  It knows nothing about
//! tags, so End markers are folded into the preceding payload and payload
//! bytes that happen to look like a name split a chunk in two.

use log::warn;

use super::RawChunk;
use crate::stream::HEADER_SIZE;

pub const EXTENDED_HEADER_NAME: &str = " * extended header * ";

fn is_printable(b: u8) -> bool {
    (32..=127).contains(&b)
}

/// Offset of the first plausible chunk name at or after `from`, or the
/// stream length if there is none.
pub fn find_next_name(stream: &[u8], from: usize) -> usize {
    let mut pos = from;
    while pos < stream.len() {
        let length = stream[pos] as usize;
        if length != 0 {
            let end = (pos + 1 + length).min(stream.len());
            if stream[pos + 1..end].iter().copied().all(is_printable) {
                return pos;
            }
        }
        pos += 1;
    }
    stream.len()
}

/// Scan without validating payloads.  Bytes between the file marker and the
/// first plausible name are reported as a pseudo-chunk named
/// [`EXTENDED_HEADER_NAME`].
pub fn scan_debug(stream: &[u8]) -> Vec<RawChunk<'_>> {
    let mut chunks = Vec::new();
    let first = HEADER_SIZE.min(stream.len());
    let mut next = find_next_name(stream, 0);

    if next > first {
        warn!("extended header of {} bytes before first chunk", next - first);
        chunks.push(RawChunk {
            address: first,
            name:    Some(EXTENDED_HEADER_NAME.to_string()),
            payload: &stream[first..next],
        });
    }

    while next < stream.len() {
        let address = next;
        let length = stream[address] as usize;
        let cont = (address + 1 + length).min(stream.len());
        let name = stream[address + 1..cont].iter().map(|&b| b as char).collect();
        next = find_next_name(stream, cont);
        chunks.push(RawChunk { address, name: Some(name), payload: &stream[cont..next] });
    }

    warn!("debug scan found {} chunks; boundaries are heuristic", chunks.len());
    chunks
}
