//! Chunk boundary scanner.
//!
//! Walks a decompressed stream and cuts it into `(address, name, payload)`
//! records without decoding payloads.  Payload length comes from the tag
//! byte that follows each name:
//!
//! | Tag | Payload length |
//! |-----|----------------|
//! | `0xEE` | `7 + entries * width(subtype)` |
//! | `0xAA` | `5 + 2 * chars` (string marker required) |
//! | `0xDD` | `2 + length byte` (opens a section) |
//! | scalar tags | `1 + width` |
//! | anything else | no payload |
//!
//! A lone `0xFF` where a name is expected closes one section.
//!
//! [`scan`] is strict and fails on the first inconsistency.  [`scan_debug`]
//! resynchronizes heuristically instead; its output may contain spurious
//! boundaries and must never be fed back into the encoder as a faithful copy.

pub mod resync;

use log::debug;

use crate::error::{Result, Zs2Error};
use crate::primitive::{self, Tag, END_MARKER, STRING_MARKER};
use crate::stream::HEADER_SIZE;

pub use resync::scan_debug;

/// One chunk before interpretation.  `name == None` is an End marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChunk<'a> {
    pub address: usize,
    pub name:    Option<String>,
    pub payload: &'a [u8],
}

impl RawChunk<'_> {
    pub fn is_end(&self) -> bool {
        self.name.is_none()
    }
}

/// Item width of an `0xEE` array subtype.
pub fn array_item_width(subtype: u16) -> Option<usize> {
    match subtype {
        0x00 => Some(0),
        0x11 => Some(1),
        0x04 => Some(4),
        0x05 => Some(8),
        0x16 => Some(4),
        _    => None,
    }
}

/// Subtype of `0xEE` arrays whose bytes hold a structured record.
pub const RECORD_SUBTYPE: u16 = 0x11;

/// Scan a whole stream; the first chunk is expected right after the file
/// marker.
pub fn scan(stream: &[u8]) -> Result<Vec<RawChunk<'_>>> {
    scan_from(stream, 0)
}

/// Scan starting at the file marker located at `start`.
pub fn scan_from(stream: &[u8], start: usize) -> Result<Vec<RawChunk<'_>>> {
    let first = start + HEADER_SIZE;
    if stream.len() < first {
        return Err(Zs2Error::truncated(start, HEADER_SIZE, stream.len()));
    }

    let mut chunks = Vec::new();
    let mut next = first;
    while next < stream.len() {
        let address = next;

        if stream[address] == END_MARKER {
            chunks.push(RawChunk { address, name: None, payload: &stream[address..address] });
            next += 1;
            continue;
        }

        let (name, cont) = primitive::decode_string_ascii(stream, address)?;

        if cont >= stream.len() {
            // Final element, nothing follows its name.
            chunks.push(RawChunk { address, name: Some(name), payload: &stream[cont..cont] });
            break;
        }

        let end = payload_end(stream, cont)?;
        chunks.push(RawChunk { address, name: Some(name), payload: &stream[cont..end] });
        next = end;
    }

    debug!("scanned {} chunks from {} bytes", chunks.len(), stream.len());
    Ok(chunks)
}

/// End offset of the payload starting at `pos`; `pos` itself when the byte
/// there is not a payload tag.
pub fn payload_end(stream: &[u8], pos: usize) -> Result<usize> {
    let tag = match Tag::from_byte(stream[pos]) {
        Some(tag) => tag,
        // some names carry no data
        None => return Ok(pos),
    };

    let end = match tag {
        Tag::Array => {
            let subtype = primitive::read_u16(stream, pos + 1)?;
            let width = array_item_width(subtype)
                .ok_or(Zs2Error::UnknownSubtype { offset: pos, subtype })?;
            let entries = primitive::read_u32(stream, pos + 3)?;
            if subtype == 0x00 && entries != 0 {
                return Err(Zs2Error::MalformedLength {
                    offset: pos + 3,
                    value:  entries,
                    reason: "empty list type EE00 declares entries",
                });
            }
            (entries as usize)
                .checked_mul(width)
                .and_then(|n| n.checked_add(pos + 7))
        }
        Tag::Utf16 => {
            let field = primitive::read_u32(stream, pos + 1)?;
            if field & STRING_MARKER == 0 {
                return Err(Zs2Error::MalformedLength {
                    offset: pos + 1,
                    value:  field,
                    reason: "string marker not set",
                });
            }
            Some(pos + 5 + ((field & !STRING_MARKER) as usize) * 2)
        }
        Tag::Section => {
            let len = *stream.get(pos + 1).ok_or_else(|| Zs2Error::truncated(pos + 1, 1, stream.len()))?;
            Some(pos + 2 + len as usize)
        }
        scalar => scalar.scalar_width().map(|w| pos + 1 + w),
    };

    match end {
        Some(end) if end <= stream.len() => Ok(end),
        Some(end) => Err(Zs2Error::truncated(pos, end - pos, stream.len())),
        None => Err(Zs2Error::truncated(pos, usize::MAX, stream.len())),
    }
}
