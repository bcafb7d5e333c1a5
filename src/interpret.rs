//! Value interpreter: turns scanned chunks into typed values in three passes.
//!
//! 1. [`decode_tags`] decodes every payload by its leading tag byte.  Arrays
//!    stay opaque (`"EE"`).
//! 2. [`decode_subtypes`] splits arrays into items by subtype (`"EE04"`,
//!    `"EE11"`, ...).  Record arrays (`EE11`) become a list of bytes.
//! 3. [`decode_records`] decodes `EE11` payloads with the record grammars.
//!
//! Every pass is total over its input.  Outside debug mode the first
//! problem aborts the whole conversion; in debug mode undecodable data is
//! kept verbatim so the rest of the stream can still be inspected.

use log::{debug, warn};

use crate::error::{Result, Zs2Error};
use crate::float::single_as_double;
use crate::grammar::RecordFamily;
use crate::primitive::{self, Tag};
use crate::scanner::{array_item_width, RawChunk};
use crate::value::{DecodedChunk, Value, TYPE_EMPTY, TYPE_RAW};

/// How far to interpret chunk payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Level {
    /// Pass 1 only.
    Tags = 1,
    /// Passes 1 and 2.
    Subtypes = 2,
    /// All passes.
    #[default]
    Records = 3,
}

impl Level {
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Level::Tags),
            2 => Some(Level::Subtypes),
            3 => Some(Level::Records),
            _ => None,
        }
    }
}

/// Per-call decoding options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeOptions {
    pub level: Level,
    /// Keep undecodable data instead of failing.  Output produced in debug
    /// mode is for inspection and is not guaranteed to encode back to the
    /// original stream.
    pub debug: bool,
}

impl DecodeOptions {
    pub fn debug() -> Self {
        DecodeOptions { debug: true, ..Default::default() }
    }
}

/// Run the passes selected by `options.level`.
pub fn interpret(chunks: &[RawChunk<'_>], options: DecodeOptions) -> Result<Vec<DecodedChunk>> {
    let mut decoded = decode_tags(chunks, options.debug)?;
    debug!("pass 1: {} chunks", decoded.len());
    if options.level >= Level::Subtypes {
        decoded = decode_subtypes(decoded, options.debug)?;
        debug!("pass 2: array subtypes decoded");
    }
    if options.level >= Level::Records {
        decoded = decode_records(decoded, options.debug)?;
        debug!("pass 3: records decoded");
    }
    Ok(decoded)
}

// ── Pass 1 ───────────────────────────────────────────────────────────────────

pub fn decode_tags(chunks: &[RawChunk<'_>], debug: bool) -> Result<Vec<DecodedChunk>> {
    chunks
        .iter()
        .map(|chunk| {
            let Some(name) = &chunk.name else {
                return Ok(DecodedChunk::end(chunk.address));
            };
            let (type_code, value) = match decode_payload(chunk.payload) {
                Ok(decoded) => decoded,
                Err(e) if debug => {
                    warn!("0x{:06x} {}: keeping payload as raw bytes ({})", chunk.address, name, e);
                    (TYPE_RAW.to_string(), Value::Bytes(chunk.payload.to_vec()))
                }
                Err(e) => return Err(e.in_chunk(chunk.address, name)),
            };
            Ok(DecodedChunk { address: chunk.address, name: name.clone(), type_code, value })
        })
        .collect()
}

fn decode_payload(payload: &[u8]) -> Result<(String, Value)> {
    let Some(&first) = payload.first() else {
        return Ok((TYPE_EMPTY.to_string(), Value::empty_list()));
    };
    let tag = Tag::from_byte(first).ok_or(Zs2Error::UnknownTag { offset: 0, tag: first })?;

    let (value, end) = match tag {
        Tag::Utf16 => {
            let (text, end) = primitive::decode_string_utf16(payload, 1, true)?;
            (Value::Utf16(text), end)
        }
        Tag::Section => {
            let (text, end) = primitive::decode_string_ascii(payload, 1)?;
            (Value::Ascii(text), end)
        }
        Tag::Array => (Value::Bytes(payload[1..].to_vec()), payload.len()),
        Tag::Single => {
            let (value, end) = primitive::decode_scalar(tag, payload, 1)?;
            (Value::Float(single_as_double(value.as_f64().unwrap_or(f64::NAN))?), end)
        }
        scalar => primitive::decode_scalar(scalar, payload, 1)?,
    };

    if end != payload.len() {
        return Err(Zs2Error::ExcessData { offset: end, entries: 1, excess: payload.len() - end });
    }
    Ok((tag.code(), value))
}

// ── Pass 2 ───────────────────────────────────────────────────────────────────

pub fn decode_subtypes(chunks: Vec<DecodedChunk>, debug: bool) -> Result<Vec<DecodedChunk>> {
    chunks
        .into_iter()
        .map(|chunk| {
            if chunk.type_code != Tag::Array.code() {
                return Ok(chunk);
            }
            let Value::Bytes(data) = &chunk.value else {
                return Ok(chunk);
            };
            match decode_array_payload(data, debug) {
                Ok(Some((type_code, value))) => Ok(DecodedChunk { type_code, value, ..chunk }),
                Ok(None) => {
                    warn!("0x{:06x} {}: keeping array undecoded", chunk.address, chunk.name);
                    Ok(chunk)
                }
                Err(e) => Err(e.in_chunk(chunk.address, &chunk.name)),
            }
        })
        .collect()
}

/// `data` starts at the subtype field.  `Ok(None)` asks to keep the array
/// undecoded, which only happens in debug mode.
fn decode_array_payload(data: &[u8], debug: bool) -> Result<Option<(String, Value)>> {
    let header = primitive::read_u16(data, 0).and_then(|subtype| {
        let width = array_item_width(subtype).ok_or(Zs2Error::UnknownSubtype { offset: 0, subtype })?;
        let entries = primitive::read_u32(data, 2)?;
        Ok((subtype, width, entries))
    });
    let (subtype, width, entries) = match header {
        Ok(header) => header,
        Err(_) if debug => return Ok(None),
        Err(e) => return Err(e),
    };

    let type_code = format!("{}{:02X}", Tag::Array.code(), subtype);
    let expected = (entries as usize).saturating_mul(width);
    let available = data.len() - 6;

    if available < expected || (subtype == 0x00 && entries != 0) {
        if debug {
            return Ok(None);
        }
        if subtype == 0x00 {
            return Err(Zs2Error::MalformedLength {
                offset: 2,
                value:  entries,
                reason: "empty list type EE00 declares entries",
            });
        }
        return Err(Zs2Error::truncated(6, expected, data.len()));
    }
    if available > expected && !debug {
        return Err(Zs2Error::ExcessData { offset: 6 + expected, entries, excess: available - expected });
    }

    let (items, end) = match primitive::decode_array(width, data, 2) {
        Ok(decoded) => decoded,
        Err(_) if debug => return Ok(None),
        Err(e) => return Err(e),
    };
    let values = items
        .into_iter()
        .map(|item| array_item(subtype, item))
        .collect::<Result<Vec<_>>>()?;

    let extra = &data[end..];
    if extra.is_empty() {
        Ok(Some((type_code, Value::List(values))))
    } else {
        Ok(Some((
            format!("{type_code}-debug"),
            Value::List(vec![Value::List(values), Value::Bytes(extra.to_vec())]),
        )))
    }
}

fn array_item(subtype: u16, item: &[u8]) -> Result<Value> {
    Ok(match subtype {
        0x04 => {
            let (value, _) = primitive::decode_scalar(Tag::Single, item, 0)?;
            Value::Float(single_as_double(value.as_f64().unwrap_or(f64::NAN))?)
        }
        0x05 => primitive::decode_scalar(Tag::Double, item, 0)?.0,
        0x16 => primitive::decode_scalar(Tag::UInt32, item, 0)?.0,
        0x11 => Value::U8(item[0]),
        _ => Value::Bytes(item.to_vec()),
    })
}

// ── Pass 3 ───────────────────────────────────────────────────────────────────

pub fn decode_records(chunks: Vec<DecodedChunk>, debug: bool) -> Result<Vec<DecodedChunk>> {
    chunks
        .into_iter()
        .map(|chunk| {
            if chunk.type_code != "EE11" {
                return Ok(chunk);
            }
            let Some(family) = RecordFamily::of(&chunk.name) else {
                if debug {
                    warn!("0x{:06x} {}: no record layout, keeping bytes", chunk.address, chunk.name);
                    return Ok(chunk);
                }
                return Err(Zs2Error::UnknownRecordType { name: chunk.name.clone() }
                    .in_chunk(chunk.address, &chunk.name));
            };
            let data = chunk.value.to_bytes().ok_or_else(|| {
                Zs2Error::ValueMismatch { type_code: chunk.type_code.clone(), found: chunk.value.to_string() }
                    .in_chunk(chunk.address, &chunk.name)
            })?;
            let record = family
                .decode(&chunk.name, &data, debug)
                .map_err(|e| e.in_chunk(chunk.address, &chunk.name))?;
            Ok(DecodedChunk { type_code: record.type_code, value: Value::List(record.values), ..chunk })
        })
        .collect()
}
