//! Stream assembler: re-encodes decoded chunks into a byte stream.
//!
//! The payload encoder dispatches on the chunk's type code, never on the
//! shape of its value, so every code produced by the interpreter (including
//! the debug-mode `raw`, `EE` and `-debug` codes) maps back to the exact
//! payload bytes it was decoded from.

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;

use crate::error::{Result, Zs2Error};
use crate::grammar;
use crate::primitive::{self, Tag, END_MARKER};
use crate::scanner::{array_item_width, RECORD_SUBTYPE};
use crate::stream::FILE_MARKER_BYTES;
use crate::value::{DecodedChunk, Value, TYPE_EMPTY, TYPE_END, TYPE_RAW};

const DEBUG_SUFFIX: &str = "-debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeCode<'a> {
    End,
    Empty,
    Raw,
    Scalar(Tag),
    Utf16,
    Section,
    /// Undecoded array body (`EE`).
    RawArray,
    /// `EExx` or `EExx-debug`.
    Array { subtype: u16, with_extra: bool },
    /// `EE11-<format>`.
    Record(&'a str),
}

impl<'a> TypeCode<'a> {
    fn parse(code: &'a str) -> Result<Self> {
        let unknown = || Zs2Error::UnknownTypeCode(code.to_string());
        Ok(match code {
            TYPE_END => TypeCode::End,
            TYPE_EMPTY => TypeCode::Empty,
            TYPE_RAW => TypeCode::Raw,
            "AA" => TypeCode::Utf16,
            "DD" => TypeCode::Section,
            "EE" => TypeCode::RawArray,
            _ => {
                if let Some(rest) = code.strip_prefix("EE") {
                    if let Some(format) = rest.strip_prefix("11-").filter(|f| *f != "debug") {
                        return Ok(TypeCode::Record(format));
                    }
                    let (hex, with_extra) = match rest.strip_suffix(DEBUG_SUFFIX) {
                        Some(hex) => (hex, true),
                        None => (rest, false),
                    };
                    if hex.len() != 2 {
                        return Err(unknown());
                    }
                    let subtype = u16::from_str_radix(hex, 16).map_err(|_| unknown())?;
                    array_item_width(subtype).ok_or_else(unknown)?;
                    TypeCode::Array { subtype, with_extra }
                } else {
                    let tag = Tag::from_code(code).filter(|t| t.scalar_width().is_some()).ok_or_else(unknown)?;
                    TypeCode::Scalar(tag)
                }
            }
        })
    }
}

/// Encode the payload of one chunk (everything after its name).
pub fn encode_payload(type_code: &str, value: &Value) -> Result<Vec<u8>> {
    let mismatch = || Zs2Error::ValueMismatch { type_code: type_code.to_string(), found: value.to_string() };
    let mut out = Vec::new();

    match TypeCode::parse(type_code)? {
        TypeCode::End => out.push(END_MARKER),
        TypeCode::Empty => {}
        TypeCode::Raw => out.extend(value.to_bytes().ok_or_else(mismatch)?),
        TypeCode::Scalar(tag) => {
            out.push(tag.byte());
            out.extend(primitive::encode_scalar(tag, value)?);
        }
        TypeCode::Utf16 => {
            out.push(Tag::Utf16.byte());
            out.extend(primitive::encode_string_utf16(value.as_str().ok_or_else(mismatch)?)?);
        }
        TypeCode::Section => {
            out.push(Tag::Section.byte());
            out.extend(primitive::encode_string_ascii(value.as_str().ok_or_else(mismatch)?)?);
        }
        TypeCode::RawArray => {
            out.push(Tag::Array.byte());
            out.extend(value.to_bytes().ok_or_else(mismatch)?);
        }
        TypeCode::Array { subtype, with_extra } => {
            let (items, extra) = if with_extra {
                match value.as_slice() {
                    Some([items, extra]) => (items, Some(extra.to_bytes().ok_or_else(mismatch)?)),
                    _ => return Err(mismatch()),
                }
            } else {
                (value, None)
            };
            out.push(Tag::Array.byte());
            out.write_u16::<LittleEndian>(subtype)?;
            encode_array_items(subtype, items, type_code, &mut out)?;
            if let Some(extra) = extra {
                out.extend(extra);
            }
        }
        TypeCode::Record(format) => {
            let values = value.as_slice().ok_or_else(mismatch)?;
            let body = grammar::encode_record(format, values)?;
            out.push(Tag::Array.byte());
            out.write_u16::<LittleEndian>(RECORD_SUBTYPE)?;
            out.write_u32::<LittleEndian>(length_field(body.len(), type_code)?)?;
            out.extend(body);
        }
    }
    Ok(out)
}

fn length_field(len: usize, type_code: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| Zs2Error::ValueCountMismatch {
        format: type_code.to_string(),
        detail: format!("{len} entries exceed the list length field"),
    })
}

/// Entry count and items of an `EExx` array.
fn encode_array_items(subtype: u16, items: &Value, type_code: &str, out: &mut Vec<u8>) -> Result<()> {
    let mismatch = || Zs2Error::ValueMismatch { type_code: type_code.to_string(), found: items.to_string() };

    if subtype == RECORD_SUBTYPE {
        let bytes = items.to_bytes().ok_or_else(mismatch)?;
        out.write_u32::<LittleEndian>(length_field(bytes.len(), type_code)?)?;
        out.extend(bytes);
        return Ok(());
    }

    let items = items.as_slice().ok_or_else(mismatch)?;
    if subtype == 0x00 && !items.is_empty() {
        return Err(mismatch());
    }
    out.write_u32::<LittleEndian>(length_field(items.len(), type_code)?)?;
    for item in items {
        let tag = match subtype {
            0x04 => Tag::Single,
            0x05 => Tag::Double,
            _ => Tag::UInt32,
        };
        out.extend(primitive::encode_scalar(tag, item)?);
    }
    Ok(())
}

/// Rebuild a byte stream from decoded chunks: file marker, then every
/// chunk's name and payload, with a single [`END_MARKER`] for End chunks.
pub fn chunks_to_raw(chunks: &[DecodedChunk]) -> Result<Vec<u8>> {
    let mut stream = FILE_MARKER_BYTES.to_vec();
    for chunk in chunks {
        if chunk.is_end() {
            stream.push(END_MARKER);
            continue;
        }
        let at = stream.len();
        let encoded = primitive::encode_string_ascii(&chunk.name)
            .and_then(|name| Ok((name, encode_payload(&chunk.type_code, &chunk.value)?)));
        let (name, payload) = encoded.map_err(|e| e.in_chunk(at, &chunk.name))?;
        stream.extend(name);
        stream.extend(payload);
    }
    debug!("assembled {} chunks into {} bytes", chunks.len(), stream.len());
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(code: &str, value: Value) -> Vec<u8> {
        encode_payload(code, &value).unwrap()
    }

    #[test]
    fn scalars() {
        assert_eq!(enc("11", Value::I32(3)), b"\x11\x03\x00\x00\x00");
        assert_eq!(enc("BB", Value::Float(3.1)), b"\xbb\x66\x66\x46\x40");
        assert_eq!(enc("99", Value::Bool(true)), b"\x99\x01");
        assert_eq!(enc("88", Value::I8(-3)), b"\x88\xfd");
        assert_eq!(enc("", Value::empty_list()), b"");
    }

    #[test]
    fn strings() {
        assert_eq!(enc("AA", Value::Utf16("mm".into())), b"\xaa\x02\x00\x00\x80m\x00m\x00");
        assert_eq!(enc("DD", Value::Ascii("ab".into())), b"\xdd\x02ab");
    }

    #[test]
    fn arrays() {
        assert_eq!(
            enc("EE16", Value::List(vec![Value::U32(7)])),
            b"\xee\x16\x00\x01\x00\x00\x00\x07\x00\x00\x00"
        );
        assert_eq!(enc("EE00", Value::empty_list()), b"\xee\x00\x00\x00\x00\x00\x00");
        assert_eq!(
            enc("EE11", Value::List(vec![Value::U8(1), Value::U8(2)])),
            b"\xee\x11\x00\x02\x00\x00\x00\x01\x02"
        );
        assert_eq!(
            enc("EE11-debug", Value::List(vec![Value::List(vec![Value::U8(7)]), Value::Bytes(vec![8])])),
            b"\xee\x11\x00\x01\x00\x00\x00\x07\x08"
        );
        assert_eq!(enc("EE", Value::Bytes(vec![0x99, 0x00])), b"\xee\x99\x00");
    }

    #[test]
    fn records() {
        let values = Value::List(vec![Value::U8(1), Value::U8(2), Value::I8(-1)]);
        assert_eq!(enc("EE11-2Bb", values), b"\xee\x11\x00\x03\x00\x00\x00\x01\x02\xff");
        assert_eq!(enc("EE11-", Value::empty_list()), b"\xee\x11\x00\x00\x00\x00\x00");
    }

    #[test]
    fn rejects_unknown_codes_and_values() {
        assert!(matches!(encode_payload("FF", &Value::U8(0)), Err(Zs2Error::UnknownTypeCode(_))));
        assert!(matches!(encode_payload("EE07", &Value::empty_list()), Err(Zs2Error::UnknownTypeCode(_))));
        assert!(matches!(encode_payload("66", &Value::I32(-1)), Err(Zs2Error::ValueMismatch { .. })));
        assert!(matches!(
            encode_payload("EE00", &Value::List(vec![Value::U8(0)])),
            Err(Zs2Error::ValueMismatch { .. })
        ));
    }

    #[test]
    fn stream_layout() {
        let chunks = vec![
            DecodedChunk { address: 4, name: "Root".into(), type_code: "DD".into(), value: Value::Ascii(String::new()) },
            DecodedChunk::end(11),
        ];
        assert_eq!(chunks_to_raw(&chunks).unwrap(), b"\xaf\xbe\xad\xde\x04Root\xdd\x00\xff");
    }
}
