//! Fixed-width scalars, the two string encodings and length-prefixed arrays.
//!
//! # Endianness
//! Every multi-byte field is little-endian.  Decoders take the whole buffer
//! plus a start position and return the position just past what they read,
//! so errors can carry the offset where the problem was found.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::{Result, Zs2Error};
use crate::float::{narrow_to_single, widen_single};
use crate::value::Value;

/// Bit 31 of a 32-bit length field marks the start of a UTF-16 string.
pub const STRING_MARKER: u32 = 0x8000_0000;
/// Byte that closes one level of section nesting.
pub const END_MARKER: u8 = 0xFF;

// ── Type tags ────────────────────────────────────────────────────────────────

/// Leading payload byte of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Int32     = 0x11,
    UInt32    = 0x22,
    Int32Alt  = 0x33,
    UInt32Alt = 0x44,
    Int16     = 0x55,
    UInt16    = 0x66,
    Int8      = 0x88,
    Bool      = 0x99,
    Utf16     = 0xAA,
    Single    = 0xBB,
    Double    = 0xCC,
    Section   = 0xDD,
    Array     = 0xEE,
}

impl Tag {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x11 => Some(Tag::Int32),
            0x22 => Some(Tag::UInt32),
            0x33 => Some(Tag::Int32Alt),
            0x44 => Some(Tag::UInt32Alt),
            0x55 => Some(Tag::Int16),
            0x66 => Some(Tag::UInt16),
            0x88 => Some(Tag::Int8),
            0x99 => Some(Tag::Bool),
            0xAA => Some(Tag::Utf16),
            0xBB => Some(Tag::Single),
            0xCC => Some(Tag::Double),
            0xDD => Some(Tag::Section),
            0xEE => Some(Tag::Array),
            _    => None,
        }
    }

    #[inline]
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Payload width after the tag byte for single-scalar tags.
    pub fn scalar_width(self) -> Option<usize> {
        match self {
            Tag::Int32 | Tag::UInt32 | Tag::Int32Alt | Tag::UInt32Alt => Some(4),
            Tag::Int16 | Tag::UInt16 => Some(2),
            Tag::Int8 | Tag::Bool    => Some(1),
            Tag::Single              => Some(4),
            Tag::Double              => Some(8),
            Tag::Utf16 | Tag::Section | Tag::Array => None,
        }
    }

    /// Type code label, the tag byte in upper-case hex.
    pub fn code(self) -> String {
        format!("{:02X}", self.byte())
    }

    pub fn from_code(code: &str) -> Option<Self> {
        if code.len() != 2 {
            return None;
        }
        u8::from_str_radix(code, 16).ok().and_then(Tag::from_byte)
    }
}

// ── Bounds helpers ───────────────────────────────────────────────────────────

fn need(data: &[u8], pos: usize, len: usize) -> Result<&[u8]> {
    pos.checked_add(len)
        .and_then(|end| data.get(pos..end))
        .ok_or_else(|| Zs2Error::truncated(pos, len, data.len()))
}

pub fn read_u16(data: &[u8], pos: usize) -> Result<u16> {
    Ok(LittleEndian::read_u16(need(data, pos, 2)?))
}

pub fn read_u32(data: &[u8], pos: usize) -> Result<u32> {
    Ok(LittleEndian::read_u32(need(data, pos, 4)?))
}

// ── Scalars ──────────────────────────────────────────────────────────────────

/// Decode the fixed-width value of `tag` starting at `pos` (just past the
/// tag byte).  Single-precision values are widened bit for bit, NaN payloads
/// included; callers that show them to humans pass them through [`crate::float::single_as_double`].
pub fn decode_scalar(tag: Tag, data: &[u8], pos: usize) -> Result<(Value, usize)> {
    let unknown = Zs2Error::UnknownTag { offset: pos, tag: tag.byte() };
    let width = tag.scalar_width().ok_or(unknown)?;
    let b = need(data, pos, width)?;
    let value = match tag {
        Tag::Int32 | Tag::Int32Alt   => Value::I32(LittleEndian::read_i32(b)),
        Tag::UInt32 | Tag::UInt32Alt => Value::U32(LittleEndian::read_u32(b)),
        Tag::Int16  => Value::I16(LittleEndian::read_i16(b)),
        Tag::UInt16 => Value::U16(LittleEndian::read_u16(b)),
        Tag::Int8   => Value::I8(b[0] as i8),
        Tag::Bool   => match b[0] {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            // kept as a number so it encodes back to the same byte
            other => Value::U8(other),
        },
        Tag::Single => Value::Float(widen_single(LittleEndian::read_u32(b))),
        Tag::Double => Value::Float(LittleEndian::read_f64(b)),
        Tag::Utf16 | Tag::Section | Tag::Array => {
            return Err(Zs2Error::UnknownTag { offset: pos, tag: tag.byte() });
        }
    };
    Ok((value, pos + width))
}

/// Encode the value bytes of a fixed-width `tag` (without the tag byte).
pub fn encode_scalar(tag: Tag, value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(8);
    match tag {
        Tag::Single => {
            let bits = narrow_to_single(float_of(tag, value)?).ok_or_else(|| mismatch(tag, value))?;
            out.write_u32::<LittleEndian>(bits)?
        }
        Tag::Double => out.write_f64::<LittleEndian>(float_of(tag, value)?)?,
        Tag::Int32 | Tag::Int32Alt => out.write_i32::<LittleEndian>(int_of(tag, value)?)?,
        Tag::UInt32 | Tag::UInt32Alt => out.write_u32::<LittleEndian>(int_of(tag, value)?)?,
        Tag::Int16  => out.write_i16::<LittleEndian>(int_of(tag, value)?)?,
        Tag::UInt16 => out.write_u16::<LittleEndian>(int_of(tag, value)?)?,
        Tag::Int8   => out.write_i8(int_of(tag, value)?)?,
        Tag::Bool   => out.write_u8(int_of(tag, value)?)?,
        Tag::Utf16 | Tag::Section | Tag::Array => {
            return Err(Zs2Error::UnknownTypeCode(tag.code()));
        }
    }
    Ok(out)
}

fn mismatch(tag: Tag, value: &Value) -> Zs2Error {
    Zs2Error::ValueMismatch { type_code: tag.code(), found: value.to_string() }
}

fn int_of<T: TryFrom<i128>>(tag: Tag, value: &Value) -> Result<T> {
    value
        .as_i128()
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| mismatch(tag, value))
}

fn float_of(tag: Tag, value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| mismatch(tag, value))
}

// ── Strings ──────────────────────────────────────────────────────────────────

/// One length byte followed by that many bytes, each mapped to the code
/// point of the same value.
pub fn decode_string_ascii(data: &[u8], pos: usize) -> Result<(String, usize)> {
    let len = need(data, pos, 1)?[0] as usize;
    let bytes = need(data, pos + 1, len)?;
    Ok((bytes.iter().map(|&b| b as char).collect(), pos + 1 + len))
}

pub fn encode_string_ascii(text: &str) -> Result<Vec<u8>> {
    let invalid = || Zs2Error::InvalidText { text: text.to_string(), encoding: "byte string" };
    let bytes = text
        .chars()
        .map(|c| u8::try_from(c as u32).map_err(|_| invalid()))
        .collect::<Result<Vec<u8>>>()?;
    let len = u8::try_from(bytes.len()).map_err(|_| invalid())?;
    let mut out = Vec::with_capacity(bytes.len() + 1);
    out.push(len);
    out.extend_from_slice(&bytes);
    Ok(out)
}

/// 32-bit length with [`STRING_MARKER`] set, then `count` UTF-16LE code units.
pub fn decode_string_utf16(data: &[u8], pos: usize, check_marker: bool) -> Result<(String, usize)> {
    let field = read_u32(data, pos)?;
    if check_marker && field & STRING_MARKER == 0 {
        return Err(Zs2Error::MalformedLength {
            offset: pos,
            value:  field,
            reason: "string marker not set",
        });
    }
    let count = (field & !STRING_MARKER) as usize;
    let bytes = need(data, pos + 4, count * 2)?;
    let units: Vec<u16> = bytes.chunks_exact(2).map(LittleEndian::read_u16).collect();
    let text = String::from_utf16(&units).map_err(|_| Zs2Error::InvalidText {
        text:     String::from_utf16_lossy(&units),
        encoding: "well-formed UTF-16",
    })?;
    Ok((text, pos + 4 + count * 2))
}

pub fn encode_string_utf16(text: &str) -> Result<Vec<u8>> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let count = u32::try_from(units.len())
        .ok()
        .filter(|n| n & STRING_MARKER == 0)
        .ok_or_else(|| Zs2Error::InvalidText { text: text.to_string(), encoding: "UTF-16 string" })?;
    let mut out = Vec::with_capacity(4 + units.len() * 2);
    out.write_u32::<LittleEndian>(count | STRING_MARKER)?;
    for unit in units {
        out.write_u16::<LittleEndian>(unit)?;
    }
    Ok(out)
}

// ── Arrays ───────────────────────────────────────────────────────────────────

/// 32-bit entry count (string marker must be clear) followed by
/// `count * item_width` bytes.  Returns one slice per entry.
pub fn decode_array(item_width: usize, data: &[u8], pos: usize) -> Result<(Vec<&[u8]>, usize)> {
    let field = read_u32(data, pos)?;
    if field & STRING_MARKER != 0 {
        return Err(Zs2Error::MalformedLength {
            offset: pos,
            value:  field,
            reason: "list length has string marker set",
        });
    }
    let count = field as usize;
    let total = count
        .checked_mul(item_width)
        .ok_or_else(|| Zs2Error::truncated(pos + 4, usize::MAX, data.len()))?;
    let body = need(data, pos + 4, total)?;
    let items = (0..count)
        .map(|i| &body[i * item_width..(i + 1) * item_width])
        .collect();
    Ok((items, pos + 4 + total))
}
