//! Decoded value model shared by the interpreter, the grammar engine, the
//! assembler and the tree representation.
//!
//! Values are serialized untagged so the text tree stays readable.  A value
//! read back from text may land in a different integer variant than the one
//! that produced it (`3` comes back as `U8`); this is harmless because every
//! encoder dispatches on the type code or format token and only asks the
//! value for a number, string or list through the accessors below.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    /// UTF-16 string (type `AA`, grammar token `S`).
    Utf16(String),
    /// Length-prefixed byte string (type `DD`).
    Ascii(String),
    #[serde(serialize_with = "serialize_float")]
    Float(f64),
    List(Vec<Value>),
    /// Fixed tuple produced by a multi-token repeated group.
    Tuple(Vec<Value>),
    /// Opaque bytes, only produced in debug mode or before pass 2.
    Bytes(Vec<u8>),
    End,
}

/// Prefix of the text form of a NaN with a non-default payload.
const NAN_BITS_PREFIX: &str = "NaN:0x";

/// Non-finite floats have no JSON number form.  NaNs other than the default
/// one carry their bit pattern (`"NaN:0x7ff0002000000000"`).
fn serialize_float<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    if v.is_nan() && v.to_bits() != f64::NAN.to_bits() {
        s.serialize_str(&format!("{NAN_BITS_PREFIX}{:016x}", v.to_bits()))
    } else if v.is_nan() {
        s.serialize_str("NaN")
    } else if v.is_infinite() {
        s.serialize_str(if *v > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        s.serialize_f64(*v)
    }
}

impl Value {
    pub fn empty_list() -> Self {
        Value::List(Vec::new())
    }

    /// Integer view of any integral variant (booleans count as 0/1).
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::Bool(b) => Some(b as i128),
            Value::U8(v)   => Some(v as i128),
            Value::I8(v)   => Some(v as i128),
            Value::U16(v)  => Some(v as i128),
            Value::I16(v)  => Some(v as i128),
            Value::U32(v)  => Some(v as i128),
            Value::I32(v)  => Some(v as i128),
            Value::U64(v)  => Some(v as i128),
            Value::I64(v)  => Some(v as i128),
            _              => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Utf16(s) | Value::Ascii(s) => match s.as_str() {
                "NaN"       => Some(f64::NAN),
                "Infinity"  => Some(f64::INFINITY),
                "-Infinity" => Some(f64::NEG_INFINITY),
                text => text
                    .strip_prefix(NAN_BITS_PREFIX)
                    .and_then(|hex| u64::from_str_radix(hex, 16).ok())
                    .map(f64::from_bits)
                    .filter(|v| v.is_nan()),
            },
            other => other.as_i128().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Utf16(s) | Value::Ascii(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) | Value::Tuple(v) => Some(v),
            _ => None,
        }
    }

    /// Raw bytes, either stored as such or as a list of byte-sized integers.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Value::Bytes(b) => Some(b.clone()),
            Value::List(items) => items
                .iter()
                .map(|v| v.as_i128().and_then(|n| u8::try_from(n).ok()))
                .collect(),
            _ => None,
        }
    }

    /// Compare against a grammar constraint literal, reading the literal as
    /// the same kind of value as `self`.
    pub fn matches_literal(&self, literal: &str) -> bool {
        let literal = literal.trim();
        match self {
            Value::Bool(b) => match literal {
                "True" | "true" | "1"  => *b,
                "False" | "false" | "0" => !*b,
                _ => false,
            },
            Value::Float(v) => literal.parse::<f64>().map_or(false, |l| l == *v),
            Value::Utf16(s) | Value::Ascii(s) => {
                let unquoted = literal
                    .strip_prefix(['"', '\''])
                    .and_then(|l| l.strip_suffix(['"', '\'']))
                    .unwrap_or(literal);
                unquoted == s
            }
            other => match other.as_i128() {
                Some(v) => parse_int_literal(literal).map_or(false, |l| l == v),
                None => false,
            },
        }
    }
}

/// Integer literals may be written as floats; the fractional part is dropped.
fn parse_int_literal(literal: &str) -> Option<i128> {
    if let Ok(v) = literal.parse::<i128>() {
        return Some(v);
    }
    if let Some(hex) = literal.strip_prefix("0x").or_else(|| literal.strip_prefix("0X")) {
        return i128::from_str_radix(hex, 16).ok();
    }
    literal.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i128)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::End => f.write_str("end"),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            other => {
                let text = serde_json::to_string(other).map_err(|_| fmt::Error)?;
                f.write_str(&text)
            }
        }
    }
}

/// One chunk after interpretation.
///
/// `type_code` names the rule that produced `value`; encoding dispatches on
/// it rather than on the shape of the value.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedChunk {
    pub address:   usize,
    pub name:      String,
    pub type_code: String,
    pub value:     Value,
}

impl DecodedChunk {
    pub fn end(address: usize) -> Self {
        Self {
            address,
            name:      String::new(),
            type_code: TYPE_END.to_string(),
            value:     Value::End,
        }
    }

    pub fn is_end(&self) -> bool {
        self.type_code == TYPE_END
    }

    pub fn is_section(&self) -> bool {
        self.type_code == TYPE_SECTION
    }
}

pub const TYPE_END:     &str = "end";
pub const TYPE_SECTION: &str = "DD";
pub const TYPE_EMPTY:   &str = "";
pub const TYPE_RAW:     &str = "raw";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_follows_value_type() {
        assert!(Value::U8(7).matches_literal("7"));
        assert!(Value::I8(-1).matches_literal("-1"));
        assert!(Value::U32(2).matches_literal("2.0"));
        assert!(!Value::U8(7).matches_literal("8"));
        assert!(!Value::U8(7).matches_literal("abc"));
        assert!(Value::Utf16("mm".into()).matches_literal("'mm'"));
        assert!(Value::Float(0.5).matches_literal("0.5"));
        assert!(!Value::List(vec![]).matches_literal("0"));
    }

    #[test]
    fn bytes_from_byte_list() {
        let v = Value::List(vec![Value::U8(1), Value::U8(255)]);
        assert_eq!(v.to_bytes(), Some(vec![1, 255]));
        let bad = Value::List(vec![Value::U16(256)]);
        assert_eq!(bad.to_bytes(), None);
    }

    #[test]
    fn json_keeps_non_finite_floats() {
        let text = serde_json::to_string(&Value::Float(f64::INFINITY)).unwrap();
        assert_eq!(text, "\"Infinity\"");
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back.as_f64(), Some(f64::INFINITY));
    }

    #[test]
    fn json_keeps_nan_payloads() {
        for bits in [0xFFFF_FFFF_FFFF_FFFFu64, 0x7FF0_0020_0000_0000, 0xFFF8_0000_0000_0000] {
            let text = serde_json::to_string(&Value::Float(f64::from_bits(bits))).unwrap();
            assert!(text.starts_with("\"NaN:0x"), "{text}");
            let back: Value = serde_json::from_str(&text).unwrap();
            assert_eq!(back.as_f64().map(f64::to_bits), Some(bits));
        }
        let text = serde_json::to_string(&Value::Float(f64::NAN)).unwrap();
        assert_eq!(text, "\"NaN\"");
        assert_eq!(Value::Utf16("NaN:0x0000000000000001".into()).as_f64(), None);
    }

    #[test]
    fn json_numbers_come_back_numeric() {
        let back: Value = serde_json::from_str("[3, -1, 3.1, \"x\"]").unwrap();
        let items = back.as_slice().unwrap();
        assert_eq!(items[0].as_i128(), Some(3));
        assert_eq!(items[1].as_i128(), Some(-1));
        assert_eq!(items[2].as_f64(), Some(3.1));
        assert_eq!(items[3].as_str(), Some("x"));
    }
}
