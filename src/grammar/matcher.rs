//! Matching record payloads against format expressions and chains.
//!
//! An *expression* is a format optionally followed by `=literal`; a *chain*
//! is a `:`-separated list of expressions that must all hold.  Every
//! expression of a chain reads the payload from its first byte, so
//! `B=2:BSHB(L)` first checks that the leading byte is 2 and then parses the
//! whole payload as `BSHB(L)`.  The result of the last expression is the
//! result of the chain.

use crate::error::{Result, Zs2Error};
use crate::float::{single_as_double, widen_single};
use crate::primitive;
use crate::value::Value;

use super::format::{self, is_scalar_group, IntToken, Token};

/// Outcome of matching a format, expression or chain against a payload.
///
/// A failed match still reports what was parsed up to the point of failure;
/// `residual` is the unparsed tail of the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult<'a> {
    pub success:  bool,
    /// Compact form of the format that was actually applied.
    pub format:   String,
    pub values:   Vec<Value>,
    pub residual: &'a [u8],
}

struct Parsed {
    ok:       bool,
    /// Expanded form.
    format:   String,
    values:   Vec<Value>,
    consumed: usize,
}

impl Parsed {
    fn new() -> Self {
        Parsed { ok: true, format: String::new(), values: Vec::new(), consumed: 0 }
    }

    fn fail(mut self) -> Self {
        self.ok = false;
        self
    }
}

/// Parse `data` against one format string.  Errors are reserved for
/// malformed formats; data that does not fit is an unsuccessful match.
pub fn match_format<'a>(format: &str, data: &'a [u8], strict_unsigned: bool) -> Result<MatchResult<'a>> {
    let tokens = format::parse(format)?;
    let parsed = parse_tokens(&tokens, data, strict_unsigned)?;
    Ok(MatchResult {
        success:  parsed.ok,
        format:   format::compact(&parsed.format)?,
        values:   parsed.values,
        residual: &data[parsed.consumed..],
    })
}

/// Evaluate a single `format[=literal]` expression.
///
/// Without `=` the format has to consume the whole payload.  With `=` the
/// payload may continue past the format, and a non-empty literal must equal
/// the last parsed value.
pub fn match_expression<'a>(expr: &str, data: &'a [u8], strict_unsigned: bool) -> Result<MatchResult<'a>> {
    let (fmt, expected) = match expr.split_once('=') {
        Some((fmt, literal)) => (fmt, Some(literal)),
        None => (expr, None),
    };
    let mut result = match_format(fmt, data, strict_unsigned)?;
    result.success = result.success
        && match expected {
            None => result.residual.is_empty(),
            Some("") => true,
            Some(literal) => result.values.last().map_or(false, |v| v.matches_literal(literal)),
        };
    Ok(result)
}

/// Evaluate a `:`-joined chain; stops at the first failing expression.
pub fn match_chain<'a>(chain: &str, data: &'a [u8], strict_unsigned: bool) -> Result<MatchResult<'a>> {
    let mut exprs = chain.split(':');
    // split always yields at least one item
    let first = exprs.next().unwrap_or_default();
    let mut result = match_expression(first, data, strict_unsigned)?;
    for expr in exprs {
        if !result.success {
            break;
        }
        result = match_expression(expr, data, strict_unsigned)?;
    }
    Ok(result)
}

fn parse_tokens(tokens: &[Token], data: &[u8], strict_unsigned: bool) -> Result<Parsed> {
    let mut out = Parsed::new();
    let mut pos = 0;

    for token in tokens {
        match token {
            Token::RestBytes => {
                out.values.extend(data[pos..].iter().map(|&b| Value::U8(b)));
                out.format.extend(std::iter::repeat('B').take(data.len() - pos));
                pos = data.len();
            }
            Token::Guess => {
                let (fmt, values) = guess_strings_and_bytes(&data[pos..]);
                out.format.push_str(&fmt);
                out.values.extend(values);
                pos = data.len();
            }
            Token::Str => match primitive::decode_string_utf16(data, pos, true) {
                Ok((text, next)) => {
                    out.values.push(Value::Utf16(text));
                    out.format.push('S');
                    pos = next;
                }
                Err(_) => {
                    out.consumed = pos;
                    return Ok(out.fail());
                }
            },
            Token::Group(sub) => match parse_group(sub, data, pos, strict_unsigned)? {
                Some((items, next)) => {
                    out.values.push(Value::List(items));
                    out.format.push('(');
                    out.format.push_str(&format::render(sub));
                    out.format.push(')');
                    pos = next;
                }
                None => {
                    out.consumed = pos;
                    return Ok(out.fail());
                }
            },
            Token::Int(int) => {
                let Some(raw) = data.get(pos..pos + int.width) else {
                    out.consumed = pos;
                    return Ok(out.fail());
                };
                let unsigned = read_unsigned(raw);
                if !strict_unsigned && unsigned == int.max_unsigned() {
                    // all bits set means "not defined"
                    out.values.push(int_value(int.as_signed(), unsigned));
                    out.format.push(int.code().to_ascii_lowercase());
                } else {
                    out.values.push(int_value(*int, unsigned));
                    out.format.push(int.code());
                }
                pos += int.width;
            }
            Token::Single => {
                let Some(raw) = data.get(pos..pos + 4) else {
                    out.consumed = pos;
                    return Ok(out.fail());
                };
                let widened = widen_single(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]));
                out.values.push(Value::Float(single_as_double(widened)?));
                out.format.push('f');
                pos += 4;
            }
            Token::Double => {
                let Some(raw) = data.get(pos..pos + 8) else {
                    out.consumed = pos;
                    return Ok(out.fail());
                };
                let mut buf = [0u8; 8];
                buf.copy_from_slice(raw);
                out.values.push(Value::Float(f64::from_le_bytes(buf)));
                out.format.push('d');
                pos += 8;
            }
        }
    }

    out.consumed = pos;
    Ok(out)
}

/// Parse a counted group starting at `pos`.  `None` when the data does not
/// hold the declared number of repetitions.
fn parse_group(
    sub: &[Token],
    data: &[u8],
    pos: usize,
    strict_unsigned: bool,
) -> Result<Option<(Vec<Value>, usize)>> {
    let Ok(count) = primitive::read_u32(data, pos) else {
        return Ok(None);
    };
    let mut next = pos + 4;
    let remaining = data.len() - next;

    // reject impossible counts before allocating anything
    let min_width: usize = sub.iter().map(Token::min_width).sum();
    let fits = if min_width == 0 {
        count as usize <= remaining.max(1)
    } else {
        (count as usize).checked_mul(min_width).map_or(false, |n| n <= remaining)
    };
    if !fits {
        return Ok(None);
    }

    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let parsed = parse_tokens(sub, &data[next..], strict_unsigned)?;
        if !parsed.ok {
            return Ok(None);
        }
        next += parsed.consumed;
        let mut values = parsed.values;
        let item = if is_scalar_group(sub) {
            values.pop().filter(|_| values.is_empty()).ok_or_else(|| Zs2Error::ValueCountMismatch {
                format: format::render(sub),
                detail: "a single-token group item must hold exactly one value".to_string(),
            })?
        } else {
            Value::Tuple(values)
        };
        items.push(item);
    }
    Ok(Some((items, next)))
}

/// Split arbitrary bytes into marker-prefixed strings and single bytes.
fn guess_strings_and_bytes(data: &[u8]) -> (String, Vec<Value>) {
    let mut fmt = String::new();
    let mut values = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        match primitive::decode_string_utf16(data, pos, true) {
            Ok((text, next)) => {
                values.push(Value::Utf16(text));
                fmt.push('S');
                pos = next;
            }
            Err(_) => {
                values.push(Value::U8(data[pos]));
                fmt.push('B');
                pos += 1;
            }
        }
    }
    (fmt, values)
}

fn read_unsigned(raw: &[u8]) -> u64 {
    raw.iter().rev().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn int_value(int: IntToken, unsigned: u64) -> Value {
    match (int.width, int.signed) {
        (1, false) => Value::U8(unsigned as u8),
        (1, true)  => Value::I8(unsigned as u8 as i8),
        (2, false) => Value::U16(unsigned as u16),
        (2, true)  => Value::I16(unsigned as u16 as i16),
        (4, false) => Value::U32(unsigned as u32),
        (4, true)  => Value::I32(unsigned as u32 as i32),
        (_, false) => Value::U64(unsigned),
        (_, true)  => Value::I64(unsigned as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_and_strings() {
        let data = b"\x02\x01\x00\x00\x80A\x00\x34\x12";
        let r = match_format("BSH", data, true).unwrap();
        assert!(r.success);
        assert_eq!(r.format, "BSH");
        assert_eq!(r.values, vec![Value::U8(2), Value::Utf16("A".into()), Value::U16(0x1234)]);
        assert!(r.residual.is_empty());
    }

    #[test]
    fn all_bits_set_becomes_minus_one() {
        let data = b"\xff\xff\xff\x01";
        let r = match_format("HBB", data, false).unwrap();
        assert_eq!(r.format, "hbB");
        assert_eq!(r.values, vec![Value::I16(-1), Value::I8(-1), Value::U8(1)]);

        let r = match_format("HBB", data, true).unwrap();
        assert_eq!(r.format, "HBB");
        assert_eq!(r.values[0], Value::U16(0xffff));
    }

    #[test]
    fn single_floats_are_reconstructed() {
        let data = 0.1f32.to_le_bytes();
        let r = match_format("f", &data, true).unwrap();
        assert_eq!(r.values, vec![Value::Float(0.1)]);
    }

    #[test]
    fn single_nan_keeps_its_payload() {
        let data = b"\x01\x00\x80\x7f";
        let r = match_format("f", data, true).unwrap();
        assert!(r.success);
        assert!(r.values[0].as_f64().unwrap().is_nan());
        assert_eq!(crate::grammar::encode_record("f", &r.values).unwrap(), data.to_vec());
    }

    #[test]
    fn groups_unwrap_single_tokens() {
        let data = b"\x02\x00\x00\x00\x05\x06\x01\x00\x00\x00\x07\x08\x00";
        let r = match_format("(B)(BH)", data, true).unwrap();
        assert!(r.success);
        assert_eq!(r.format, "(B)(BH)");
        assert_eq!(
            r.values,
            vec![
                Value::List(vec![Value::U8(5), Value::U8(6)]),
                Value::List(vec![Value::Tuple(vec![Value::U8(7), Value::U16(8)])]),
            ]
        );
        assert!(r.values.iter().flat_map(|v| v.as_slice().unwrap()).all(|v| *v != Value::End));
    }

    #[test]
    fn oversized_group_count_fails() {
        let data = b"\xff\xff\xff\x7f\x01";
        let r = match_format("(L)", data, true).unwrap();
        assert!(!r.success);
        assert_eq!(r.residual, &data[..]);
    }

    #[test]
    fn missing_string_marker_fails() {
        let r = match_format("S", b"\x01\x00\x00\x00A\x00", true).unwrap();
        assert!(!r.success);
    }

    #[test]
    fn rest_and_guess() {
        let r = match_format("B.", b"\x01\x02\x03", true).unwrap();
        assert_eq!(r.format, "3B");
        assert_eq!(r.values.len(), 3);

        let r = match_format("*", b"\x07\x01\x00\x00\x80x\x00\x09", true).unwrap();
        assert!(r.success);
        assert_eq!(r.format, "BSB");
        assert_eq!(r.values[1], Value::Utf16("x".into()));
        assert!(match_format("*", b"", true).unwrap().success);
    }

    #[test]
    fn expression_needs_full_consumption_without_literal() {
        assert!(!match_expression("B", b"\x01\x02", true).unwrap().success);
        assert!(match_expression("B=", b"\x01\x02", true).unwrap().success);
        assert!(match_expression("B=1", b"\x01\x02", true).unwrap().success);
        assert!(!match_expression("B=2", b"\x01\x02", true).unwrap().success);
        assert!(match_expression("BB", b"\x01\x02", true).unwrap().success);
    }

    #[test]
    fn chain_restarts_each_expression() {
        let data = b"\x02\x05\x00";
        let r = match_chain("B=2:BH", data, true).unwrap();
        assert!(r.success);
        assert_eq!(r.format, "BH");
        assert_eq!(r.values, vec![Value::U8(2), Value::U16(5)]);

        assert!(!match_chain("B=1:BH", data, true).unwrap().success);
        assert!(!match_chain("B=2:B", data, true).unwrap().success);
    }

    #[test]
    fn bad_format_is_an_error() {
        assert!(match_chain("B=1:B(", b"\x01", true).is_err());
    }
}
