use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{Result, Zs2Error};
use crate::float::narrow_to_single;
use crate::primitive;
use crate::value::Value;

use super::format::{self, is_scalar_group, IntToken, Token};

/// Serialize `values` according to `format`, the inverse of
/// [`super::match_format`] on a successful match.
///
/// An unsigned token holding `-1` is written with all bits set.  Every value
/// must be consumed by the format and the format must not run out of values.
pub fn encode_record(format: &str, values: &[Value]) -> Result<Vec<u8>> {
    let tokens = format::parse(format)?;
    let mut out = Vec::new();
    let used = encode_sequence(&tokens, values, format, &mut out)?;
    if used != values.len() {
        return Err(Zs2Error::ValueCountMismatch {
            format: format.to_string(),
            detail: format!("{} values left over", values.len() - used),
        });
    }
    Ok(out)
}

/// Returns the number of values written.
fn encode_sequence(tokens: &[Token], values: &[Value], fmt: &str, out: &mut Vec<u8>) -> Result<usize> {
    let mut idx = 0;
    for token in tokens {
        match token {
            Token::RestBytes | Token::Guess => {
                for value in &values[idx..] {
                    match value {
                        Value::Utf16(text) if matches!(token, Token::Guess) => {
                            out.extend(primitive::encode_string_utf16(text)?);
                        }
                        other => write_int(out, IntToken { width: 1, signed: false }, other)?,
                    }
                }
                idx = values.len();
                continue;
            }
            _ => {}
        }

        let value = values.get(idx).ok_or_else(|| Zs2Error::ValueCountMismatch {
            format: fmt.to_string(),
            detail: format!("ran out of values at token {}", format::render(std::slice::from_ref(token))),
        })?;
        idx += 1;

        match token {
            Token::Int(int) => write_int(out, *int, value)?,
            Token::Single => {
                let bits = narrow_to_single(float_value(value, 'f')?).ok_or_else(|| mismatch('f', value))?;
                out.write_u32::<LittleEndian>(bits)?
            }
            Token::Double => out.write_f64::<LittleEndian>(float_value(value, 'd')?)?,
            Token::Str => {
                let text = value.as_str().ok_or_else(|| mismatch('S', value))?;
                out.extend(primitive::encode_string_utf16(text)?);
            }
            Token::Group(sub) => encode_group(sub, value, fmt, out)?,
            Token::RestBytes | Token::Guess => {}
        }
    }
    Ok(idx)
}

fn encode_group(sub: &[Token], value: &Value, fmt: &str, out: &mut Vec<u8>) -> Result<()> {
    let items = value.as_slice().ok_or_else(|| mismatch('(', value))?;
    let count = u32::try_from(items.len()).map_err(|_| mismatch('(', value))?;
    out.write_u32::<LittleEndian>(count)?;

    for item in items {
        let fields = if is_scalar_group(sub) {
            std::slice::from_ref(item)
        } else {
            item.as_slice().unwrap_or(std::slice::from_ref(item))
        };
        let used = encode_sequence(sub, fields, fmt, out)?;
        if used != fields.len() {
            return Err(Zs2Error::ValueCountMismatch {
                format: fmt.to_string(),
                detail: format!(
                    "group ({}) got {} values, used {}",
                    format::render(sub),
                    fields.len(),
                    used
                ),
            });
        }
    }
    Ok(())
}

fn write_int(out: &mut Vec<u8>, int: IntToken, value: &Value) -> Result<()> {
    let v = value.as_i128().ok_or_else(|| mismatch(int.code(), value))?;
    let bits = 8 * int.width as u32;
    if int.signed {
        let min = -(1i128 << (bits - 1));
        let max = (1i128 << (bits - 1)) - 1;
        if v < min || v > max {
            return Err(mismatch(int.code(), value));
        }
        out.write_int::<LittleEndian>(v as i64, int.width)?;
    } else {
        let v = if v == -1 { int.max_unsigned() as i128 } else { v };
        if v < 0 || v > int.max_unsigned() as i128 {
            return Err(mismatch(int.code(), value));
        }
        out.write_uint::<LittleEndian>(v as u64, int.width)?;
    }
    Ok(())
}

fn float_value(value: &Value, token: char) -> Result<f64> {
    value.as_f64().ok_or_else(|| mismatch(token, value))
}

fn mismatch(token: char, value: &Value) -> Zs2Error {
    Zs2Error::ValueMismatch { type_code: token.to_string(), found: value.to_string() }
}
