//! Format strings describing structured record layouts.
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `B` `b` | unsigned / signed 8-bit integer |
//! | `H` `h` | unsigned / signed 16-bit integer |
//! | `L` `l` | unsigned / signed 32-bit integer |
//! | `Q` `q` | unsigned / signed 64-bit integer |
//! | `f` `d` | single / double precision float |
//! | `S` | UTF-16 string with string marker |
//! | `(...)` | 32-bit count, then that many repetitions of the group |
//! | `.` | every remaining byte as `B` |
//! | `*` | remaining bytes as a mix of `S` and `B`, never fails |
//!
//! A decimal prefix repeats the following token or group: `2S2(LH)` expands
//! to `SS(LH)(LH)`.

use crate::error::{Result, Zs2Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntToken {
    pub width:  usize,
    pub signed: bool,
}

impl IntToken {
    pub fn code(self) -> char {
        let c = match self.width {
            1 => 'B',
            2 => 'H',
            4 => 'L',
            _ => 'Q',
        };
        if self.signed { c.to_ascii_lowercase() } else { c }
    }

    pub fn max_unsigned(self) -> u64 {
        if self.width >= 8 { u64::MAX } else { (1u64 << (8 * self.width)) - 1 }
    }

    pub fn as_signed(self) -> Self {
        IntToken { signed: true, ..self }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Int(IntToken),
    Single,
    Double,
    Str,
    Group(Vec<Token>),
    /// `.`
    RestBytes,
    /// `*`
    Guess,
}

impl Token {
    /// True for tokens whose value count depends on the data.
    pub fn is_greedy(&self) -> bool {
        matches!(self, Token::RestBytes | Token::Guess)
    }

    /// Smallest number of bytes this token can consume.
    pub fn min_width(&self) -> usize {
        match self {
            Token::Int(t) => t.width,
            Token::Single => 4,
            Token::Double => 8,
            Token::Str | Token::Group(_) => 4,
            Token::RestBytes | Token::Guess => 0,
        }
    }
}

/// A group with a single fixed token yields bare values instead of tuples.
pub fn is_scalar_group(tokens: &[Token]) -> bool {
    tokens.len() == 1 && !tokens[0].is_greedy()
}

fn check_brackets(format: &str) -> Result<()> {
    let mut depth = 0i32;
    for c in format.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return Err(Zs2Error::UnbalancedBrackets { format: format.to_string() });
        }
    }
    if depth != 0 {
        return Err(Zs2Error::UnbalancedBrackets { format: format.to_string() });
    }
    Ok(())
}

/// Index of the bracket closing the one at `open`.  Brackets are balanced.
fn closing(chars: &[char], open: usize) -> usize {
    let mut depth = 0;
    for (i, &c) in chars.iter().enumerate().skip(open) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    chars.len()
}

/// Rewrite every counted token or group as explicit repetitions.
pub fn expand(format: &str) -> Result<String> {
    check_brackets(format)?;
    let chars: Vec<char> = format.chars().collect();
    Ok(expand_chars(&chars))
}

fn expand_chars(chars: &[char]) -> String {
    let mut out = String::new();
    let mut idx = 0;
    let mut times: Option<usize> = None;
    while idx < chars.len() {
        let c = chars[idx];
        if let Some(d) = c.to_digit(10) {
            times = Some(times.unwrap_or(0) * 10 + d as usize);
            idx += 1;
        } else if c == '(' {
            let close = closing(chars, idx);
            let inner = expand_chars(&chars[idx + 1..close]);
            for _ in 0..times.take().unwrap_or(1) {
                out.push('(');
                out.push_str(&inner);
                out.push(')');
            }
            idx = close + 1;
        } else {
            for _ in 0..times.take().unwrap_or(1) {
                out.push(c);
            }
            idx += 1;
        }
    }
    out
}

/// Consolidate runs of identical tokens or groups into `<count><token>`.
pub fn compact(format: &str) -> Result<String> {
    if format.is_empty() {
        return Ok(String::new());
    }
    let expanded = expand(format)?;
    let chars: Vec<char> = expanded.chars().collect();
    Ok(compact_chars(&chars))
}

fn compact_chars(chars: &[char]) -> String {
    let mut tokens: Vec<String> = Vec::new();
    let mut idx = 0;
    while idx < chars.len() {
        if chars[idx] == '(' {
            let close = closing(chars, idx);
            tokens.push(format!("({})", compact_chars(&chars[idx + 1..close])));
            idx = close + 1;
        } else {
            tokens.push(chars[idx].to_string());
            idx += 1;
        }
    }

    let mut out = String::new();
    let mut i = 0;
    while i < tokens.len() {
        let run = tokens[i..].iter().take_while(|t| **t == tokens[i]).count();
        if run > 1 {
            out.push_str(&run.to_string());
        }
        out.push_str(&tokens[i]);
        i += run;
    }
    out
}

/// Parse a format (compact or expanded) into tokens.
pub fn parse(format: &str) -> Result<Vec<Token>> {
    let expanded = expand(format)?;
    let chars: Vec<char> = expanded.chars().collect();
    parse_chars(&chars, format)
}

fn parse_chars(chars: &[char], format: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut idx = 0;
    while idx < chars.len() {
        let c = chars[idx];
        let token = match c {
            '(' => {
                let close = closing(chars, idx);
                let inner = parse_chars(&chars[idx + 1..close], format)?;
                idx = close;
                Token::Group(inner)
            }
            'B' | 'b' | 'H' | 'h' | 'L' | 'l' | 'Q' | 'q' => {
                let width = match c.to_ascii_uppercase() {
                    'B' => 1,
                    'H' => 2,
                    'L' => 4,
                    _   => 8,
                };
                Token::Int(IntToken { width, signed: c.is_ascii_lowercase() })
            }
            'f' => Token::Single,
            'd' => Token::Double,
            'S' => Token::Str,
            '.' => Token::RestBytes,
            '*' => Token::Guess,
            other => {
                return Err(Zs2Error::UnknownToken { token: other, format: format.to_string() });
            }
        };
        tokens.push(token);
        idx += 1;
    }
    Ok(tokens)
}

/// Expanded text form of a token sequence.
pub fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        render_into(token, &mut out);
    }
    out
}

fn render_into(token: &Token, out: &mut String) {
    match token {
        Token::Int(t) => out.push(t.code()),
        Token::Single => out.push('f'),
        Token::Double => out.push('d'),
        Token::Str => out.push('S'),
        Token::RestBytes => out.push('.'),
        Token::Guess => out.push('*'),
        Token::Group(inner) => {
            out.push('(');
            for t in inner {
                render_into(t, out);
            }
            out.push(')');
        }
    }
}
