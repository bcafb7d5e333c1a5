//! Markup form of a chunk list.
//!
//! One element per chunk, named after the chunk, with `type` and `value`
//! attributes (plus `address` on request).  Sections nest and close
//! explicitly; every other chunk is an empty element.  `AA` and `DD` values
//! are written as plain text, raw bytes as `0x` hex, everything else in its
//! JSON form.
//!
//! [`from_xml`] reads that layout back into tree nodes.  A `name` attribute
//! overrides the element name, and a section written as an empty element is
//! a section without children.  Only the subset of XML this module writes is
//! understood: no DTDs, no CDATA, text between elements is ignored.

use std::fmt::Write as _;

use crate::error::{Result, Zs2Error};
use crate::primitive::Tag;
use crate::tree::{section_balance, Node};
use crate::value::{DecodedChunk, Value, TYPE_SECTION};

const PROLOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Resolve the five named entities and numeric character references.
fn unescape(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let semi = amp + rest[amp..].find(';')?;
        let c = match &rest[amp + 1..semi] {
            "amp"  => '&',
            "lt"   => '<',
            "gt"   => '>',
            "quot" => '"',
            "apos" => '\'',
            entity => {
                let code = match entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                    Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                    None => entity.strip_prefix('#')?.parse().ok()?,
                };
                char::from_u32(code)?
            }
        };
        out.push(c);
        rest = &rest[semi + 1..];
    }
    out.push_str(rest);
    Some(out)
}

fn is_text_type(type_code: &str) -> bool {
    type_code == Tag::Utf16.code() || type_code == TYPE_SECTION
}

/// Markup export of `chunks`.  Sections must balance.
pub fn to_xml(chunks: &[DecodedChunk], with_address: bool) -> Result<String> {
    let (opened, closed) = section_balance(chunks);
    if opened != closed {
        return Err(Zs2Error::SectionImbalance { opened, closed });
    }

    let mut out = format!("{PROLOG}\n");
    let mut sections: Vec<&str> = Vec::new();
    for chunk in chunks {
        if chunk.is_end() {
            let name = sections.pop().ok_or(Zs2Error::SectionImbalance { opened, closed })?;
            let _ = writeln!(out, "{}</{}>", "  ".repeat(sections.len()), name);
            continue;
        }
        let value = match &chunk.value {
            Value::Utf16(s) | Value::Ascii(s) if is_text_type(&chunk.type_code) => s.clone(),
            other => other.to_string(),
        };
        let address = if with_address { format!("address='{:06x}' ", chunk.address) } else { String::new() };
        let close = if chunk.is_section() { "" } else { "/" };
        let _ = writeln!(
            out,
            "{}<{} {}type='{}' value=\"{}\" {}>",
            "  ".repeat(sections.len()),
            chunk.name,
            address,
            chunk.type_code,
            escape_attr(&value),
            close
        );
        if chunk.is_section() {
            sections.push(&chunk.name);
        }
    }
    Ok(out)
}

fn parse_value(type_code: &str, text: &str) -> std::result::Result<Value, String> {
    if type_code == Tag::Utf16.code() {
        return Ok(Value::Utf16(text.to_string()));
    }
    if type_code == TYPE_SECTION {
        return Ok(Value::Ascii(text.to_string()));
    }
    if let Some(hex) = text.strip_prefix("0x") {
        return hex::decode(hex).map(Value::Bytes).map_err(|e| format!("bad hex value: {e}"));
    }
    serde_json::from_str(text).map_err(|e| format!("bad value {text:?}: {e}"))
}

struct Reader<'a> {
    text: &'a str,
    pos:  usize,
}

impl<'a> Reader<'a> {
    fn error(&self, reason: impl Into<String>) -> Zs2Error {
        Zs2Error::Markup { offset: self.pos, reason: reason.into() }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, token: &str) -> bool {
        let found = self.rest().starts_with(token);
        if found {
            self.pos += token.len();
        }
        found
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.eat(token) { Ok(()) } else { Err(self.error(format!("expected {token:?}"))) }
    }

    fn skip_past(&mut self, token: &str) -> Result<()> {
        match self.rest().find(token) {
            Some(at) => {
                self.pos += at + token.len();
                Ok(())
            }
            None => Err(self.error(format!("missing {token:?}"))),
        }
    }

    fn name(&mut self) -> Result<&'a str> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '/' | '>' | '='))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error("expected a name"));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn quoted(&mut self) -> Result<String> {
        let rest = self.rest();
        let quote = match rest.chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("expected a quoted value")),
        };
        let len = rest[1..].find(quote).ok_or_else(|| self.error("unterminated value"))?;
        let raw = &rest[1..1 + len];
        let text = unescape(raw).ok_or_else(|| self.error(format!("bad character reference in {raw:?}")))?;
        self.pos += len + 2;
        Ok(text)
    }

    /// Everything after `<` up to and including `>` or `/>`.  Returns the
    /// element name, the node and whether the element was already closed.
    fn start_tag(&mut self) -> Result<(&'a str, Node, bool)> {
        let offset = self.pos;
        let element = self.name()?;
        let mut name = element.to_string();
        let (mut type_code, mut value, mut address) = (None, None, None);

        let closed = loop {
            self.skip_whitespace();
            if self.eat("/>") {
                break true;
            }
            if self.eat(">") {
                break false;
            }
            let key = self.name()?;
            self.skip_whitespace();
            self.expect("=")?;
            self.skip_whitespace();
            let text = self.quoted()?;
            match key {
                "name"  => name = text,
                "type"  => type_code = Some(text),
                "value" => value = Some(text),
                "address" => {
                    let parsed = usize::from_str_radix(&text, 16)
                        .map_err(|_| self.error(format!("bad address {text:?}")))?;
                    address = Some(parsed);
                }
                _ => {}
            }
        };

        let missing = |attr: &str| Zs2Error::Markup { offset, reason: format!("<{element}> has no {attr}") };
        let type_code = type_code.ok_or_else(|| missing("type"))?;
        let value = value.ok_or_else(|| missing("value"))?;
        let value = parse_value(&type_code, &value).map_err(|reason| Zs2Error::Markup { offset, reason })?;
        let node = Node { name, type_code, value, address, children: Vec::new() };
        Ok((element, node, closed))
    }
}

fn attach(open: &mut [(&str, Node)], roots: &mut Vec<Node>, node: Node, offset: usize) -> Result<()> {
    match open.last_mut() {
        Some((_, parent)) if parent.is_section() => parent.children.push(node),
        Some((element, parent)) => {
            return Err(Zs2Error::Markup {
                offset,
                reason: format!("<{element}> of type {} cannot hold children", parent.type_code),
            })
        }
        None => roots.push(node),
    }
    Ok(())
}

/// Read markup written by [`to_xml`] back into tree nodes.
pub fn from_xml(text: &str) -> Result<Vec<Node>> {
    let mut reader = Reader { text, pos: 0 };
    let mut roots = Vec::new();
    let mut open: Vec<(&str, Node)> = Vec::new();

    while let Some(at) = reader.rest().find('<') {
        reader.pos += at;
        let offset = reader.pos;
        if reader.eat("<?") {
            reader.skip_past("?>")?;
        } else if reader.eat("<!--") {
            reader.skip_past("-->")?;
        } else if reader.eat("</") {
            let element = reader.name()?;
            reader.skip_whitespace();
            reader.expect(">")?;
            let (opened, node) = open
                .pop()
                .ok_or_else(|| Zs2Error::Markup { offset, reason: format!("</{element}> closes nothing") })?;
            if opened != element {
                return Err(Zs2Error::Markup { offset, reason: format!("</{element}> closes <{opened}>") });
            }
            attach(&mut open, &mut roots, node, offset)?;
        } else {
            reader.pos += 1;
            let (element, node, closed) = reader.start_tag()?;
            if closed {
                attach(&mut open, &mut roots, node, offset)?;
            } else {
                open.push((element, node));
            }
        }
    }

    if let Some((element, _)) = open.last() {
        return Err(reader.error(format!("<{element}> is never closed")));
    }
    Ok(roots)
}
