//! Human-readable views of streams and decoded chunks.  None of these are
//! read back; the markup export in [`crate::markup`] is.

use std::fmt::Write as _;

use crate::tree::section_balance;
use crate::value::DecodedChunk;

fn printable(b: u8) -> char {
    if (32..=127).contains(&b) { b as char } else { '\u{b7}' }
}

/// Classic hex dump of `rows` lines starting at `start`.  Stops early at the
/// end of `data`.
pub fn hex_dump(data: &[u8], start: usize, rows: usize, bytes_per_row: usize) -> String {
    let step = bytes_per_row.max(1);
    let end = start.saturating_add(rows.saturating_mul(step)).min(data.len());
    let mut lines = Vec::new();
    let mut pos = start;
    while pos < end {
        let line = &data[pos..(pos + step).min(data.len())];
        let hex = line.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ");
        let text: String = line.iter().copied().map(printable).collect();
        lines.push(format!("{pos:06x}: {hex}    {text}"));
        pos += step;
    }
    lines.join("\n")
}

/// One line per chunk: address, indented name, type code, value.  End lines
/// name the sections they close, innermost first.  Indentation is dropped
/// when sections do not balance.
pub fn text_dump(chunks: &[DecodedChunk]) -> String {
    let (opened, closed) = section_balance(chunks);
    let indent = if opened == closed { "  " } else { "" };
    let mut sections: Vec<&str> = Vec::new();
    let mut out = String::new();

    for chunk in chunks {
        let mut path = String::new();
        if chunk.is_end() {
            path = sections.iter().rev().copied().collect::<Vec<_>>().join("<-");
            sections.pop();
        }
        let pad = indent.repeat(sections.len());
        let _ = writeln!(
            out,
            "{}",
            format!("{:06x}: {}{} [{}] {} {}", chunk.address, pad, chunk.name, chunk.type_code, chunk.value, path)
                .trim_end()
        );
        if chunk.is_section() {
            sections.push(&chunk.name);
        }
    }
    out
}
