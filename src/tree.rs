//! Nested view of a decoded chunk list and its JSON text form.
//!
//! Sections (`DD` chunks) own the chunks up to their matching End marker.
//! End markers themselves are implicit in the tree; [`flatten`] emits one for
//! every section, including sections without children.

use serde::{Deserialize, Serialize};

use crate::error::{Result, Zs2Error};
use crate::value::{DecodedChunk, Value, TYPE_SECTION};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(rename = "type")]
    pub type_code: String,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<usize>,
    /// Only populated for sections.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    pub fn is_section(&self) -> bool {
        self.type_code == TYPE_SECTION
    }

    fn from_chunk(chunk: &DecodedChunk, with_address: bool) -> Self {
        Node {
            name:      chunk.name.clone(),
            type_code: chunk.type_code.clone(),
            value:     chunk.value.clone(),
            address:   with_address.then_some(chunk.address),
            children:  Vec::new(),
        }
    }

    fn to_chunk(&self) -> DecodedChunk {
        DecodedChunk {
            address:   self.address.unwrap_or(0),
            name:      self.name.clone(),
            type_code: self.type_code.clone(),
            value:     self.value.clone(),
        }
    }
}

/// JSON document written by [`to_json`].
#[derive(Debug, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    generator: String,
    chunks:    Vec<Node>,
}

/// Count section openings and End markers.
pub fn section_balance(chunks: &[DecodedChunk]) -> (usize, usize) {
    chunks.iter().fold((0, 0), |(opened, closed), c| {
        (opened + c.is_section() as usize, closed + c.is_end() as usize)
    })
}

/// Nest a flat chunk list.  Sections must balance.
pub fn build(chunks: &[DecodedChunk], with_address: bool) -> Result<Vec<Node>> {
    let (opened, closed) = section_balance(chunks);
    let imbalance = || Zs2Error::SectionImbalance { opened, closed };
    if opened != closed {
        return Err(imbalance());
    }

    let mut roots = Vec::new();
    let mut open: Vec<Node> = Vec::new();
    for chunk in chunks {
        let node = if chunk.is_end() {
            open.pop().ok_or_else(imbalance)?
        } else if chunk.is_section() {
            open.push(Node::from_chunk(chunk, with_address));
            continue;
        } else {
            Node::from_chunk(chunk, with_address)
        };
        match open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    }
    if !open.is_empty() {
        return Err(imbalance());
    }
    Ok(roots)
}

/// Inverse of [`build`].  Children of nodes that are not sections are
/// ignored.
pub fn flatten(nodes: &[Node]) -> Vec<DecodedChunk> {
    let mut chunks = Vec::new();
    let mut stack = vec![nodes.iter()];
    while let Some(level) = stack.last_mut() {
        match level.next() {
            Some(node) => {
                chunks.push(node.to_chunk());
                if node.is_section() {
                    stack.push(node.children.iter());
                }
            }
            None => {
                stack.pop();
                if !stack.is_empty() {
                    chunks.push(DecodedChunk::end(0));
                }
            }
        }
    }
    chunks
}

pub fn to_json(nodes: &[Node]) -> Result<String> {
    let doc = Document {
        generator: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        chunks:    nodes.to_vec(),
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

pub fn from_json(text: &str) -> Result<Vec<Node>> {
    let doc: Document = serde_json::from_str(text)?;
    Ok(doc.chunks)
}
