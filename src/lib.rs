//! Decoder and encoder for zs2 measurement files.
//!
//! A `.zs2` file is a gzip container around a stream of named chunks.  The
//! stream is decoded in stages: [`scanner`] cuts it into chunks,
//! [`interpret`] turns payloads into typed values (using [`grammar`] for
//! structured records), and [`assemble`] turns the values back into the
//! identical byte stream.

pub mod assemble;
pub mod container;
pub mod dump;
pub mod error;
pub mod float;
pub mod grammar;
pub mod interpret;
pub mod markup;
pub mod pipeline;
pub mod primitive;
pub mod scanner;
pub mod stream;
pub mod tree;
pub mod value;

pub use assemble::{chunks_to_raw, encode_payload};
pub use error::{Result, Zs2Error};
pub use float::single_as_double;
pub use interpret::{interpret, DecodeOptions, Level};
pub use pipeline::{decode_stream, encode_stream, process_cycle, CycleReport};
pub use scanner::{scan, scan_debug, RawChunk};
pub use stream::fingerprint;
pub use tree::{flatten as tree_to_chunks, Node};
pub use value::{DecodedChunk, Value};
