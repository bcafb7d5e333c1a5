//! Record grammar engine for `EE11` payloads.
//!
//! Records are decoded by trying candidate layouts (see [`format`] for the
//! token language) in order until one consumes the payload completely, and
//! encoded again from the compact format reported by the match.

pub mod encode;
pub mod format;
pub mod matcher;
pub mod records;

pub use encode::encode_record;
pub use format::{compact, expand};
pub use matcher::{match_chain, match_expression, match_format, MatchResult};
pub use records::{decode_record, record_type_code, DecodedRecord, Grammar, RecordFamily, FALLBACK, QS_GRAMMARS};
