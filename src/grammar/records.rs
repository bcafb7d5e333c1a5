//! Named record layouts and the record decoder.

use log::warn;

use crate::error::{Result, Zs2Error};
use crate::value::Value;

use super::matcher::match_chain;

/// Layout that accepts any payload.
pub const FALLBACK: &str = "*";

/// Candidate chains for one record name, most specific first.
#[derive(Debug, Clone, Copy)]
pub struct Grammar {
    pub name:   &'static str,
    pub chains: &'static [&'static str],
}

/// Layouts of the `QS_*` parameter records.  The leading byte selects the
/// record version.
pub const QS_GRAMMARS: &[Grammar] = &[
    Grammar { name: "QS_Par",           chains: &["B=1:B4B"] },
    Grammar { name: "QS_ValPar",        chains: &["B=1:BdSH(d)(B)B"] },
    Grammar { name: "QS_TextPar",       chains: &["B=1:B4S"] },
    Grammar { name: "QS_SelPar",        chains: &["B=2:BL(L)4S"] },
    Grammar { name: "QS_ValArrPar",     chains: &["B=2:BSHB(L)"] },
    Grammar { name: "QS_ValArrParElem", chains: &["B=2:B(Ld)"] },
    Grammar { name: "QS_ArrPar",        chains: &["B=2:B(L)B"] },
    Grammar {
        name:   "QS_ParProp",
        chains: &[
            "B=7:B9BH9S3H5SL=0:B9BH9S3H5SL2HBS4B",
            "B=7:B9BH9S3H5SL=2:B9BH9S3H5SL2HBLS4B",
            "B=8:B9BH*",
        ],
    },
    Grammar { name: "QS_ValProp",       chains: &["B=1:B4B"] },
    Grammar { name: "QS_TextProp",      chains: &["B=1:B8B"] },
    Grammar {
        name:   "QS_SelProp",
        chains: &[
            "B=4:B3B2(4S)2(S)(H)(L)(S)",
            "B=4:B3B",
            "B=5:B3B2(4S)2(S)(H)(L)(S)B",
            "B=5:B4B",
        ],
    },
    Grammar { name: "QS_ValArrParProp", chains: &["B=2:B4BH4B"] },
    Grammar { name: "QS_SkalProp",      chains: &["B=2:B2S2B"] },
    Grammar { name: "QS_ValSetting",    chains: &["B=2:B2SLS3BH2B(H)(S)11B"] },
    Grammar { name: "QS_NumFmt",        chains: &["B=2:B4Bd"] },
    Grammar { name: "QS_Plaus",         chains: &["B=1:B9B6BH6BH6B"] },
    Grammar { name: "QS_Tol",           chains: &["B=1:B9B6BH6BH3B"] },
];

pub fn lookup<'t>(table: &'t [Grammar], name: &str) -> Option<&'t Grammar> {
    table.iter().find(|g| g.name == name)
}

/// Type code of a decoded record.
pub fn record_type_code(format: &str) -> String {
    if format.is_empty() {
        "EE11".to_string()
    } else {
        format!("EE11-{format}")
    }
}

/// A decoded record payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub values:    Vec<Value>,
    pub type_code: String,
    /// Only [`FALLBACK`] matched, and it is not one of the declared chains.
    pub heuristic: bool,
}

/// Decode a record payload with the first chain of `name` in `table` that
/// matches it completely, falling back to [`FALLBACK`].
///
/// With `debug` set, a record that only the fallback could decode is logged
/// so gaps in the table show up.
pub fn decode_record(
    table: &[Grammar],
    name: &str,
    data: &[u8],
    strict_unsigned: bool,
    debug: bool,
) -> Result<DecodedRecord> {
    let declared = lookup(table, name).map_or(&[][..], |g| g.chains);

    for chain in declared.iter().copied().chain(std::iter::once(FALLBACK)) {
        let result = match_chain(chain, data, strict_unsigned)?;
        if !result.success || !result.residual.is_empty() {
            continue;
        }
        let heuristic = chain == FALLBACK && !declared.contains(&FALLBACK);
        if debug && heuristic {
            warn!(
                "applied heuristic format {} for {} with {} bytes",
                result.format,
                name,
                data.len()
            );
        }
        return Ok(DecodedRecord {
            values: result.values,
            type_code: record_type_code(&result.format),
            heuristic,
        });
    }

    // the fallback consumes any payload
    Err(Zs2Error::UnknownRecordType { name: name.to_string() })
}

/// Record names with a known decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFamily {
    /// `QS_*` parameter records, decoded with [`QS_GRAMMARS`].
    Qs,
    /// `Entry` records.  Their layout is not known, so they are always split
    /// heuristically.
    Entry,
}

impl RecordFamily {
    pub fn of(name: &str) -> Option<Self> {
        if name.starts_with("QS_") {
            Some(RecordFamily::Qs)
        } else if name == "Entry" {
            Some(RecordFamily::Entry)
        } else {
            None
        }
    }

    pub fn decode(self, name: &str, data: &[u8], debug: bool) -> Result<DecodedRecord> {
        match self {
            RecordFamily::Qs => decode_record(QS_GRAMMARS, name, data, false, debug),
            RecordFamily::Entry => decode_record(&[], name, data, true, false),
        }
    }
}
