//! Entry-index derivation strategies.
//!
//! A repeated structure in the form (residences, employers, relatives) puts
//! the entry number somewhere in the field identifier, usually as a bracketed
//! index or a numbered token. A rule names how to recover it from its match
//! with one of a small closed set of strategies, stored as `{kind, args}`:
//!
//! | kind                 | args                          |
//! |----------------------|-------------------------------|
//! | `constant`           | `{"value": 2}` or `2`         |
//! | `captureGroupAsInt`  | `{"group": 1, "offset": -1}`  |
//! | `captureGroupLookup` | `{"group": 1, "table": {..}}` |

use std::collections::BTreeMap;

use regex::Captures;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{EntryIndexError, RuleError};

/// Serialised form of an entry-index strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryIndexSpec {
    pub kind: String,
    #[serde(default)]
    pub args: Value,
}

/// How a rule turns its regex match into an entry index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryIndexStrategy {
    /// Every match belongs to the same entry.
    Constant(u32),
    /// Parse a capture group as an integer and add `offset`
    /// (e.g. `-1` for one-based `Entry1` tokens).
    CaptureGroupAsInt { group: usize, offset: i64 },
    /// Map the text of a capture group through a fixed table.
    CaptureGroupLookup {
        group: usize,
        table: BTreeMap<String, u32>,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConstantArgs {
    value: u32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupArgs {
    group: usize,
    #[serde(default)]
    offset: i64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct LookupArgs {
    group: usize,
    table: BTreeMap<String, u32>,
}

impl EntryIndexStrategy {
    pub const CONSTANT: &'static str = "constant";
    pub const CAPTURE_GROUP_AS_INT: &'static str = "captureGroupAsInt";
    pub const CAPTURE_GROUP_LOOKUP: &'static str = "captureGroupLookup";

    /// Interpret a `{kind, args}` record.
    pub fn from_spec(spec: &EntryIndexSpec) -> Result<Self, RuleError> {
        let bad_args = |e: serde_json::Error| RuleError::StrategyArgs {
            kind: spec.kind.clone(),
            reason: e.to_string(),
        };

        match spec.kind.as_str() {
            Self::CONSTANT => {
                // A bare number is accepted as shorthand.
                if let Some(n) = spec.args.as_u64() {
                    let value = u32::try_from(n).map_err(|_| RuleError::StrategyArgs {
                        kind: spec.kind.clone(),
                        reason: format!("{n} does not fit an entry index"),
                    })?;
                    return Ok(Self::Constant(value));
                }
                let args: ConstantArgs =
                    serde_json::from_value(spec.args.clone()).map_err(bad_args)?;
                Ok(Self::Constant(args.value))
            }
            Self::CAPTURE_GROUP_AS_INT => {
                let args: GroupArgs = serde_json::from_value(spec.args.clone()).map_err(bad_args)?;
                Ok(Self::CaptureGroupAsInt {
                    group: args.group,
                    offset: args.offset,
                })
            }
            Self::CAPTURE_GROUP_LOOKUP => {
                let args: LookupArgs =
                    serde_json::from_value(spec.args.clone()).map_err(bad_args)?;
                Ok(Self::CaptureGroupLookup {
                    group: args.group,
                    table: args.table,
                })
            }
            other => Err(RuleError::UnknownStrategy(other.to_string())),
        }
    }

    /// Serialised form; `from_spec(&s.to_spec()) == s`.
    pub fn to_spec(&self) -> EntryIndexSpec {
        match self {
            Self::Constant(value) => EntryIndexSpec {
                kind: Self::CONSTANT.to_string(),
                args: json!({ "value": value }),
            },
            Self::CaptureGroupAsInt { group, offset } => EntryIndexSpec {
                kind: Self::CAPTURE_GROUP_AS_INT.to_string(),
                args: json!({ "group": group, "offset": offset }),
            },
            Self::CaptureGroupLookup { group, table } => EntryIndexSpec {
                kind: Self::CAPTURE_GROUP_LOOKUP.to_string(),
                args: json!({ "group": group, "table": table }),
            },
        }
    }

    /// Capture group this strategy reads, if any.
    pub fn group(&self) -> Option<usize> {
        match self {
            Self::Constant(_) => None,
            Self::CaptureGroupAsInt { group, .. } | Self::CaptureGroupLookup { group, .. } => {
                Some(*group)
            }
        }
    }

    /// Derive the entry index from a match.
    pub fn derive(&self, caps: &Captures<'_>) -> Result<u32, EntryIndexError> {
        match self {
            Self::Constant(value) => Ok(*value),
            Self::CaptureGroupAsInt { group, offset } => {
                let text = group_text(caps, *group)?;
                let parsed: i64 = text.parse().map_err(|_| EntryIndexError::NotNumeric {
                    group: *group,
                    value: text.to_string(),
                })?;
                let index = parsed.checked_add(*offset).filter(|v| *v >= 0).ok_or(
                    EntryIndexError::Negative {
                        group: *group,
                        value: parsed,
                        offset: *offset,
                    },
                )?;
                u32::try_from(index).map_err(|_| EntryIndexError::NotNumeric {
                    group: *group,
                    value: text.to_string(),
                })
            }
            Self::CaptureGroupLookup { group, table } => {
                let text = group_text(caps, *group)?;
                table
                    .get(text)
                    .copied()
                    .ok_or_else(|| EntryIndexError::NoLookup {
                        group: *group,
                        value: text.to_string(),
                    })
            }
        }
    }
}

fn group_text<'h>(caps: &Captures<'h>, group: usize) -> Result<&'h str, EntryIndexError> {
    caps.get(group)
        .map(|m| m.as_str())
        .ok_or(EntryIndexError::MissingGroup(group))
}
