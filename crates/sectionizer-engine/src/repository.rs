//! Rule repository: loading and saving rule documents.
//!
//! A rule document maps section numbers to ordered rule records:
//!
//! ```json
//! {
//!   "4":  [{ "pattern": "Section4\\[0\\]", "confidence": 0.95, "description": "SSN page" }],
//!   "13": [{ "pattern": "section_13_(\\d)-2", "confidence": 0.9, "subsection": "13A",
//!            "entryIndexStrategy": {
//!              "kind": "captureGroupAsInt", "args": { "group": 1, "offset": -1 }
//!            } }]
//! }
//! ```
//!
//! Several documents merge by appending, section by section, in the order
//! given. A record that cannot be compiled is dropped and reported; the rest
//! of the run goes on.

use sectionizer_core::{MatchRule, RuleDocument, RuleError, RuleSet};
use tracing::{debug, info, warn};

use crate::error::RepositoryError;

/// A record that was dropped while loading.
#[derive(Debug)]
pub struct RejectedRule {
    /// Position of the document among the loaded sources.
    pub source: usize,
    pub section: u32,
    /// Position of the record within its section's list.
    pub index: usize,
    pub pattern: String,
    pub error: RuleError,
}

/// Outcome of [`load`].
#[derive(Debug)]
pub struct LoadedRules {
    pub rules: RuleSet,
    pub rejected: Vec<RejectedRule>,
}

/// Parse one rule document from JSON.
pub fn parse_document(json: &str) -> Result<RuleDocument, RepositoryError> {
    Ok(serde_json::from_str(json)?)
}

/// Compile rule documents into a [`RuleSet`].
///
/// Fails only when no rule in any section survives.
pub fn load<I>(sources: I) -> Result<LoadedRules, RepositoryError>
where
    I: IntoIterator<Item = RuleDocument>,
{
    let mut rules = RuleSet::new();
    let mut rejected = Vec::new();

    for (source, document) in sources.into_iter().enumerate() {
        for (section, records) in document {
            let mut previous: Option<f32> = None;
            for (index, record) in records.iter().enumerate() {
                match MatchRule::from_record(record, section) {
                    Ok(rule) => {
                        if let Some(prev) = previous
                            && rule.confidence > prev
                        {
                            debug!(
                                section,
                                index,
                                confidence = rule.confidence,
                                previous = prev,
                                "rule is more confident than its predecessor"
                            );
                        }
                        previous = Some(rule.confidence);
                        rules.push(rule);
                    }
                    Err(error) => {
                        warn!(
                            source,
                            section,
                            index,
                            pattern = %record.pattern,
                            error = %error,
                            "dropping rule"
                        );
                        rejected.push(RejectedRule {
                            source,
                            section,
                            index,
                            pattern: record.pattern.clone(),
                            error,
                        });
                    }
                }
            }
        }
    }

    if rules.is_empty() {
        return Err(RepositoryError::NoUsableRules {
            rejected: rejected.len(),
        });
    }

    info!(
        rules = rules.rule_count(),
        sections = rules.sections().count(),
        rejected = rejected.len(),
        "loaded rule set"
    );
    Ok(LoadedRules { rules, rejected })
}

/// Serialisable form of a rule set.
pub fn save(rules: &RuleSet) -> RuleDocument {
    rules.to_document()
}

/// Pretty-printed JSON of a rule set.
pub fn to_json(rules: &RuleSet) -> Result<String, RepositoryError> {
    Ok(serde_json::to_string_pretty(&save(rules))?)
}
