//! Cross-section conflict resolution.
//!
//! The same generic pattern (say `^form1\[0\]`) listed in sections 11, 14 and
//! 15 at the same confidence decides nothing: whichever section the
//! classifier visits first wins every field it matches. Such patterns are
//! removed from every section they appear in. A generic pattern with one
//! clearly stronger claim (confidence spread above [`CONFIDENCE_SPREAD`]) is
//! kept, as is any pattern that appears in a single section.

use std::collections::{BTreeMap, BTreeSet};

use sectionizer_core::RuleSet;
use serde::Serialize;
use tracing::info;

use crate::generic::GenericMatcher;

/// Maximum confidence spread at which a generic pattern counts as a tie.
pub const CONFIDENCE_SPREAD: f32 = 0.1;

// Absorbs f32 rounding in `max - min` (0.95 - 0.85 is not exactly 0.1).
const SPREAD_EPSILON: f32 = 1e-6;

/// A pattern stripped from the rule set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedRule {
    /// Pattern source plus flags, `/source/flags`.
    pub key: String,
    pub sections: Vec<u32>,
    pub min_confidence: f32,
    pub max_confidence: f32,
    /// Number of rules removed for this key (a section may list it twice).
    pub rule_count: usize,
}

#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub rules: RuleSet,
    pub removed: Vec<RemovedRule>,
}

/// Remove generic patterns that tie across sections.
pub fn resolve(rules: RuleSet, generic: &GenericMatcher) -> ResolveOutcome {
    // key → (sections, confidences, generic?)
    let mut occurrences: BTreeMap<String, (BTreeSet<u32>, Vec<f32>, bool)> = BTreeMap::new();
    for (section, list) in rules.iter() {
        for rule in list {
            let entry = occurrences
                .entry(rule.key())
                .or_insert_with(|| (BTreeSet::new(), Vec::new(), generic.is_generic(rule)));
            entry.0.insert(section);
            entry.1.push(rule.confidence);
        }
    }

    let mut removed = Vec::new();
    for (key, (sections, confidences, is_generic)) in occurrences {
        if sections.len() < 2 || !is_generic {
            continue;
        }
        let min = confidences.iter().copied().fold(f32::INFINITY, f32::min);
        let max = confidences.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if max - min > CONFIDENCE_SPREAD + SPREAD_EPSILON {
            continue;
        }

        let sections: Vec<u32> = sections.into_iter().collect();
        info!(
            pattern = %key,
            sections = ?sections,
            min_confidence = min,
            max_confidence = max,
            "removing generic pattern shared across sections"
        );
        removed.push(RemovedRule {
            key,
            sections,
            min_confidence: min,
            max_confidence: max,
            rule_count: confidences.len(),
        });
    }

    let mut rules = rules;
    if !removed.is_empty() {
        let keys: BTreeSet<&str> = removed.iter().map(|r| r.key.as_str()).collect();
        rules.retain(|rule| !keys.contains(rule.key().as_str()));
    }

    ResolveOutcome { rules, removed }
}
