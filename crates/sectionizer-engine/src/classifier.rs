//! First-match field classification.
//!
//! Each field name is tested against every section's rule list, sections in
//! ascending order and rules in list order; the first rule that matches
//! decides section, subsection and entry index. Fields are independent of one
//! another, so large batches are classified in parallel when the `parallel`
//! feature is enabled. Output order always follows input order.

use std::collections::BTreeMap;

use sectionizer_core::{
    ClassifiedField, EntryIndexError, MatchRule, RawField, RuleSet, UNCLASSIFIED,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::generic::GenericMatcher;

/// Default batch size above which classification runs in parallel.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 1024;

/// A match whose entry index could not be derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationDiagnostic {
    /// Position of the field in the input list.
    pub field_index: usize,
    pub name: String,
    pub section: u32,
    /// Key of the rule that matched.
    pub rule: String,
    pub reason: String,
}

/// Result of classifying a batch.
#[derive(Debug, Clone)]
pub struct Classification {
    pub fields: Vec<ClassifiedField>,
    /// Section → assigned field count, including [`UNCLASSIFIED`].
    pub counts: BTreeMap<u32, usize>,
    pub diagnostics: Vec<ClassificationDiagnostic>,
}

impl Classification {
    pub fn unclassified_count(&self) -> usize {
        self.counts.get(&UNCLASSIFIED).copied().unwrap_or(0)
    }
}

/// Applies a rule set to raw fields.
pub struct FieldClusterer<'a> {
    rules: &'a RuleSet,
    generic: &'a GenericMatcher,
    parallel_threshold: usize,
}

/// Outcome of matching one name against one rule.
pub(crate) enum RuleMatch<'r> {
    Matched {
        rule: &'r MatchRule,
        entry: Option<u32>,
    },
    EntryFailed {
        rule: &'r MatchRule,
        error: EntryIndexError,
    },
}

/// Test `name` against a section's rules; the first matching rule decides.
pub(crate) fn match_section<'r>(rules: &'r [MatchRule], name: &str) -> Option<RuleMatch<'r>> {
    rules.iter().find_map(|rule| {
        let caps = rule.captures(name)?;
        Some(match &rule.entry_index {
            None => RuleMatch::Matched { rule, entry: None },
            Some(strategy) => match strategy.derive(&caps) {
                Ok(entry) => RuleMatch::Matched {
                    rule,
                    entry: Some(entry),
                },
                Err(error) => RuleMatch::EntryFailed { rule, error },
            },
        })
    })
}

impl<'a> FieldClusterer<'a> {
    pub fn new(rules: &'a RuleSet, generic: &'a GenericMatcher) -> Self {
        Self {
            rules,
            generic,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// Batches above `threshold` fields go parallel; 0 disables parallelism.
    pub fn parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Classify a single field; the diagnostic is set when the entry index
    /// could not be derived (the field is then unclassified).
    pub fn classify_field(
        &self,
        index: usize,
        raw: &RawField,
    ) -> (ClassifiedField, Option<ClassificationDiagnostic>) {
        for (_, rules) in self.rules.iter() {
            match match_section(rules, &raw.name) {
                None => continue,
                Some(RuleMatch::Matched { rule, entry }) => {
                    let field = ClassifiedField {
                        field: raw.clone(),
                        section: rule.section,
                        subsection: rule.subsection.clone(),
                        entry,
                        confidence: rule.confidence,
                        is_explicitly_detected: !self.generic.is_generic(rule),
                        was_moved_by_healing: false,
                    };
                    return (field, None);
                }
                Some(RuleMatch::EntryFailed { rule, error }) => {
                    debug!(
                        name = %raw.name,
                        rule = %rule,
                        error = %error,
                        "entry index derivation failed"
                    );
                    let diagnostic = ClassificationDiagnostic {
                        field_index: index,
                        name: raw.name.clone(),
                        section: rule.section,
                        rule: rule.key(),
                        reason: error.to_string(),
                    };
                    return (ClassifiedField::unclassified(raw.clone()), Some(diagnostic));
                }
            }
        }
        (ClassifiedField::unclassified(raw.clone()), None)
    }

    /// Classify a batch. `output.fields[i]` always corresponds to `fields[i]`.
    pub fn classify(&self, fields: &[RawField]) -> Classification {
        let results = self.classify_all(fields);

        let mut out = Vec::with_capacity(results.len());
        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        let mut diagnostics = Vec::new();
        for (field, diagnostic) in results {
            *counts.entry(field.section).or_default() += 1;
            out.push(field);
            diagnostics.extend(diagnostic);
        }

        info!(
            fields = out.len(),
            sections = counts.keys().filter(|s| **s != UNCLASSIFIED).count(),
            unclassified = counts.get(&UNCLASSIFIED).copied().unwrap_or(0),
            diagnostics = diagnostics.len(),
            "classified fields"
        );

        Classification {
            fields: out,
            counts,
            diagnostics,
        }
    }

    fn classify_all(
        &self,
        fields: &[RawField],
    ) -> Vec<(ClassifiedField, Option<ClassificationDiagnostic>)> {
        #[cfg(feature = "parallel")]
        {
            if self.parallel_threshold > 0 && fields.len() > self.parallel_threshold {
                use rayon::prelude::*;
                return fields
                    .par_iter()
                    .enumerate()
                    .map(|(i, raw)| self.classify_field(i, raw))
                    .collect();
            }
        }
        fields
            .iter()
            .enumerate()
            .map(|(i, raw)| self.classify_field(i, raw))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sectionizer_core::EntryIndexStrategy;

    fn rule(pattern: &str, section: u32, confidence: f32) -> MatchRule {
        MatchRule::new(pattern, section, confidence).unwrap()
    }

    fn raw(names: &[&str]) -> Vec<RawField> {
        names.iter().map(|n| RawField::named(*n)).collect()
    }

    #[test]
    fn single_unambiguous_match() {
        let rules: RuleSet = [rule(r"Section4\[0\]", 4, 0.95)].into_iter().collect();
        let generic = GenericMatcher::default();
        let out = FieldClusterer::new(&rules, &generic)
            .classify(&raw(&["form1[0].Section4[0].SSN[0]"]));

        let f = &out.fields[0];
        assert_eq!(f.section, 4);
        assert_eq!(f.confidence, 0.95);
        assert!(f.is_explicitly_detected);
        assert!(!f.was_moved_by_healing);
        assert_eq!(out.counts[&4], 1);
    }

    #[test]
    fn unclassifiable_field() {
        let rules: RuleSet = [rule(r"Section4\[0\]", 4, 0.95)].into_iter().collect();
        let generic = GenericMatcher::default();
        let out = FieldClusterer::new(&rules, &generic)
            .classify(&raw(&["form1[0].#subform[68].#field[3]"]));

        let f = &out.fields[0];
        assert_eq!(f.section, UNCLASSIFIED);
        assert_eq!(f.confidence, 0.0);
        assert!(!f.is_explicitly_detected);
        assert_eq!(out.unclassified_count(), 1);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn earlier_rule_in_section_wins() {
        let rules: RuleSet = [
            rule(r"Section13_2\[\d\]\.TextField11", 13, 0.7)
                .subsection("13A.2"),
            rule(r"Section13_2", 13, 0.9).subsection("13A"),
        ]
        .into_iter()
        .collect();
        let generic = GenericMatcher::default();
        let out = FieldClusterer::new(&rules, &generic)
            .classify(&raw(&["form1[0].Section13_2[1].TextField11[4]"]));
        assert_eq!(out.fields[0].subsection.as_deref(), Some("13A.2"));
        assert_eq!(out.fields[0].confidence, 0.7);
    }

    #[test]
    fn lower_section_number_wins_across_sections() {
        let rules: RuleSet = [rule("SSN", 4, 0.6), rule("Sections1-6", 2, 0.5)]
            .into_iter()
            .collect();
        let generic = GenericMatcher::default();
        let out = FieldClusterer::new(&rules, &generic)
            .classify(&raw(&["form1[0].Sections1-6[0].SSN[0]"]));
        assert_eq!(out.fields[0].section, 2);
    }

    #[test]
    fn generic_fallback_is_not_explicit() {
        let rules: RuleSet = [rule(r"^form1\[0\]", 30, 0.3)].into_iter().collect();
        let generic = GenericMatcher::default();
        let out = FieldClusterer::new(&rules, &generic)
            .classify(&raw(&["form1[0].continuation[0].TextField11[0]"]));
        assert_eq!(out.fields[0].section, 30);
        assert!(!out.fields[0].is_explicitly_detected);
    }

    #[test]
    fn entry_index_derived() {
        let rules: RuleSet = [rule(r"Section16_3\[0\]\.#area\[(\d+)\]", 16, 0.9)
            .subsection("16.3")
            .entry_index(EntryIndexStrategy::CaptureGroupAsInt { group: 1, offset: 0 })]
        .into_iter()
        .collect();
        let generic = GenericMatcher::default();
        let out = FieldClusterer::new(&rules, &generic)
            .classify(&raw(&["form1[0].Section16_3[0].#area[2].From_Datefield_Name_2[0]"]));
        assert_eq!(out.fields[0].entry, Some(2));
    }

    #[test]
    fn entry_failure_unclassifies_with_diagnostic() {
        let rules: RuleSet = [rule(r"Section13_(\w)", 13, 0.9)
            .entry_index(EntryIndexStrategy::CaptureGroupAsInt { group: 1, offset: 0 })]
        .into_iter()
        .collect();
        let generic = GenericMatcher::default();
        let out = FieldClusterer::new(&rules, &generic).classify(&raw(&[
            "form1[0].Section13_x[0].TextField11[0]",
            "form1[0].Section13_2[0].TextField11[0]",
        ]));

        assert_eq!(out.fields[0].section, UNCLASSIFIED);
        assert_eq!(out.fields[1].section, 13);
        assert_eq!(out.fields[1].entry, Some(2));
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].field_index, 0);
        assert_eq!(out.diagnostics[0].section, 13);
    }

    #[test]
    fn conservation_and_determinism_across_thresholds() {
        let rules: RuleSet = [
            rule(r"Section(\d+)\[", 5, 0.4),
            rule(r"Sections7-9", 7, 0.9),
            rule(r"TextField11\[(\d+)\]", 12, 0.6)
                .entry_index(EntryIndexStrategy::CaptureGroupAsInt { group: 1, offset: 0 }),
        ]
        .into_iter()
        .collect();
        let generic = GenericMatcher::default();

        let names: Vec<String> = (0..3000)
            .map(|i| match i % 4 {
                0 => format!("form1[0].Section{}[0].TextField11[{}]", i % 30, i % 7),
                1 => format!("form1[0].Sections7-9[0].#field[{i}]"),
                2 => format!("form1[0].#subform[{i}].TextField11[{}]", i % 3),
                _ => format!("form1[0].continuation{i}"),
            })
            .collect();
        let fields: Vec<RawField> = names.iter().map(RawField::named).collect();

        let sequential = FieldClusterer::new(&rules, &generic)
            .parallel_threshold(0)
            .classify(&fields);
        let parallel = FieldClusterer::new(&rules, &generic)
            .parallel_threshold(16)
            .classify(&fields);

        assert_eq!(sequential.fields.len(), fields.len());
        assert_eq!(sequential.fields, parallel.fields);
        assert_eq!(sequential.counts, parallel.counts);
        assert_eq!(
            serde_json::to_string(&sequential.fields).unwrap(),
            serde_json::to_string(&parallel.fields).unwrap()
        );
        assert_eq!(sequential.counts.values().sum::<usize>(), fields.len());
        for (raw, classified) in fields.iter().zip(&sequential.fields) {
            assert_eq!(raw, &classified.field);
        }
    }
}
