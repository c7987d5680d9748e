//! Count-driven healing of weak assignments.
//!
//! After a validation pass, fields that were placed by a generic or
//! low-confidence rule are offered to the sections that are short of fields
//! (undersized or missing), biggest shortfall first. A field moves only when
//! the short section has a rule that matches it and that rule is more specific
//! than the one that placed it. Counts are tracked as fields move, so a section
//! stops receiving once it reaches its expected count and a section with a
//! surplus stops giving once the surplus is gone.
//!
//! Each field is considered once per call, and a field already moved by an
//! earlier call is left alone.

use std::collections::BTreeMap;

use sectionizer_core::{ClassifiedField, RuleSet, UNCLASSIFIED};
use serde::Serialize;
use tracing::{debug, info};

use crate::classifier::{RuleMatch, match_section};
use crate::config::HealingOptions;
use crate::generic::GenericMatcher;
use crate::validator::{DeviationStatus, ValidationResult};

/// Audit record of one reassignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealingMove {
    pub field_index: usize,
    pub name: String,
    pub from_section: u32,
    pub to_section: u32,
    /// Key of the rule that claimed the field.
    pub rule: String,
    pub rule_description: String,
    pub rule_confidence: f32,
    /// Confidence of the assignment the field was moved away from.
    pub previous_confidence: f32,
}

#[derive(Debug, Clone)]
pub struct HealOutcome {
    pub fields: Vec<ClassifiedField>,
    pub moved: usize,
    pub moves: Vec<HealingMove>,
}

/// Live expected/actual counts for one evaluated section.
#[derive(Debug, Clone, Copy)]
struct Count {
    expected: u32,
    actual: u32,
    target: bool,
}

impl Count {
    fn deficit(&self) -> u32 {
        self.expected.saturating_sub(self.actual)
    }

    fn surplus(&self) -> u32 {
        self.actual.saturating_sub(self.expected)
    }
}

/// Reassign weakly classified fields to sections that are short of fields.
///
/// `validation` must describe `fields` as passed in. Healing never fails and
/// never assigns a section without a matching rule.
pub fn heal(
    mut fields: Vec<ClassifiedField>,
    validation: &ValidationResult,
    rules: &RuleSet,
    generic: &GenericMatcher,
    options: &HealingOptions,
) -> HealOutcome {
    let mut counts: BTreeMap<u32, Count> = validation
        .deviations
        .iter()
        .map(|d| {
            let target = matches!(d.status, DeviationStatus::Undersized | DeviationStatus::Missing);
            (
                d.section,
                Count {
                    expected: d.expected_fields,
                    actual: d.actual_fields,
                    target,
                },
            )
        })
        .collect();

    if !counts.values().any(|c| c.target && c.deficit() > 0) {
        debug!("no undersized sections; nothing to heal");
        return HealOutcome {
            fields,
            moved: 0,
            moves: Vec::new(),
        };
    }

    let mut moves = Vec::new();
    for (index, field) in fields.iter_mut().enumerate() {
        if field.section == UNCLASSIFIED || field.was_moved_by_healing {
            continue;
        }
        let weak = !field.is_explicitly_detected || field.confidence < options.confidence_threshold;
        if !weak {
            continue;
        }

        let source = field.section;
        let own = counts.get(&source).copied();

        // Targets by remaining shortfall, largest first; ties by section number.
        let mut targets: Vec<(u32, u32)> = counts
            .iter()
            .filter(|(s, c)| c.target && **s != source && c.deficit() > 0)
            .map(|(s, c)| (*s, c.deficit()))
            .collect();
        targets.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        for (target, remaining) in targets {
            if !source_may_give(own, remaining) {
                continue;
            }
            let Some(RuleMatch::Matched { rule, entry }) =
                match_section(rules.rules(target), field.name())
            else {
                continue;
            };
            let more_specific = rule.confidence > field.confidence || !generic.is_generic(rule);
            if !more_specific {
                continue;
            }

            debug!(
                name = %field.name(),
                from = source,
                to = target,
                rule = %rule,
                "healing field"
            );
            moves.push(HealingMove {
                field_index: index,
                name: field.name().to_string(),
                from_section: source,
                to_section: target,
                rule: rule.key(),
                rule_description: rule.description.clone(),
                rule_confidence: rule.confidence,
                previous_confidence: field.confidence,
            });
            field.reassign(target, rule.subsection.clone(), entry);

            if let Some(c) = counts.get_mut(&source) {
                c.actual = c.actual.saturating_sub(1);
            }
            if let Some(c) = counts.get_mut(&target) {
                c.actual += 1;
            }
            break;
        }
    }

    info!(moved = moves.len(), "healing pass complete");
    HealOutcome {
        fields,
        moved: moves.len(),
        moves,
    }
}

/// A section may give up a field while it holds more than expected, or when
/// the receiving section is worse off than this one would be after the move.
/// Sections without an expectation can always give.
fn source_may_give(own: Option<Count>, target_deficit: u32) -> bool {
    match own {
        None => true,
        Some(c) if c.surplus() > 0 => true,
        Some(c) => c.target && target_deficit > c.deficit() + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationOptions;
    use crate::validator::validate;
    use sectionizer_core::{ExpectationTable, MatchRule, RawField, SectionExpectation};

    fn field(name: &str, section: u32, confidence: f32, explicit: bool) -> ClassifiedField {
        let mut f = ClassifiedField::unclassified(RawField::named(name));
        f.section = section;
        f.confidence = confidence;
        f.is_explicitly_detected = explicit;
        f
    }

    fn count_in(fields: &[ClassifiedField], section: u32) -> usize {
        fields.iter().filter(|f| f.section == section).count()
    }

    /// Section 18 holds 947 explicit fields plus 18 fallback fields that a
    /// section-4 rule claims; section 4 is 18 short.
    fn section_18_overflow() -> (Vec<ClassifiedField>, ExpectationTable, RuleSet) {
        let mut fields = Vec::new();
        for i in 0..22 {
            fields.push(field(&format!("form1[0].Section4[0].TextField11[{i}]"), 4, 0.95, true));
        }
        for i in 0..947 {
            fields.push(field(&format!("form1[0].Section18_1[0].TextField11[{i}]"), 18, 0.9, true));
        }
        for i in 0..18 {
            fields.push(field(&format!("form1[0].#subform[4].SSN[{i}]"), 18, 0.3, false));
        }

        let table: ExpectationTable = [
            (4, SectionExpectation::fields(40)),
            (18, SectionExpectation::fields(947)),
        ]
        .into_iter()
        .collect();

        let rules: RuleSet = [
            MatchRule::new(r"Section4\[0\]", 4, 0.95).unwrap(),
            MatchRule::new(r"#subform\[4\]\.SSN\[\d+\]", 4, 0.9)
                .unwrap()
                .subsection("4.1")
                .describe("SSN continuation boxes"),
            MatchRule::new(r"Section18_\d", 18, 0.9).unwrap(),
            MatchRule::new(r"^form1\[0\]", 18, 0.3).unwrap(),
        ]
        .into_iter()
        .collect();

        (fields, table, rules)
    }

    #[test]
    fn count_driven_healing() {
        let (fields, table, rules) = section_18_overflow();
        let before = validate(&fields, &table, &ValidationOptions::default());
        assert!(before.undersized_sections.contains(&4));
        assert_eq!(before.deviation(18).unwrap().actual_fields, 965);

        let out = heal(
            fields,
            &before,
            &rules,
            &GenericMatcher::default(),
            &HealingOptions::default(),
        );
        assert_eq!(out.moved, 18);
        assert_eq!(count_in(&out.fields, 18), 947);
        assert_eq!(count_in(&out.fields, 4), 40);

        for f in out.fields.iter().filter(|f| f.name().contains("#subform[4]")) {
            assert_eq!(f.section, 4);
            assert!(f.was_moved_by_healing);
            assert_eq!(f.subsection.as_deref(), Some("4.1"));
            // Original assignment metadata is untouched.
            assert_eq!(f.confidence, 0.3);
            assert!(!f.is_explicitly_detected);
        }
        assert!(out.moves.iter().all(|m| m.from_section == 18
            && m.to_section == 4
            && m.rule_description == "SSN continuation boxes"));

        let after = validate(&out.fields, &table, &ValidationOptions::default());
        assert!(after.success);
    }

    #[test]
    fn conservation_and_boundedness() {
        let (fields, table, rules) = section_18_overflow();
        let n = fields.len();
        let validation = validate(&fields, &table, &ValidationOptions::default());
        let generic = GenericMatcher::default();
        let first = heal(fields, &validation, &rules, &generic, &HealingOptions::default());
        assert_eq!(first.fields.len(), n);

        let mut indices: Vec<usize> = first.moves.iter().map(|m| m.field_index).collect();
        indices.dedup();
        assert_eq!(indices.len(), first.moves.len(), "no field healed twice");

        // A second pass on its own output leaves moved fields where they are.
        let revalidated = validate(&first.fields, &table, &ValidationOptions::default());
        let second = heal(
            first.fields.clone(),
            &revalidated,
            &rules,
            &generic,
            &HealingOptions::default(),
        );
        assert_eq!(second.moved, 0);
        assert_eq!(second.fields, first.fields);
    }

    #[test]
    fn deficit_caps_moves() {
        let (fields, mut table, rules) = section_18_overflow();
        // Section 4 now needs only 10 more, section 18 expects 950.
        table.insert(4, SectionExpectation::fields(32));
        table.insert(18, SectionExpectation::fields(950));
        let validation = validate(&fields, &table, &ValidationOptions::default());
        assert!(validation.undersized_sections.contains(&4));

        let out = heal(
            fields,
            &validation,
            &rules,
            &GenericMatcher::default(),
            &HealingOptions::default(),
        );
        assert_eq!(out.moved, 10);
        assert_eq!(count_in(&out.fields, 4), 32);
    }

    #[test]
    fn strong_assignments_stay() {
        let (mut fields, table, rules) = section_18_overflow();
        for f in fields.iter_mut().filter(|f| f.name().contains("#subform[4]")) {
            f.is_explicitly_detected = true;
            f.confidence = 0.8;
        }
        let validation = validate(&fields, &table, &ValidationOptions::default());
        let out = heal(
            fields,
            &validation,
            &rules,
            &GenericMatcher::default(),
            &HealingOptions::default(),
        );
        assert_eq!(out.moved, 0);
    }

    #[test]
    fn no_matching_rule_means_no_move() {
        let (fields, table, _) = section_18_overflow();
        let rules: RuleSet = [MatchRule::new(r"Section4\[0\]", 4, 0.95).unwrap()]
            .into_iter()
            .collect();
        let validation = validate(&fields, &table, &ValidationOptions::default());
        let out = heal(
            fields.clone(),
            &validation,
            &rules,
            &GenericMatcher::default(),
            &HealingOptions::default(),
        );
        assert_eq!(out.moved, 0);
        assert_eq!(out.fields, fields);
    }

    #[test]
    fn generic_rule_with_lower_confidence_does_not_claim() {
        let fields = vec![
            field("form1[0].misc[0]", 9, 0.4, false),
            field("form1[0].Section2[0].a", 2, 0.9, true),
        ];
        let table: ExpectationTable = [(2, SectionExpectation::fields(20))].into_iter().collect();
        let rules: RuleSet =
            [MatchRule::new(r"^form1\[0\]", 2, 0.3).unwrap()].into_iter().collect();
        let validation = validate(&fields, &table, &ValidationOptions::default());
        let out = heal(
            fields,
            &validation,
            &rules,
            &GenericMatcher::default(),
            &HealingOptions::default(),
        );
        assert_eq!(out.moved, 0);
    }

    #[test]
    fn missing_section_is_a_target() {
        let fields = vec![
            field("form1[0].Section5[0].TextField11[0]", 30, 0.2, false),
            field("form1[0].Section5[0].TextField11[1]", 30, 0.2, false),
        ];
        let table: ExpectationTable = [(5, SectionExpectation::fields(2))].into_iter().collect();
        let rules: RuleSet =
            [MatchRule::new(r"Section5\[0\]", 5, 0.9).unwrap()].into_iter().collect();
        let validation = validate(&fields, &table, &ValidationOptions::default());
        assert!(validation.missing_mandatory_sections.contains(&5));

        let out = heal(
            fields,
            &validation,
            &rules,
            &GenericMatcher::default(),
            &HealingOptions::default(),
        );
        assert_eq!(out.moved, 2);
        assert!(out.fields.iter().all(|f| f.section == 5 && f.was_moved_by_healing));
    }

    #[test]
    fn unclassified_fields_are_not_healed() {
        let fields = vec![ClassifiedField::unclassified(RawField::named(
            "form1[0].Section5[0].TextField11[0]",
        ))];
        let table: ExpectationTable = [(5, SectionExpectation::fields(2))].into_iter().collect();
        let rules: RuleSet =
            [MatchRule::new(r"Section5\[0\]", 5, 0.9).unwrap()].into_iter().collect();
        let validation = validate(&fields, &table, &ValidationOptions::default());
        let out = heal(
            fields,
            &validation,
            &rules,
            &GenericMatcher::default(),
            &HealingOptions::default(),
        );
        assert_eq!(out.moved, 0);
        assert_eq!(out.fields[0].section, UNCLASSIFIED);
    }

    #[test]
    fn undersized_source_only_gives_to_worse_target() {
        // Section 6 expects 10 and has 6 weak fields; section 7 expects 30 and has none.
        let mut fields: Vec<ClassifiedField> = (0..6)
            .map(|i| field(&format!("form1[0].Section6_7[0].TextField11[{i}]"), 6, 0.4, true))
            .collect();
        fields.extend((0..6).map(|i| field(&format!("form1[0].Section7[0].x[{i}]"), 7, 0.9, true)));
        let table: ExpectationTable = [
            (6, SectionExpectation::fields(10)),
            (7, SectionExpectation::fields(30)),
        ]
        .into_iter()
        .collect();
        let rules: RuleSet = [MatchRule::new(r"Section6_7", 7, 0.8).unwrap()].into_iter().collect();
        let validation = validate(&fields, &table, &ValidationOptions::default());
        assert!(validation.undersized_sections.contains(&6));
        assert!(validation.undersized_sections.contains(&7));

        let out = heal(
            fields,
            &validation,
            &rules,
            &GenericMatcher::default(),
            &HealingOptions::default(),
        );
        // 7 is 24 short, 6 is 4 short: every move keeps 7 worse off than 6.
        assert_eq!(out.moved, 6);
        assert_eq!(count_in(&out.fields, 7), 12);
    }

    #[test]
    fn ignored_source_section_gives() {
        // Section 30 expects 3 and holds 3, but is excluded from validation.
        let fields: Vec<ClassifiedField> = (0..3)
            .map(|i| field(&format!("form1[0].Section5[0].TextField11[{i}]"), 30, 0.2, false))
            .collect();
        let table: ExpectationTable = [
            (5, SectionExpectation::fields(3)),
            (30, SectionExpectation::fields(3)),
        ]
        .into_iter()
        .collect();
        let rules: RuleSet =
            [MatchRule::new(r"Section5\[0\]", 5, 0.9).unwrap()].into_iter().collect();
        let options = ValidationOptions {
            ignore_sections: [30].into_iter().collect(),
            ..ValidationOptions::default()
        };
        let validation = validate(&fields, &table, &options);
        assert!(validation.deviation(30).is_none());

        let generic = GenericMatcher::default();
        let out = heal(fields, &validation, &rules, &generic, &HealingOptions::default());
        assert_eq!(out.moved, 3);
        assert_eq!(count_in(&out.fields, 5), 3);
    }
}
