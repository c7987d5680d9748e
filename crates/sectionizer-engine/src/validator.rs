//! Validation of a classification against expected per-section counts.
//!
//! For every section in the expectation table (minus ignored ones) the actual
//! field, subsection and entry counts are compared to the expected ones. A
//! field-count deviation is *significant* when its percentage exceeds the
//! tolerance and it is larger than a small absolute floor, so a section
//! expecting 3 fields is not flagged for being off by one.
//!
//! The result is a pure function of the fields and the table; it is never
//! updated in place.

use std::collections::{BTreeMap, BTreeSet};

use sectionizer_core::{ClassifiedField, ExpectationTable, UNCLASSIFIED};
use serde::Serialize;
use tracing::info;

use crate::config::ValidationOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviationStatus {
    Aligned,
    /// Expected fields but received none.
    Missing,
    Undersized,
    Oversized,
}

impl DeviationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aligned => "aligned",
            Self::Missing => "missing",
            Self::Undersized => "undersized",
            Self::Oversized => "oversized",
        }
    }
}

/// Expected vs actual counts for one section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionDeviation {
    pub section: u32,
    pub expected_fields: u32,
    pub actual_fields: u32,
    pub expected_entries: u32,
    pub actual_entries: u32,
    pub expected_subsections: u32,
    pub actual_subsections: u32,
    /// `actual - expected`.
    pub field_deviation: i64,
    pub field_deviation_percent: f64,
    pub entry_deviation: i64,
    pub subsection_deviation: i64,
    /// The section is structurally mandatory (expects at least one field).
    pub is_critical: bool,
    pub status: DeviationStatus,
}

impl SectionDeviation {
    /// Fields still needed to reach the expected count.
    pub fn deficit(&self) -> u32 {
        self.expected_fields.saturating_sub(self.actual_fields)
    }

    /// Fields beyond the expected count.
    pub fn surplus(&self) -> u32 {
        self.actual_fields.saturating_sub(self.expected_fields)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// One entry per evaluated section, ascending.
    pub deviations: Vec<SectionDeviation>,
    pub missing_mandatory_sections: BTreeSet<u32>,
    pub undersized_sections: BTreeSet<u32>,
    pub oversized_sections: BTreeSet<u32>,
    /// Sections holding fields but absent from the table. Never flagged.
    pub unexpected_sections: BTreeSet<u32>,
    pub unknown_field_count: usize,
    pub total_fields: usize,
    /// Percentage (0–100) of evaluated sections within tolerance.
    pub alignment_percentage: f64,
    pub success: bool,
}

impl ValidationResult {
    pub fn deviation(&self, section: u32) -> Option<&SectionDeviation> {
        self.deviations.iter().find(|d| d.section == section)
    }
}

#[derive(Default)]
struct Tally<'a> {
    fields: u32,
    subsections: BTreeSet<&'a str>,
    entries: BTreeSet<u32>,
}

/// Compare a classification with the expectation table.
pub fn validate(
    fields: &[ClassifiedField],
    expectations: &ExpectationTable,
    options: &ValidationOptions,
) -> ValidationResult {
    let mut tallies: BTreeMap<u32, Tally<'_>> = BTreeMap::new();
    let mut unknown_field_count = 0usize;
    for field in fields {
        if field.section == UNCLASSIFIED {
            unknown_field_count += 1;
            continue;
        }
        let tally = tallies.entry(field.section).or_default();
        tally.fields += 1;
        if let Some(sub) = &field.subsection {
            tally.subsections.insert(sub.as_str());
        }
        if let Some(entry) = field.entry {
            tally.entries.insert(entry);
        }
    }

    let max_percent = options.max_deviation_percent();
    let overflow_counts = !options.ignores_overflow();
    let empty = Tally::default();

    let mut deviations = Vec::new();
    let mut missing = BTreeSet::new();
    let mut undersized = BTreeSet::new();
    let mut oversized = BTreeSet::new();

    for (&section, expected) in expectations {
        if options.ignore_sections.contains(&section) {
            continue;
        }
        let tally = tallies.get(&section).unwrap_or(&empty);
        let actual_fields = tally.fields;
        let actual_entries = tally.entries.len() as u32;
        let actual_subsections = tally.subsections.len() as u32;

        let field_deviation = i64::from(actual_fields) - i64::from(expected.fields);
        let field_deviation_percent = deviation_percent(field_deviation, expected.fields);
        let significant = field_deviation_percent > max_percent
            && field_deviation.unsigned_abs() > u64::from(options.min_absolute_deviation);

        let status = if expected.is_mandatory() && actual_fields == 0 {
            missing.insert(section);
            DeviationStatus::Missing
        } else if significant && field_deviation < 0 {
            undersized.insert(section);
            DeviationStatus::Undersized
        } else if significant && field_deviation > 0 {
            oversized.insert(section);
            DeviationStatus::Oversized
        } else {
            DeviationStatus::Aligned
        };

        deviations.push(SectionDeviation {
            section,
            expected_fields: expected.fields,
            actual_fields,
            expected_entries: expected.entries,
            actual_entries,
            expected_subsections: expected.subsections,
            actual_subsections,
            field_deviation,
            field_deviation_percent,
            entry_deviation: i64::from(actual_entries) - i64::from(expected.entries),
            subsection_deviation: i64::from(actual_subsections) - i64::from(expected.subsections),
            is_critical: expected.is_mandatory(),
            status,
        });
    }

    let failing = |d: &SectionDeviation| match d.status {
        DeviationStatus::Aligned => false,
        DeviationStatus::Missing | DeviationStatus::Undersized => true,
        DeviationStatus::Oversized => overflow_counts,
    };
    let evaluated = deviations.len();
    let within = deviations.iter().filter(|d| !failing(d)).count();
    let alignment_percentage = if evaluated == 0 {
        100.0
    } else {
        within as f64 / evaluated as f64 * 100.0
    };

    let success =
        missing.is_empty() && undersized.is_empty() && (!overflow_counts || oversized.is_empty());

    let unexpected_sections: BTreeSet<u32> = tallies
        .keys()
        .filter(|s| !expectations.contains_key(s))
        .copied()
        .collect();

    info!(
        evaluated,
        missing = missing.len(),
        undersized = undersized.len(),
        oversized = oversized.len(),
        unknown = unknown_field_count,
        alignment = alignment_percentage,
        success,
        "validated classification"
    );

    ValidationResult {
        deviations,
        missing_mandatory_sections: missing,
        undersized_sections: undersized,
        oversized_sections: oversized,
        unexpected_sections,
        unknown_field_count,
        total_fields: fields.len(),
        alignment_percentage,
        success,
    }
}

fn deviation_percent(deviation: i64, expected: u32) -> f64 {
    if expected == 0 {
        if deviation > 0 { 100.0 } else { 0.0 }
    } else {
        deviation.unsigned_abs() as f64 / f64::from(expected) * 100.0
    }
}
