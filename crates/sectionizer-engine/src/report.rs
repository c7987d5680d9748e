//! Distribution summaries and per-section reference documents.
//!
//! These answer the questions asked when auditing a section by hand: how
//! many fields landed there, how they split across subsections and entries,
//! which fields are shared (no entry index), and whether any field name
//! occurs more than once in the extraction.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use sectionizer_core::ClassifiedField;
use serde::{Deserialize, Serialize};

/// Field distribution within one section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionDistribution {
    pub section: u32,
    pub total_fields: usize,
    pub unique_names: usize,
    /// Subsection label → field count. Fields without a subsection are not listed.
    pub subsections: BTreeMap<String, usize>,
    /// Entry index → field count.
    pub entries: BTreeMap<u32, usize>,
    /// Fields without an entry index.
    pub shared_fields: usize,
    pub moved_by_healing: usize,
}

/// A field name seen more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateName {
    pub name: String,
    pub count: usize,
}

/// Header of a per-section reference document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionMetadata {
    pub section_id: u32,
    pub total_fields: usize,
    pub unique_names: usize,
    pub subsections: Vec<String>,
    pub entries: Vec<u32>,
    /// ISO 8601 timestamp string.
    pub generated_at: String,
}

/// All fields of one section, as written to `section-<N>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionReference {
    pub metadata: SectionMetadata,
    pub fields: Vec<ClassifiedField>,
}

/// Per-section distribution, ascending by section (0 first when present).
pub fn distribution(fields: &[ClassifiedField]) -> Vec<SectionDistribution> {
    let mut by_section: BTreeMap<u32, Vec<&ClassifiedField>> = BTreeMap::new();
    for f in fields {
        by_section.entry(f.section).or_default().push(f);
    }

    by_section
        .into_iter()
        .map(|(section, members)| {
            let mut subsections: BTreeMap<String, usize> = BTreeMap::new();
            let mut entries: BTreeMap<u32, usize> = BTreeMap::new();
            let mut names: BTreeSet<&str> = BTreeSet::new();
            let mut shared_fields = 0;
            let mut moved_by_healing = 0;

            for f in &members {
                names.insert(f.name());
                if let Some(sub) = &f.subsection {
                    *subsections.entry(sub.clone()).or_default() += 1;
                }
                match f.entry {
                    Some(e) => *entries.entry(e).or_default() += 1,
                    None => shared_fields += 1,
                }
                if f.was_moved_by_healing {
                    moved_by_healing += 1;
                }
            }

            SectionDistribution {
                section,
                total_fields: members.len(),
                unique_names: names.len(),
                subsections,
                entries,
                shared_fields,
                moved_by_healing,
            }
        })
        .collect()
}

/// Names occurring more than once, most frequent first, then by name.
pub fn duplicate_names<'a, I>(names: I) -> Vec<DuplicateName>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for name in names {
        *counts.entry(name).or_default() += 1;
    }

    let mut dups: Vec<DuplicateName> = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, count)| DuplicateName {
            name: name.to_string(),
            count,
        })
        .collect();
    dups.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    dups
}

/// Split a classification into one reference document per section.
pub fn section_references(
    fields: &[ClassifiedField],
    generated_at: DateTime<Utc>,
) -> BTreeMap<u32, SectionReference> {
    let stamp = generated_at.to_rfc3339();
    let mut grouped: BTreeMap<u32, Vec<ClassifiedField>> = BTreeMap::new();
    for f in fields {
        grouped.entry(f.section).or_default().push(f.clone());
    }

    grouped
        .into_iter()
        .map(|(section, members)| {
            let names: BTreeSet<&str> = members.iter().map(|f| f.name()).collect();
            let subsections: BTreeSet<&str> =
                members.iter().filter_map(|f| f.subsection.as_deref()).collect();
            let entries: BTreeSet<u32> = members.iter().filter_map(|f| f.entry).collect();

            let metadata = SectionMetadata {
                section_id: section,
                total_fields: members.len(),
                unique_names: names.len(),
                subsections: subsections.into_iter().map(str::to_string).collect(),
                entries: entries.into_iter().collect(),
                generated_at: stamp.clone(),
            };
            (
                section,
                SectionReference {
                    metadata,
                    fields: members,
                },
            )
        })
        .collect()
}
