//! Classification rules and rule sets.
//!
//! A [`MatchRule`] is a compiled regex plus the section it assigns. Rules are
//! grouped per section in a [`RuleSet`]; order inside a section is
//! precedence (first match wins), and sections are visited in ascending
//! number order.

use std::collections::BTreeMap;
use std::fmt;

use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::entry::{EntryIndexSpec, EntryIndexStrategy};
use crate::error::RuleError;

/// Serialised rule record, as found in rule documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRecord {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flags: String,
    /// Defaults to the section the record is listed under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_index_strategy: Option<EntryIndexSpec>,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Rule document: section number → ordered rule records.
pub type RuleDocument = BTreeMap<u32, Vec<RuleRecord>>;

/// A compiled classification rule.
#[derive(Debug, Clone)]
pub struct MatchRule {
    regex: Regex,
    source: String,
    flags: String,
    pub section: u32,
    pub subsection: Option<String>,
    pub entry_index: Option<EntryIndexStrategy>,
    pub confidence: f32,
    pub description: String,
}

impl MatchRule {
    /// Compile a rule with no flags, subsection or entry strategy.
    pub fn new(pattern: &str, section: u32, confidence: f32) -> Result<Self, RuleError> {
        Self::build(pattern, "", section, confidence)
    }

    /// Compile a rule with JavaScript-style regex flags (`i`, `m`, `s`, `x`;
    /// `g`, `u` and `y` are accepted and ignored).
    pub fn with_flags(
        pattern: &str,
        flags: &str,
        section: u32,
        confidence: f32,
    ) -> Result<Self, RuleError> {
        Self::build(pattern, flags, section, confidence)
    }

    /// Compile a record listed under `listed_section` in a rule document.
    pub fn from_record(record: &RuleRecord, listed_section: u32) -> Result<Self, RuleError> {
        let section = match record.section {
            Some(declared) if declared != listed_section => {
                return Err(RuleError::SectionMismatch {
                    declared,
                    listed: listed_section,
                });
            }
            Some(declared) => declared,
            None => listed_section,
        };

        let mut rule = Self::build(&record.pattern, &record.flags, section, record.confidence)?;
        rule.subsection = record.subsection.clone();
        rule.description = record.description.clone();
        if let Some(spec) = &record.entry_index_strategy {
            let strategy = EntryIndexStrategy::from_spec(spec)?;
            // Group 0 is the whole match.
            if let Some(group) = strategy.group()
                && group >= rule.regex.captures_len()
            {
                return Err(RuleError::StrategyArgs {
                    kind: spec.kind.clone(),
                    reason: format!("pattern has no capture group {group}"),
                });
            }
            rule.entry_index = Some(strategy);
        }
        Ok(rule)
    }

    fn build(pattern: &str, flags: &str, section: u32, confidence: f32) -> Result<Self, RuleError> {
        if section == 0 {
            return Err(RuleError::InvalidSection(section));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(RuleError::ConfidenceRange(confidence));
        }

        let flags = normalize_flags(flags)?;
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .ignore_whitespace(flags.contains('x'))
            .build()
            .map_err(|source| RuleError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            regex,
            source: pattern.to_string(),
            flags,
            section,
            subsection: None,
            entry_index: None,
            confidence,
            description: String::new(),
        })
    }

    pub fn subsection(mut self, subsection: impl Into<String>) -> Self {
        self.subsection = Some(subsection.into());
        self
    }

    pub fn entry_index(mut self, strategy: EntryIndexStrategy) -> Self {
        self.entry_index = Some(strategy);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Pattern source text as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Normalised flags (deduplicated, sorted).
    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// Identity of the pattern across sections: source text plus flags.
    pub fn key(&self) -> String {
        format!("/{}/{}", self.source, self.flags)
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn captures<'h>(&self, name: &'h str) -> Option<Captures<'h>> {
        self.regex.captures(name)
    }

    pub fn to_record(&self) -> RuleRecord {
        RuleRecord {
            pattern: self.source.clone(),
            flags: self.flags.clone(),
            section: Some(self.section),
            subsection: self.subsection.clone(),
            entry_index_strategy: self.entry_index.as_ref().map(EntryIndexStrategy::to_spec),
            confidence: self.confidence,
            description: self.description.clone(),
        }
    }
}

impl PartialEq for MatchRule {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.flags == other.flags
            && self.section == other.section
            && self.subsection == other.subsection
            && self.entry_index == other.entry_index
            && self.confidence == other.confidence
            && self.description == other.description
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → s{} ({:.2})", self.key(), self.section, self.confidence)
    }
}

fn normalize_flags(flags: &str) -> Result<String, RuleError> {
    let mut chars: Vec<char> = Vec::with_capacity(flags.len());
    for c in flags.chars() {
        if !matches!(c, 'i' | 'm' | 's' | 'x' | 'g' | 'u' | 'y') {
            return Err(RuleError::UnknownFlag(c));
        }
        chars.push(c);
    }
    chars.sort_unstable();
    chars.dedup();
    Ok(chars.into_iter().collect())
}

/// Ordered rule lists keyed by section number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    sections: BTreeMap<u32, Vec<MatchRule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule to the end of its section's list.
    pub fn push(&mut self, rule: MatchRule) {
        self.sections.entry(rule.section).or_default().push(rule);
    }

    /// Rules of one section in precedence order.
    pub fn rules(&self, section: u32) -> &[MatchRule] {
        self.sections.get(&section).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sections in ascending order with their rule lists.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[MatchRule])> {
        self.sections.iter().map(|(s, rules)| (*s, rules.as_slice()))
    }

    /// Section numbers that hold at least one rule.
    pub fn sections(&self) -> impl Iterator<Item = u32> + '_ {
        self.sections
            .iter()
            .filter(|(_, rules)| !rules.is_empty())
            .map(|(s, _)| *s)
    }

    pub fn rule_count(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count() == 0
    }

    /// Keep only rules for which `keep` returns true; returns how many were dropped.
    /// Sections left without rules are removed.
    pub fn retain(&mut self, mut keep: impl FnMut(&MatchRule) -> bool) -> usize {
        let before = self.rule_count();
        for rules in self.sections.values_mut() {
            rules.retain(|r| keep(r));
        }
        self.sections.retain(|_, rules| !rules.is_empty());
        before - self.rule_count()
    }

    pub fn to_document(&self) -> RuleDocument {
        self.sections
            .iter()
            .filter(|(_, rules)| !rules.is_empty())
            .map(|(s, rules)| (*s, rules.iter().map(MatchRule::to_record).collect()))
            .collect()
    }
}

impl FromIterator<MatchRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = MatchRule>>(iter: I) -> Self {
        let mut set = Self::new();
        for rule in iter {
            set.push(rule);
        }
        set
    }
}
