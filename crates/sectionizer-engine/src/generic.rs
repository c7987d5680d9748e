//! Genericness heuristic for rule patterns.
//!
//! A generic pattern is one broad enough to match fields of several sections:
//! the bare document root (`^form1\[0\]`) or a lone field-type token
//! (`text`, `dropdown`). The conflict resolver strips such patterns when they
//! tie across sections, and the classifier does not count a match by one as
//! explicit detection.
//!
//! The heuristic works on the pattern's *literal form*: the source with a
//! leading `^`, a trailing `$` and backslash escapes of punctuation removed,
//! so `^form1\[0\]` becomes `form1[0]`.

use regex::Regex;
use sectionizer_core::MatchRule;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configurable genericness vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenericityConfig {
    /// Field-type tokens compared case-insensitively against the literal form.
    pub tokens: Vec<String>,
    /// Regexes matched against the literal form (document-root prefixes).
    pub root_patterns: Vec<String>,
}

impl Default for GenericityConfig {
    fn default() -> Self {
        Self {
            tokens: vec!["text".to_string(), "dropdown".to_string()],
            root_patterns: vec![r"^form\d*(\[\d*\])?\.?$".to_string()],
        }
    }
}

/// Compiled form of [`GenericityConfig`].
#[derive(Debug, Clone)]
pub struct GenericMatcher {
    tokens: Vec<String>,
    roots: Vec<Regex>,
}

impl GenericMatcher {
    pub fn from_config(config: &GenericityConfig) -> Result<Self, ConfigError> {
        let roots = config
            .root_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|source| ConfigError::RootPattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            tokens: config.tokens.iter().map(|t| t.to_lowercase()).collect(),
            roots,
        })
    }

    pub fn is_generic(&self, rule: &MatchRule) -> bool {
        self.is_generic_source(rule.source())
    }

    pub fn is_generic_source(&self, source: &str) -> bool {
        let literal = literal_form(source);
        if literal.is_empty() {
            // Matches everything.
            return true;
        }
        let lowered = literal.to_lowercase();
        self.tokens.iter().any(|t| *t == lowered) || self.roots.iter().any(|r| r.is_match(&literal))
    }
}

impl Default for GenericMatcher {
    fn default() -> Self {
        let config = GenericityConfig::default();
        Self {
            tokens: config.tokens,
            roots: config
                .root_patterns
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
        }
    }
}

/// Strip anchors and punctuation escapes from a pattern source.
pub fn literal_form(source: &str) -> String {
    let trimmed = source.trim();
    let trimmed = trimmed.strip_prefix('^').unwrap_or(trimmed);
    let trimmed = match trimmed.strip_suffix('$') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => trimmed,
    };

    let mut out = String::with_capacity(trimmed.len());
    let mut chars = trimmed.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) if next.is_ascii_punctuation() => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_form_strips_anchors_and_escapes() {
        assert_eq!(literal_form(r"^form1\[0\]"), "form1[0]");
        assert_eq!(literal_form(r"^text$"), "text");
        assert_eq!(literal_form(r"Section9\.1-9\.4"), "Section9.1-9.4");
        assert_eq!(literal_form(r"TextField11\[(\d+)\]"), r"TextField11[(\d+)]");
        assert_eq!(literal_form(r"cost\$"), "cost$");
    }

    #[test]
    fn default_heuristic() {
        let g = GenericMatcher::default();
        assert!(g.is_generic_source(r"^form1\[0\]"));
        assert!(g.is_generic_source(r"form1\[0\]\."));
        assert!(g.is_generic_source("form1"));
        assert!(g.is_generic_source("text"));
        assert!(g.is_generic_source("DropDown"));
        assert!(g.is_generic_source("^$"));

        assert!(!g.is_generic_source(r"Section4\[0\]"));
        assert!(!g.is_generic_source(r"^form1\[0\]\.Section4\[0\]"));
        assert!(!g.is_generic_source("TextField11"));
    }

    #[test]
    fn configured_vocabulary() {
        let g = GenericMatcher::from_config(&GenericityConfig {
            tokens: vec!["checkbox".into()],
            root_patterns: vec![r"^#subform\[\d+\]$".into()],
        })
        .unwrap();
        assert!(g.is_generic_source("CheckBox"));
        assert!(g.is_generic_source(r"#subform\[68\]"));
        assert!(!g.is_generic_source("text"));
    }

    #[test]
    fn bad_root_pattern() {
        let err = GenericMatcher::from_config(&GenericityConfig {
            tokens: vec![],
            root_patterns: vec!["(".into()],
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::RootPattern { .. }));
    }
}
