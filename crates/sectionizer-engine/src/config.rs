//! Run configuration.
//!
//! Every member has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! {
//!   "validation": { "strict": false, "ignoreSections": [30] },
//!   "healing": { "confidenceThreshold": 0.75 },
//!   "genericity": { "tokens": ["text", "dropdown"] },
//!   "parallelThreshold": 1024
//! }
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::classifier::DEFAULT_PARALLEL_THRESHOLD;
use crate::error::ConfigError;
use crate::generic::GenericityConfig;

/// Default tolerance in percent.
pub const DEFAULT_MAX_DEVIATION_PERCENT: f64 = 30.0;
/// Tolerance in percent when `strict` is set.
pub const STRICT_MAX_DEVIATION_PERCENT: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationOptions {
    pub strict: bool,
    /// Overrides the 30% (strict: 10%) tolerance.
    pub max_deviation_percent: Option<f64>,
    /// A deviation must exceed this many fields to count, whatever its percentage.
    pub min_absolute_deviation: u32,
    pub ignore_sections: BTreeSet<u32>,
    /// Defaults to `!strict`. When set, oversized sections are still reported
    /// but do not count against alignment or success.
    pub ignore_overflow_sections: Option<bool>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            strict: false,
            max_deviation_percent: None,
            min_absolute_deviation: 2,
            ignore_sections: BTreeSet::new(),
            ignore_overflow_sections: None,
        }
    }
}

impl ValidationOptions {
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    pub fn max_deviation_percent(&self) -> f64 {
        self.max_deviation_percent.unwrap_or(if self.strict {
            STRICT_MAX_DEVIATION_PERCENT
        } else {
            DEFAULT_MAX_DEVIATION_PERCENT
        })
    }

    pub fn ignores_overflow(&self) -> bool {
        self.ignore_overflow_sections.unwrap_or(!self.strict)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealingOptions {
    pub enabled: bool,
    /// Assignments below this confidence are eligible for healing even when
    /// they came from a section-specific rule.
    pub confidence_threshold: f32,
}

impl Default for HealingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            confidence_threshold: 0.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionizerConfig {
    pub validation: ValidationOptions,
    pub healing: HealingOptions,
    pub genericity: GenericityConfig,
    /// Field batches larger than this are classified in parallel when the
    /// `parallel` feature is enabled.
    pub parallel_threshold: usize,
}

impl Default for SectionizerConfig {
    fn default() -> Self {
        Self {
            validation: ValidationOptions::default(),
            healing: HealingOptions::default(),
            genericity: GenericityConfig::default(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl SectionizerConfig {
    /// Parse a config document. The document and its sections must be JSON objects;
    /// serde would otherwise read an array positionally into a defaulted struct.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let Some(members) = value.as_object() else {
            return Err(ConfigError::NotAnObject("config".into()));
        };
        for key in ["validation", "healing", "genericity"] {
            if let Some(member) = members.get(key)
                && !member.is_object()
            {
                return Err(ConfigError::NotAnObject(key.into()));
            }
        }
        let config: Self = serde_json::from_value(value)?;
        config.check()?;
        Ok(config)
    }

    /// Reject values that would make a run meaningless.
    pub fn check(&self) -> Result<(), ConfigError> {
        if let Some(p) = self.validation.max_deviation_percent
            && (p.is_nan() || p <= 0.0)
        {
            return Err(ConfigError::DeviationPercent(p));
        }
        let t = self.healing.confidence_threshold;
        if !(0.0..=1.0).contains(&t) {
            return Err(ConfigError::HealingThreshold(t));
        }
        Ok(())
    }
}
