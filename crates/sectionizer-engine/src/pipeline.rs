//! End-to-end run: resolve, classify, validate, heal, validate again.

use sectionizer_core::{ClassifiedField, ExpectationTable, RawField, RuleSet};
use tracing::info;

use crate::classifier::{Classification, ClassificationDiagnostic, FieldClusterer};
use crate::config::SectionizerConfig;
use crate::error::ConfigError;
use crate::generic::GenericMatcher;
use crate::healer::{HealingMove, heal};
use crate::resolver::{RemovedRule, resolve};
use crate::validator::{ValidationResult, validate};

/// Everything a run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Rules after conflict resolution.
    pub rules: RuleSet,
    pub removed: Vec<RemovedRule>,
    pub diagnostics: Vec<ClassificationDiagnostic>,
    /// Validation of the classifier's output, before healing.
    pub initial: ValidationResult,
    pub healing_moves: Vec<HealingMove>,
    /// Validation after healing. Equal to `initial` when healing was skipped.
    pub validation: ValidationResult,
    /// One entry per input field, in input order.
    pub fields: Vec<ClassifiedField>,
}

impl PipelineReport {
    pub fn healed(&self) -> bool {
        !self.healing_moves.is_empty()
    }
}

/// A configured pipeline. Holds no rules; each run takes its own set.
#[derive(Debug, Clone)]
pub struct Sectionizer {
    config: SectionizerConfig,
    generic: GenericMatcher,
}

impl Sectionizer {
    pub fn new(config: SectionizerConfig) -> Result<Self, ConfigError> {
        config.check()?;
        let generic = GenericMatcher::from_config(&config.genericity)?;
        Ok(Self { config, generic })
    }

    pub fn config(&self) -> &SectionizerConfig {
        &self.config
    }

    pub fn generic(&self) -> &GenericMatcher {
        &self.generic
    }

    /// Resolve and classify only.
    pub fn classify(
        &self,
        fields: &[RawField],
        rules: RuleSet,
    ) -> (RuleSet, Vec<RemovedRule>, Classification) {
        let resolved = resolve(rules, &self.generic);
        let classification = FieldClusterer::new(&resolved.rules, &self.generic)
            .parallel_threshold(self.config.parallel_threshold)
            .classify(fields);
        (resolved.rules, resolved.removed, classification)
    }

    pub fn run(
        &self,
        fields: &[RawField],
        rules: RuleSet,
        expectations: &ExpectationTable,
    ) -> PipelineReport {
        let (rules, removed, classification) = self.classify(fields, rules);
        let initial = validate(&classification.fields, expectations, &self.config.validation);

        let (fields, healing_moves, validation) = if !self.config.healing.enabled {
            info!("healing disabled");
            (classification.fields, Vec::new(), initial.clone())
        } else if initial.success {
            info!("validation passed; healing skipped");
            (classification.fields, Vec::new(), initial.clone())
        } else {
            let healed = heal(
                classification.fields,
                &initial,
                &rules,
                &self.generic,
                &self.config.healing,
            );
            let after = validate(&healed.fields, expectations, &self.config.validation);
            (healed.fields, healed.moves, after)
        };

        info!(
            fields = fields.len(),
            removed = removed.len(),
            moved = healing_moves.len(),
            alignment = validation.alignment_percentage,
            success = validation.success,
            "pipeline complete"
        );

        PipelineReport {
            rules,
            removed,
            diagnostics: classification.diagnostics,
            initial,
            healing_moves,
            validation,
            fields,
        }
    }
}
