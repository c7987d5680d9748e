//! Sectionizer engine: rule loading, conflict resolution, classification,
//! validation against expected counts, and healing.

pub mod classifier;
pub mod config;
mod error;
pub mod generic;
pub mod healer;
pub mod pipeline;
pub mod report;
pub mod repository;
pub mod resolver;
pub mod validator;

pub use classifier::{Classification, ClassificationDiagnostic, FieldClusterer};
pub use config::{HealingOptions, SectionizerConfig, ValidationOptions};
pub use error::{ConfigError, RepositoryError};
pub use generic::{GenericMatcher, GenericityConfig};
pub use healer::{HealOutcome, HealingMove, heal};
pub use pipeline::{PipelineReport, Sectionizer};
pub use repository::{LoadedRules, RejectedRule};
pub use resolver::{RemovedRule, ResolveOutcome, resolve};
pub use validator::{DeviationStatus, SectionDeviation, ValidationResult, validate};
