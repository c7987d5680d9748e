//! Core types for the sectionizer: match rules, raw and classified fields,
//! expected-count tables and entry-index strategies.

pub mod entry;
mod error;
pub mod expectation;
pub mod field;
pub mod rule;

pub use entry::{EntryIndexSpec, EntryIndexStrategy};
pub use error::{EntryIndexError, RuleError};
pub use expectation::{ExpectationTable, SectionExpectation};
pub use field::{ClassifiedField, RawField, UNCLASSIFIED};
pub use rule::{MatchRule, RuleDocument, RuleRecord, RuleSet};
