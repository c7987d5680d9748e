use thiserror::Error;

/// Reasons a single rule record cannot be turned into a [`MatchRule`](crate::MatchRule).
///
/// All of these are fatal for the offending rule only.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("pattern /{pattern}/ does not compile: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown regex flag '{0}'")]
    UnknownFlag(char),

    #[error("unknown entry index strategy: {0}")]
    UnknownStrategy(String),

    #[error("bad arguments for entry index strategy {kind}: {reason}")]
    StrategyArgs { kind: String, reason: String },

    #[error("confidence {0} outside [0, 1]")]
    ConfidenceRange(f32),

    #[error("section must be >= 1, got {0}")]
    InvalidSection(u32),

    #[error("rule declares section {declared} but is listed under section {listed}")]
    SectionMismatch { declared: u32, listed: u32 },
}

/// Failure to derive an entry index from a successful match.
///
/// Recoverable: the classifier marks the field unclassified and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryIndexError {
    #[error("capture group {0} did not participate in the match")]
    MissingGroup(usize),

    #[error("capture group {group} is not an integer: {value:?}")]
    NotNumeric { group: usize, value: String },

    #[error("capture group {group} value {value} with offset {offset} is negative")]
    Negative { group: usize, value: i64, offset: i64 },

    #[error("capture group {group} value {value:?} has no lookup entry")]
    NoLookup { group: usize, value: String },
}
