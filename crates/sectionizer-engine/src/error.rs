use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("rule document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no usable rules in any section ({rejected} rejected)")]
    NoUsableRules { rejected: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} must be a JSON object")]
    NotAnObject(String),

    #[error("genericity root pattern /{pattern}/ does not compile: {source}")]
    RootPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("maxDeviationPercent must be positive, got {0}")]
    DeviationPercent(f64),

    #[error("healing confidenceThreshold {0} outside [0, 1]")]
    HealingThreshold(f32),
}
