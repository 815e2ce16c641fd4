use thiserror::Error;

pub type Result<T> = std::result::Result<T, DslError>;

#[derive(Debug, Error)]
pub enum DslError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid job: {0}")]
    Invalid(String),

    #[error("unparseable predicate '{expr}': {reason}")]
    Predicate { expr: String, reason: String },

    #[error(transparent)]
    Engine(#[from] lazyflow_core::Error),
}
