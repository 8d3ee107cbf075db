use thiserror::Error;

#[derive(Debug, Error)]
pub enum HyperceptionError {
    #[error("Optimizer '{0}' not supported")]
    UnsupportedOptimizer(String),

    #[error("Missing hyperparameter '{0}'")]
    MissingHparam(String),

    #[error("Hyperparameter '{key}' has the wrong type: expected {expected}")]
    HparamType { key: String, expected: &'static str },

    #[error("Unknown activation '{0}'")]
    UnknownActivation(String),

    #[error("Invalid input shape {0:?}: expected (channels, height, width) with positive dims")]
    InvalidShape(Vec<usize>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HyperceptionError>;
