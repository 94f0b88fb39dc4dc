use bid_types::BatchError;
use thiserror::Error;

/// Invalid per-run configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Alert gate must lie in [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("Weight '{name}' must be a non-negative finite number, got {value}")]
    InvalidWeight { name: String, value: f64 },

    #[error("Risk weights must sum to 1.0, got {0:.4}")]
    WeightSum(f64),

    #[error("Tolerance '{name}' must be positive and finite, got {value}")]
    InvalidTolerance { name: String, value: f64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid document batch: {0}")]
    Batch(#[from] BatchError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
