//! Error types for exp-runner
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// exp-runner error types
#[derive(Error, Debug)]
pub enum Error {
    /// Logging was requested but no backend was supplied
    #[error("Experimentation system not passed, cannot log experiment\nPass an experiment logger or disable logging with log_experiment(false)")]
    MissingExperimentLogger,

    /// Logging was requested but no experiment name was supplied
    #[error("Experiment name must be specified for the experiment logging system")]
    MissingExperimentName,

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// A logging call was made outside of an active run
    #[error("No active run: call start_run() before logging")]
    NoActiveRun,

    /// A run was started before an experiment was selected
    #[error("No experiment set: call set_experiment() before start_run()")]
    NoExperiment,

    /// Dataset files are missing or the dataset is unknown
    #[error("Dataset {name} with version {version} not found")]
    DatasetNotFound {
        /// Dataset name
        name: String,
        /// Dataset version
        version: String,
    },

    /// Model used before fitting
    #[error("Model {0} is not fitted: call fit() before predict()")]
    NotFitted(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}
