//! Param Record - logged run parameter

use serde::{Deserialize, Serialize};

use crate::loggable::ParamValue;

/// One parameter of a run. Logging a key twice keeps the last value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParamRecord {
    run_id: String,
    key: String,
    value: ParamValue,
}

impl ParamRecord {
    /// Create a parameter record.
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, value: ParamValue) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            value,
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parameter key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the parameter value.
    #[must_use]
    pub const fn value(&self) -> &ParamValue {
        &self.value
    }
}
