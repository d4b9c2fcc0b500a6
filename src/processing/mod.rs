//! Pre- and post-processing of model inputs and outputs

use crate::loggable::{short_type_name, Loggable, Metrics, ParamValue, Params};
use crate::Result;

/// Transforms samples before they reach a model or after it produced them.
///
/// Processors attached to a [`Model`](crate::model::Model) are logged by the
/// runner under the `Preprocessor` / `Postprocessor` roles.
pub trait DataProcessor<T>: Loggable {
    /// Process a single sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the sample cannot be processed.
    fn apply(&self, sample: T) -> Result<T>;

    /// Process a batch of samples.
    ///
    /// # Errors
    ///
    /// Returns the first per-sample error.
    fn apply_batch(&self, batch: Vec<T>) -> Result<Vec<T>> {
        batch.into_iter().map(|sample| self.apply(sample)).collect()
    }
}

/// Processor that returns its input unchanged.
#[derive(Debug, Clone, Default)]
pub struct EmptyProcessor {
    name: Option<String>,
}

impl EmptyProcessor {
    /// Create an identity processor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an identity processor with an explicit name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

impl Loggable for EmptyProcessor {
    fn name(&self) -> &str {
        self.name
            .as_deref()
            .unwrap_or_else(|| short_type_name::<Self>())
    }

    fn params(&self) -> Params {
        let mut params = Params::new();
        params.insert("processor_name".into(), ParamValue::from(self.name()));
        params
    }

    fn metrics(&self) -> Metrics {
        Metrics::new()
    }
}

impl<T> DataProcessor<T> for EmptyProcessor {
    fn apply(&self, sample: T) -> Result<T> {
        Ok(sample)
    }
}

/// Lowercases string samples (e.g. tokens before lookup).
#[derive(Debug, Clone, Copy, Default)]
pub struct LowercaseProcessor;

impl Loggable for LowercaseProcessor {
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    fn params(&self) -> Params {
        let mut params = Params::new();
        params.insert("processor_name".into(), ParamValue::from(self.name()));
        params
    }

    fn metrics(&self) -> Metrics {
        Metrics::new()
    }
}

impl DataProcessor<String> for LowercaseProcessor {
    fn apply(&self, sample: String) -> Result<String> {
        Ok(sample.to_lowercase())
    }
}
