//! Model contract with unified fit/predict interface
//!
//! Hyperparameters should be supplied when the model is constructed (not to
//! `fit`) so they are reported through [`Loggable::params`] and end up in the
//! experiment logger.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::loggable::{Loggable, ParamValue, Params};
use crate::Result;

/// A trainable model.
pub trait Model: Loggable {
    /// Input features for both training and prediction.
    type Features;
    /// Target values.
    type Labels;
    /// Prediction output.
    type Predictions;

    /// Train/fit the model.
    ///
    /// # Errors
    ///
    /// Returns an error if training fails.
    fn fit(&mut self, x: &Self::Features, y: Option<&Self::Labels>) -> Result<()>;

    /// Run prediction on a new set.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not fitted or prediction fails.
    fn predict(&self, x: &Self::Features) -> Result<Self::Predictions>;

    /// Processor applied to inputs, if any.
    fn preprocessor(&self) -> Option<&dyn Loggable> {
        None
    }

    /// Processor applied to outputs, if any.
    fn postprocessor(&self) -> Option<&dyn Loggable> {
        None
    }
}

/// Name and hyperparameters shared by model implementations.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperParams {
    model_name: String,
    params: Params,
}

impl HyperParams {
    /// Create an empty hyperparameter set for the named model.
    #[must_use]
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            params: Params::new(),
        }
    }

    /// Add a hyperparameter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add every entry of `params`.
    #[must_use]
    pub fn extend(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    /// Model name.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Hyperparameter mapping.
    #[must_use]
    pub const fn params(&self) -> &Params {
        &self.params
    }

    /// Emit the "created model" log line.
    pub fn announce(&self) {
        info!(model = %self.model_name, hyper_params = ?self.params, "created model");
    }
}

/// Store a model as JSON.
///
/// # Errors
///
/// Returns an error if the file cannot be written or the model cannot be serialized.
pub fn save_model<M: Serialize>(model: &M, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, model)?;
    info!(path = %path.display(), "saved model");
    Ok(())
}

/// Load a model previously stored with [`save_model`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not contain a valid model.
pub fn load_model<M: DeserializeOwned>(path: impl AsRef<Path>) -> Result<M> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Weights {
        bias: f64,
        coef: Vec<f64>,
    }

    #[test]
    fn test_hyper_params_builder() {
        let hp = HyperParams::new("svm")
            .with("kernel", "linear")
            .with("c", 1.0);
        assert_eq!(hp.model_name(), "svm");
        assert_eq!(hp.params().len(), 2);
        assert_eq!(hp.params()["kernel"], ParamValue::from("linear"));
    }

    #[test]
    fn test_save_and_load_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("weights.json");
        let weights = Weights {
            bias: 0.5,
            coef: vec![1.0, -2.0],
        };

        save_model(&weights, &path).unwrap();
        let loaded: Weights = load_model(&path).unwrap();

        assert_eq!(loaded, weights);
    }

    #[test]
    fn test_load_missing_model() {
        let result: Result<Weights> = load_model("/nonexistent/model.json");
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }
}
