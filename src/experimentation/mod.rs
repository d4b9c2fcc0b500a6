//! Experiment logging backends
//!
//! [`Experimentation`] is the seam between the runner and wherever runs are
//! recorded. [`LocalExperimentation`] records into an in-memory
//! [`ExperimentStore`](crate::experiment::ExperimentStore) and optionally
//! mirrors every run to a local tracking directory.

mod local;

pub use local::LocalExperimentation;

use std::path::Path;

use crate::evaluation::EvaluationMetrics;
use crate::loggable::{Metrics, ParamValue, Params};
use crate::Result;

/// Experiment logging system (local file store, tracking server, ...).
pub trait Experimentation {
    /// Backend name, used in log messages.
    fn name(&self) -> &str;

    /// Select (or create) the experiment subsequent runs belong to.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot create the experiment.
    fn set_experiment(&mut self, name: &str, artifact_location: Option<&Path>) -> Result<()>;

    /// Start a new run.
    ///
    /// # Errors
    ///
    /// Returns an error if no experiment is set or the run cannot be created.
    fn start_run(&mut self) -> Result<()>;

    /// End the active run.
    ///
    /// # Errors
    ///
    /// Returns an error if the run cannot be finalized.
    fn end_run(&mut self) -> Result<()>;

    /// Log one parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no active run.
    fn log_param(&mut self, key: &str, value: ParamValue) -> Result<()>;

    /// Log multiple parameters.
    ///
    /// # Errors
    ///
    /// Returns the first [`log_param`](Self::log_param) error.
    fn log_params(&mut self, params: &Params) -> Result<()> {
        for (key, value) in params {
            self.log_param(key, value.clone())?;
        }
        Ok(())
    }

    /// Log a metric value, optionally at an explicit step.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no active run.
    fn log_metric(&mut self, key: &str, value: f64, step: Option<u64>) -> Result<()>;

    /// Log multiple metrics at once.
    ///
    /// # Errors
    ///
    /// Returns the first [`log_metric`](Self::log_metric) error.
    fn log_metrics(&mut self, metrics: &Metrics, step: Option<u64>) -> Result<()> {
        for (key, value) in metrics {
            self.log_metric(key, *value, step)?;
        }
        Ok(())
    }

    /// Log an encoded PNG image under `title`.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be stored.
    fn log_image(&mut self, title: &str, png: &[u8]) -> Result<()>;

    /// Log a local file as an artifact, under `artifact_path` if given.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or stored.
    fn log_artifact(&mut self, local_path: &Path, artifact_path: Option<&str>) -> Result<()>;

    /// Log every file below a local directory as artifacts.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read or a file cannot be stored.
    fn log_artifacts(&mut self, local_dir: &Path, artifact_path: Option<&str>) -> Result<()>;

    /// Log the flat metrics of an evaluation result in one batch.
    ///
    /// # Errors
    ///
    /// Returns the [`log_metrics`](Self::log_metrics) error.
    fn log_evaluation_result(&mut self, result: &EvaluationMetrics) -> Result<()> {
        self.log_metrics(&result.metrics(), None)
    }
}
