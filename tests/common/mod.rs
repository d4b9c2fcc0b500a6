//! Mock collaborators shared by the integration tests

#![allow(dead_code)]

use std::cell::Cell;
use std::path::Path;

use exp_runner::data::{DataLoader, DatasetSpec};
use exp_runner::evaluation::{EvaluationMetrics, Evaluator};
use exp_runner::experimentation::Experimentation;
use exp_runner::loggable::{short_type_name, Loggable, Metrics, ParamValue, Params};
use exp_runner::model::Model;
use exp_runner::processing::EmptyProcessor;
use exp_runner::{Error, Result};

// =============================================================================
// Model
// =============================================================================

/// Model that echoes its input and counts calls.
#[derive(Default)]
pub struct MockModel {
    pub params: Params,
    pub fit_calls: usize,
    pub predict_calls: Cell<usize>,
    pub fail_fit: bool,
    pub preprocessor: Option<EmptyProcessor>,
}

impl MockModel {
    pub fn linear() -> Self {
        let mut params = Params::new();
        params.insert("kernel".into(), ParamValue::from("linear"));
        Self {
            params,
            ..Self::default()
        }
    }
}

impl Loggable for MockModel {
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    fn params(&self) -> Params {
        self.params.clone()
    }

    fn metrics(&self) -> Metrics {
        Metrics::new()
    }
}

impl Model for MockModel {
    type Features = Vec<f64>;
    type Labels = Vec<f64>;
    type Predictions = Vec<f64>;

    fn fit(&mut self, _x: &Vec<f64>, _y: Option<&Vec<f64>>) -> Result<()> {
        self.fit_calls += 1;
        if self.fail_fit {
            return Err(Error::Other("fit exploded".into()));
        }
        Ok(())
    }

    fn predict(&self, x: &Vec<f64>) -> Result<Vec<f64>> {
        self.predict_calls.set(self.predict_calls.get() + 1);
        Ok(x.clone())
    }

    fn preprocessor(&self) -> Option<&dyn Loggable> {
        self.preprocessor.as_ref().map(|p| p as &dyn Loggable)
    }
}

// =============================================================================
// DataLoader
// =============================================================================

pub struct MockDataLoader {
    spec: DatasetSpec,
}

impl MockDataLoader {
    pub fn iris() -> Self {
        Self {
            spec: DatasetSpec::new("iris", "1"),
        }
    }
}

impl Loggable for MockDataLoader {
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    fn params(&self) -> Params {
        self.spec.params()
    }

    fn metrics(&self) -> Metrics {
        Metrics::new()
    }
}

impl DataLoader for MockDataLoader {
    type Dataset = (Vec<f64>, Vec<f64>);

    fn download_dataset(&self) -> Result<()> {
        Ok(())
    }

    fn get_dataset(&self) -> Result<Self::Dataset> {
        Ok((vec![1.0, 2.0], vec![1.0, 2.0]))
    }
}

// =============================================================================
// Evaluator
// =============================================================================

/// Evaluator returning a fixed result and counting calls.
pub struct MockEvaluator {
    pub result: EvaluationMetrics,
    pub calls: Cell<usize>,
    pub fail: bool,
}

impl MockEvaluator {
    pub fn returning(result: EvaluationMetrics) -> Self {
        Self {
            result,
            calls: Cell::new(0),
            fail: false,
        }
    }

    pub fn accuracy(value: f64) -> Self {
        Self::returning(EvaluationMetrics::flat([("accuracy", value)]))
    }
}

impl Loggable for MockEvaluator {
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    fn params(&self) -> Params {
        Params::new()
    }

    fn metrics(&self) -> Metrics {
        Metrics::new()
    }
}

impl Evaluator for MockEvaluator {
    type Labels = Vec<f64>;
    type Predictions = Vec<f64>;

    fn evaluate(&self, _truth: Option<&Vec<f64>>, _p: &Vec<f64>) -> Result<EvaluationMetrics> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(Error::InvalidInput("evaluation exploded".into()));
        }
        Ok(self.result.clone())
    }
}

// =============================================================================
// Experimentation
// =============================================================================

/// One call received by [`RecordingExperimentation`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetExperiment(String),
    StartRun,
    EndRun,
    Param(String, ParamValue),
    Params(Params),
    Metric(String, f64, Option<u64>),
    Metrics(Metrics, Option<u64>),
    Image(String),
    Artifact(String),
}

/// Backend that records every call in order.
#[derive(Default)]
pub struct RecordingExperimentation {
    pub calls: Vec<Call>,
}

impl RecordingExperimentation {
    /// All logged parameters, later writes winning.
    pub fn logged_params(&self) -> Params {
        let mut params = Params::new();
        for call in &self.calls {
            match call {
                Call::Param(k, v) => {
                    params.insert(k.clone(), v.clone());
                }
                Call::Params(batch) => params.extend(batch.clone()),
                _ => {}
            }
        }
        params
    }

    /// Non-empty metric batches in call order.
    pub fn metric_batches(&self) -> Vec<(Metrics, Option<u64>)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Metrics(m, step) if !m.is_empty() => Some((m.clone(), *step)),
                _ => None,
            })
            .collect()
    }

    /// Number of times `key` was logged as a metric.
    pub fn metric_count(&self, key: &str) -> usize {
        self.calls
            .iter()
            .map(|call| match call {
                Call::Metric(k, _, _) => usize::from(k == key),
                Call::Metrics(m, _) => usize::from(m.contains_key(key)),
                _ => 0,
            })
            .sum()
    }
}

impl Experimentation for RecordingExperimentation {
    fn name(&self) -> &str {
        "Recording"
    }

    fn set_experiment(&mut self, name: &str, _artifact_location: Option<&Path>) -> Result<()> {
        self.calls.push(Call::SetExperiment(name.to_string()));
        Ok(())
    }

    fn start_run(&mut self) -> Result<()> {
        self.calls.push(Call::StartRun);
        Ok(())
    }

    fn end_run(&mut self) -> Result<()> {
        self.calls.push(Call::EndRun);
        Ok(())
    }

    fn log_param(&mut self, key: &str, value: ParamValue) -> Result<()> {
        self.calls.push(Call::Param(key.to_string(), value));
        Ok(())
    }

    fn log_params(&mut self, params: &Params) -> Result<()> {
        self.calls.push(Call::Params(params.clone()));
        Ok(())
    }

    fn log_metric(&mut self, key: &str, value: f64, step: Option<u64>) -> Result<()> {
        self.calls.push(Call::Metric(key.to_string(), value, step));
        Ok(())
    }

    fn log_metrics(&mut self, metrics: &Metrics, step: Option<u64>) -> Result<()> {
        self.calls.push(Call::Metrics(metrics.clone(), step));
        Ok(())
    }

    fn log_image(&mut self, title: &str, _png: &[u8]) -> Result<()> {
        self.calls.push(Call::Image(title.to_string()));
        Ok(())
    }

    fn log_artifact(&mut self, local_path: &Path, _artifact_path: Option<&str>) -> Result<()> {
        self.calls
            .push(Call::Artifact(local_path.display().to_string()));
        Ok(())
    }

    fn log_artifacts(&mut self, local_dir: &Path, _artifact_path: Option<&str>) -> Result<()> {
        self.calls.push(Call::Artifact(local_dir.display().to_string()));
        Ok(())
    }
}
