//! Experiment Store - in-memory storage for experiment tracking data
//!
//! Lookups by ID use hash maps; metrics are kept in insertion order and
//! sorted by step on query.

use std::collections::HashMap;

use super::{ArtifactRecord, ExperimentRecord, MetricRecord, ParamRecord, RunRecord};
use crate::loggable::{Metrics, Params};

/// In-memory store for experiments, runs and everything logged to them.
#[derive(Debug, Default)]
pub struct ExperimentStore {
    experiments: HashMap<String, ExperimentRecord>,
    runs: HashMap<String, RunRecord>,
    params: Vec<ParamRecord>,
    metrics: Vec<MetricRecord>,
    artifacts: Vec<ArtifactRecord>,
}

impl ExperimentStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
            && self.runs.is_empty()
            && self.params.is_empty()
            && self.metrics.is_empty()
            && self.artifacts.is_empty()
    }

    /// Number of experiments.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Number of runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Number of metric points.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// Add (or replace) an experiment.
    pub fn add_experiment(&mut self, experiment: ExperimentRecord) {
        self.experiments
            .insert(experiment.experiment_id().to_string(), experiment);
    }

    /// Get an experiment by ID.
    #[must_use]
    pub fn get_experiment(&self, experiment_id: &str) -> Option<&ExperimentRecord> {
        self.experiments.get(experiment_id)
    }

    /// Find an experiment by name.
    #[must_use]
    pub fn find_experiment_by_name(&self, name: &str) -> Option<&ExperimentRecord> {
        self.experiments.values().find(|e| e.name() == name)
    }

    /// Add (or replace) a run.
    pub fn add_run(&mut self, run: RunRecord) {
        self.runs.insert(run.run_id().to_string(), run);
    }

    /// Get a run by ID.
    #[must_use]
    pub fn get_run(&self, run_id: &str) -> Option<&RunRecord> {
        self.runs.get(run_id)
    }

    /// Get a run by ID for a status update.
    pub fn get_run_mut(&mut self, run_id: &str) -> Option<&mut RunRecord> {
        self.runs.get_mut(run_id)
    }

    /// All runs of an experiment, oldest first.
    #[must_use]
    pub fn get_runs_for_experiment(&self, experiment_id: &str) -> Vec<&RunRecord> {
        let mut runs: Vec<&RunRecord> = self
            .runs
            .values()
            .filter(|run| run.experiment_id() == experiment_id)
            .collect();
        runs.sort_by_key(|run| (run.started_at(), run.run_id().to_string()));
        runs
    }

    /// Set a run parameter, replacing any earlier value for the key.
    pub fn set_param(&mut self, param: ParamRecord) {
        if let Some(existing) = self
            .params
            .iter_mut()
            .find(|p| p.run_id() == param.run_id() && p.key() == param.key())
        {
            *existing = param;
        } else {
            self.params.push(param);
        }
    }

    /// Parameters of a run.
    #[must_use]
    pub fn get_params_for_run(&self, run_id: &str) -> Params {
        self.params
            .iter()
            .filter(|p| p.run_id() == run_id)
            .map(|p| (p.key().to_string(), p.value().clone()))
            .collect()
    }

    /// Append a metric point.
    pub fn add_metric(&mut self, metric: MetricRecord) {
        self.metrics.push(metric);
    }

    /// Points of one metric of a run, ordered by step.
    ///
    /// Points sharing a step keep their logging order.
    #[must_use]
    pub fn get_metrics_for_run(&self, run_id: &str, key: &str) -> Vec<MetricRecord> {
        let mut metrics: Vec<MetricRecord> = self
            .metrics
            .iter()
            .filter(|m| m.run_id() == run_id && m.key() == key)
            .cloned()
            .collect();

        metrics.sort_by_key(MetricRecord::step);

        metrics
    }

    /// All metric points of a run in logging order.
    #[must_use]
    pub fn get_all_metrics_for_run(&self, run_id: &str) -> Vec<&MetricRecord> {
        self.metrics.iter().filter(|m| m.run_id() == run_id).collect()
    }

    /// Latest value of every metric of a run (highest step, last logged wins).
    #[must_use]
    pub fn latest_metrics(&self, run_id: &str) -> Metrics {
        let mut latest: HashMap<&str, &MetricRecord> = HashMap::new();
        for metric in self.metrics.iter().filter(|m| m.run_id() == run_id) {
            match latest.get(metric.key()) {
                Some(current) if current.step() > metric.step() => {}
                _ => {
                    latest.insert(metric.key(), metric);
                }
            }
        }
        latest
            .into_iter()
            .map(|(key, m)| (key.to_string(), m.value()))
            .collect()
    }

    /// Step to use for the next point of `key` when none is given.
    #[must_use]
    pub fn next_step(&self, run_id: &str, key: &str) -> u64 {
        self.metrics
            .iter()
            .filter(|m| m.run_id() == run_id && m.key() == key)
            .map(|m| m.step().saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    /// Record an artifact.
    pub fn add_artifact(&mut self, artifact: ArtifactRecord) {
        self.artifacts.push(artifact);
    }

    /// Artifacts of a run in logging order.
    #[must_use]
    pub fn get_artifacts_for_run(&self, run_id: &str) -> Vec<&ArtifactRecord> {
        self.artifacts
            .iter()
            .filter(|a| a.run_id() == run_id)
            .collect()
    }
}
