//! Evaluation results - flat metric bags and per-step series

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::loggable::Metrics;

/// Metric values indexed by step (epoch, threshold index, ...).
///
/// Steps iterate in ascending order. Logging each step separately lets the
/// tracking backend draw a curve per metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    steps: BTreeMap<u64, Metrics>,
}

impl StepMetrics {
    /// Create an empty series.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one metric value at a step.
    pub fn insert(&mut self, step: u64, key: impl Into<String>, value: f64) {
        self.steps.entry(step).or_default().insert(key.into(), value);
    }

    /// Record a metric series starting at step 0 (e.g. per-epoch loss).
    #[must_use]
    pub fn with_series(mut self, key: &str, values: &[f64]) -> Self {
        for (step, value) in (0u64..).zip(values) {
            self.insert(step, key, *value);
        }
        self
    }

    /// Steps in ascending order.
    pub fn steps(&self) -> impl Iterator<Item = u64> + '_ {
        self.steps.keys().copied()
    }

    /// Metric values recorded at `step` (empty if the step is unknown).
    #[must_use]
    pub fn metrics_at(&self, step: u64) -> Metrics {
        self.steps.get(&step).cloned().unwrap_or_default()
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if no step was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Values of the last step.
    #[must_use]
    pub fn last(&self) -> Metrics {
        self.steps
            .last_key_value()
            .map(|(_, m)| m.clone())
            .unwrap_or_default()
    }
}

/// Output of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EvaluationMetrics {
    /// One value per metric.
    Flat(Metrics),
    /// One value per metric and step.
    Steps(StepMetrics),
}

impl EvaluationMetrics {
    /// Build a flat result from `(name, value)` pairs.
    #[must_use]
    pub fn flat<K: Into<String>>(pairs: impl IntoIterator<Item = (K, f64)>) -> Self {
        Self::Flat(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Flat view of the metrics; for a step series, the values of the last step.
    #[must_use]
    pub fn metrics(&self) -> Metrics {
        match self {
            Self::Flat(metrics) => metrics.clone(),
            Self::Steps(steps) => steps.last(),
        }
    }

    /// Look up one metric in the flat view.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<f64> {
        match self {
            Self::Flat(metrics) => metrics.get(key).copied(),
            Self::Steps(steps) => steps.last().get(key).copied(),
        }
    }

    /// The step series, if this is one.
    #[must_use]
    pub const fn as_steps(&self) -> Option<&StepMetrics> {
        match self {
            Self::Flat(_) => None,
            Self::Steps(steps) => Some(steps),
        }
    }
}

impl From<StepMetrics> for EvaluationMetrics {
    fn from(steps: StepMetrics) -> Self {
        Self::Steps(steps)
    }
}

impl From<Metrics> for EvaluationMetrics {
    fn from(metrics: Metrics) -> Self {
        Self::Flat(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_metrics_ordering() {
        let mut steps = StepMetrics::new();
        steps.insert(2, "loss", 0.2);
        steps.insert(0, "loss", 0.9);
        steps.insert(1, "loss", 0.5);

        assert_eq!(steps.steps().collect::<Vec<_>>(), vec![0, 1, 2]);
        // Restartable
        assert_eq!(steps.steps().count(), 3);
        assert_eq!(steps.metrics_at(1)["loss"], 0.5);
        assert!(steps.metrics_at(7).is_empty());
    }

    #[test]
    fn test_with_series() {
        let steps = StepMetrics::new()
            .with_series("loss", &[0.9, 0.4])
            .with_series("accuracy", &[0.6, 0.8]);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps.metrics_at(0).len(), 2);
        assert_eq!(steps.last()["accuracy"], 0.8);
    }

    #[test]
    fn test_flat_metrics_lookup() {
        let result = EvaluationMetrics::flat([("accuracy", 0.95), ("f1", 0.9)]);
        assert_eq!(result.get("accuracy"), Some(0.95));
        assert_eq!(result.get("recall"), None);
        assert!(result.as_steps().is_none());
    }

    #[test]
    fn test_step_result_flat_view_is_last_step() {
        let result = EvaluationMetrics::from(StepMetrics::new().with_series("loss", &[1.0, 0.3]));
        assert_eq!(result.get("loss"), Some(0.3));
        assert_eq!(result.as_steps().map(StepMetrics::len), Some(2));
    }
}
