//! Model evaluation
//!
//! An [`Evaluator`] compares predictions against ground truth and returns
//! [`EvaluationMetrics`], either a flat bag or a per-step series.

mod metrics;

pub use metrics::{EvaluationMetrics, StepMetrics};

use std::time::Instant;

use tracing::info;

use crate::loggable::Loggable;
use crate::Result;

/// Logic for model and results evaluation.
pub trait Evaluator: Loggable {
    /// Ground truth type.
    type Labels;
    /// Prediction type produced by the evaluated model.
    type Predictions;

    /// Evaluate `predictions` against `ground_truth`.
    ///
    /// Ground truth is optional: some predictions carry their own gold
    /// annotations (e.g. tagged sentences).
    ///
    /// # Errors
    ///
    /// Returns an error if the inputs are inconsistent (e.g. length mismatch).
    fn evaluate(
        &self,
        ground_truth: Option<&Self::Labels>,
        predictions: &Self::Predictions,
    ) -> Result<EvaluationMetrics>;
}

/// Logs how long a scope took when dropped.
///
/// ```rust
/// use exp_runner::evaluation::TimeTook;
///
/// {
///     let _timer = TimeTook::new("sample");
///     let _v: Vec<u64> = (0..1000).collect();
/// }
/// ```
#[derive(Debug)]
pub struct TimeTook {
    description: String,
    start: Instant,
}

impl TimeTook {
    /// Start timing a block.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for TimeTook {
    fn drop(&mut self) {
        info!(
            block = %self.description,
            elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0,
            "time took"
        );
    }
}
