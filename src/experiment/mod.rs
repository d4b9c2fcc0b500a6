//! Experiment Tracking Schema
//!
//! Records kept by the local tracking backend.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N)
//!                              │
//!                              ├──< ParamRecord (N)  [last write wins]
//!                              ├──< MetricRecord (N) [time-series]
//!                              └──< ArtifactRecord (N) [CAS]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use exp_runner::experiment::{ExperimentRecord, ExperimentStore, MetricRecord, RunRecord, RunStatus};
//!
//! let mut store = ExperimentStore::new();
//! let experiment = ExperimentRecord::new("exp-001", "iris-svm");
//!
//! let mut run = RunRecord::new("run-001", experiment.experiment_id());
//! run.start();
//!
//! for epoch in 0..3 {
//!     store.add_metric(MetricRecord::new(run.run_id(), "loss", epoch, 1.0 / (epoch as f64 + 1.0)));
//! }
//!
//! run.complete(RunStatus::Success);
//! assert_eq!(store.get_metrics_for_run("run-001", "loss").len(), 3);
//! ```

mod artifact_record;
mod experiment_record;
mod metric_record;
mod param_record;
mod run_record;
mod store;

pub use artifact_record::{cas_hash, ArtifactRecord};
pub use experiment_record::ExperimentRecord;
pub use metric_record::MetricRecord;
pub use param_record::ParamRecord;
pub use run_record::{RunRecord, RunStatus};
pub use store::ExperimentStore;
