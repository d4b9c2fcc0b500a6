//! # exp-runner: Experiment Runner Scaffold
//!
//! **Version**: 0.1.0
//!
//! exp-runner binds a [`Model`](model::Model), a
//! [`DataLoader`](data::DataLoader), an [`Evaluator`](evaluation::Evaluator)
//! and an [`Experimentation`](experimentation::Experimentation) backend, drives
//! fit → predict → evaluate, and forwards the parameters and metrics of every
//! collaborator to the backend.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Genchi Genbutsu**: every run records the exact dataset version and hyperparameters
//! - **Poka-Yoke safety**: a logged run cannot be built without a backend and experiment name
//! - **Jidoka**: collaborator errors stop the run immediately
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use exp_runner::data::DataLoader;
//! use exp_runner::experimentation::LocalExperimentation;
//! use exp_runner::runner::ExperimentRunner;
//! use exp_runner::samples::iris::{CentroidConfig, IrisCentroidModel, IrisDataLoader, IrisEvaluator};
//!
//! let loader = IrisDataLoader::new("data");
//! let data = loader.get_dataset()?;
//! let mut model = IrisCentroidModel::new(CentroidConfig::default());
//! let mut tracker = LocalExperimentation::open("mlruns")?;
//!
//! let mut runner = ExperimentRunner::builder(&mut model, &data.x_train, &data.x_test, &loader, &IrisEvaluator)
//!     .y_train(&data.y_train)
//!     .y_test(&data.y_test)
//!     .experiment_logger(&mut tracker)
//!     .experiment_name("iris")
//!     .build()?;
//!
//! let metrics = runner.run()?;
//! println!("accuracy: {:?}", metrics.get("accuracy"));
//! runner.end_run()?;
//! # Ok::<(), exp_runner::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod experiment;
pub mod experimentation;
pub mod loggable;
pub mod model;
pub mod processing;
pub mod runner;
pub mod samples;

pub use error::{Error, Result};
pub use evaluation::EvaluationMetrics;
pub use loggable::{Loggable, Metrics, ParamValue, Params};
pub use runner::{ExperimentRunner, RunnerState};
