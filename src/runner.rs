//! Experiment runner - binds a model, data loader, evaluator and logger
//!
//! The runner drives one experiment attempt: fit → predict → evaluate, and
//! forwards the parameters and metrics of every bound collaborator to the
//! experiment logger. It is a straight-line coordinator: collaborator errors
//! propagate unchanged and nothing is retried. A failed run is left open on
//! the backend.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut runner = ExperimentRunner::builder(&mut model, &x_train, &x_test, &loader, &evaluator)
//!     .y_train(&y_train)
//!     .y_test(&y_test)
//!     .experiment_logger(&mut tracker)
//!     .experiment_name("iris-svm")
//!     .param("one_additional_param", "x")
//!     .build()?;
//!
//! // Option 1: fit, predict and evaluate
//! let metrics = runner.run()?;
//!
//! // Option 2: run each part separately
//! runner.fit_model()?;
//! runner.predict()?;
//! let metrics = runner.evaluate()?;
//! ```

use tracing::{info, warn};

use crate::data::DataLoader;
use crate::evaluation::{EvaluationMetrics, Evaluator, TimeTook};
use crate::experimentation::Experimentation;
use crate::loggable::{Loggable, ParamValue, Params};
use crate::model::Model;
use crate::{Error, Result};

/// Progress of a runner through one experiment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Built; nothing ran yet.
    Constructed,
    /// `fit_model` completed.
    Fitted,
    /// Predictions are cached.
    Predicted,
    /// Evaluation metrics are cached.
    Evaluated,
}

/// Runs one model, evaluates the results and stores all parameters and
/// metrics in the experiment logger.
pub struct ExperimentRunner<'a, M: Model, D, E> {
    model: &'a mut M,
    data_loader: &'a D,
    evaluator: &'a E,
    x_train: &'a M::Features,
    y_train: Option<&'a M::Labels>,
    x_test: &'a M::Features,
    y_test: Option<&'a M::Labels>,
    experiment_logger: Option<&'a mut dyn Experimentation>,
    log_experiment: bool,
    experiment_name: Option<String>,
    additional_params: Params,
    predictions: Option<M::Predictions>,
    evaluation_metrics: Option<EvaluationMetrics>,
    state: RunnerState,
}

/// Builder for [`ExperimentRunner`].
pub struct ExperimentRunnerBuilder<'a, M: Model, D, E> {
    model: &'a mut M,
    data_loader: &'a D,
    evaluator: &'a E,
    x_train: &'a M::Features,
    y_train: Option<&'a M::Labels>,
    x_test: &'a M::Features,
    y_test: Option<&'a M::Labels>,
    experiment_logger: Option<&'a mut dyn Experimentation>,
    log_experiment: bool,
    experiment_name: Option<String>,
    additional_params: Params,
}

impl<'a, M, D, E> ExperimentRunnerBuilder<'a, M, D, E>
where
    M: Model,
    D: DataLoader,
    E: Evaluator<Labels = M::Labels, Predictions = M::Predictions>,
{
    /// Training labels.
    #[must_use]
    pub const fn y_train(mut self, y_train: &'a M::Labels) -> Self {
        self.y_train = Some(y_train);
        self
    }

    /// Test labels (ground truth for the evaluator).
    #[must_use]
    pub const fn y_test(mut self, y_test: &'a M::Labels) -> Self {
        self.y_test = Some(y_test);
        self
    }

    /// Whether to log this experiment (default `true`).
    #[must_use]
    pub const fn log_experiment(mut self, log_experiment: bool) -> Self {
        self.log_experiment = log_experiment;
        self
    }

    /// Experiment logging backend.
    #[must_use]
    pub fn experiment_logger(mut self, logger: &'a mut dyn Experimentation) -> Self {
        self.experiment_logger = Some(logger);
        self
    }

    /// Experiment name used by the logging backend.
    #[must_use]
    pub fn experiment_name(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = Some(name.into());
        self
    }

    /// Extra parameter logged verbatim with the run.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.additional_params.insert(key.into(), value.into());
        self
    }

    /// Extra parameters logged verbatim with the run.
    #[must_use]
    pub fn params(mut self, params: Params) -> Self {
        self.additional_params.extend(params);
        self
    }

    /// Build the runner.
    ///
    /// With logging enabled this selects the experiment, starts a run and
    /// logs the parameters and metrics of the model, evaluator, data loader
    /// and the model's processors, followed by the extra parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingExperimentLogger`] or
    /// [`Error::MissingExperimentName`] if logging is enabled without a
    /// backend or experiment name, or any error raised by the backend.
    pub fn build(self) -> Result<ExperimentRunner<'a, M, D, E>> {
        info!(
            experiment = self.experiment_name.as_deref().unwrap_or("<unnamed>"),
            "starting experiment"
        );

        if self.log_experiment {
            if self.experiment_logger.is_none() {
                return Err(Error::MissingExperimentLogger);
            }
            if self.experiment_name.as_deref().map_or(true, str::is_empty) {
                return Err(Error::MissingExperimentName);
            }
        }

        let mut runner = ExperimentRunner {
            model: self.model,
            data_loader: self.data_loader,
            evaluator: self.evaluator,
            x_train: self.x_train,
            y_train: self.y_train,
            x_test: self.x_test,
            y_test: self.y_test,
            experiment_logger: self.experiment_logger,
            log_experiment: self.log_experiment,
            experiment_name: self.experiment_name,
            additional_params: self.additional_params,
            predictions: None,
            evaluation_metrics: None,
            state: RunnerState::Constructed,
        };

        if runner.log_experiment {
            runner.log_collaborators()?;
        }

        Ok(runner)
    }
}

impl<'a, M, D, E> ExperimentRunner<'a, M, D, E>
where
    M: Model,
    D: DataLoader,
    E: Evaluator<Labels = M::Labels, Predictions = M::Predictions>,
{
    /// Start building a runner from its required collaborators.
    #[must_use]
    pub fn builder(
        model: &'a mut M,
        x_train: &'a M::Features,
        x_test: &'a M::Features,
        data_loader: &'a D,
        evaluator: &'a E,
    ) -> ExperimentRunnerBuilder<'a, M, D, E> {
        ExperimentRunnerBuilder {
            model,
            data_loader,
            evaluator,
            x_train,
            y_train: None,
            x_test,
            y_test: None,
            experiment_logger: None,
            log_experiment: true,
            experiment_name: None,
            additional_params: Params::new(),
        }
    }

    fn log_collaborators(&mut self) -> Result<()> {
        let Some(logger) = self.experiment_logger.as_deref_mut() else {
            return Ok(());
        };
        let experiment_name = self.experiment_name.as_deref().unwrap_or_default();

        info!(backend = logger.name(), "connecting to experiment logger");
        logger.set_experiment(experiment_name, None)?;
        logger.start_run()?;

        log_loggable(logger, &*self.model, "Model")?;
        log_loggable(logger, self.evaluator, "Evaluator")?;
        log_loggable(logger, self.data_loader, "DataLoader")?;
        if let Some(preprocessor) = self.model.preprocessor() {
            log_loggable(logger, preprocessor, "Preprocessor")?;
        }
        if let Some(postprocessor) = self.model.postprocessor() {
            log_loggable(logger, postprocessor, "Postprocessor")?;
        }

        if !self.additional_params.is_empty() {
            info!(params = ?self.additional_params, "logging additional parameters");
            logger.log_params(&self.additional_params)?;
        }
        Ok(())
    }

    /// Fit, predict and evaluate.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the model, evaluator or logger.
    pub fn run(&mut self) -> Result<&EvaluationMetrics> {
        self.fit_model()?;
        self.predict()?;
        self.evaluate()
    }

    /// Fit the model on the training set.
    ///
    /// Cached predictions are not cleared.
    ///
    /// # Errors
    ///
    /// Returns the model's fit error.
    pub fn fit_model(&mut self) -> Result<()> {
        info!(model = self.model.name(), "fitting model");
        let _timer = TimeTook::new("fit");
        self.model.fit(self.x_train, self.y_train)?;
        self.state = RunnerState::Fitted;
        Ok(())
    }

    /// Predict on the test set and cache the predictions.
    ///
    /// # Errors
    ///
    /// Returns the model's predict error.
    pub fn predict(&mut self) -> Result<()> {
        let predictions = self.model_predict()?;
        self.predictions = Some(predictions);
        self.state = RunnerState::Predicted;
        Ok(())
    }

    fn model_predict(&self) -> Result<M::Predictions> {
        info!(model = self.model.name(), "running model predict on test set");
        let _timer = TimeTook::new("predict");
        self.model.predict(self.x_test)
    }

    /// Evaluate the cached predictions, predicting first if there are none.
    ///
    /// With logging enabled, a step series is logged one step at a time and
    /// a flat result is logged in one batch.
    ///
    /// # Errors
    ///
    /// Returns the model's predict error, the evaluator's error or the
    /// logger's error.
    pub fn evaluate(&mut self) -> Result<&EvaluationMetrics> {
        let predictions = if let Some(predictions) = self.predictions.take() {
            info!("predictions found, skipping model predict");
            predictions
        } else {
            info!("predictions not found, running model predict");
            self.model_predict()?
        };

        let result = {
            let _timer = TimeTook::new("evaluate");
            self.evaluator.evaluate(self.y_test, &predictions)
        };
        self.predictions = Some(predictions);
        let result = result?;

        if self.log_experiment {
            if let Some(logger) = self.experiment_logger.as_deref_mut() {
                match &result {
                    EvaluationMetrics::Steps(steps) => {
                        for step in steps.steps() {
                            logger.log_metrics(&steps.metrics_at(step), Some(step))?;
                        }
                    }
                    EvaluationMetrics::Flat(_) => logger.log_evaluation_result(&result)?,
                }
            }
        }

        info!(metrics = ?result.metrics(), "evaluation finished");
        self.state = RunnerState::Evaluated;
        Ok(self.evaluation_metrics.insert(result))
    }

    /// End the backend run opened at construction.
    ///
    /// The runner never ends the run on its own.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub fn end_run(&mut self) -> Result<()> {
        if !self.log_experiment {
            return Ok(());
        }
        match self.experiment_logger.as_deref_mut() {
            Some(logger) => logger.end_run(),
            None => Ok(()),
        }
    }

    /// Predictions cached by the last [`predict`](Self::predict).
    #[must_use]
    pub fn get_predictions(&self) -> Option<&M::Predictions> {
        if self.predictions.is_none() {
            warn!("model was not predicted; call predict() to calculate predictions");
        }
        self.predictions.as_ref()
    }

    /// Metrics cached by the last [`evaluate`](Self::evaluate).
    #[must_use]
    pub fn get_evaluation_metrics(&self) -> Option<&EvaluationMetrics> {
        if self.evaluation_metrics.is_none() {
            warn!("evaluation metrics are empty; run a full experiment (fit, predict, evaluate) first");
        }
        self.evaluation_metrics.as_ref()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> RunnerState {
        self.state
    }

    /// Experiment name, if set.
    #[must_use]
    pub fn experiment_name(&self) -> Option<&str> {
        self.experiment_name.as_deref()
    }

    /// Whether this runner logs to the experiment logger.
    #[must_use]
    pub const fn log_experiment(&self) -> bool {
        self.log_experiment
    }

    /// The bound model.
    #[must_use]
    pub fn model(&self) -> &M {
        self.model
    }
}

fn log_loggable(
    logger: &mut dyn Experimentation,
    loggable: &dyn Loggable,
    role: &str,
) -> Result<()> {
    logger.log_params(&loggable.params())?;
    logger.log_metrics(&loggable.metrics(), None)?;
    logger.log_param(role, ParamValue::from(loggable.name()))
}
