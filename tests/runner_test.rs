//! Experiment runner tests
//!
//! Drive the runner with counting mocks and a recording backend, then check
//! what reached the backend.

mod common;

use common::{Call, MockDataLoader, MockEvaluator, MockModel, RecordingExperimentation};
use exp_runner::evaluation::{EvaluationMetrics, StepMetrics};
use exp_runner::processing::EmptyProcessor;
use exp_runner::{Error, ExperimentRunner, ParamValue, RunnerState};

fn data() -> (Vec<f64>, Vec<f64>) {
    (vec![0.1, 0.2, 0.3], vec![0.4, 0.5])
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_logging_without_logger_fails() {
    let (x_train, x_test) = data();
    let loader = MockDataLoader::iris();
    let evaluator = MockEvaluator::accuracy(0.9);
    let mut model = MockModel::linear();
    let result = ExperimentRunner::builder(
        &mut model,
        &x_train,
        &x_test,
        &loader,
        &evaluator,
    )
    .experiment_name("no-logger")
    .build();

    assert!(matches!(result, Err(Error::MissingExperimentLogger)));
}

#[test]
fn test_logging_without_name_fails() {
    let (x_train, x_test) = data();
    let loader = MockDataLoader::iris();
    let evaluator = MockEvaluator::accuracy(0.9);
    let mut model = MockModel::linear();
    let mut backend = RecordingExperimentation::default();
    let result = ExperimentRunner::builder(
        &mut model,
        &x_train,
        &x_test,
        &loader,
        &evaluator,
    )
    .experiment_logger(&mut backend)
    .build();

    assert!(matches!(result, Err(Error::MissingExperimentName)));
    drop(result);
    assert!(backend.calls.is_empty());
}

#[test]
fn test_empty_name_counts_as_missing() {
    let (x_train, x_test) = data();
    let loader = MockDataLoader::iris();
    let evaluator = MockEvaluator::accuracy(0.9);
    let mut model = MockModel::linear();
    let mut backend = RecordingExperimentation::default();
    let result = ExperimentRunner::builder(
        &mut model,
        &x_train,
        &x_test,
        &loader,
        &evaluator,
    )
    .experiment_logger(&mut backend)
    .experiment_name("")
    .build();

    assert!(matches!(result, Err(Error::MissingExperimentName)));
}

#[test]
fn test_logging_disabled_needs_no_backend() {
    let (x_train, x_test) = data();
    let loader = MockDataLoader::iris();
    let mut model = MockModel::linear();
    let evaluator = MockEvaluator::accuracy(0.5);
    let mut runner = ExperimentRunner::builder(
        &mut model,
        &x_train,
        &x_test,
        &loader,
        &evaluator,
    )
    .log_experiment(false)
    .build()
    .unwrap();

    assert!(!runner.log_experiment());
    assert_eq!(runner.run().unwrap().get("accuracy"), Some(0.5));
}

#[test]
fn test_construction_opens_run_and_logs_roles() {
    let (x_train, x_test) = data();
    let loader = MockDataLoader::iris();
    let evaluator = MockEvaluator::accuracy(0.9);
    let mut model = MockModel {
        preprocessor: Some(EmptyProcessor::named("noop")),
        ..MockModel::linear()
    };
    let mut backend = RecordingExperimentation::default();
    let runner = ExperimentRunner::builder(
        &mut model,
        &x_train,
        &x_test,
        &loader,
        &evaluator,
    )
    .experiment_logger(&mut backend)
    .experiment_name("roles")
    .build()
    .unwrap();
    assert_eq!(runner.experiment_name(), Some("roles"));
    drop(runner);

    assert_eq!(backend.calls[0], Call::SetExperiment("roles".into()));
    assert_eq!(backend.calls[1], Call::StartRun);

    let params = backend.logged_params();
    assert_eq!(params["Model"], ParamValue::from("MockModel"));
    assert_eq!(params["Evaluator"], ParamValue::from("MockEvaluator"));
    assert_eq!(params["DataLoader"], ParamValue::from("MockDataLoader"));
    assert_eq!(params["Preprocessor"], ParamValue::from("noop"));
    assert!(!params.contains_key("Postprocessor"));
    assert!(!backend.calls.contains(&Call::EndRun));
}

#[test]
fn test_additional_params_logged_verbatim_in_one_batch() {
    let (x_train, x_test) = data();
    let loader = MockDataLoader::iris();
    let evaluator = MockEvaluator::accuracy(0.9);
    let mut model = MockModel::linear();
    let mut backend = RecordingExperimentation::default();
    let runner = ExperimentRunner::builder(
        &mut model,
        &x_train,
        &x_test,
        &loader,
        &evaluator,
    )
    .experiment_logger(&mut backend)
    .experiment_name("extras")
    .param("one_additional_param", "x")
    .param("seed", 7)
    .build()
    .unwrap();
    drop(runner);

    let last = backend.calls.last().unwrap();
    let Call::Params(batch) = last else {
        panic!("expected extra params batch last, got {last:?}");
    };
    assert_eq!(batch.len(), 2);
    assert_eq!(batch["one_additional_param"], ParamValue::from("x"));
    assert_eq!(batch["seed"], ParamValue::Int(7));
}

// =============================================================================
// Run lifecycle
// =============================================================================

#[test]
fn test_run_calls_each_collaborator_once() {
    let (x_train, x_test) = data();
    let loader = MockDataLoader::iris();
    let mut model = MockModel::linear();
    let evaluator = MockEvaluator::accuracy(0.9);
    let mut backend = RecordingExperimentation::default();
    {
        let mut runner = ExperimentRunner::builder(
            &mut model,
            &x_train,
            &x_test,
            &loader,
            &evaluator,
        )
        .experiment_logger(&mut backend)
        .experiment_name("counts")
        .build()
        .unwrap();
        runner.run().unwrap();
        assert_eq!(runner.state(), RunnerState::Evaluated);
    }

    assert_eq!(model.fit_calls, 1);
    assert_eq!(model.predict_calls.get(), 1);
    assert_eq!(evaluator.calls.get(), 1);
}

#[test]
fn test_evaluate_twice_predicts_once() {
    let (x_train, x_test) = data();
    let loader = MockDataLoader::iris();
    let mut model = MockModel::linear();
    let evaluator = MockEvaluator::accuracy(0.9);
    {
        let mut runner = ExperimentRunner::builder(
            &mut model,
            &x_train,
            &x_test,
            &loader,
            &evaluator,
        )
        .log_experiment(false)
        .build()
        .unwrap();
        runner.evaluate().unwrap();
        runner.evaluate().unwrap();
        assert_eq!(runner.get_predictions(), Some(&x_test));
    }

    assert_eq!(model.predict_calls.get(), 1);
    assert_eq!(evaluator.calls.get(), 2);
}

#[test]
fn test_explicit_predict_is_not_cached_away() {
    let (x_train, x_test) = data();
    let loader = MockDataLoader::iris();
    let mut model = MockModel::linear();
    let evaluator = MockEvaluator::accuracy(0.9);
    {
        let mut runner = ExperimentRunner::builder(
            &mut model,
            &x_train,
            &x_test,
            &loader,
            &evaluator,
        )
        .log_experiment(false)
        .build()
        .unwrap();
        runner.run().unwrap();
        runner.predict().unwrap();
    }

    assert_eq!(model.predict_calls.get(), 2);
}

#[test]
fn test_getters_before_run_are_empty() {
    let (x_train, x_test) = data();
    let loader = MockDataLoader::iris();
    let mut model = MockModel::linear();
    let evaluator = MockEvaluator::accuracy(0.9);
    let runner = ExperimentRunner::builder(
        &mut model,
        &x_train,
        &x_test,
        &loader,
        &evaluator,
    )
    .log_experiment(false)
    .build()
    .unwrap();

    assert_eq!(runner.state(), RunnerState::Constructed);
    assert!(runner.get_predictions().is_none());
    assert!(runner.get_evaluation_metrics().is_none());
}

// =============================================================================
// Metric logging
// =============================================================================

#[test]
fn test_flat_metrics_logged_once_per_key() {
    let (x_train, x_test) = data();
    let loader = MockDataLoader::iris();
    let mut model = MockModel::linear();
    let evaluator = MockEvaluator::returning(EvaluationMetrics::flat([
        ("accuracy", 0.9),
        ("f1", 0.8),
    ]));
    let mut backend = RecordingExperimentation::default();
    {
        let mut runner = ExperimentRunner::builder(
            &mut model,
            &x_train,
            &x_test,
            &loader,
            &evaluator,
        )
        .experiment_logger(&mut backend)
        .experiment_name("flat")
        .build()
        .unwrap();
        runner.run().unwrap();
    }

    assert_eq!(backend.metric_count("accuracy"), 1);
    assert_eq!(backend.metric_count("f1"), 1);
}

#[test]
fn test_step_metrics_logged_one_call_per_step() {
    let (x_train, x_test) = data();
    let loader = MockDataLoader::iris();
    let mut model = MockModel::linear();
    let steps = StepMetrics::new()
        .with_series("loss", &[0.9, 0.5, 0.2])
        .with_series("accuracy", &[0.3, 0.6, 0.8]);
    let evaluator = MockEvaluator::returning(steps.clone().into());
    let mut backend = RecordingExperimentation::default();
    {
        let mut runner = ExperimentRunner::builder(
            &mut model,
            &x_train,
            &x_test,
            &loader,
            &evaluator,
        )
        .experiment_logger(&mut backend)
        .experiment_name("steps")
        .build()
        .unwrap();
        runner.run().unwrap();
    }

    let batches = backend.metric_batches();
    assert_eq!(batches.len(), 3);
    for (step, (metrics, logged_step)) in batches.iter().enumerate() {
        let step = step as u64;
        assert_eq!(*logged_step, Some(step));
        assert_eq!(*metrics, steps.metrics_at(step));
    }
}

#[test]
fn test_no_metric_logging_when_disabled() {
    let (x_train, x_test) = data();
    let loader = MockDataLoader::iris();
    let mut model = MockModel::linear();
    let evaluator = MockEvaluator::accuracy(0.9);
    let mut backend = RecordingExperimentation::default();
    {
        let mut runner = ExperimentRunner::builder(
            &mut model,
            &x_train,
            &x_test,
            &loader,
            &evaluator,
        )
        .log_experiment(false)
        .experiment_logger(&mut backend)
        .build()
        .unwrap();
        runner.run().unwrap();
        runner.end_run().unwrap();
    }

    assert!(backend.calls.is_empty());
}

#[test]
fn test_iris_scenario() {
    let (x_train, x_test) = data();
    let loader = MockDataLoader::iris();
    let mut model = MockModel::linear();
    let evaluator = MockEvaluator::accuracy(0.95);
    let mut backend = RecordingExperimentation::default();
    {
        let mut runner = ExperimentRunner::builder(
            &mut model,
            &x_train,
            &x_test,
            &loader,
            &evaluator,
        )
        .experiment_logger(&mut backend)
        .experiment_name("iris")
        .build()
        .unwrap();
        runner.run().unwrap();
        runner.end_run().unwrap();
    }

    let params = backend.logged_params();
    assert_eq!(params["kernel"], ParamValue::from("linear"));
    assert_eq!(params["dataset_name"], ParamValue::from("iris"));
    assert_eq!(params["dataset_version"], ParamValue::from("1"));

    let batches = backend.metric_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0.get("accuracy"), Some(&0.95));
    assert_eq!(backend.calls.last(), Some(&Call::EndRun));
}

// =============================================================================
// Failure propagation
// =============================================================================

#[test]
fn test_fit_failure_propagates_and_leaves_run_open() {
    let (x_train, x_test) = data();
    let loader = MockDataLoader::iris();
    let mut model = MockModel {
        fail_fit: true,
        ..MockModel::linear()
    };
    let evaluator = MockEvaluator::accuracy(0.9);
    let mut backend = RecordingExperimentation::default();
    {
        let mut runner = ExperimentRunner::builder(
            &mut model,
            &x_train,
            &x_test,
            &loader,
            &evaluator,
        )
        .experiment_logger(&mut backend)
        .experiment_name("boom")
        .build()
        .unwrap();

        let err = runner.run().unwrap_err();
        assert!(matches!(err, Error::Other(ref msg) if msg == "fit exploded"));
        assert_eq!(runner.state(), RunnerState::Constructed);
    }

    assert_eq!(model.predict_calls.get(), 0);
    assert_eq!(evaluator.calls.get(), 0);
    assert!(backend.calls.contains(&Call::StartRun));
    assert!(!backend.calls.contains(&Call::EndRun));
}

#[test]
fn test_evaluator_failure_keeps_predictions() {
    let (x_train, x_test) = data();
    let loader = MockDataLoader::iris();
    let mut model = MockModel::linear();
    let evaluator = MockEvaluator {
        fail: true,
        ..MockEvaluator::accuracy(0.9)
    };
    let mut runner = ExperimentRunner::builder(
        &mut model,
        &x_train,
        &x_test,
        &loader,
        &evaluator,
    )
    .log_experiment(false)
    .build()
    .unwrap();

    assert!(matches!(runner.evaluate(), Err(Error::InvalidInput(_))));
    assert!(runner.get_predictions().is_some());
    assert!(runner.get_evaluation_metrics().is_none());
}
