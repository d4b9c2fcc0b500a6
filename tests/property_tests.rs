//! Property-based tests for parameter harvesting and metric forwarding
//!
//! - Run with ProptestConfig::with_cases(100)
//! - Must complete in <30 seconds for pre-commit hook

mod common;

use std::collections::BTreeMap;

use common::{MockDataLoader, MockEvaluator, MockModel, RecordingExperimentation};
use exp_runner::evaluation::{EvaluationMetrics, StepMetrics};
use exp_runner::loggable::scalar_params;
use exp_runner::{ExperimentRunner, ParamValue};
use proptest::prelude::*;
use serde::Serialize;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

#[derive(Debug, Clone, Serialize)]
struct Config {
    count: i64,
    rate: f64,
    enabled: bool,
    label: String,
    layers: Vec<u32>,
    nested: BTreeMap<String, i64>,
    missing: Option<i64>,
}

fn arb_config() -> impl Strategy<Value = Config> {
    (
        any::<i64>(),
        -1.0e6f64..1.0e6,
        any::<bool>(),
        "[a-z]{0,12}",
        proptest::collection::vec(0u32..1024, 0..5),
    )
        .prop_map(|(count, rate, enabled, label, layers)| Config {
            count,
            rate,
            enabled,
            label,
            layers,
            nested: BTreeMap::new(),
            missing: None,
        })
}

/// Metric series: 1-3 keys, every key with the same number of steps.
fn arb_series() -> impl Strategy<Value = (Vec<String>, usize, Vec<f64>)> {
    (1usize..4, 1usize..12).prop_flat_map(|(keys, steps)| {
        (
            Just((0..keys).map(|k| format!("metric_{k}")).collect::<Vec<_>>()),
            Just(steps),
            proptest::collection::vec(0.0f64..1.0, keys * steps),
        )
    })
}

fn run_with(evaluator: &MockEvaluator, extras: &[(String, i64)]) -> RecordingExperimentation {
    let x = vec![1.0, 2.0];
    let loader = MockDataLoader::iris();
    let mut model = MockModel::linear();
    let mut backend = RecordingExperimentation::default();
    {
        let mut builder = ExperimentRunner::builder(&mut model, &x, &x, &loader, evaluator)
            .experiment_logger(&mut backend)
            .experiment_name("prop");
        for (key, value) in extras {
            builder = builder.param(key.clone(), *value);
        }
        let mut runner = builder.build().unwrap();
        runner.run().unwrap();
    }
    backend
}

// ============================================================================
// Parameter Harvesting Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: exactly the scalar fields are harvested, with their values
    #[test]
    fn prop_scalar_params_keep_exactly_scalars(config in arb_config()) {
        let params = scalar_params(&config);

        prop_assert_eq!(params.len(), 4);
        prop_assert_eq!(&params["count"], &ParamValue::Int(config.count));
        prop_assert_eq!(&params["rate"], &ParamValue::Float(config.rate));
        prop_assert_eq!(&params["enabled"], &ParamValue::Bool(config.enabled));
        prop_assert_eq!(&params["label"], &ParamValue::Str(config.label.clone()));
        prop_assert!(!params.contains_key("layers"));
        prop_assert!(!params.contains_key("nested"));
        prop_assert!(!params.contains_key("missing"));
    }

    /// Property: extra construction params reach the backend verbatim
    #[test]
    fn prop_extra_params_logged_verbatim(
        extras in proptest::collection::btree_map("[a-z_]{1,10}", any::<i64>(), 0..6)
    ) {
        let extras: Vec<(String, i64)> = extras.into_iter().collect();
        let evaluator = MockEvaluator::accuracy(0.5);
        let backend = run_with(&evaluator, &extras);

        let logged = backend.logged_params();
        for (key, value) in &extras {
            prop_assert_eq!(&logged[key], &ParamValue::Int(*value));
        }
    }
}

// ============================================================================
// Metric Forwarding Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: a step series produces one metric call per step, in step order
    #[test]
    fn prop_one_metric_call_per_step((keys, steps, values) in arb_series()) {
        let mut series = StepMetrics::new();
        for (k, key) in keys.iter().enumerate() {
            series = series.with_series(key, &values[k * steps..(k + 1) * steps]);
        }
        let evaluator = MockEvaluator::returning(series.clone().into());
        let backend = run_with(&evaluator, &[]);

        let batches = backend.metric_batches();
        prop_assert_eq!(batches.len(), steps);
        for (i, (metrics, step)) in batches.iter().enumerate() {
            prop_assert_eq!(*step, Some(i as u64));
            prop_assert_eq!(metrics, &series.metrics_at(i as u64));
            prop_assert_eq!(metrics.len(), keys.len());
        }
    }

    /// Property: every flat metric key is logged exactly once
    #[test]
    fn prop_flat_metrics_logged_once(
        metrics in proptest::collection::btree_map("[a-z]{1,8}", 0.0f64..1.0, 1..8)
    ) {
        let evaluator = MockEvaluator::returning(EvaluationMetrics::Flat(metrics.clone()));
        let backend = run_with(&evaluator, &[]);

        for key in metrics.keys() {
            prop_assert_eq!(backend.metric_count(key), 1);
        }
    }
}
