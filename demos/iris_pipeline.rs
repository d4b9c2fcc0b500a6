//! Iris pipeline demo
//!
//! Generates an Iris-shaped dataset, prepares the train/test split, runs the
//! nearest-centroid model through the experiment runner and prints what the
//! local tracking backend recorded.
//!
//! Run with: cargo run --example iris_pipeline

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use exp_runner::config::LoggingConfig;
use exp_runner::data::{CsvTable, DataLoader};
use exp_runner::experimentation::{Experimentation, LocalExperimentation};
use exp_runner::samples::iris::{
    CentroidConfig, IrisCentroidModel, IrisDataLoader, IrisEvaluator, FEATURE_COLUMNS, LABEL_COLUMN,
};
use exp_runner::ExperimentRunner;

const SPECIES: [(&str, [f64; 4]); 3] = [
    ("Iris-setosa", [5.0, 3.4, 1.5, 0.2]),
    ("Iris-versicolor", [5.9, 2.8, 4.3, 1.3]),
    ("Iris-virginica", [6.6, 3.0, 5.6, 2.0]),
];

fn synthetic_iris(rows_per_class: usize) -> exp_runner::Result<CsvTable> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut headers = vec!["Id".to_string()];
    headers.extend(FEATURE_COLUMNS.iter().map(ToString::to_string));
    headers.push(LABEL_COLUMN.to_string());

    let mut rows = Vec::new();
    for (species, means) in SPECIES {
        for _ in 0..rows_per_class {
            let mut row = vec![(rows.len() + 1).to_string()];
            row.extend(
                means
                    .iter()
                    .map(|m| format!("{:.1}", m + rng.gen_range(-0.3..0.3))),
            );
            row.push(species.to_string());
            rows.push(row);
        }
    }
    CsvTable::new(headers, rows)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _guard = LoggingConfig::default().install()?;

    println!("=== exp-runner: Iris pipeline ===\n");

    let workspace = tempfile::tempdir()?;
    let data_dir = workspace.path().join("data");
    let tracking_dir = workspace.path().join("mlruns");

    let loader = IrisDataLoader::new(&data_dir);
    synthetic_iris(50)?.write(loader.raw_path())?;
    loader.download_dataset()?;
    loader.prepare_dataset()?;
    let data = loader.get_dataset()?;
    println!(
        "1. Prepared split: {} train / {} test rows",
        data.x_train.len(),
        data.x_test.len()
    );

    let mut model = IrisCentroidModel::new(CentroidConfig::default());
    let mut tracker = LocalExperimentation::open(&tracking_dir)?;

    let mut runner = ExperimentRunner::builder(
        &mut model,
        &data.x_train,
        &data.x_test,
        &loader,
        &IrisEvaluator,
    )
    .y_train(&data.y_train)
    .y_test(&data.y_test)
    .experiment_logger(&mut tracker)
    .experiment_name("iris-demo")
    .param("one_additional_param", "demo")
    .build()?;

    let accuracy = runner.run()?.get("accuracy").unwrap_or_default();
    println!("2. Accuracy: {accuracy:.3}");
    runner.end_run()?;
    drop(runner);

    println!("3. Recorded runs:");
    for run in tracker.search_runs("iris-demo") {
        let params = tracker.store().get_params_for_run(run.run_id());
        println!("   run {} ({:?})", run.run_id(), run.status());
        for (key, value) in &params {
            println!("     {key} = {value}");
        }
    }
    println!("   backend: {}", tracker.name());

    Ok(())
}
