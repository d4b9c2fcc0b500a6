//! exp-runner CLI
//!
//! Runs the sample pipelines against the local tracking backend and lists
//! recorded runs.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use figment::providers::Serialized;
use tracing::{info, warn};

use exp_runner::config::AppConfig;
use exp_runner::data::DataLoader;
use exp_runner::experimentation::{Experimentation, LocalExperimentation};
use exp_runner::model::save_model;
use exp_runner::samples::iris::{CentroidConfig, IrisCentroidModel, IrisDataLoader, IrisEvaluator};
use exp_runner::samples::ner::{
    unzip_sentences, ConllDataLoader, MostFrequentTagModel, NerEvaluator, TaggerConfig,
};
use exp_runner::{EvaluationMetrics, ExperimentRunner};

/// CLI arguments
#[derive(Parser)]
#[command(name = "exp-runner")]
#[command(about = "Run sample experiments and inspect tracked runs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter (overrides the configured level)
    #[arg(long)]
    log_level: Option<String>,

    /// Local tracking directory (overrides the configured one)
    #[arg(long)]
    tracking_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Nearest-centroid classifier on the Iris dataset
    Iris {
        /// Directory with raw/ and processed/ subdirectories
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Create the train/test split from raw data first
        #[arg(long)]
        prepare: bool,

        /// Experiment to log the run under
        #[arg(short, long)]
        experiment_name: Option<String>,

        /// Do not log the run
        #[arg(long)]
        no_log: bool,
    },
    /// Most-frequent-tag NER baseline on CoNLL-2003
    Ner {
        /// Directory containing conll_03/eng.{train,testa,testb}
        #[arg(short, long)]
        data_dir: PathBuf,

        /// Fraction of each fold to keep
        #[arg(long, default_value_t = 1.0)]
        downsample: f64,

        /// Lowercase tokens before tagging
        #[arg(long)]
        lowercase: bool,

        /// Experiment to log the run under
        #[arg(short, long)]
        experiment_name: Option<String>,

        /// Do not log the run
        #[arg(long)]
        no_log: bool,
    },
    /// List runs of an experiment
    Runs {
        /// Experiment name
        #[arg(short, long)]
        experiment_name: Option<String>,
    },
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut figment =
        AppConfig::figment(cli.config.as_deref()).context("failed to load configuration")?;

    if let Some(level) = &cli.log_level {
        figment = figment.merge(Serialized::default("logging.level", level));
    }
    if let Some(dir) = &cli.tracking_dir {
        figment = figment.merge(Serialized::default("tracking_dir", dir));
    }

    let (experiment_name, no_log) = match &cli.command {
        Commands::Iris {
            experiment_name,
            no_log,
            ..
        }
        | Commands::Ner {
            experiment_name,
            no_log,
            ..
        } => (experiment_name.as_ref(), *no_log),
        Commands::Runs { experiment_name } => (experiment_name.as_ref(), false),
    };
    if let Some(name) = experiment_name {
        figment = figment.merge(Serialized::default("experiment_name", name));
    }
    if no_log {
        figment = figment.merge(Serialized::default("log_experiment", false));
    }

    AppConfig::from_figment(&figment).context("invalid configuration")
}

fn open_tracker(config: &AppConfig) -> Result<LocalExperimentation> {
    match &config.tracking_dir {
        Some(dir) => LocalExperimentation::open(dir)
            .with_context(|| format!("failed to open tracking directory {}", dir.display())),
        None => Ok(LocalExperimentation::new()),
    }
}

fn print_metrics(metrics: &EvaluationMetrics) {
    for (key, value) in metrics.metrics() {
        println!("{key}: {value:.4}");
    }
}

fn run_iris(config: &AppConfig, data_dir: &Path, prepare: bool) -> Result<()> {
    let loader = IrisDataLoader::new(data_dir);
    if prepare {
        loader.download_dataset()?;
        loader.prepare_dataset().context("failed to prepare iris split")?;
    }
    let data = loader.get_dataset().context("failed to load iris dataset")?;

    let mut model = IrisCentroidModel::new(CentroidConfig::default());
    let mut tracker = open_tracker(config)?;

    let outcome = (|| -> Result<EvaluationMetrics> {
        let metrics = {
            let mut runner = ExperimentRunner::builder(
                &mut model,
                &data.x_train,
                &data.x_test,
                &loader,
                &IrisEvaluator,
            )
            .y_train(&data.y_train)
            .y_test(&data.y_test)
            .log_experiment(config.log_experiment)
            .experiment_logger(&mut tracker)
            .experiment_name(&config.experiment_name)
            .param("data_dir", data_dir.display().to_string())
            .build()?;
            let metrics = runner.run()?.clone();
            metrics
        };

        if config.log_experiment {
            if let Some(dir) = config.tracking_dir.as_ref() {
                log_model(&mut tracker, dir, &model)?;
            }
            tracker.end_run()?;
        }
        Ok(metrics)
    })();

    let metrics = finish(&mut tracker, config, outcome)?;
    print_metrics(&metrics);
    Ok(())
}

fn run_ner(config: &AppConfig, data_dir: &Path, downsample: f64, lowercase: bool) -> Result<()> {
    let loader = ConllDataLoader::new(data_dir).with_downsample(downsample);
    loader.download_dataset()?;
    let corpus = loader.get_dataset().context("failed to load CoNLL corpus")?;
    let (x_train, y_train) = unzip_sentences(&corpus.train);
    let (x_test, y_test) = unzip_sentences(&corpus.test);

    let mut model = MostFrequentTagModel::new(TaggerConfig {
        lowercase,
        ..TaggerConfig::default()
    });
    let mut tracker = open_tracker(config)?;

    let outcome = (|| -> Result<EvaluationMetrics> {
        let mut runner =
            ExperimentRunner::builder(&mut model, &x_train, &x_test, &loader, &NerEvaluator)
                .y_train(&y_train)
                .y_test(&y_test)
                .log_experiment(config.log_experiment)
                .experiment_logger(&mut tracker)
                .experiment_name(&config.experiment_name)
                .build()?;
        let metrics = runner.run()?.clone();
        runner.end_run()?;
        Ok(metrics)
    })();

    let metrics = finish(&mut tracker, config, outcome)?;
    print_metrics(&metrics);
    Ok(())
}

/// Save a fitted model under the tracking directory and attach it to the active run.
fn log_model(
    tracker: &mut LocalExperimentation,
    dir: &Path,
    model: &IrisCentroidModel,
) -> Result<()> {
    let model_path = dir.join("iris_centroid_model.json");
    save_model(model, &model_path).context("failed to save model")?;
    tracker.log_artifact(&model_path, Some("model"))?;
    Ok(())
}

/// Mark a run that was left open by a failed pipeline as failed.
fn finish(
    tracker: &mut LocalExperimentation,
    config: &AppConfig,
    outcome: Result<EvaluationMetrics>,
) -> Result<EvaluationMetrics> {
    if outcome.is_err() && config.log_experiment && tracker.active_run_id().is_some() {
        if let Err(err) = tracker.fail_run() {
            warn!(error = %err, "failed to mark run as failed");
        }
    }
    outcome
}

fn list_runs(config: &AppConfig) -> Result<()> {
    if config.tracking_dir.is_none() {
        bail!("no tracking directory configured; pass --tracking-dir");
    }
    let tracker = open_tracker(config)?;
    let runs = tracker.search_runs(&config.experiment_name);
    if runs.is_empty() {
        info!(experiment = %config.experiment_name, "no runs recorded");
        return Ok(());
    }

    for run in runs {
        let started = run
            .started_at()
            .map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
        let metrics = tracker
            .store()
            .latest_metrics(run.run_id())
            .into_iter()
            .map(|(k, v)| format!("{k}={v:.4}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{}  {:?}  {started}  {metrics}", run.run_id(), run.status());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let _guard = config
        .logging
        .install()
        .context("failed to install logging")?;

    match &cli.command {
        Commands::Iris {
            data_dir, prepare, ..
        } => run_iris(&config, data_dir, *prepare),
        Commands::Ner {
            data_dir,
            downsample,
            lowercase,
            ..
        } => run_ner(&config, data_dir, *downsample, *lowercase),
        Commands::Runs { .. } => list_runs(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exp_runner::experiment::RunStatus;

    fn started_tracker(dir: &Path) -> (LocalExperimentation, String) {
        let mut tracker = LocalExperimentation::open(dir).unwrap();
        tracker.set_experiment("cli", None).unwrap();
        tracker.start_run().unwrap();
        let run_id = tracker.active_run_id().unwrap().to_string();
        (tracker, run_id)
    }

    #[test]
    fn test_failed_model_logging_fails_run() {
        let workspace = tempfile::tempdir().unwrap();
        let (mut tracker, run_id) = started_tracker(&workspace.path().join("mlruns"));
        let not_a_dir = workspace.path().join("occupied");
        std::fs::write(&not_a_dir, b"file").unwrap();

        let config = AppConfig::default();
        let model = IrisCentroidModel::new(CentroidConfig::default());
        let outcome = log_model(&mut tracker, &not_a_dir, &model)
            .map(|()| EvaluationMetrics::flat([("accuracy", 1.0)]));
        assert!(finish(&mut tracker, &config, outcome).is_err());

        assert!(tracker.active_run_id().is_none());
        let reopened = LocalExperimentation::open(workspace.path().join("mlruns")).unwrap();
        assert_eq!(
            reopened.store().get_run(&run_id).unwrap().status(),
            RunStatus::Failed
        );
    }

    #[test]
    fn test_finish_leaves_successful_run_open() {
        let workspace = tempfile::tempdir().unwrap();
        let (mut tracker, run_id) = started_tracker(workspace.path());

        let outcome = Ok(EvaluationMetrics::flat([("accuracy", 1.0)]));
        assert!(finish(&mut tracker, &AppConfig::default(), outcome).is_ok());
        assert_eq!(tracker.active_run_id(), Some(run_id.as_str()));
    }
}
