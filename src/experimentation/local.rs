//! Local experiment tracking backed by [`ExperimentStore`]
//!
//! With a tracking directory, runs are mirrored to disk:
//!
//! ```text
//! <tracking_dir>/<experiment_id>/experiment.json
//! <tracking_dir>/<experiment_id>/<run_id>/run.json
//! <tracking_dir>/<experiment_id>/<run_id>/artifacts/...
//! ```

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::Experimentation;
use crate::experiment::{
    ArtifactRecord, ExperimentRecord, ExperimentStore, MetricRecord, ParamRecord, RunRecord,
    RunStatus,
};
use crate::loggable::{ParamValue, Params};
use crate::{Error, Result};

const EXPERIMENT_FILE: &str = "experiment.json";
const RUN_FILE: &str = "run.json";
const ARTIFACTS_DIR: &str = "artifacts";

/// On-disk form of one run.
#[derive(Debug, Serialize, Deserialize)]
struct RunSnapshot {
    run: RunRecord,
    params: Params,
    metrics: Vec<MetricRecord>,
    artifacts: Vec<ArtifactRecord>,
}

/// Experiment logger recording into memory and, optionally, a local directory.
///
/// # Example
///
/// ```rust
/// use exp_runner::experimentation::{Experimentation, LocalExperimentation};
///
/// # fn main() -> exp_runner::Result<()> {
/// let mut tracker = LocalExperimentation::new();
/// tracker.set_experiment("iris-svm", None)?;
/// tracker.start_run()?;
/// tracker.log_param("kernel", "linear".into())?;
/// tracker.log_metric("accuracy", 0.95, None)?;
/// tracker.end_run()?;
///
/// let runs = tracker.search_runs("iris-svm");
/// assert_eq!(runs.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct LocalExperimentation {
    store: ExperimentStore,
    tracking_dir: Option<PathBuf>,
    files_to_log: Vec<PathBuf>,
    package_dir: Option<PathBuf>,
    active_experiment: Option<String>,
    active_run: Option<String>,
}

impl LocalExperimentation {
    /// Create an in-memory tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or create) a tracking directory, loading the runs already stored there.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed or created.
    /// Experiment and run files that fail to parse are skipped with a warning.
    pub fn open(tracking_dir: impl Into<PathBuf>) -> Result<Self> {
        let tracking_dir = tracking_dir.into();
        fs::create_dir_all(&tracking_dir)?;

        let mut store = ExperimentStore::new();
        for entry in fs::read_dir(&tracking_dir)? {
            let experiment_dir = entry?.path();
            let experiment_file = experiment_dir.join(EXPERIMENT_FILE);
            if !experiment_file.is_file() {
                continue;
            }
            match read_json::<ExperimentRecord>(&experiment_file) {
                Ok(record) => store.add_experiment(record),
                Err(err) => {
                    warn!(
                        path = %experiment_file.display(),
                        error = %err,
                        "skipping unreadable experiment"
                    );
                    continue;
                }
            }

            for run_entry in fs::read_dir(&experiment_dir)? {
                let run_file = run_entry?.path().join(RUN_FILE);
                if !run_file.is_file() {
                    continue;
                }
                let snapshot: RunSnapshot = match read_json(&run_file) {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        warn!(
                            path = %run_file.display(),
                            error = %err,
                            "skipping unreadable run"
                        );
                        continue;
                    }
                };
                let run_id = snapshot.run.run_id().to_string();
                for (key, value) in snapshot.params {
                    store.set_param(ParamRecord::new(&run_id, key, value));
                }
                for metric in snapshot.metrics {
                    store.add_metric(metric);
                }
                for artifact in snapshot.artifacts {
                    store.add_artifact(artifact);
                }
                store.add_run(snapshot.run);
            }
        }

        info!(
            path = %tracking_dir.display(),
            experiments = store.experiment_count(),
            runs = store.run_count(),
            "opened tracking directory"
        );

        Ok(Self {
            store,
            tracking_dir: Some(tracking_dir),
            ..Self::default()
        })
    }

    /// Files logged as artifacts at the start of every run.
    #[must_use]
    pub fn with_files_to_log(mut self, files: Vec<PathBuf>) -> Self {
        self.files_to_log = files;
        self
    }

    /// Source directory logged as artifacts at the start of every run.
    #[must_use]
    pub fn with_package_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.package_dir = Some(dir.into());
        self
    }

    /// Underlying record store.
    #[must_use]
    pub const fn store(&self) -> &ExperimentStore {
        &self.store
    }

    /// Tracking directory, if runs are mirrored to disk.
    #[must_use]
    pub fn tracking_dir(&self) -> Option<&Path> {
        self.tracking_dir.as_deref()
    }

    /// ID of the active run.
    #[must_use]
    pub fn active_run_id(&self) -> Option<&str> {
        self.active_run.as_deref()
    }

    /// ID of the selected experiment.
    #[must_use]
    pub fn active_experiment_id(&self) -> Option<&str> {
        self.active_experiment.as_deref()
    }

    /// Runs of the named experiment, oldest first.
    #[must_use]
    pub fn search_runs(&self, experiment_name: &str) -> Vec<&RunRecord> {
        self.store
            .find_experiment_by_name(experiment_name)
            .map(|e| self.store.get_runs_for_experiment(e.experiment_id()))
            .unwrap_or_default()
    }

    /// End the active run as failed.
    ///
    /// # Errors
    ///
    /// Returns an error if the run snapshot cannot be written.
    pub fn fail_run(&mut self) -> Result<()> {
        self.finish_run(RunStatus::Failed)
    }

    /// Write the active run's snapshot to the tracking directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    pub fn flush(&self) -> Result<()> {
        match self.active_run.as_deref() {
            Some(run_id) => self.persist_run(run_id),
            None => Ok(()),
        }
    }

    fn finish_run(&mut self, status: RunStatus) -> Result<()> {
        let Some(run_id) = self.active_run.take() else {
            warn!("no active run to end");
            return Ok(());
        };
        if let Some(run) = self.store.get_run_mut(&run_id) {
            run.complete(status);
        }
        self.persist_run(&run_id)?;
        info!(run_id = %run_id, ?status, "run ended");
        Ok(())
    }

    fn require_run(&self) -> Result<String> {
        self.active_run.clone().ok_or(Error::NoActiveRun)
    }

    fn run_dir(&self, run_id: &str) -> Option<PathBuf> {
        let root = self.tracking_dir.as_ref()?;
        let run = self.store.get_run(run_id)?;
        Some(root.join(run.experiment_id()).join(run_id))
    }

    fn persist_run(&self, run_id: &str) -> Result<()> {
        let (Some(dir), Some(run)) = (self.run_dir(run_id), self.store.get_run(run_id)) else {
            return Ok(());
        };
        let snapshot = RunSnapshot {
            run: run.clone(),
            params: self.store.get_params_for_run(run_id),
            metrics: self
                .store
                .get_all_metrics_for_run(run_id)
                .into_iter()
                .cloned()
                .collect(),
            artifacts: self
                .store
                .get_artifacts_for_run(run_id)
                .into_iter()
                .cloned()
                .collect(),
        };
        write_json(&dir.join(RUN_FILE), &snapshot)
    }

    fn store_artifact(&mut self, key: String, content: &[u8]) -> Result<()> {
        let run_id = self.require_run()?;
        if let Some(dir) = self.run_dir(&run_id) {
            let dest = dir.join(ARTIFACTS_DIR).join(&key);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&dest, content)?;
        }
        let artifact = ArtifactRecord::from_bytes(&run_id, key, content);
        debug!(key = artifact.key(), hash = artifact.cas_hash(), "logged artifact");
        self.store.add_artifact(artifact);
        Ok(())
    }
}

impl Experimentation for LocalExperimentation {
    fn name(&self) -> &str {
        "LocalExperimentation"
    }

    fn set_experiment(&mut self, name: &str, artifact_location: Option<&Path>) -> Result<()> {
        if let Some(existing) = self.store.find_experiment_by_name(name) {
            self.active_experiment = Some(existing.experiment_id().to_string());
            debug!(experiment = name, "reusing experiment");
            return Ok(());
        }

        let experiment_id = Uuid::new_v4().simple().to_string();
        let mut record = ExperimentRecord::new(&experiment_id, name);
        if let Some(location) = artifact_location {
            record = record.with_artifact_location(location.display().to_string());
        }
        if let Some(root) = &self.tracking_dir {
            write_json(&root.join(&experiment_id).join(EXPERIMENT_FILE), &record)?;
        }
        info!(experiment = name, id = %experiment_id, "created experiment");

        self.store.add_experiment(record);
        self.active_experiment = Some(experiment_id);
        Ok(())
    }

    fn start_run(&mut self) -> Result<()> {
        let experiment_id = self.active_experiment.clone().ok_or(Error::NoExperiment)?;
        if self.active_run.is_some() {
            info!("ending active run before starting a new one");
            self.finish_run(RunStatus::Success)?;
        }

        let run_id = Uuid::new_v4().simple().to_string();
        let mut run = RunRecord::new(&run_id, &experiment_id);
        run.start();
        self.store.add_run(run);
        self.active_run = Some(run_id.clone());
        self.persist_run(&run_id)?;
        info!(run_id = %run_id, experiment_id = %experiment_id, "run started");

        if let Some(dir) = self.package_dir.clone() {
            info!(path = %dir.display(), "logging package sources");
            self.log_artifacts(&dir, None)?;
        }
        for file in self.files_to_log.clone() {
            self.log_artifact(&file, None)?;
        }
        Ok(())
    }

    fn end_run(&mut self) -> Result<()> {
        self.finish_run(RunStatus::Success)
    }

    fn log_param(&mut self, key: &str, value: ParamValue) -> Result<()> {
        let run_id = self.require_run()?;
        if let ParamValue::Float(v) = value {
            ensure_finite(key, v)?;
        }
        self.store.set_param(ParamRecord::new(run_id, key, value));
        Ok(())
    }

    fn log_metric(&mut self, key: &str, value: f64, step: Option<u64>) -> Result<()> {
        let run_id = self.require_run()?;
        ensure_finite(key, value)?;
        let step = step.unwrap_or_else(|| self.store.next_step(&run_id, key));
        self.store.add_metric(MetricRecord::new(run_id, key, step, value));
        Ok(())
    }

    fn log_image(&mut self, title: &str, png: &[u8]) -> Result<()> {
        let file_name = if is_valid_file_stem(title) {
            format!("{title}.png")
        } else {
            let fallback = format!("{}.png", Uuid::new_v4());
            warn!(title, fallback = %fallback, "image title is not a usable file name");
            fallback
        };
        self.store_artifact(file_name, png)
    }

    fn log_artifact(&mut self, local_path: &Path, artifact_path: Option<&str>) -> Result<()> {
        let file_name = local_path
            .file_name()
            .ok_or_else(|| {
                Error::InvalidInput(format!("{} has no file name", local_path.display()))
            })?
            .to_string_lossy()
            .into_owned();
        let content = fs::read(local_path)?;
        self.store_artifact(artifact_key(artifact_path, &file_name), &content)
    }

    fn log_artifacts(&mut self, local_dir: &Path, artifact_path: Option<&str>) -> Result<()> {
        let mut files = Vec::new();
        collect_files(local_dir, "", &mut files)?;
        files.sort();
        for (path, relative) in files {
            let content = fs::read(&path)?;
            self.store_artifact(artifact_key(artifact_path, &relative), &content)?;
        }
        Ok(())
    }
}

/// JSON has no encoding for NaN or infinities, so they never reach `run.json`.
fn ensure_finite(key: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("{key} is not a finite number: {value}")))
    }
}

fn artifact_key(artifact_path: Option<&str>, relative: &str) -> String {
    match artifact_path.map(|p| p.trim_matches('/')) {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}/{relative}"),
        _ => relative.to_string(),
    }
}

fn collect_files(dir: &Path, prefix: &str, out: &mut Vec<(PathBuf, String)>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let relative = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        if path.is_dir() {
            collect_files(&path, &relative, out)?;
        } else {
            out.push((path, relative));
        }
    }
    Ok(())
}

fn is_valid_file_stem(title: &str) -> bool {
    !title.trim().is_empty()
        && title != "."
        && title != ".."
        && !title.chars().any(|c| {
            c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
        })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}
