//! Iris classification sample
//!
//! Dataset layout below a data directory:
//!
//! ```text
//! raw/<name>.csv                        Id,SepalLengthCm,...,Species
//! processed/<name>-<version>-train.csv  written by prepare_dataset
//! processed/<name>-<version>-test.csv
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::{CsvTable, DataLoader, DatasetSpec};
use crate::evaluation::{EvaluationMetrics, Evaluator};
use crate::loggable::{scalar_params, short_type_name, Loggable, Metrics, Params};
use crate::model::{HyperParams, Model};
use crate::processing::{DataProcessor, EmptyProcessor};
use crate::{Error, Result};

/// Label column of the Iris dataset.
pub const LABEL_COLUMN: &str = "Species";

/// Feature columns of the Iris dataset.
pub const FEATURE_COLUMNS: [&str; 4] = [
    "SepalLengthCm",
    "SepalWidthCm",
    "PetalLengthCm",
    "PetalWidthCm",
];

/// Share of rows held out for testing by [`IrisDataLoader::prepare_dataset`].
pub const TEST_FRACTION: f64 = 0.3;

/// Train and test split with labels separated from features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrisDataset {
    /// Training features.
    pub x_train: CsvTable,
    /// Training labels.
    pub y_train: Vec<String>,
    /// Test features.
    pub x_test: CsvTable,
    /// Test labels.
    pub y_test: Vec<String>,
}

/// Loads the Iris CSV splits from a local data directory.
#[derive(Debug, Clone)]
pub struct IrisDataLoader {
    spec: DatasetSpec,
    data_dir: PathBuf,
    seed: u64,
}

impl IrisDataLoader {
    /// Loader for dataset `iris` version `1` below `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::with_dataset(data_dir, "iris", "1")
    }

    /// Loader for an explicit dataset name and version.
    #[must_use]
    pub fn with_dataset(
        data_dir: impl Into<PathBuf>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            spec: DatasetSpec::new(name, version).with_param("test_fraction", TEST_FRACTION),
            data_dir: data_dir.into(),
            seed: 42,
        }
    }

    /// Seed used for the train/test shuffle.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Path of the raw, unsplit dataset.
    #[must_use]
    pub fn raw_path(&self) -> PathBuf {
        self.data_dir
            .join("raw")
            .join(format!("{}.csv", self.spec.name()))
    }

    /// Path of a processed split (`train` or `test`).
    #[must_use]
    pub fn split_path(&self, split: &str) -> PathBuf {
        self.data_dir.join("processed").join(format!(
            "{}-{}-{split}.csv",
            self.spec.name(),
            self.spec.version()
        ))
    }

    /// Create the train/test split from the raw dataset and store it in `processed/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DatasetNotFound`] if the raw file is missing, or an
    /// I/O or CSV error.
    pub fn prepare_dataset(&self) -> Result<()> {
        info!(dataset = self.spec.name(), "creating train/test split");
        let raw = read_split(&self.raw_path(), &self.spec)?;
        let (train, test) = raw.train_test_split(TEST_FRACTION, self.seed);
        train.write(self.split_path("train"))?;
        test.write(self.split_path("test"))?;
        Ok(())
    }
}

fn read_split(path: &Path, spec: &DatasetSpec) -> Result<CsvTable> {
    if !path.exists() {
        return Err(spec.not_found());
    }
    CsvTable::read(path)
}

impl Loggable for IrisDataLoader {
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    fn params(&self) -> Params {
        self.spec.params()
    }

    fn metrics(&self) -> Metrics {
        Metrics::new()
    }
}

impl DataLoader for IrisDataLoader {
    type Dataset = IrisDataset;

    /// The Iris data ships with the repository; this only checks it is present.
    fn download_dataset(&self) -> Result<()> {
        if self.raw_path().exists() {
            info!(path = %self.raw_path().display(), "raw dataset present, skipping download");
            Ok(())
        } else {
            Err(self.spec.not_found())
        }
    }

    fn get_dataset(&self) -> Result<IrisDataset> {
        let train = read_split(&self.split_path("train"), &self.spec)?;
        let test = read_split(&self.split_path("test"), &self.spec)?;

        let (x_train, y_train) = train.split_column(LABEL_COLUMN)?;
        let (x_test, y_test) = test.split_column(LABEL_COLUMN)?;

        info!(train = x_train.len(), test = x_test.len(), "loaded iris samples");
        Ok(IrisDataset {
            x_train,
            y_train,
            x_test,
            y_test,
        })
    }
}

/// Distance used to pick the nearest centroid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    /// L2 distance.
    #[default]
    Euclidean,
    /// L1 distance.
    Manhattan,
}

impl Distance {
    fn between(self, a: &[f64], b: &[f64]) -> f64 {
        let pairs = a.iter().zip(b);
        match self {
            Self::Euclidean => pairs.map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt(),
            Self::Manhattan => pairs.map(|(x, y)| (x - y).abs()).sum(),
        }
    }
}

/// Hyperparameters of [`IrisCentroidModel`].
///
/// The `features` list is not a scalar and is therefore not logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidConfig {
    /// Feature columns used for fitting and prediction.
    pub features: Vec<String>,
    /// Label column name.
    pub label: String,
    /// Distance to the class centroids.
    pub distance: Distance,
}

impl Default for CentroidConfig {
    fn default() -> Self {
        Self {
            features: FEATURE_COLUMNS.iter().map(ToString::to_string).collect(),
            label: LABEL_COLUMN.to_string(),
            distance: Distance::default(),
        }
    }
}

/// Nearest-centroid classifier over the numeric Iris features.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IrisCentroidModel {
    config: CentroidConfig,
    #[serde(skip)]
    preprocessor: EmptyProcessor,
    centroids: BTreeMap<String, Vec<f64>>,
}

impl IrisCentroidModel {
    /// Create an unfitted model.
    #[must_use]
    pub fn new(config: CentroidConfig) -> Self {
        HyperParams::new(short_type_name::<Self>())
            .extend(scalar_params(&config))
            .announce();
        Self {
            config,
            preprocessor: EmptyProcessor::new(),
            centroids: BTreeMap::new(),
        }
    }

    /// Hyperparameters.
    #[must_use]
    pub const fn config(&self) -> &CentroidConfig {
        &self.config
    }

    /// Class centroids, empty until fitted.
    #[must_use]
    pub const fn centroids(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.centroids
    }

    fn feature_matrix(&self, x: &CsvTable) -> Result<Vec<Vec<f64>>> {
        let matrix = x.numeric_columns(&self.config.features)?;
        self.preprocessor.apply_batch(matrix)
    }
}

impl Loggable for IrisCentroidModel {
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    fn params(&self) -> Params {
        scalar_params(&self.config)
    }

    fn metrics(&self) -> Metrics {
        Metrics::new()
    }
}

impl Model for IrisCentroidModel {
    type Features = CsvTable;
    type Labels = Vec<String>;
    type Predictions = Vec<String>;

    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, x: &CsvTable, y: Option<&Vec<String>>) -> Result<()> {
        let y = y.ok_or_else(|| Error::InvalidInput("training labels are required".into()))?;
        let matrix = self.feature_matrix(x)?;
        if matrix.len() != y.len() {
            return Err(Error::InvalidInput(format!(
                "{} feature rows but {} labels",
                matrix.len(),
                y.len()
            )));
        }

        let dims = self.config.features.len();
        let mut sums: BTreeMap<String, (Vec<f64>, usize)> = BTreeMap::new();
        for (row, label) in matrix.iter().zip(y) {
            let (sum, count) = sums
                .entry(label.clone())
                .or_insert_with(|| (vec![0.0; dims], 0));
            for (acc, value) in sum.iter_mut().zip(row) {
                *acc += value;
            }
            *count += 1;
        }

        self.centroids = sums
            .into_iter()
            .map(|(label, (sum, count))| {
                let centroid = sum.into_iter().map(|s| s / count as f64).collect();
                (label, centroid)
            })
            .collect();

        info!(classes = self.centroids.len(), samples = y.len(), "finished fitting model");
        Ok(())
    }

    fn predict(&self, x: &CsvTable) -> Result<Vec<String>> {
        if self.centroids.is_empty() {
            return Err(Error::NotFitted(self.name().to_string()));
        }
        let matrix = self.feature_matrix(x)?;
        info!(samples = matrix.len(), "predicting");

        let predictions = matrix
            .iter()
            .filter_map(|row| {
                self.centroids
                    .iter()
                    .map(|(label, centroid)| (label, self.config.distance.between(row, centroid)))
                    .min_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(label, _)| label.clone())
            })
            .collect();
        Ok(predictions)
    }

    fn preprocessor(&self) -> Option<&dyn Loggable> {
        Some(&self.preprocessor)
    }
}

/// Classification accuracy.
#[derive(Debug, Clone, Copy, Default)]
pub struct IrisEvaluator;

impl Loggable for IrisEvaluator {
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    fn params(&self) -> Params {
        Params::new()
    }

    fn metrics(&self) -> Metrics {
        Metrics::new()
    }
}

impl Evaluator for IrisEvaluator {
    type Labels = Vec<String>;
    type Predictions = Vec<String>;

    #[allow(clippy::cast_precision_loss)]
    fn evaluate(
        &self,
        ground_truth: Option<&Vec<String>>,
        predictions: &Vec<String>,
    ) -> Result<EvaluationMetrics> {
        let truth = ground_truth
            .ok_or_else(|| Error::InvalidInput("ground truth labels are required".into()))?;
        if truth.len() != predictions.len() {
            return Err(Error::InvalidInput(format!(
                "{} labels but {} predictions",
                truth.len(),
                predictions.len()
            )));
        }
        if truth.is_empty() {
            return Err(Error::InvalidInput("cannot evaluate an empty test set".into()));
        }

        let correct = truth.iter().zip(predictions).filter(|(t, p)| t == p).count();
        Ok(EvaluationMetrics::flat([(
            "accuracy",
            correct as f64 / truth.len() as f64,
        )]))
    }
}
