//! Data loading contract
//!
//! A [`DataLoader`] pins the dataset an experiment runs on by name and
//! version, so a run can always be traced back to the exact data it used.

mod table;

pub use table::CsvTable;

use crate::loggable::{Loggable, ParamValue, Params};
use crate::Result;

/// Loads (and if needed downloads) a named, versioned dataset.
pub trait DataLoader: Loggable {
    /// In-memory dataset type returned by [`get_dataset`](Self::get_dataset).
    type Dataset;

    /// Fetch the dataset from its source into local storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset is unknown or cannot be stored.
    fn download_dataset(&self) -> Result<()>;

    /// Load the dataset into memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DatasetNotFound`](crate::Error::DatasetNotFound) if
    /// the dataset has not been downloaded/prepared.
    fn get_dataset(&self) -> Result<Self::Dataset>;
}

/// Dataset identity shared by data loaders.
///
/// Reported as `dataset_name` / `dataset_version` parameters, plus any
/// extra data parameters (e.g. downsampling ratio).
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSpec {
    name: String,
    version: String,
    extra: Params,
}

impl DatasetSpec {
    /// Create a dataset spec with the given name and version.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            extra: Params::new(),
        }
    }

    /// Add an extra data parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dataset version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Parameters describing the dataset.
    #[must_use]
    pub fn params(&self) -> Params {
        let mut params = Params::new();
        params.insert("dataset_name".into(), ParamValue::Str(self.name.clone()));
        params.insert(
            "dataset_version".into(),
            ParamValue::Str(self.version.clone()),
        );
        params.extend(self.extra.clone());
        params
    }

    /// Error for a dataset that is not available locally.
    #[must_use]
    pub fn not_found(&self) -> crate::Error {
        crate::Error::DatasetNotFound {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}
