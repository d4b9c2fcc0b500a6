//! Named entity recognition sample on CoNLL-2003 style data
//!
//! Files are read from `<data_dir>/<dataset_name>/` and use the CoNLL column
//! format: one token per line with the entity tag in the last column, blank
//! lines between sentences, `-DOCSTART-` lines ignored.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::data::{DataLoader, DatasetSpec};
use crate::evaluation::{EvaluationMetrics, Evaluator};
use crate::loggable::{scalar_params, short_type_name, Loggable, Metrics, Params};
use crate::model::{HyperParams, Model};
use crate::processing::{DataProcessor, LowercaseProcessor};
use crate::{Error, Result};

/// Training fold.
pub const TRAIN_FOLD: &str = "eng.train";
/// Development fold, merged into training.
pub const DEV_FOLD: &str = "eng.testa";
/// Test fold.
pub const TEST_FOLD: &str = "eng.testb";

const OUTSIDE: &str = "O";

/// A tokenized sentence with one entity tag per token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    /// Tokens.
    pub tokens: Vec<String>,
    /// Entity tags (`O`, `B-PER`, `I-LOC`, ...).
    pub tags: Vec<String>,
}

/// Parse CoNLL column-formatted text.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for a non-empty line with fewer than two columns.
pub fn parse_conll(text: &str) -> Result<Vec<Sentence>> {
    let mut sentences = Vec::new();
    let mut current = Sentence {
        tokens: Vec::new(),
        tags: Vec::new(),
    };

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.starts_with("-DOCSTART-") {
            continue;
        }
        if line.is_empty() {
            if !current.tokens.is_empty() {
                sentences.push(std::mem::replace(
                    &mut current,
                    Sentence {
                        tokens: Vec::new(),
                        tags: Vec::new(),
                    },
                ));
            }
            continue;
        }

        let columns: Vec<&str> = line.split_whitespace().collect();
        let (Some(token), Some(tag)) = (columns.first(), columns.last()) else {
            continue;
        };
        if columns.len() < 2 {
            return Err(Error::InvalidInput(format!(
                "line {}: expected token and tag columns",
                line_no + 1
            )));
        }
        current.tokens.push((*token).to_string());
        current.tags.push((*tag).to_string());
    }

    if !current.tokens.is_empty() {
        sentences.push(current);
    }
    Ok(sentences)
}

/// Split sentences into `(tokens, tags)` sequences.
#[must_use]
pub fn unzip_sentences(sentences: &[Sentence]) -> (Vec<Vec<String>>, Vec<Vec<String>>) {
    sentences
        .iter()
        .map(|s| (s.tokens.clone(), s.tags.clone()))
        .unzip()
}

/// Training (train + dev) and test sentences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NerCorpus {
    /// Training sentences, dev fold included.
    pub train: Vec<Sentence>,
    /// Test sentences.
    pub test: Vec<Sentence>,
}

/// Loads the CoNLL-2003 folds from a local directory.
#[derive(Debug, Clone)]
pub struct ConllDataLoader {
    spec: DatasetSpec,
    data_dir: PathBuf,
    downsample: f64,
    seed: u64,
}

impl ConllDataLoader {
    /// Loader for `conll_03` version `1` below `data_dir`, without downsampling.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            spec: DatasetSpec::new("conll_03", "1").with_param("downsample", 1.0),
            data_dir: data_dir.into(),
            downsample: 1.0,
            seed: 42,
        }
    }

    /// Keep only this fraction of every fold (clamped to `(0, 1]`).
    #[must_use]
    pub fn with_downsample(mut self, fraction: f64) -> Self {
        self.downsample = fraction.clamp(f64::MIN_POSITIVE, 1.0);
        self.spec = DatasetSpec::new(self.spec.name(), self.spec.version())
            .with_param("downsample", self.downsample);
        self
    }

    /// Directory holding the fold files.
    #[must_use]
    pub fn dataset_dir(&self) -> PathBuf {
        self.data_dir.join(self.spec.name())
    }

    fn read_fold(&self, fold: &str) -> Result<Vec<Sentence>> {
        let path = self.dataset_dir().join(fold);
        if !path.exists() {
            return Err(self.spec.not_found());
        }
        let sentences = parse_conll(&fs::read_to_string(&path)?)?;
        debug!(fold, sentences = sentences.len(), "read fold");
        Ok(self.downsampled(sentences))
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn downsampled(&self, mut sentences: Vec<Sentence>) -> Vec<Sentence> {
        if self.downsample >= 1.0 || sentences.is_empty() {
            return sentences;
        }
        let keep = ((sentences.len() as f64 * self.downsample).round() as usize).max(1);
        sentences.shuffle(&mut StdRng::seed_from_u64(self.seed));
        sentences.truncate(keep);
        sentences
    }
}

impl Loggable for ConllDataLoader {
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

impl DataLoader for ConllDataLoader {
    type Dataset = NerCorpus;

    /// Checks the three folds are present locally.
    fn download_dataset(&self) -> Result<()> {
        if self.spec.name() != "conll_03" || self.spec.version() != "1" {
            return Err(self.spec.not_found());
        }
        for fold in [TRAIN_FOLD, DEV_FOLD, TEST_FOLD] {
            if !self.dataset_dir().join(fold).exists() {
                return Err(self.spec.not_found());
            }
        }
        info!(dir = %self.dataset_dir().display(), "dataset already exists, skipping download");
        Ok(())
    }

    fn get_dataset(&self) -> Result<NerCorpus> {
        let mut train = self.read_fold(TRAIN_FOLD)?;
        train.extend(self.read_fold(DEV_FOLD)?);
        let test = self.read_fold(TEST_FOLD)?;
        info!(train = train.len(), test = test.len(), "loaded sentences");
        Ok(NerCorpus { train, test })
    }
}

/// Hyperparameters of [`MostFrequentTagModel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggerConfig {
    /// Lowercase tokens before lookup.
    pub lowercase: bool,
    /// Tokens seen fewer times are tagged with `default_tag`.
    pub min_count: u32,
    /// Tag for unknown tokens.
    pub default_tag: String,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            lowercase: false,
            min_count: 1,
            default_tag: OUTSIDE.to_string(),
        }
    }
}

/// Baseline tagger: every token gets the tag it carried most often in training.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MostFrequentTagModel {
    config: TaggerConfig,
    #[serde(skip)]
    lowercase: Option<LowercaseProcessor>,
    lexicon: HashMap<String, String>,
}

impl MostFrequentTagModel {
    /// Create an unfitted tagger.
    #[must_use]
    pub fn new(config: TaggerConfig) -> Self {
        HyperParams::new(short_type_name::<Self>())
            .extend(scalar_params(&config))
            .announce();
        let lowercase = config.lowercase.then_some(LowercaseProcessor);
        Self {
            config,
            lowercase,
            lexicon: HashMap::new(),
        }
    }

    /// Number of tokens with a learned tag.
    #[must_use]
    pub fn vocabulary_size(&self) -> usize {
        self.lexicon.len()
    }

    fn normalize(&self, tokens: &[String]) -> Result<Vec<String>> {
        match &self.lowercase {
            Some(processor) => processor.apply_batch(tokens.to_vec()),
            None => Ok(tokens.to_vec()),
        }
    }
}

impl Loggable for MostFrequentTagModel {
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

impl Model for MostFrequentTagModel {
    type Features = Vec<Vec<String>>;
    type Labels = Vec<Vec<String>>;
    type Predictions = Vec<Vec<String>>;

    fn fit(&mut self, x: &Vec<Vec<String>>, y: Option<&Vec<Vec<String>>>) -> Result<()> {
        let y = y.ok_or_else(|| Error::InvalidInput("training tags are required".into()))?;
        if x.len() != y.len() {
            return Err(Error::InvalidInput(format!(
                "{} sentences but {} tag sequences",
                x.len(),
                y.len()
            )));
        }

        let mut counts: HashMap<String, BTreeMap<&str, u32>> = HashMap::new();
        for (i, (tokens, tags)) in x.iter().zip(y).enumerate() {
            if tokens.len() != tags.len() {
                return Err(Error::InvalidInput(format!(
                    "sentence {i}: {} tokens but {} tags",
                    tokens.len(),
                    tags.len()
                )));
            }
            for (token, tag) in self.normalize(tokens)?.into_iter().zip(tags) {
                *counts.entry(token).or_default().entry(tag.as_str()).or_default() += 1;
            }
        }

        self.lexicon = counts
            .into_iter()
            .filter(|(_, tags)| tags.values().sum::<u32>() >= self.config.min_count)
            .filter_map(|(token, tags)| {
                // BTreeMap order makes ties resolve to the smallest tag
                let mut best: Option<(&str, u32)> = None;
                for (tag, count) in tags {
                    if best.map_or(true, |(_, c)| count > c) {
                        best = Some((tag, count));
                    }
                }
                best.map(|(tag, _)| (token, tag.to_string()))
            })
            .collect();

        info!(vocabulary = self.lexicon.len(), sentences = x.len(), "finished training tagger");
        Ok(())
    }

    fn predict(&self, x: &Vec<Vec<String>>) -> Result<Vec<Vec<String>>> {
        if self.lexicon.is_empty() {
            return Err(Error::NotFitted(self.name().to_string()));
        }
        let tagged = x
            .iter()
            .map(|tokens| {
                Ok(self
                    .normalize(tokens)?
                    .iter()
                    .map(|t| {
                        self.lexicon
                            .get(t)
                            .cloned()
                            .unwrap_or_else(|| self.config.default_tag.clone())
                    })
                    .collect())
            })
            .collect::<Result<Vec<Vec<String>>>>()?;
        info!(sentences = tagged.len(), "tagged sentences");
        Ok(tagged)
    }

    fn preprocessor(&self) -> Option<&dyn Loggable> {
        self.lowercase.as_ref().map(|p| p as &dyn Loggable)
    }
}

/// One entity chunk: `(sentence, type, start, end)` with `end` exclusive.
type Chunk = (usize, String, usize, usize);

fn split_tag(tag: &str) -> (&str, &str) {
    if tag == OUTSIDE {
        return (OUTSIDE, "");
    }
    match tag.split_once('-') {
        Some((prefix, kind)) => (prefix, kind),
        None => ("I", tag),
    }
}

/// Entity chunks of a tag sequence (IOB1 and IOB2 both accepted).
///
/// An `I-` tag following `O` or a different type opens a new chunk.
#[must_use]
pub fn chunks(sentence: usize, tags: &[String]) -> Vec<Chunk> {
    let mut found = Vec::new();
    let mut open: Option<(String, usize)> = None;

    for (i, tag) in tags.iter().map(String::as_str).chain([OUTSIDE]).enumerate() {
        let (prefix, kind) = split_tag(tag);
        let continues = matches!(&open, Some((open_kind, _)) if prefix == "I" && open_kind == kind);

        if !continues {
            if let Some((open_kind, start)) = open.take() {
                found.push((sentence, open_kind, start, i));
            }
            if prefix != OUTSIDE {
                open = Some((kind.to_string(), i));
            }
        }
    }
    found
}

/// Token accuracy and entity-level micro F1.
#[derive(Debug, Clone, Copy, Default)]
pub struct NerEvaluator;

impl Loggable for NerEvaluator {
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

impl Evaluator for NerEvaluator {
    type Labels = Vec<Vec<String>>;
    type Predictions = Vec<Vec<String>>;

    #[allow(clippy::cast_precision_loss)]
    fn evaluate(
        &self,
        ground_truth: Option<&Vec<Vec<String>>>,
        predictions: &Vec<Vec<String>>,
    ) -> Result<EvaluationMetrics> {
        let gold = ground_truth
            .ok_or_else(|| Error::InvalidInput("gold tags are required".into()))?;
        if gold.len() != predictions.len() {
            return Err(Error::InvalidInput(format!(
                "{} gold sentences but {} predicted",
                gold.len(),
                predictions.len()
            )));
        }

        let mut tokens = 0usize;
        let mut correct_tokens = 0usize;
        let mut gold_chunks = BTreeSet::new();
        let mut predicted_chunks = BTreeSet::new();

        for (i, (gold_tags, predicted_tags)) in gold.iter().zip(predictions).enumerate() {
            if gold_tags.len() != predicted_tags.len() {
                return Err(Error::InvalidInput(format!(
                    "sentence {i}: {} gold tags but {} predicted",
                    gold_tags.len(),
                    predicted_tags.len()
                )));
            }
            tokens += gold_tags.len();
            correct_tokens += gold_tags
                .iter()
                .zip(predicted_tags)
                .filter(|(g, p)| g == p)
                .count();
            gold_chunks.extend(chunks(i, gold_tags));
            predicted_chunks.extend(chunks(i, predicted_tags));
        }

        if tokens == 0 {
            return Err(Error::InvalidInput("cannot evaluate an empty test set".into()));
        }

        let true_positives = gold_chunks.intersection(&predicted_chunks).count() as f64;
        let precision = ratio(true_positives, predicted_chunks.len() as f64);
        let recall = ratio(true_positives, gold_chunks.len() as f64);
        let f1 = ratio(2.0 * precision * recall, precision + recall);

        Ok(EvaluationMetrics::flat([
            ("f1", f1),
            ("accuracy", correct_tokens as f64 / tokens as f64),
        ]))
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Write sentences in CoNLL format (token and tag columns).
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_conll(path: &Path, sentences: &[Sentence]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = String::from("-DOCSTART- O\n\n");
    for sentence in sentences {
        for (token, tag) in sentence.tokens.iter().zip(&sentence.tags) {
            out.push_str(token);
            out.push(' ');
            out.push_str(tag);
            out.push('\n');
        }
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}
