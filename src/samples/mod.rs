//! Sample pipelines built on the collaborator contracts
//!
//! - [`iris`]: CSV loader, nearest-centroid classifier, accuracy evaluator
//! - [`ner`]: CoNLL loader, most-frequent-tag tagger, entity F1 evaluator

pub mod iris;
pub mod ner;
