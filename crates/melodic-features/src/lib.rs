//! Expectancy and repetition features for melodic occurrences.
//!
//! Takes a corpus of segmented melodies and a list of occurrences (query
//! phrases found in some match context), computes per-note expectancy
//! scores, merges in values produced by external tools, and condenses
//! everything into one row per occurrence for hypothesis testing.
//!
//! # Example
//!
//! ```
//! use melodic_features::{Corpus, FeaturePipeline, Occurrence, PipelineInputs};
//!
//! let corpus: Corpus = serde_json::from_str(r#"[
//!     {"filename": "tune1", "symbols": [
//!         {"onset": 0.0, "ioi": 1.0, "pitch": 60, "phrase_id": 0},
//!         {"onset": 1.0, "ioi": 1.0, "pitch": 67, "pitch_interval": 7, "phrase_id": 0},
//!         {"onset": 2.0, "ioi": 1.0, "pitch": 62, "pitch_interval": -5, "phrase_id": 0}
//!     ]}
//! ]"#).unwrap();
//!
//! let occurrences = vec![Occurrence::new("tune1", 0)];
//! let run = FeaturePipeline::default()
//!     .run(corpus, occurrences, PipelineInputs::default())
//!     .unwrap();
//!
//! assert_eq!(run.table.rows[0].features.pitch_reversal(), Some(2.5));
//! ```

pub mod averager;
pub mod corpus;
pub mod expectancy;
pub mod import;
pub mod mcsv;
pub mod occurrence;
pub mod pipeline;
pub mod repetition;
pub mod table;

pub use averager::{average_occurrences, segment_average};
pub use corpus::{Corpus, Melody, NoteFeatures, Phrase, Symbol};
pub use expectancy::{ExpectancyScore, TwoFactorModel};
pub use import::{
    merge_entropy, merge_information_content, read_entropy_file, read_information_content_file,
    EntropyRow, InformationContentRow, MergeReport,
};
pub use mcsv::{export_corpus, write_mcsv, DEFAULT_TICKS};
pub use occurrence::{Occurrence, OccurrenceFeatures};
pub use pipeline::{FeaturePipeline, PipelineInputs, PipelineRun, RunSummary};
pub use repetition::{annotate_repetitions, repetition_counts, ContourKey};
pub use table::{HypothesisRow, HypothesisTable, TableFormat};

use std::path::PathBuf;

/// Errors from feature computation and merging.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("delimited text error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An occurrence names a melody that is not in the corpus.
    #[error("occurrence {index} references unknown melody {filename:?}")]
    UnknownMelody { index: usize, filename: String },

    /// An occurrence names a phrase index the melody does not have.
    #[error("occurrence {index} references phrase {segment} of {filename:?}, which has {phrase_count} phrases")]
    UnresolvedOccurrence {
        index: usize,
        filename: String,
        segment: usize,
        phrase_count: usize,
    },

    #[error("invalid corpus: {0}")]
    InvalidCorpus(String),

    #[error("invalid occurrence record {index}: {message}")]
    InvalidOccurrence { index: usize, message: String },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
