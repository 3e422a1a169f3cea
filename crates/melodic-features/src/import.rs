//! Merge values computed by external tools.
//!
//! Two file layouts are understood: phrase-level n-gram entropy
//! (`file.id`, 1-based `phr.id`, `mean.entropy`) and note-level information
//! content (`melody.name`, `information.content`). Extra columns are ignored.
//! Cells reading `NA`, `NaN` or empty are missing values.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::corpus::Corpus;
use crate::occurrence::Occurrence;
use crate::{Error, Result};

/// One phrase-level entropy value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntropyRow {
    #[serde(rename = "file.id")]
    pub file_id: String,
    /// 1-based phrase number, as written by the entropy tool.
    #[serde(rename = "phr.id")]
    pub phrase_id: String,
    #[serde(rename = "mean.entropy", deserialize_with = "missing_f64")]
    pub mean_entropy: Option<f64>,
}

/// One note-level information content value. Rows of a melody appear in
/// note order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InformationContentRow {
    #[serde(rename = "melody.name")]
    pub melody_name: String,
    #[serde(rename = "information.content", deserialize_with = "missing_f64")]
    pub information_content: Option<f64>,
}

/// What a merge did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    /// External rows (or melodies) that found a target.
    pub matched: usize,
    /// Targets (occurrences or notes) written.
    pub updated: usize,
    /// External rows (or melodies) with no target.
    pub unmatched: usize,
    /// Internal names that received no external data.
    pub missing: Vec<String>,
}

pub fn read_entropy<R: Read>(reader: R, delimiter: u8) -> Result<Vec<EntropyRow>> {
    read_rows(reader, delimiter)
}

pub fn read_entropy_file(path: &Path, delimiter: u8) -> Result<Vec<EntropyRow>> {
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    read_entropy(file, delimiter)
}

pub fn read_information_content<R: Read>(
    reader: R,
    delimiter: u8,
) -> Result<Vec<InformationContentRow>> {
    read_rows(reader, delimiter)
}

pub fn read_information_content_file(
    path: &Path,
    delimiter: u8,
) -> Result<Vec<InformationContentRow>> {
    let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
    read_information_content(file, delimiter)
}

fn read_rows<R, T>(reader: R, delimiter: u8) -> Result<Vec<T>>
where
    R: Read,
    T: for<'de> Deserialize<'de>,
{
    // Whitespace-delimited tool output often carries a trailing delimiter,
    // so rows may be one field longer than the header.
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for row in csv_reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

fn missing_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("na") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(|v| Some(v).filter(|v| !v.is_nan()))
        .map_err(serde::de::Error::custom)
}

/// Convert a 1-based external phrase number to a 0-based phrase index.
fn phrase_index(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok()?.checked_sub(1)
}

/// Attach entropy values to occurrences by (file id, phrase id - 1).
///
/// Every matching occurrence receives the value; a later row for the same
/// phrase replaces an earlier one. Rows naming files or phrases with no
/// occurrence are ignored.
pub fn merge_entropy(rows: &[EntropyRow], occurrences: &mut [Occurrence]) -> MergeReport {
    let mut by_phrase: HashMap<(&str, usize), Vec<usize>> = HashMap::new();
    for (i, occurrence) in occurrences.iter().enumerate() {
        by_phrase
            .entry((occurrence.query_filename.as_str(), occurrence.query_segment_id))
            .or_default()
            .push(i);
    }

    let mut report = MergeReport::default();
    let mut targets: Vec<(usize, Option<f64>)> = Vec::new();
    for row in rows {
        let Some(segment) = phrase_index(&row.phrase_id) else {
            warn!(
                file_id = %row.file_id,
                phr_id = %row.phrase_id,
                "entropy row has no valid phrase id, skipping"
            );
            report.unmatched += 1;
            continue;
        };

        match by_phrase.get(&(row.file_id.as_str(), segment)) {
            Some(indices) => {
                report.matched += 1;
                targets.extend(indices.iter().map(|&i| (i, row.mean_entropy)));
            }
            None => report.unmatched += 1,
        }
    }

    let mut written = vec![false; occurrences.len()];
    for (i, value) in targets {
        occurrences[i].features.set_mean_entropy(value);
        written[i] = true;
    }
    report.updated = written.iter().filter(|&&w| w).count();

    let mut missing: Vec<String> = occurrences
        .iter()
        .zip(&written)
        .filter(|(_, &w)| !w)
        .map(|(o, _)| o.query_filename.clone())
        .collect();
    missing.sort();
    missing.dedup();
    for filename in &missing {
        warn!(filename = %filename, "no entropy rows for occurrence");
    }
    report.missing = missing;

    debug!(
        matched = report.matched,
        updated = report.updated,
        unmatched = report.unmatched,
        "entropy merged"
    );
    report
}

/// Assign information content to notes by position within each melody.
///
/// The i-th row for a melody goes to its i-th note; pitch and onset are not
/// consulted. Melodies without rows are skipped with a warning.
pub fn merge_information_content(
    rows: &[InformationContentRow],
    corpus: &mut Corpus,
) -> MergeReport {
    let mut by_melody: HashMap<&str, Vec<Option<f64>>> = HashMap::new();
    for row in rows {
        by_melody
            .entry(row.melody_name.as_str())
            .or_default()
            .push(row.information_content);
    }

    let mut report = MergeReport::default();
    for melody in corpus.melodies_mut() {
        let Some(values) = by_melody.remove(melody.filename.as_str()) else {
            warn!(filename = %melody.filename, "no information content rows, skipping melody");
            report.missing.push(melody.filename.clone());
            continue;
        };

        if values.len() != melody.symbols.len() {
            warn!(
                filename = %melody.filename,
                notes = melody.symbols.len(),
                rows = values.len(),
                "information content row count differs from note count"
            );
        }

        for (symbol, value) in melody.symbols.iter_mut().zip(values) {
            symbol.features.set_information_content(value);
            report.updated += 1;
        }
        report.matched += 1;
    }
    report.unmatched = by_melody.len();

    debug!(
        melodies = report.matched,
        notes = report.updated,
        unmatched = report.unmatched,
        "information content merged"
    );
    report
}
