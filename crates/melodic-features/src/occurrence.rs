use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

pub const QUERY_FILENAME: &str = "query_filename";
pub const QUERY_SEGMENT_ID: &str = "query_segment_id";

/// Per-occurrence scalars filled in by the pipeline stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceFeatures {
    information_content: Option<f64>,
    pitch_proximity: Option<f64>,
    pitch_reversal: Option<f64>,
    phrase_length: Option<usize>,
    phrase_repetitions: Option<usize>,
    mean_entropy: Option<f64>,
}

impl OccurrenceFeatures {
    pub fn information_content(&self) -> Option<f64> {
        self.information_content
    }

    pub fn pitch_proximity(&self) -> Option<f64> {
        self.pitch_proximity
    }

    pub fn pitch_reversal(&self) -> Option<f64> {
        self.pitch_reversal
    }

    pub fn phrase_length(&self) -> Option<usize> {
        self.phrase_length
    }

    pub fn phrase_repetitions(&self) -> Option<usize> {
        self.phrase_repetitions
    }

    pub fn mean_entropy(&self) -> Option<f64> {
        self.mean_entropy
    }

    pub fn set_information_content(&mut self, value: Option<f64>) {
        self.information_content = value.filter(|v| !v.is_nan());
    }

    pub fn set_pitch_proximity(&mut self, value: Option<f64>) {
        self.pitch_proximity = value.filter(|v| !v.is_nan());
    }

    pub fn set_pitch_reversal(&mut self, value: Option<f64>) {
        self.pitch_reversal = value.filter(|v| !v.is_nan());
    }

    pub fn set_phrase_length(&mut self, value: usize) {
        self.phrase_length = Some(value);
    }

    pub fn set_phrase_repetitions(&mut self, value: usize) {
        self.phrase_repetitions = Some(value);
    }

    pub fn set_mean_entropy(&mut self, value: Option<f64>) {
        self.mean_entropy = value.filter(|v| !v.is_nan());
    }
}

/// A query phrase found in some match context.
///
/// `metadata` keeps every input column other than the two key columns, in
/// input order, so they can be written back out untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub query_filename: String,
    /// 0-based phrase index within the query melody.
    pub query_segment_id: usize,
    #[serde(default)]
    pub metadata: Vec<(String, String)>,
    #[serde(default)]
    pub features: OccurrenceFeatures,
}

impl Occurrence {
    pub fn new(query_filename: impl Into<String>, query_segment_id: usize) -> Self {
        Self {
            query_filename: query_filename.into(),
            query_segment_id,
            metadata: Vec::new(),
            features: OccurrenceFeatures::default(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// Load occurrences from `.json` (array of objects) or delimited text.
    pub fn load(path: &Path, delimiter: u8) -> Result<Vec<Occurrence>> {
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        if is_json {
            let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
            let records: Vec<serde_json::Map<String, Value>> =
                serde_json::from_reader(std::io::BufReader::new(file))?;
            from_json_records(records)
        } else {
            let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
            read_delimited(file, delimiter)
        }
    }
}

/// Read occurrences from delimited text with a header row.
pub fn read_delimited<R: std::io::Read>(reader: R, delimiter: u8) -> Result<Vec<Occurrence>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::InvalidOccurrence {
                index: 0,
                message: format!("missing column {:?}", name),
            })
    };
    let filename_col = column(QUERY_FILENAME)?;
    let segment_col = column(QUERY_SEGMENT_ID)?;

    let mut occurrences = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or("");

        let mut occurrence = Occurrence::new(
            field(filename_col),
            parse_segment_id(index, field(segment_col))?,
        );
        for (i, header) in headers.iter().enumerate() {
            if i != filename_col && i != segment_col {
                occurrence.metadata.push((header.to_string(), field(i).to_string()));
            }
        }
        occurrences.push(occurrence);
    }
    Ok(occurrences)
}

/// Build occurrences from JSON objects. The segment id may be a number or a
/// numeric string.
pub fn from_json_records(records: Vec<serde_json::Map<String, Value>>) -> Result<Vec<Occurrence>> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let filename = match record.get(QUERY_FILENAME) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => {
                    return Err(Error::InvalidOccurrence {
                        index,
                        message: format!("missing {}", QUERY_FILENAME),
                    })
                }
            };
            let segment = match record.get(QUERY_SEGMENT_ID) {
                Some(Value::String(s)) => parse_segment_id(index, s)?,
                Some(Value::Number(n)) => parse_segment_id(index, &n.to_string())?,
                _ => {
                    return Err(Error::InvalidOccurrence {
                        index,
                        message: format!("missing or non-numeric {}", QUERY_SEGMENT_ID),
                    })
                }
            };

            let mut occurrence = Occurrence::new(filename, segment);
            // Key columns are skipped rather than removed so the rest keep
            // their input order.
            occurrence.metadata = record
                .into_iter()
                .filter(|(key, _)| key != QUERY_FILENAME && key != QUERY_SEGMENT_ID)
                .map(|(key, value)| {
                    let text = match value {
                        Value::String(s) => s,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    (key, text)
                })
                .collect();
            Ok(occurrence)
        })
        .collect()
}

fn parse_segment_id(index: usize, raw: &str) -> Result<usize> {
    raw.trim().parse().map_err(|_| Error::InvalidOccurrence {
        index,
        message: format!("{} {:?} is not a phrase index", QUERY_SEGMENT_ID, raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn delimited_keeps_metadata_in_order() {
        let text = "match_filename,query_filename,similarity,query_segment_id\n\
                    tune9,tune1,0.8,2\n\
                    tune7,tune2,1.0,0\n";
        let occurrences = read_delimited(text.as_bytes(), b',').unwrap();

        assert_eq!(occurrences.len(), 2);
        assert_eq!(occurrences[0].query_filename, "tune1");
        assert_eq!(occurrences[0].query_segment_id, 2);
        assert_eq!(
            occurrences[0].metadata,
            vec![
                ("match_filename".to_string(), "tune9".to_string()),
                ("similarity".to_string(), "0.8".to_string()),
            ]
        );
        assert_eq!(occurrences[1].features, OccurrenceFeatures::default());
    }

    #[test]
    fn delimited_requires_key_columns() {
        let text = "query_filename,other\ntune1,x\n";
        let err = read_delimited(text.as_bytes(), b',').unwrap_err();
        assert!(err.to_string().contains("query_segment_id"), "{}", err);
    }

    #[test]
    fn bad_segment_id_is_rejected() {
        let text = "query_filename;query_segment_id\ntune1;first\n";
        let err = read_delimited(text.as_bytes(), b';').unwrap_err();
        assert!(matches!(err, Error::InvalidOccurrence { index: 0, .. }));
    }

    #[test]
    fn json_accepts_string_or_number_segment_ids() {
        let records: Vec<serde_json::Map<String, Value>> = serde_json::from_str(
            r#"[
                {"query_filename": "tune1", "query_segment_id": "3", "score": 0.5},
                {"query_filename": "tune2", "query_segment_id": 0, "note": null}
            ]"#,
        )
        .unwrap();
        let occurrences = from_json_records(records).unwrap();

        assert_eq!(occurrences[0].query_segment_id, 3);
        assert_eq!(occurrences[0].metadata, vec![("score".to_string(), "0.5".to_string())]);
        assert_eq!(occurrences[1].query_segment_id, 0);
        assert_eq!(occurrences[1].metadata, vec![("note".to_string(), String::new())]);
    }

    #[test]
    fn json_metadata_keeps_input_order() {
        let records: Vec<serde_json::Map<String, Value>> = serde_json::from_str(
            r#"[{"zeta": "z", "query_filename": "tune1", "alpha": 1,
                 "query_segment_id": 0, "match_filename": "tune4"}]"#,
        )
        .unwrap();
        let occurrences = from_json_records(records).unwrap();

        let keys: Vec<&str> = occurrences[0].metadata.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "match_filename"]);
    }

    #[test]
    fn feature_setters_drop_nan() {
        let mut features = OccurrenceFeatures::default();
        features.set_mean_entropy(Some(f64::NAN));
        assert_eq!(features.mean_entropy(), None);
        features.set_phrase_length(4);
        assert_eq!(features.phrase_length(), Some(4));
    }
}
