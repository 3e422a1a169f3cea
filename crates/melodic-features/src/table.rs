use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::occurrence::{Occurrence, OccurrenceFeatures, QUERY_FILENAME, QUERY_SEGMENT_ID};
use crate::Result;

/// Feature column names, in output order.
pub const FEATURE_COLUMNS: [&str; 6] = [
    "IC",
    "pitch_proximity",
    "pitch_reversal",
    "phrase_length",
    "phrase_repetitions",
    "mean.entropy",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableFormat {
    #[default]
    Csv,
    Json,
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableFormat::Csv => write!(f, "csv"),
            TableFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for TableFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(TableFormat::Csv),
            "json" => Ok(TableFormat::Json),
            other => Err(format!("unknown table format {:?} (expected csv or json)", other)),
        }
    }
}

/// One output row: an occurrence with its features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HypothesisRow {
    pub query_filename: String,
    pub query_segment_id: usize,
    pub metadata: Vec<(String, String)>,
    pub features: OccurrenceFeatures,
}

impl HypothesisRow {
    fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Feature cells in `FEATURE_COLUMNS` order.
    fn feature_values(&self) -> [Option<f64>; 6] {
        let f = &self.features;
        [
            f.information_content(),
            f.pitch_proximity(),
            f.pitch_reversal(),
            f.phrase_length().map(|v| v as f64),
            f.phrase_repetitions().map(|v| v as f64),
            f.mean_entropy(),
        ]
    }
}

impl From<Occurrence> for HypothesisRow {
    fn from(occurrence: Occurrence) -> Self {
        Self {
            query_filename: occurrence.query_filename,
            query_segment_id: occurrence.query_segment_id,
            metadata: occurrence.metadata,
            features: occurrence.features,
        }
    }
}

/// The merged table: one row per occurrence, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HypothesisTable {
    pub rows: Vec<HypothesisRow>,
}

impl HypothesisTable {
    pub fn from_occurrences(occurrences: Vec<Occurrence>) -> Self {
        Self {
            rows: occurrences.into_iter().map(HypothesisRow::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Metadata columns across all rows, in first-seen order. Columns that
    /// share a name with a key or feature column are dropped; the computed
    /// value wins.
    pub fn metadata_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in &self.rows {
            for (key, _) in &row.metadata {
                let reserved = key == QUERY_FILENAME
                    || key == QUERY_SEGMENT_ID
                    || FEATURE_COLUMNS.contains(&key.as_str());
                if !reserved && !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    pub fn columns(&self) -> Vec<String> {
        let mut columns = vec![QUERY_FILENAME.to_string(), QUERY_SEGMENT_ID.to_string()];
        columns.extend(self.metadata_columns());
        columns.extend(FEATURE_COLUMNS.iter().map(|c| c.to_string()));
        columns
    }

    /// Write delimited text. Missing features are written as `missing`.
    pub fn write_csv<W: Write>(&self, writer: W, delimiter: u8, missing: &str) -> Result<()> {
        let metadata_columns = self.metadata_columns();
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);

        csv_writer.write_record(self.columns())?;
        for row in &self.rows {
            let mut record = vec![row.query_filename.clone(), row.query_segment_id.to_string()];
            record.extend(
                metadata_columns
                    .iter()
                    .map(|c| row.metadata_value(c).unwrap_or("").to_string()),
            );
            record.extend(row.feature_values().iter().map(|v| match v {
                Some(v) => v.to_string(),
                None => missing.to_string(),
            }));
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Rows as flat JSON objects; missing features are `null`.
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        let metadata_columns = self.metadata_columns();
        self.rows
            .iter()
            .map(|row| {
                let mut record = Map::new();
                record.insert(QUERY_FILENAME.into(), Value::from(row.query_filename.clone()));
                record.insert(QUERY_SEGMENT_ID.into(), Value::from(row.query_segment_id));
                for column in &metadata_columns {
                    if let Some(value) = row.metadata_value(column) {
                        record.insert(column.clone(), Value::from(value));
                    }
                }
                let f = &row.features;
                let values = [
                    f.information_content().map(Value::from),
                    f.pitch_proximity().map(Value::from),
                    f.pitch_reversal().map(Value::from),
                    f.phrase_length().map(Value::from),
                    f.phrase_repetitions().map(Value::from),
                    f.mean_entropy().map(Value::from),
                ];
                for (column, value) in FEATURE_COLUMNS.iter().zip(values) {
                    record.insert(column.to_string(), value.unwrap_or(Value::Null));
                }
                record
            })
            .collect()
    }

    /// Counts are written as integers, averages as floats.
    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, &self.to_records())?;
        writer.flush().map_err(serde_json::Error::io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> HypothesisTable {
        let mut first = Occurrence::new("tune1", 0)
            .with_metadata("match_filename", "tune5")
            .with_metadata("IC", "stale");
        first.features.set_information_content(Some(2.5));
        first.features.set_phrase_length(4);
        first.features.set_phrase_repetitions(2);

        let second = Occurrence::new("tune2", 1).with_metadata("similarity", "0.9");
        HypothesisTable::from_occurrences(vec![first, second])
    }

    #[test]
    fn columns_union_metadata_and_drop_reserved() {
        assert_eq!(
            table().columns(),
            vec![
                "query_filename",
                "query_segment_id",
                "match_filename",
                "similarity",
                "IC",
                "pitch_proximity",
                "pitch_reversal",
                "phrase_length",
                "phrase_repetitions",
                "mean.entropy",
            ]
        );
    }

    #[test]
    fn csv_writes_missing_token() {
        let mut out = Vec::new();
        table().write_csv(&mut out, b',', "NA").unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "tune1,0,tune5,,2.5,NA,NA,4,2,NA");
        assert_eq!(lines[2], "tune2,1,,0.9,NA,NA,NA,NA,NA,NA");
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_errors_surface_through_buffering() {
        let err = table()
            .write_json(std::io::BufWriter::new(FullDisk))
            .unwrap_err();
        assert!(err.to_string().contains("disk full"), "{}", err);

        let err = table()
            .write_csv(std::io::BufWriter::new(FullDisk), b',', "NA")
            .unwrap_err();
        assert!(err.to_string().contains("disk full"), "{}", err);
    }

    #[test]
    fn json_counts_are_integers() {
        let mut out = Vec::new();
        table().write_json(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\"phrase_length\": 4,"), "{}", text);
        assert!(text.contains("\"IC\": 2.5,"), "{}", text);
    }

    #[test]
    fn rows_keep_input_order() {
        let rows: Vec<_> = table().rows.iter().map(|r| r.query_filename.clone()).collect();
        assert_eq!(rows, vec!["tune1", "tune2"]);
    }

    #[test]
    fn json_records_use_null_for_missing() {
        let records = table().to_records();
        assert_eq!(records[0]["IC"], Value::from(2.5));
        assert_eq!(records[0]["phrase_length"], Value::from(4_usize));
        assert_eq!(records[0]["phrase_repetitions"], Value::from(2_usize));
        assert_eq!(records[1]["mean.entropy"], Value::Null);
        assert!(!records[1].contains_key("match_filename"));
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<TableFormat>(), Ok(TableFormat::Json));
        assert!("xlsx".parse::<TableFormat>().is_err());
    }
}
