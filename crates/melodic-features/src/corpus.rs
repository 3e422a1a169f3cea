use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Derived per-note values. Every slot stays `None` until a stage fills it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteFeatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    information_content: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pitch_proximity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pitch_reversal: Option<f64>,
}

impl NoteFeatures {
    pub fn information_content(&self) -> Option<f64> {
        self.information_content
    }

    pub fn pitch_proximity(&self) -> Option<f64> {
        self.pitch_proximity
    }

    pub fn pitch_reversal(&self) -> Option<f64> {
        self.pitch_reversal
    }

    /// NaN is stored as missing.
    pub fn set_information_content(&mut self, value: Option<f64>) {
        self.information_content = value.filter(|v| !v.is_nan());
    }

    pub fn set_pitch_proximity(&mut self, value: Option<f64>) {
        self.pitch_proximity = value.filter(|v| !v.is_nan());
    }

    pub fn set_pitch_reversal(&mut self, value: Option<f64>) {
        self.pitch_reversal = value.filter(|v| !v.is_nan());
    }
}

/// One note of a melody.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    /// Onset in beats from the start of the melody.
    pub onset: f64,
    /// Inter-onset interval to the next note, in beats.
    pub ioi: f64,
    pub pitch: i32,
    /// Signed semitones from the previous note. Absent on the first note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_interval: Option<i32>,
    pub phrase_id: u32,
    #[serde(default)]
    pub features: NoteFeatures,
}

impl Symbol {
    pub fn new(onset: f64, ioi: f64, pitch: i32, phrase_id: u32) -> Self {
        Self {
            onset,
            ioi,
            pitch,
            pitch_interval: None,
            phrase_id,
            features: NoteFeatures::default(),
        }
    }

    pub fn with_interval(mut self, interval: i32) -> Self {
        self.pitch_interval = Some(interval);
        self
    }
}

/// A melody and its notes in onset order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Melody {
    pub filename: String,
    pub symbols: Vec<Symbol>,
}

/// A borrowed view of one phrase: the maximal run of notes sharing a phrase id.
#[derive(Debug, Clone, Copy)]
pub struct Phrase<'a> {
    /// 0-based position of the phrase within its melody.
    pub index: usize,
    pub phrase_id: u32,
    pub symbols: &'a [Symbol],
}

impl<'a> Phrase<'a> {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Onset of the phrase's first note.
    pub fn start_onset(&self) -> f64 {
        self.symbols.first().map(|s| s.onset).unwrap_or(0.0)
    }

    /// Onsets on the phrase's local timeline (first note at 0).
    pub fn local_onsets(&self) -> impl Iterator<Item = f64> + 'a {
        let start = self.start_onset();
        self.symbols.iter().map(move |s| s.onset - start)
    }
}

impl Melody {
    pub fn new(filename: impl Into<String>, symbols: Vec<Symbol>) -> Self {
        Self {
            filename: filename.into(),
            symbols,
        }
    }

    /// Note index ranges of each phrase, split wherever the phrase id increases.
    pub fn phrase_ranges(&self) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        if self.symbols.is_empty() {
            return ranges;
        }

        let mut start = 0;
        for i in 1..self.symbols.len() {
            if self.symbols[i].phrase_id > self.symbols[i - 1].phrase_id {
                ranges.push(start..i);
                start = i;
            }
        }
        ranges.push(start..self.symbols.len());
        ranges
    }

    pub fn phrases(&self) -> Vec<Phrase<'_>> {
        self.phrase_ranges()
            .into_iter()
            .enumerate()
            .map(|(index, range)| self.view(index, range))
            .collect()
    }

    /// The phrase at 0-based position `index`.
    pub fn phrase(&self, index: usize) -> Option<Phrase<'_>> {
        self.phrase_ranges()
            .into_iter()
            .nth(index)
            .map(|range| self.view(index, range))
    }

    pub fn phrase_count(&self) -> usize {
        self.phrase_ranges().len()
    }

    fn view(&self, index: usize, range: Range<usize>) -> Phrase<'_> {
        let symbols = &self.symbols[range];
        Phrase {
            index,
            phrase_id: symbols.first().map(|s| s.phrase_id).unwrap_or(0),
            symbols,
        }
    }

    /// Signed interval into each note. The first note has none; later notes
    /// missing a stored interval get it from the pitch difference.
    pub fn pitch_intervals(&self) -> Vec<Option<i32>> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, s)| {
                if i == 0 {
                    None
                } else {
                    Some(
                        s.pitch_interval
                            .unwrap_or(s.pitch - self.symbols[i - 1].pitch),
                    )
                }
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        let mut previous: Option<&Symbol> = None;
        for (i, symbol) in self.symbols.iter().enumerate() {
            if !symbol.onset.is_finite() || symbol.onset < 0.0 {
                return Err(self.invalid(
                    i,
                    format!("onset {} is not a non-negative number", symbol.onset),
                ));
            }
            if !symbol.ioi.is_finite() || symbol.ioi < 0.0 {
                return Err(self.invalid(
                    i,
                    format!("ioi {} is not a non-negative number", symbol.ioi),
                ));
            }
            if let Some(prev) = previous {
                if symbol.onset < prev.onset {
                    return Err(self.invalid(i, "onset decreases".to_string()));
                }
                if symbol.phrase_id < prev.phrase_id {
                    return Err(self.invalid(
                        i,
                        format!("phrase id {} follows {}", symbol.phrase_id, prev.phrase_id),
                    ));
                }
            }
            previous = Some(symbol);
        }
        Ok(())
    }

    fn invalid(&self, note: usize, message: String) -> Error {
        Error::InvalidCorpus(format!("{} note {}: {}", self.filename, note, message))
    }
}

/// All melodies of a corpus, addressable by filename.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Melody>", into = "Vec<Melody>")]
pub struct Corpus {
    melodies: Vec<Melody>,
    by_filename: HashMap<String, usize>,
}

impl From<Vec<Melody>> for Corpus {
    fn from(melodies: Vec<Melody>) -> Self {
        let mut by_filename = HashMap::with_capacity(melodies.len());
        for (i, melody) in melodies.iter().enumerate() {
            // First occurrence wins; duplicates are reported by validate().
            by_filename.entry(melody.filename.clone()).or_insert(i);
        }
        Self {
            melodies,
            by_filename,
        }
    }
}

impl From<Corpus> for Vec<Melody> {
    fn from(corpus: Corpus) -> Self {
        corpus.melodies
    }
}

impl Corpus {
    /// Load a corpus from a JSON array of melodies.
    pub fn load_json(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| Error::io(path, e))?;
        let corpus: Corpus = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(corpus)
    }

    pub fn len(&self) -> usize {
        self.melodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.melodies.is_empty()
    }

    pub fn melodies(&self) -> &[Melody] {
        &self.melodies
    }

    pub fn melodies_mut(&mut self) -> &mut [Melody] {
        &mut self.melodies
    }

    pub fn melody(&self, filename: &str) -> Option<&Melody> {
        self.by_filename.get(filename).map(|&i| &self.melodies[i])
    }

    pub fn melody_mut(&mut self, filename: &str) -> Option<&mut Melody> {
        let index = *self.by_filename.get(filename)?;
        Some(&mut self.melodies[index])
    }

    /// Check the ordering invariants every stage relies on.
    pub fn validate(&self) -> Result<()> {
        if self.by_filename.len() != self.melodies.len() {
            let mut seen = HashSet::new();
            for melody in &self.melodies {
                if !seen.insert(melody.filename.as_str()) {
                    return Err(Error::InvalidCorpus(format!(
                        "duplicate filename {:?}",
                        melody.filename
                    )));
                }
            }
        }

        for melody in &self.melodies {
            melody.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn two_phrase_melody() -> Melody {
        Melody::new(
            "tune1",
            vec![
                Symbol::new(0.0, 1.0, 60, 0),
                Symbol::new(1.0, 1.0, 62, 0).with_interval(2),
                Symbol::new(2.0, 0.5, 64, 1).with_interval(2),
                Symbol::new(2.5, 1.5, 60, 1).with_interval(-4),
            ],
        )
    }

    #[test]
    fn phrases_split_on_id_increase() {
        let melody = two_phrase_melody();
        let ranges = melody.phrase_ranges();
        assert_eq!(ranges, vec![0..2, 2..4]);

        let second = melody.phrase(1).unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(second.phrase_id, 1);
        assert_eq!(second.len(), 2);
        assert_eq!(second.local_onsets().collect::<Vec<_>>(), vec![0.0, 0.5]);
    }

    #[test]
    fn phrase_index_beyond_end_is_none() {
        assert!(two_phrase_melody().phrase(2).is_none());
        assert!(Melody::new("empty", vec![]).phrase(0).is_none());
    }

    #[test]
    fn non_contiguous_ids_still_index_by_position() {
        let melody = Melody::new(
            "gaps",
            vec![Symbol::new(0.0, 1.0, 60, 3), Symbol::new(1.0, 1.0, 60, 7)],
        );
        assert_eq!(melody.phrase_count(), 2);
        assert_eq!(melody.phrase(1).unwrap().phrase_id, 7);
    }

    #[test]
    fn intervals_fall_back_to_pitch_difference() {
        let melody = Melody::new(
            "derived",
            vec![
                Symbol::new(0.0, 1.0, 60, 0).with_interval(99),
                Symbol::new(1.0, 1.0, 67, 0),
                Symbol::new(2.0, 1.0, 65, 0).with_interval(-2),
            ],
        );
        assert_eq!(melody.pitch_intervals(), vec![None, Some(7), Some(-2)]);
    }

    #[test]
    fn nan_feature_is_missing() {
        let mut features = NoteFeatures::default();
        features.set_information_content(Some(f64::NAN));
        assert_eq!(features.information_content(), None);
        features.set_information_content(Some(2.5));
        assert_eq!(features.information_content(), Some(2.5));
    }

    #[test]
    fn corpus_deserializes_from_json_array() {
        let json = r#"[{"filename": "a", "symbols": [
            {"onset": 0, "ioi": 1, "pitch": 60, "phrase_id": 0},
            {"onset": 1, "ioi": 1, "pitch": 62, "pitch_interval": 2, "phrase_id": 0}
        ]}]"#;
        let corpus: Corpus = serde_json::from_str(json).unwrap();
        assert_eq!(corpus.len(), 1);
        let melody = corpus.melody("a").unwrap();
        assert_eq!(melody.symbols[1].pitch_interval, Some(2));
        assert_eq!(melody.symbols[0].features, NoteFeatures::default());
        assert!(corpus.melody("b").is_none());
    }

    #[test]
    fn validate_rejects_decreasing_phrase_ids() {
        let corpus = Corpus::from(vec![Melody::new(
            "bad",
            vec![Symbol::new(0.0, 1.0, 60, 1), Symbol::new(1.0, 1.0, 62, 0)],
        )]);
        let err = corpus.validate().unwrap_err();
        assert!(err.to_string().contains("phrase id 0 follows 1"), "{}", err);
    }

    #[test]
    fn validate_rejects_duplicate_filenames() {
        let corpus = Corpus::from(vec![two_phrase_melody(), two_phrase_melody()]);
        assert!(matches!(corpus.validate(), Err(Error::InvalidCorpus(_))));
    }

    #[test]
    fn validate_accepts_well_formed_corpus() {
        let corpus = Corpus::from(vec![two_phrase_melody()]);
        corpus.validate().unwrap();
    }
}
