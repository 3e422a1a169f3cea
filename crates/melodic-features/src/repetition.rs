use std::collections::HashMap;

use tracing::debug;

use crate::corpus::{Corpus, Melody, Phrase};
use crate::occurrence::Occurrence;

/// A phrase's shape: (onset on the phrase's local timeline, pitch) per note.
///
/// Equality is exact, including the float onsets. Transposed or rhythmically
/// varied repeats are different keys.
#[derive(Debug, Clone, PartialEq)]
pub struct ContourKey(pub Vec<(f64, i32)>);

impl ContourKey {
    pub fn from_phrase(phrase: &Phrase<'_>) -> Self {
        ContourKey(
            phrase
                .local_onsets()
                .zip(phrase.symbols.iter().map(|s| s.pitch))
                .collect(),
        )
    }
}

pub fn contour_keys(melody: &Melody) -> Vec<ContourKey> {
    melody.phrases().iter().map(ContourKey::from_phrase).collect()
}

/// For each phrase, how many phrases of the melody (itself included) share
/// its contour key.
pub fn repetition_counts(melody: &Melody) -> Vec<usize> {
    let keys = contour_keys(melody);
    keys.iter()
        .map(|key| keys.iter().filter(|other| *other == key).count())
        .collect()
}

/// Write repetition counts onto every occurrence whose (filename, phrase
/// index) names a phrase in the corpus. Returns how many were written.
/// Occurrences without a matching phrase are left unset.
pub fn annotate_repetitions(corpus: &Corpus, occurrences: &mut [Occurrence]) -> usize {
    let mut by_phrase: HashMap<(String, usize), Vec<usize>> = HashMap::new();
    for (i, occurrence) in occurrences.iter().enumerate() {
        by_phrase
            .entry((occurrence.query_filename.clone(), occurrence.query_segment_id))
            .or_default()
            .push(i);
    }

    let mut annotated = 0;
    for melody in corpus.melodies() {
        let counts = repetition_counts(melody);
        let repeated = counts.iter().filter(|&&c| c > 1).count();
        debug!(
            filename = %melody.filename,
            phrases = counts.len(),
            repeated,
            "phrase repetitions"
        );

        for (segment, &count) in counts.iter().enumerate() {
            let Some(indices) = by_phrase.get(&(melody.filename.clone(), segment)) else {
                continue;
            };
            for &i in indices {
                occurrences[i].features.set_phrase_repetitions(count);
                annotated += 1;
            }
        }
    }
    annotated
}
