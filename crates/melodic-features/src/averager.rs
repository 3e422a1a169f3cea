use tracing::debug;

use crate::corpus::{Corpus, NoteFeatures};
use crate::occurrence::Occurrence;
use crate::{Error, Result};

/// Mean of the present values. `None` when nothing is present; missing
/// values (including NaN) never count as zero.
pub fn segment_average<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = values
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .fold((0.0_f64, 0_usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Fill the averaged note features and phrase length of every occurrence.
///
/// Fails on the first occurrence whose melody or phrase is not in the
/// corpus: such a row would have nothing to aggregate from.
pub fn average_occurrences(corpus: &Corpus, occurrences: &mut [Occurrence]) -> Result<()> {
    for (index, occurrence) in occurrences.iter_mut().enumerate() {
        let melody = corpus
            .melody(&occurrence.query_filename)
            .ok_or_else(|| Error::UnknownMelody {
                index,
                filename: occurrence.query_filename.clone(),
            })?;

        let phrase = melody
            .phrase(occurrence.query_segment_id)
            .ok_or_else(|| Error::UnresolvedOccurrence {
                index,
                filename: occurrence.query_filename.clone(),
                segment: occurrence.query_segment_id,
                phrase_count: melody.phrase_count(),
            })?;

        let notes: Vec<&NoteFeatures> = phrase.symbols.iter().map(|s| &s.features).collect();
        let features = &mut occurrence.features;
        features.set_information_content(segment_average(
            notes.iter().map(|n| n.information_content()),
        ));
        features.set_pitch_proximity(segment_average(notes.iter().map(|n| n.pitch_proximity())));
        features.set_pitch_reversal(segment_average(notes.iter().map(|n| n.pitch_reversal())));
        features.set_phrase_length(phrase.len());
    }

    debug!(occurrences = occurrences.len(), "segment averages computed");
    Ok(())
}
