//! Two-factor melodic expectancy (pitch proximity and pitch reversal).
//!
//! Each note is judged against the interval that led into the previous note
//! (the implicative interval). Pitch proximity is the size of the realized
//! interval. Pitch reversal combines a registral direction term, which only
//! has an opinion after large implicative intervals, with a registral return
//! term for reversals of similar size.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corpus::{Corpus, Melody};

/// Scores for one note. `None` where the model makes no prediction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectancyScore {
    pub pitch_proximity: Option<f64>,
    pub pitch_reversal: Option<f64>,
}

/// Parameters of the two-factor model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoFactorModel {
    /// Largest implicative interval (semitones) the model accepts.
    pub max_implicative: u32,
    /// Largest realized interval (semitones) the model accepts.
    pub max_realized: u32,
    /// Implicative interval at which reversal is undefined. Smaller intervals
    /// are "small", larger ones "large".
    pub tritone: u32,
    /// Maximum size difference for a reversal to count as a return.
    pub return_tolerance: u32,
    pub return_weight: f64,
}

impl Default for TwoFactorModel {
    fn default() -> Self {
        Self {
            max_implicative: 11,
            max_realized: 12,
            tritone: 6,
            return_tolerance: 2,
            return_weight: 1.5,
        }
    }
}

impl TwoFactorModel {
    /// Score the realized interval `realized` following `implicative`.
    pub fn score(&self, implicative: i32, realized: i32) -> ExpectancyScore {
        let implicative_size = implicative.unsigned_abs();
        let realized_size = realized.unsigned_abs();

        if implicative_size > self.max_implicative || realized_size > self.max_realized {
            return ExpectancyScore::default();
        }

        ExpectancyScore {
            pitch_proximity: Some(realized_size as f64),
            pitch_reversal: self.pitch_reversal(implicative, realized),
        }
    }

    fn pitch_reversal(&self, implicative: i32, realized: i32) -> Option<f64> {
        let implicative_size = implicative.unsigned_abs();
        if implicative_size == self.tritone {
            return None;
        }

        let turn = implicative.signum() * realized.signum();

        let direction = if implicative_size < self.tritone {
            0.0
        } else {
            // Lateral motion (unison) after a large leap is neither.
            match turn {
                1 => -1.0,
                -1 => 1.0,
                _ => 0.0,
            }
        };

        let registral_return = if turn < 0
            && implicative_size.abs_diff(realized.unsigned_abs()) <= self.return_tolerance
        {
            self.return_weight
        } else {
            0.0
        };

        Some(direction + registral_return)
    }

    /// Score every note given the interval into each note (`None` for the
    /// first). The first two notes never get a score.
    pub fn score_intervals(&self, intervals: &[Option<i32>]) -> Vec<ExpectancyScore> {
        intervals
            .iter()
            .enumerate()
            .map(|(i, &realized)| {
                if i < 2 {
                    return ExpectancyScore::default();
                }
                match (intervals[i - 1], realized) {
                    (Some(implicative), Some(realized)) => self.score(implicative, realized),
                    _ => ExpectancyScore::default(),
                }
            })
            .collect()
    }

    /// Write scores onto the notes of one melody and return them.
    pub fn annotate_melody(&self, melody: &mut Melody) -> Vec<ExpectancyScore> {
        let scores = self.score_intervals(&melody.pitch_intervals());
        for (symbol, score) in melody.symbols.iter_mut().zip(&scores) {
            symbol.features.set_pitch_proximity(score.pitch_proximity);
            symbol.features.set_pitch_reversal(score.pitch_reversal);
        }
        scores
    }

    pub fn annotate_corpus(&self, corpus: &mut Corpus) {
        for melody in corpus.melodies_mut() {
            let scores = self.annotate_melody(melody);
            let scored = scores.iter().filter(|s| s.pitch_proximity.is_some()).count();
            debug!(
                filename = %melody.filename,
                notes = scores.len(),
                scored,
                "expectancy scored"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Symbol;
    use pretty_assertions::assert_eq;

    fn score(implicative: i32, realized: i32) -> ExpectancyScore {
        TwoFactorModel::default().score(implicative, realized)
    }

    #[test]
    fn large_leap_then_similar_reversal() {
        let s = score(7, -5);
        assert_eq!(s.pitch_proximity, Some(5.0));
        assert_eq!(s.pitch_reversal, Some(2.5));
    }

    #[test]
    fn large_leap_continued_is_penalized() {
        assert_eq!(score(8, 3).pitch_reversal, Some(-1.0));
        assert_eq!(score(-9, -1).pitch_reversal, Some(-1.0));
    }

    #[test]
    fn large_leap_reversed_by_dissimilar_interval() {
        // Opposite direction but |9 - 2| > 2, so no return bonus
        assert_eq!(score(9, -2).pitch_reversal, Some(1.0));
    }

    #[test]
    fn small_interval_has_no_direction_preference() {
        assert_eq!(score(2, 3).pitch_reversal, Some(0.0));
        assert_eq!(score(-3, 2).pitch_reversal, Some(1.5));
        assert_eq!(score(4, -1).pitch_reversal, Some(0.0));
    }

    #[test]
    fn tritone_implicative_leaves_reversal_missing() {
        for p in [-12, -6, 0, 1, 6, 12] {
            let s = score(6, p);
            assert_eq!(s.pitch_reversal, None, "p = {}", p);
            assert_eq!(s.pitch_proximity, Some(p.abs() as f64));
        }
        assert_eq!(score(-6, 3).pitch_reversal, None);
    }

    #[test]
    fn outside_octave_is_missing() {
        assert_eq!(score(12, 1), ExpectancyScore::default());
        assert_eq!(score(-12, 1), ExpectancyScore::default());
        assert_eq!(score(1, 13), ExpectancyScore::default());
        assert_eq!(score(11, -12).pitch_proximity, Some(12.0));
    }

    #[test]
    fn unison_after_large_leap() {
        assert_eq!(score(7, 0).pitch_reversal, Some(0.0));
        assert_eq!(score(-7, 0).pitch_reversal, Some(0.0));
        assert_eq!(score(7, 0).pitch_proximity, Some(0.0));
    }

    #[test]
    fn first_two_notes_are_never_scored() {
        let model = TwoFactorModel::default();
        let scores = model.score_intervals(&[None, Some(2), Some(-2), Some(7)]);
        assert_eq!(scores[0], ExpectancyScore::default());
        assert_eq!(scores[1], ExpectancyScore::default());
        assert_eq!(scores[2].pitch_reversal, Some(1.5));
        assert_eq!(scores[3].pitch_proximity, Some(7.0));
        assert_eq!(scores[3].pitch_reversal, Some(0.0));
    }

    #[test]
    fn second_note_is_missing_even_after_scored_notes() {
        // Scores must not leak from one note to the next
        let model = TwoFactorModel::default();
        let scores = model.score_intervals(&[None, Some(1)]);
        assert_eq!(scores, vec![ExpectancyScore::default(); 2]);
    }

    #[test]
    fn annotate_writes_note_features() {
        let mut melody = Melody::new(
            "tune",
            vec![
                Symbol::new(0.0, 1.0, 60, 0),
                Symbol::new(1.0, 1.0, 67, 0).with_interval(7),
                Symbol::new(2.0, 1.0, 62, 0).with_interval(-5),
            ],
        );
        TwoFactorModel::default().annotate_melody(&mut melody);

        assert_eq!(melody.symbols[0].features.pitch_proximity(), None);
        assert_eq!(melody.symbols[1].features.pitch_reversal(), None);
        assert_eq!(melody.symbols[2].features.pitch_proximity(), Some(5.0));
        assert_eq!(melody.symbols[2].features.pitch_reversal(), Some(2.5));
    }
}
