use tracing::{info, info_span};

use crate::averager::average_occurrences;
use crate::corpus::Corpus;
use crate::expectancy::TwoFactorModel;
use crate::import::{
    merge_entropy, merge_information_content, EntropyRow, InformationContentRow, MergeReport,
};
use crate::occurrence::Occurrence;
use crate::repetition::annotate_repetitions;
use crate::table::HypothesisTable;
use crate::Result;

/// Rows produced by the external tools. Either may be absent, in which case
/// the corresponding features stay missing.
#[derive(Debug, Clone, Default)]
pub struct PipelineInputs {
    pub information_content: Option<Vec<InformationContentRow>>,
    pub entropy: Option<Vec<EntropyRow>>,
}

/// Counts gathered over one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub melodies: usize,
    pub occurrences: usize,
    pub information_content: Option<MergeReport>,
    pub entropy: Option<MergeReport>,
    /// Occurrences that received a repetition count.
    pub repetitions: usize,
}

/// Result of a run. The corpus is handed back with its note features filled.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub corpus: Corpus,
    pub table: HypothesisTable,
    pub summary: RunSummary,
}

/// Runs every stage in order over one corpus and its occurrences.
#[derive(Debug, Clone, Default)]
pub struct FeaturePipeline {
    model: TwoFactorModel,
}

impl FeaturePipeline {
    pub fn new(model: TwoFactorModel) -> Self {
        Self { model }
    }

    /// Validate, score, merge, average, count and tabulate.
    ///
    /// Each stage finishes before the next starts, so the table is built
    /// only after every feature has been written.
    pub fn run(
        &self,
        mut corpus: Corpus,
        mut occurrences: Vec<Occurrence>,
        inputs: PipelineInputs,
    ) -> Result<PipelineRun> {
        let _span = info_span!(
            "feature_pipeline",
            melodies = corpus.len(),
            occurrences = occurrences.len()
        )
        .entered();

        corpus.validate()?;

        let mut summary = RunSummary {
            melodies: corpus.len(),
            occurrences: occurrences.len(),
            ..Default::default()
        };

        self.model.annotate_corpus(&mut corpus);

        if let Some(rows) = &inputs.information_content {
            let report = merge_information_content(rows, &mut corpus);
            info!(
                melodies = report.matched,
                skipped = report.missing.len(),
                "merged information content"
            );
            summary.information_content = Some(report);
        }

        average_occurrences(&corpus, &mut occurrences)?;

        summary.repetitions = annotate_repetitions(&corpus, &mut occurrences);

        if let Some(rows) = &inputs.entropy {
            let report = merge_entropy(rows, &mut occurrences);
            info!(
                occurrences = report.updated,
                unmatched_rows = report.unmatched,
                "merged entropy"
            );
            summary.entropy = Some(report);
        }

        let table = HypothesisTable::from_occurrences(occurrences);
        info!(rows = table.len(), "hypothesis table built");

        Ok(PipelineRun {
            corpus,
            table,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Melody, Symbol};
    use crate::Error;
    use pretty_assertions::assert_eq;

    #[test]
    fn invalid_corpus_stops_the_run() {
        let corpus = Corpus::from(vec![Melody::new(
            "bad",
            vec![Symbol::new(1.0, 1.0, 60, 0), Symbol::new(0.5, 1.0, 60, 0)],
        )]);
        let err = FeaturePipeline::default()
            .run(corpus, vec![], PipelineInputs::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCorpus(_)));
    }

    #[test]
    fn absent_inputs_leave_features_missing() {
        let corpus = Corpus::from(vec![Melody::new(
            "tune1",
            vec![
                Symbol::new(0.0, 1.0, 60, 0),
                Symbol::new(1.0, 1.0, 62, 0),
                Symbol::new(2.0, 1.0, 64, 0),
            ],
        )]);
        let run = FeaturePipeline::default()
            .run(corpus, vec![Occurrence::new("tune1", 0)], PipelineInputs::default())
            .unwrap();

        let features = &run.table.rows[0].features;
        assert_eq!(features.information_content(), None);
        assert_eq!(features.mean_entropy(), None);
        assert_eq!(features.pitch_proximity(), Some(2.0));
        assert_eq!(features.phrase_repetitions(), Some(1));
        assert_eq!(run.summary.information_content, None);
        assert_eq!(run.summary.repetitions, 1);
    }
}
