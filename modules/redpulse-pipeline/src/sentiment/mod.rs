//! Sentiment scoring: one annotation per record, transformer first,
//! lexicon when the model can't answer.

pub mod lexicon;
pub mod transformer;

use std::sync::Arc;

use inference_client::TextClassifier;
use thiserror::Error;
use tracing::{info, warn};

use redpulse_common::{
    CanonicalRecord, PipelineConfig, SentimentAnnotation, SentimentMethod, StrategyKind,
};

pub use lexicon::LEXICON_CONFIDENCE;
pub use transformer::{Classified, TransformerScorer};

/// Why the transformer could not score a record. Never surfaces to
/// callers; each one turns into a lexicon fallback.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("sentiment model unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("classifier request failed: {0}")]
    Request(String),

    #[error("classifier returned {got} distributions for {expected} inputs")]
    LengthMismatch { expected: usize, got: usize },

    #[error("unknown class label {0:?}")]
    UnknownLabel(String),

    #[error("malformed class distribution: {0}")]
    MalformedDistribution(String),
}

/// Scoring strategy, fixed at construction.
pub enum SentimentStrategy {
    Transformer(TransformerScorer),
    Lexicon,
}

/// Per-batch method accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoringCounts {
    pub transformer: usize,
    pub lexicon: usize,
    /// Records the transformer failed on that the lexicon scored instead.
    pub fallbacks: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScoredBatch {
    pub annotations: Vec<SentimentAnnotation>,
    pub counts: ScoringCounts,
}

pub struct SentimentScorer {
    strategy: SentimentStrategy,
}

impl SentimentScorer {
    pub fn new(strategy: SentimentStrategy) -> Self {
        Self { strategy }
    }

    pub fn lexicon() -> Self {
        Self::new(SentimentStrategy::Lexicon)
    }

    pub fn transformer(classifier: Arc<dyn TextClassifier>, config: &PipelineConfig) -> Self {
        Self::new(SentimentStrategy::Transformer(TransformerScorer::new(
            classifier, config,
        )))
    }

    /// Build the strategy the config asks for. A transformer strategy with
    /// no classifier degrades to the lexicon.
    pub fn from_config(
        config: &PipelineConfig,
        classifier: Option<Arc<dyn TextClassifier>>,
    ) -> Self {
        match (config.strategy, classifier) {
            (StrategyKind::Transformer, Some(classifier)) => {
                info!(model = classifier.model_name(), "Using transformer sentiment strategy");
                Self::transformer(classifier, config)
            }
            (StrategyKind::Transformer, None) => {
                warn!("Transformer strategy requested without a classifier, using lexicon");
                Self::lexicon()
            }
            (StrategyKind::Lexicon, _) => {
                info!("Using lexicon sentiment strategy");
                Self::lexicon()
            }
        }
    }

    pub fn strategy(&self) -> &SentimentStrategy {
        &self.strategy
    }

    /// Score a single record.
    pub async fn score(&self, record: &CanonicalRecord) -> SentimentAnnotation {
        self.score_batch(std::slice::from_ref(record))
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| lexicon::annotate(&record.id, &record.text))
    }

    /// Score records. One annotation per input, in input order.
    pub async fn score_batch(&self, records: &[CanonicalRecord]) -> Vec<SentimentAnnotation> {
        self.score_batch_counted(records).await.annotations
    }

    /// `score_batch` plus how each record was scored.
    pub async fn score_batch_counted(&self, records: &[CanonicalRecord]) -> ScoredBatch {
        let scorer = match &self.strategy {
            SentimentStrategy::Lexicon => return score_with_lexicon(records),
            SentimentStrategy::Transformer(scorer) => scorer,
        };

        if scorer.ensure_ready().await.is_err() {
            return score_with_lexicon(records);
        }

        let mut annotations: Vec<Option<SentimentAnnotation>> = vec![None; records.len()];
        let mut counts = ScoringCounts::default();

        // Empty texts never reach the model.
        let mut pending = Vec::new();
        for (i, record) in records.iter().enumerate() {
            if record.text.trim().is_empty() {
                annotations[i] = Some(SentimentAnnotation::neutral(
                    &record.id,
                    SentimentMethod::Transformer,
                ));
                counts.transformer += 1;
            } else {
                pending.push(i);
            }
        }

        let texts: Vec<&str> = pending.iter().map(|&i| records[i].text.as_str()).collect();
        let outcomes = scorer.classify(&texts).await;

        for (&i, outcome) in pending.iter().zip(outcomes) {
            let record = &records[i];
            annotations[i] = Some(match outcome {
                Ok(c) => {
                    counts.transformer += 1;
                    SentimentAnnotation {
                        record_id: record.id.clone(),
                        label: c.label,
                        score: c.score,
                        method: SentimentMethod::Transformer,
                        confidence: c.confidence,
                    }
                }
                Err(e) => {
                    let chunk_level =
                        matches!(e, ScoringError::Request(_) | ScoringError::LengthMismatch { .. });
                    if !chunk_level {
                        // chunk-level failures are already logged once per chunk
                        warn!(
                            record_id = %record.id,
                            error = %e,
                            "Transformer output rejected, using lexicon"
                        );
                    }
                    counts.lexicon += 1;
                    counts.fallbacks += 1;
                    lexicon::annotate(&record.id, &record.text)
                }
            });
        }

        let annotations = records
            .iter()
            .zip(annotations)
            .map(|(record, a)| a.unwrap_or_else(|| lexicon::annotate(&record.id, &record.text)))
            .collect();

        ScoredBatch { annotations, counts }
    }
}

fn score_with_lexicon(records: &[CanonicalRecord]) -> ScoredBatch {
    ScoredBatch {
        annotations: records
            .iter()
            .map(|r| lexicon::annotate(&r.id, &r.text))
            .collect(),
        counts: ScoringCounts {
            lexicon: records.len(),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record_with_text, MockClassifier};
    use redpulse_common::SentimentLabel;

    fn config() -> PipelineConfig {
        PipelineConfig::builder().batch_size(2).scoring_concurrency(2).build()
    }

    #[tokio::test]
    async fn lexicon_strategy_scores_every_record() {
        let scorer = SentimentScorer::lexicon();
        let records = vec![
            record_with_text("a", "bullish on this, great numbers"),
            record_with_text("b", ""),
        ];
        let batch = scorer.score_batch_counted(&records).await;
        assert_eq!(batch.annotations.len(), 2);
        assert_eq!(batch.annotations[0].label, SentimentLabel::Positive);
        assert_eq!(batch.annotations[1], SentimentAnnotation::neutral("b", SentimentMethod::Lexicon));
        assert_eq!(batch.counts.lexicon, 2);
    }

    #[tokio::test]
    async fn transformer_preserves_order_across_chunks() {
        let classifier = Arc::new(MockClassifier::keyword_driven());
        let scorer = SentimentScorer::transformer(classifier.clone(), &config());
        let records = vec![
            record_with_text("1", "happy"),
            record_with_text("2", "sad"),
            record_with_text("3", "meh"),
            record_with_text("4", "sad"),
            record_with_text("5", "happy"),
        ];
        let annotations = scorer.score_batch(&records).await;
        let labels: Vec<_> = annotations.iter().map(|a| a.label).collect();
        assert_eq!(
            labels,
            vec![
                SentimentLabel::Positive,
                SentimentLabel::Negative,
                SentimentLabel::Neutral,
                SentimentLabel::Negative,
                SentimentLabel::Positive,
            ]
        );
        let ids: Vec<_> = annotations.iter().map(|a| a.record_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
        assert!(annotations.iter().all(|a| a.method == SentimentMethod::Transformer));
        // 5 texts in chunks of 2
        assert_eq!(classifier.batch_calls(), 3);
    }

    #[tokio::test]
    async fn empty_text_skips_the_model() {
        let classifier = Arc::new(MockClassifier::keyword_driven());
        let scorer = SentimentScorer::transformer(classifier.clone(), &config());
        let a = scorer.score(&record_with_text("e", "   ")).await;
        assert_eq!(a.label, SentimentLabel::Neutral);
        assert_eq!(a.score, 0.0);
        assert_eq!(a.confidence, 0.0);
        assert_eq!(classifier.batch_calls(), 0);
    }

    #[tokio::test]
    async fn failed_call_falls_back_to_lexicon() {
        let classifier = Arc::new(MockClassifier::keyword_driven().failing_batches());
        let scorer = SentimentScorer::transformer(classifier, &config());
        let records = vec![
            record_with_text("a", "terrible crash"),
            record_with_text("b", "great rally"),
        ];
        let batch = scorer.score_batch_counted(&records).await;
        assert_eq!(batch.counts.fallbacks, 2);
        assert_eq!(batch.counts.transformer, 0);
        assert!(batch.annotations.iter().all(|a| a.method == SentimentMethod::Lexicon));
        assert_eq!(batch.annotations[0].label, SentimentLabel::Negative);
        assert_eq!(batch.annotations[1].label, SentimentLabel::Positive);
    }

    #[tokio::test]
    async fn warm_up_failure_switches_to_lexicon_for_good() {
        let classifier = Arc::new(MockClassifier::keyword_driven().unavailable());
        let scorer = SentimentScorer::transformer(classifier.clone(), &config());
        let records = vec![record_with_text("a", "happy")];

        for _ in 0..3 {
            let batch = scorer.score_batch_counted(&records).await;
            assert_eq!(batch.annotations[0].method, SentimentMethod::Lexicon);
            assert_eq!(batch.counts.lexicon, 1);
        }
        assert_eq!(classifier.warm_up_calls(), 1);
        assert_eq!(classifier.batch_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_label_falls_back_per_record() {
        let classifier = Arc::new(MockClassifier::keyword_driven().with_label_for("weird", "joy"));
        let scorer = SentimentScorer::transformer(classifier, &config());
        let records = vec![
            record_with_text("a", "happy"),
            record_with_text("b", "weird but great"),
        ];
        let batch = scorer.score_batch_counted(&records).await;
        assert_eq!(batch.annotations[0].method, SentimentMethod::Transformer);
        assert_eq!(batch.annotations[1].method, SentimentMethod::Lexicon);
        assert_eq!(batch.counts.transformer, 1);
        assert_eq!(batch.counts.fallbacks, 1);
    }

    #[tokio::test]
    async fn from_config_without_classifier_uses_lexicon() {
        let scorer = SentimentScorer::from_config(&PipelineConfig::default(), None);
        assert!(matches!(scorer.strategy(), SentimentStrategy::Lexicon));
    }
}
