use std::sync::Arc;

use futures::stream::{self, StreamExt};
use inference_client::util::normalize_label;
use inference_client::{truncate_to_char_boundary, ClassScore, TextClassifier};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use redpulse_common::{PipelineConfig, SentimentLabel};

use super::ScoringError;

/// One interpreted class distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classified {
    pub label: SentimentLabel,
    pub score: f64,
    pub confidence: f64,
}

/// Transformer strategy: batches texts through a `TextClassifier`.
///
/// The classifier is warmed up on first use. If warm-up fails the scorer
/// stays unavailable for its whole lifetime and callers fall back to the
/// lexicon.
pub struct TransformerScorer {
    classifier: Arc<dyn TextClassifier>,
    ready: OnceCell<Result<(), ScoringError>>,
    batch_size: usize,
    concurrency: usize,
    max_input_bytes: usize,
}

impl TransformerScorer {
    pub fn new(classifier: Arc<dyn TextClassifier>, config: &PipelineConfig) -> Self {
        Self {
            classifier,
            ready: OnceCell::new(),
            batch_size: config.batch_size.max(1),
            concurrency: config.scoring_concurrency.max(1),
            max_input_bytes: config.max_input_bytes,
        }
    }

    pub fn model_name(&self) -> &str {
        self.classifier.model_name()
    }

    /// Warm the model up once. Later calls return the first outcome.
    pub async fn ensure_ready(&self) -> Result<(), ScoringError> {
        self.ready
            .get_or_init(|| async {
                match self.classifier.warm_up().await {
                    Ok(()) => {
                        info!(model = self.model_name(), "Transformer scorer ready");
                        Ok(())
                    }
                    Err(e) => {
                        warn!(
                            model = self.model_name(),
                            error = %e,
                            "Sentiment model unavailable, using lexicon from now on"
                        );
                        Err(ScoringError::UpstreamUnavailable(e.to_string()))
                    }
                }
            })
            .await
            .clone()
    }

    /// Classify texts in chunks of `batch_size`, up to `concurrency` chunks
    /// in flight. Returns one outcome per input, in input order.
    pub async fn classify(&self, texts: &[&str]) -> Vec<Result<Classified, ScoringError>> {
        let per_chunk: Vec<Vec<Result<Classified, ScoringError>>> =
            stream::iter(texts.chunks(self.batch_size))
                .map(|chunk| self.classify_chunk(chunk))
                .buffered(self.concurrency)
                .collect()
                .await;

        per_chunk.into_iter().flatten().collect()
    }

    async fn classify_chunk(&self, chunk: &[&str]) -> Vec<Result<Classified, ScoringError>> {
        let inputs: Vec<String> = chunk
            .iter()
            .map(|t| truncate_to_char_boundary(t, self.max_input_bytes).to_string())
            .collect();

        debug!(model = self.model_name(), texts = inputs.len(), "Classifying chunk");

        let distributions = match self.classifier.classify_batch(&inputs).await {
            Ok(d) => d,
            Err(e) => {
                warn!(
                    model = self.model_name(),
                    texts = inputs.len(),
                    error = %e,
                    "Classifier call failed, falling back to lexicon for chunk"
                );
                let err = ScoringError::Request(e.to_string());
                return vec![Err(err); chunk.len()];
            }
        };

        if distributions.len() != chunk.len() {
            warn!(
                model = self.model_name(),
                expected = chunk.len(),
                got = distributions.len(),
                "Classifier returned wrong number of results, falling back to lexicon for chunk"
            );
            let err = ScoringError::LengthMismatch {
                expected: chunk.len(),
                got: distributions.len(),
            };
            return vec![Err(err); chunk.len()];
        }

        distributions.iter().map(Vec::as_slice).map(interpret).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Positive,
    Negative,
    Neutral,
}

fn class_of(label: &str) -> Option<Class> {
    match normalize_label(label).as_str() {
        "pos" | "positive" | "label_2" => Some(Class::Positive),
        "neg" | "negative" | "label_0" => Some(Class::Negative),
        "neu" | "neutral" | "label_1" => Some(Class::Neutral),
        _ => None,
    }
}

/// Turn a class distribution into label, polarity and confidence.
///
/// Polarity is `P(pos) - P(neg)`. The label is the most probable class;
/// ties go to neutral, then positive.
pub fn interpret(distribution: &[ClassScore]) -> Result<Classified, ScoringError> {
    if distribution.is_empty() {
        return Err(ScoringError::MalformedDistribution("empty distribution".into()));
    }

    let (mut pos, mut neg, mut neu) = (0.0f64, 0.0f64, 0.0f64);
    for class in distribution {
        let p = class.score as f64;
        if !p.is_finite() || p < 0.0 {
            return Err(ScoringError::MalformedDistribution(format!(
                "probability {} for {:?}",
                class.score, class.label
            )));
        }
        match class_of(&class.label) {
            Some(Class::Positive) => pos = pos.max(p),
            Some(Class::Negative) => neg = neg.max(p),
            Some(Class::Neutral) => neu = neu.max(p),
            None => return Err(ScoringError::UnknownLabel(class.label.clone())),
        }
    }

    let mut label = SentimentLabel::Neutral;
    let mut best = neu;
    if pos > best {
        label = SentimentLabel::Positive;
        best = pos;
    }
    if neg > best {
        label = SentimentLabel::Negative;
        best = neg;
    }

    Ok(Classified {
        label,
        score: (pos - neg).clamp(-1.0, 1.0),
        confidence: best.clamp(0.0, 1.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(pairs: &[(&str, f32)]) -> Vec<ClassScore> {
        pairs.iter().map(|(l, s)| ClassScore::new(*l, *s)).collect()
    }

    #[test]
    fn interprets_named_labels() {
        let c = interpret(&dist(&[("POS", 0.8), ("NEU", 0.15), ("NEG", 0.05)])).unwrap();
        assert_eq!(c.label, SentimentLabel::Positive);
        assert!((c.score - 0.75).abs() < 1e-6);
        assert!((c.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn interprets_indexed_labels() {
        let c = interpret(&dist(&[("LABEL_0", 0.7), ("LABEL_1", 0.2), ("LABEL_2", 0.1)])).unwrap();
        assert_eq!(c.label, SentimentLabel::Negative);
        assert!((c.score + 0.6).abs() < 1e-6);
    }

    #[test]
    fn ties_prefer_neutral_then_positive() {
        let c = interpret(&dist(&[("positive", 0.4), ("neutral", 0.4), ("negative", 0.2)])).unwrap();
        assert_eq!(c.label, SentimentLabel::Neutral);
        let c = interpret(&dist(&[("positive", 0.45), ("negative", 0.45), ("neutral", 0.1)])).unwrap();
        assert_eq!(c.label, SentimentLabel::Positive);
    }

    #[test]
    fn rejects_unknown_label() {
        let err = interpret(&dist(&[("joy", 0.9)])).unwrap_err();
        assert_eq!(err, ScoringError::UnknownLabel("joy".into()));
    }

    #[test]
    fn rejects_malformed_probabilities() {
        assert!(matches!(
            interpret(&dist(&[("pos", f32::NAN)])),
            Err(ScoringError::MalformedDistribution(_))
        ));
        assert!(matches!(interpret(&[]), Err(ScoringError::MalformedDistribution(_))));
    }

    #[test]
    fn missing_classes_count_as_zero() {
        let c = interpret(&dist(&[("negative", 0.9)])).unwrap();
        assert_eq!(c.label, SentimentLabel::Negative);
        assert!((c.score + 0.9).abs() < 1e-6);
    }
}
