//! Error taxonomy for the analytics pipeline.
//!
//! `RecordError` is recovered per record and counted. `BatchError` aborts a
//! run and reaches the caller wrapped in `PipelineError` together with the
//! stage it came from.

use thiserror::Error;

/// Pipeline stage, for error context and failure accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    Score,
    Aggregate,
    Detect,
    Insights,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Normalize => write!(f, "normalize"),
            Stage::Score => write!(f, "score"),
            Stage::Aggregate => write!(f, "aggregate"),
            Stage::Detect => write!(f, "detect"),
            Stage::Insights => write!(f, "insights"),
        }
    }
}

/// A failure confined to one record. The record is dropped from the output.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("record at position {index} has no id")]
    MissingId { index: usize },

    #[error("record {record_id} has an invalid sentiment annotation: {reason}")]
    InvalidSentiment { record_id: String, reason: String },
}

impl RecordError {
    pub fn stage(&self) -> Stage {
        match self {
            RecordError::MissingId { .. } => Stage::Normalize,
            RecordError::InvalidSentiment { .. } => Stage::Score,
        }
    }

    /// The record id, when the record had one.
    pub fn record_id(&self) -> Option<&str> {
        match self {
            RecordError::MissingId { .. } => None,
            RecordError::InvalidSentiment { record_id, .. } => Some(record_id),
        }
    }
}

/// A failure that invalidates the whole batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("window must be a positive duration, got {seconds}s")]
    InvalidWindow { seconds: i64 },

    #[error("anomaly threshold must be finite and positive, got {value}")]
    InvalidThreshold { value: f64 },

    #[error("record {record_id} has a non-finite engagement score")]
    NonFiniteEngagement { record_id: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: BatchError,
}

impl StageError {
    pub fn new(stage: Stage, source: BatchError) -> Self {
        Self { stage, source }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("computing result {fingerprint} failed: {source}")]
    Cache {
        fingerprint: String,
        #[source]
        source: StageError,
    },

    #[error("pipeline run exceeded {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl PipelineError {
    /// The stage that failed, if the failure came from a stage.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage(e) | PipelineError::Cache { source: e, .. } => Some(e.stage),
            PipelineError::Timeout { .. } => None,
        }
    }

    /// Short message for a dashboard banner.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Stage(e) | PipelineError::Cache { source: e, .. } => {
                format!("Analysis failed during {}: {}", e.stage, e.source)
            }
            PipelineError::Timeout { timeout_ms } => {
                let secs = *timeout_ms as f64 / 1000.0;
                format!("Analysis took longer than {secs:.1}s and was cancelled")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_error_message_names_stage_and_cause() {
        let err = StageError::new(Stage::Detect, BatchError::InvalidWindow { seconds: 0 });
        assert_eq!(
            err.to_string(),
            "detect stage failed: window must be a positive duration, got 0s"
        );
    }

    #[test]
    fn pipeline_error_exposes_stage() {
        let err: PipelineError =
            StageError::new(Stage::Detect, BatchError::InvalidThreshold { value: -1.0 }).into();
        assert_eq!(err.stage(), Some(Stage::Detect));
        assert!(err.user_message().starts_with("Analysis failed during detect"));

        let timeout = PipelineError::Timeout { timeout_ms: 1500 };
        assert_eq!(timeout.stage(), None);
        assert!(timeout.user_message().contains("1.5s"));
    }

    #[test]
    fn record_error_reports_stage() {
        assert_eq!(RecordError::MissingId { index: 3 }.stage(), Stage::Normalize);
        let e = RecordError::InvalidSentiment {
            record_id: "a".into(),
            reason: "nan".into(),
        };
        assert_eq!(e.stage(), Stage::Score);
        assert_eq!(e.record_id(), Some("a"));
    }
}
