use serde::{Deserialize, Serialize};
use tracing::warn;

use redpulse_common::{RecordError, Stage};

use crate::sentiment::ScoringCounts;

/// A record dropped during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFailure {
    /// None when the record had no id.
    pub record_id: Option<String>,
    pub stage: Stage,
    pub reason: String,
}

impl From<&RecordError> for RecordFailure {
    fn from(err: &RecordError) -> Self {
        Self {
            record_id: err.record_id().map(str::to_string),
            stage: err.stage(),
            reason: err.to_string(),
        }
    }
}

/// Stats from a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub input_records: usize,
    /// Records beyond `max_records`, never looked at.
    pub truncated: usize,
    pub duplicates_removed: usize,
    /// Records outside the query's subreddit, range or filters.
    pub filtered_out: usize,
    pub failed_records: usize,
    pub failures: Vec<RecordFailure>,
    pub transformer_scored: usize,
    pub lexicon_scored: usize,
    pub transformer_fallbacks: usize,
    pub analyzed: usize,
    pub windows: usize,
    pub anomalies: usize,
    pub trend_peaks: usize,
}

impl RunStats {
    /// Log and count a recovered record failure.
    pub fn record_failure(&mut self, err: &RecordError) {
        warn!(
            stage = %err.stage(),
            record_id = err.record_id().unwrap_or("<none>"),
            error = %err,
            "Dropping record"
        );
        self.failed_records += 1;
        self.failures.push(RecordFailure::from(err));
    }

    pub fn add_scoring(&mut self, counts: ScoringCounts) {
        self.transformer_scored += counts.transformer;
        self.lexicon_scored += counts.lexicon;
        self.transformer_fallbacks += counts.fallbacks;
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Analysis Run Complete ===")?;
        writeln!(f, "Input records:      {}", self.input_records)?;
        if self.truncated > 0 {
            writeln!(f, "Truncated:          {}", self.truncated)?;
        }
        writeln!(f, "Duplicates removed: {}", self.duplicates_removed)?;
        writeln!(f, "Filtered out:       {}", self.filtered_out)?;
        writeln!(f, "Failed records:     {}", self.failed_records)?;
        writeln!(f, "Analyzed:           {}", self.analyzed)?;
        writeln!(f, "\nSentiment:")?;
        writeln!(f, "  Transformer: {}", self.transformer_scored)?;
        writeln!(f, "  Lexicon:     {}", self.lexicon_scored)?;
        if self.transformer_fallbacks > 0 {
            writeln!(f, "  Fallbacks:   {}", self.transformer_fallbacks)?;
        }
        writeln!(f, "\nDetection:")?;
        writeln!(f, "  Windows:     {}", self.windows)?;
        writeln!(f, "  Anomalies:   {}", self.anomalies)?;
        writeln!(f, "  Trend peaks: {}", self.trend_peaks)?;
        if !self.failures.is_empty() {
            writeln!(f, "\nFailures:")?;
            for failure in &self.failures {
                writeln!(
                    f,
                    "  [{}] {}: {}",
                    failure.stage,
                    failure.record_id.as_deref().unwrap_or("<no id>"),
                    failure.reason
                )?;
            }
        }
        Ok(())
    }
}
