pub mod cache;
pub mod detector;
pub mod features;
pub mod insights;
pub mod normalizer;
pub mod orchestrator;
pub mod result;
pub mod sentiment;
pub mod source;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use cache::{CacheError, CacheStats, Fingerprint, ResultCache};
pub use detector::{Detection, Detector};
pub use features::{FeatureAggregator, Snapshot};
pub use insights::{compute_insights, Insights};
pub use normalizer::{normalize, normalize_batch, NormalizedBatch};
pub use orchestrator::Pipeline;
pub use result::{AnalyzedRecord, ResultSet};
pub use sentiment::{ScoringError, SentimentScorer, SentimentStrategy, LEXICON_CONFIDENCE};
pub use source::{JsonFileSource, RecordSource};
pub use stats::{RecordFailure, RunStats};
