pub mod config;
pub mod error;
pub mod file_config;
pub mod query;
pub mod types;

pub use config::{Config, LogFormat, PipelineConfig, StrategyKind, DEFAULT_SENTIMENT_MODEL};
pub use error::{BatchError, PipelineError, RecordError, Stage, StageError};
pub use file_config::{load_config, FileConfig};
pub use query::{normalize_subreddit, FilterSet, QueryParams};
pub use types::*;
