use std::env;
use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

pub const DEFAULT_SENTIMENT_MODEL: &str = "finiteautomata/bertweet-base-sentiment-analysis";

/// Which sentiment strategy the scorer is built with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Transformer,
    Lexicon,
}

/// Tunables threaded explicitly through the pipeline. Fixed for the
/// lifetime of a `Pipeline`.
#[derive(Debug, Clone, PartialEq, TypedBuilder, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[builder(default)]
    pub strategy: StrategyKind,
    /// Texts per classifier call.
    #[builder(default = 512)]
    pub batch_size: usize,
    /// Classifier calls in flight at once.
    #[builder(default = 4)]
    pub scoring_concurrency: usize,
    /// Inputs longer than this are cut at a char boundary before classification.
    #[builder(default = 2000)]
    pub max_input_bytes: usize,
    /// Weight `k` of comments relative to upvotes in the engagement score.
    #[builder(default = 2.0)]
    pub comment_weight: f64,
    #[builder(default = 3600)]
    pub window_seconds: i64,
    #[builder(default = 2.5)]
    pub z_threshold: f64,
    #[builder(default = 3600)]
    pub cache_ttl_seconds: u64,
    #[builder(default = 32)]
    pub cache_max_entries: usize,
    /// Records beyond this count are dropped before normalization.
    #[builder(default = 1000)]
    pub max_records: usize,
    #[builder(default = 3)]
    pub trending_min_count: usize,
    #[builder(default = 10)]
    pub top_n: usize,
    #[builder(default = 5)]
    pub top_posts: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PipelineConfig {
    /// Reject values no run could succeed with. Window and threshold are
    /// left to the detector, which reports them as batch failures.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }
        if self.scoring_concurrency == 0 {
            bail!("scoring_concurrency must be at least 1");
        }
        if !self.comment_weight.is_finite() || self.comment_weight < 0.0 {
            bail!("comment_weight must be finite and non-negative, got {}", self.comment_weight);
        }
        if self.cache_max_entries == 0 {
            bail!("cache_max_entries must be at least 1");
        }
        if self.max_records == 0 {
            bail!("max_records must be at least 1");
        }
        Ok(())
    }
}

/// Environment configuration: secrets and deployment-specific values.
/// Tunables live in the TOML `FileConfig`.
#[derive(Debug, Clone)]
pub struct Config {
    pub hf_api_token: Option<String>,
    pub inference_base_url: Option<String>,
    pub sentiment_model: String,
    pub config_path: Option<PathBuf>,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// `LOG_FORMAT=json` selects JSON lines; anything else is text.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let config = Self {
            hf_api_token: non_empty_env("HF_API_TOKEN"),
            inference_base_url: non_empty_env("INFERENCE_BASE_URL"),
            sentiment_model: non_empty_env("SENTIMENT_MODEL")
                .unwrap_or_else(|| DEFAULT_SENTIMENT_MODEL.to_string()),
            config_path: non_empty_env("REDPULSE_CONFIG").map(PathBuf::from),
            log_format: LogFormat::from_env(),
        };

        config.log_keys();
        config
    }

    fn log_keys(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  HF_API_TOKEN: {}", key_preview(self.hf_api_token.as_deref()));
        tracing::info!("  INFERENCE_BASE_URL: {}", key_preview(self.inference_base_url.as_deref()));
        tracing::info!("  SENTIMENT_MODEL: {}", self.sentiment_model);
    }
}

/// First five characters and the length, never the whole value.
fn key_preview(val: Option<&str>) -> String {
    match val {
        Some(v) if !v.is_empty() => {
            let head: String = v.chars().take(5).collect();
            format!("{}...({} chars)", head, v.chars().count())
        }
        _ => "<not set>".to_string(),
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.strategy, StrategyKind::Transformer);
        assert_eq!(cfg.batch_size, 512);
        assert_eq!(cfg.comment_weight, 2.0);
        assert_eq!(cfg.z_threshold, 2.5);
        assert_eq!(cfg.window_seconds, 3600);
        assert_eq!(cfg.cache_ttl_seconds, 3600);
        assert_eq!(cfg.cache_max_entries, 32);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn builder_overrides_single_fields() {
        let cfg = PipelineConfig::builder()
            .strategy(StrategyKind::Lexicon)
            .z_threshold(3.0)
            .build();
        assert_eq!(cfg.strategy, StrategyKind::Lexicon);
        assert_eq!(cfg.z_threshold, 3.0);
        assert_eq!(cfg.batch_size, 512);
    }

    #[test]
    fn validate_rejects_zero_batch_size() {
        let cfg = PipelineConfig::builder().batch_size(0).build();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_negative_comment_weight() {
        let cfg = PipelineConfig::builder().comment_weight(-1.0).build();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn key_preview_cuts_on_char_boundaries() {
        assert_eq!(key_preview(None), "<not set>");
        assert_eq!(key_preview(Some("")), "<not set>");
        assert_eq!(key_preview(Some("hf_abcdefgh")), "hf_ab...(11 chars)");
        assert_eq!(key_preview(Some("ключ-токен")), "ключ-...(10 chars)");
    }
}
