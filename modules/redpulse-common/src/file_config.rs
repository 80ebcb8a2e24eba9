use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::config::{PipelineConfig, StrategyKind};

/// TOML-backed tunables loaded from disk.
/// Secrets (API tokens) stay as env vars. Every section and field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub sentiment: SentimentConfig,
    pub features: FeaturesConfig,
    pub detector: DetectorConfig,
    pub cache: CacheConfig,
    pub pipeline: RunConfig,
    pub insights: InsightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SentimentConfig {
    pub strategy: StrategyKind,
    pub model: Option<String>,
    pub batch_size: usize,
    pub concurrency: usize,
    pub max_input_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeaturesConfig {
    pub comment_weight: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    pub window_seconds: i64,
    pub z_threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub max_records: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InsightsConfig {
    pub trending_min_count: usize,
    pub top_n: usize,
    pub top_posts: usize,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        let d = PipelineConfig::default();
        Self {
            strategy: d.strategy,
            model: None,
            batch_size: d.batch_size,
            concurrency: d.scoring_concurrency,
            max_input_bytes: d.max_input_bytes,
        }
    }
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            comment_weight: PipelineConfig::default().comment_weight,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        let d = PipelineConfig::default();
        Self {
            window_seconds: d.window_seconds,
            z_threshold: d.z_threshold,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        let d = PipelineConfig::default();
        Self {
            ttl_seconds: d.cache_ttl_seconds,
            max_entries: d.cache_max_entries,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_records: PipelineConfig::default().max_records,
        }
    }
}

impl Default for InsightsConfig {
    fn default() -> Self {
        let d = PipelineConfig::default();
        Self {
            trending_min_count: d.trending_min_count,
            top_n: d.top_n,
            top_posts: d.top_posts,
        }
    }
}

impl FileConfig {
    /// Flatten the sections into the structure the pipeline takes.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::builder()
            .strategy(self.sentiment.strategy)
            .batch_size(self.sentiment.batch_size)
            .scoring_concurrency(self.sentiment.concurrency)
            .max_input_bytes(self.sentiment.max_input_bytes)
            .comment_weight(self.features.comment_weight)
            .window_seconds(self.detector.window_seconds)
            .z_threshold(self.detector.z_threshold)
            .cache_ttl_seconds(self.cache.ttl_seconds)
            .cache_max_entries(self.cache.max_entries)
            .max_records(self.pipeline.max_records)
            .trending_min_count(self.insights.trending_min_count)
            .top_n(self.insights.top_n)
            .top_posts(self.insights.top_posts)
            .build()
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}
