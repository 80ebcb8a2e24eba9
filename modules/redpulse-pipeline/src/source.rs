// Record sources: where raw platform records come from.
//
// RecordSource is the contract the pipeline needs from the platform API
// client. JsonFileSource serves records saved to disk, as a JSON array or
// one JSON object per line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use redpulse_common::{QueryParams, RawRecord};

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch up to `limit` raw records for the query. Returning fewer is
    /// normal; filtering by the query is best-effort and the pipeline
    /// applies it again.
    async fn fetch(&self, query: &QueryParams, limit: usize) -> Result<Vec<RawRecord>>;
}

pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    async fn fetch(&self, _query: &QueryParams, limit: usize) -> Result<Vec<RawRecord>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read records file: {}", self.path.display()))?;

        let mut records = parse_records(&content)
            .with_context(|| format!("Failed to parse records file: {}", self.path.display()))?;
        records.truncate(limit);

        info!(path = %self.path.display(), records = records.len(), "Loaded raw records");
        Ok(records)
    }
}

/// Parse a JSON array of records, or JSON lines.
pub fn parse_records(content: &str) -> Result<Vec<RawRecord>> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid record on line {}", i + 1))
        })
        .collect()
}
