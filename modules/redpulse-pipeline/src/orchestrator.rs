//! Sequences the stages and assembles the `ResultSet`.
//!
//! Per-record problems are counted in `RunStats` and the record is dropped;
//! batch problems abort the run with the stage that raised them.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use inference_client::TextClassifier;
use tracing::{info, warn};
use uuid::Uuid;

use redpulse_common::{
    CanonicalRecord, PipelineConfig, PipelineError, QueryParams, RawRecord, RecordError,
    SentimentAnnotation, Stage, StageError,
};

use crate::cache::{CacheError, Fingerprint, ResultCache};
use crate::detector::Detector;
use crate::features::{FeatureAggregator, Snapshot};
use crate::insights::compute_insights;
use crate::normalizer::normalize_batch;
use crate::result::{AnalyzedRecord, ResultSet};
use crate::sentiment::SentimentScorer;
use crate::stats::RunStats;

pub struct Pipeline {
    config: PipelineConfig,
    scorer: SentimentScorer,
    aggregator: FeatureAggregator,
    detector: Detector,
    cache: ResultCache<ResultSet>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, scorer: SentimentScorer) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            aggregator: FeatureAggregator::from_config(&config),
            detector: Detector::new(config.z_threshold),
            cache: ResultCache::new(config.cache_max_entries),
            scorer,
            config,
        })
    }

    /// Build with the scorer the config asks for.
    pub fn from_config(
        config: PipelineConfig,
        classifier: Option<Arc<dyn TextClassifier>>,
    ) -> Result<Self> {
        let scorer = SentimentScorer::from_config(&config, classifier);
        Self::new(config, scorer)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn scorer(&self) -> &SentimentScorer {
        &self.scorer
    }

    pub fn cache(&self) -> &ResultCache<ResultSet> {
        &self.cache
    }

    /// Cached run. Within the TTL a query with the same fingerprint returns
    /// the stored result without looking at `raw`.
    pub async fn run(
        &self,
        raw: &[RawRecord],
        query: &QueryParams,
        previous: Option<&Snapshot>,
    ) -> Result<Arc<ResultSet>, PipelineError> {
        let query = query.normalized();
        let fingerprint = Fingerprint::for_query(&query);
        let ttl = Duration::from_secs(self.config.cache_ttl_seconds);

        self.cache
            .get_or_compute(&fingerprint, ttl, || {
                self.compute(raw, &query, &fingerprint, previous, Utc::now())
            })
            .await
            .map_err(|CacheError::Compute { fingerprint, source }| PipelineError::Cache {
                fingerprint: fingerprint.to_string(),
                source,
            })
    }

    /// `run` bounded by `timeout`. On expiry nothing is cached.
    pub async fn run_with_timeout(
        &self,
        raw: &[RawRecord],
        query: &QueryParams,
        previous: Option<&Snapshot>,
        timeout: Duration,
    ) -> Result<Arc<ResultSet>, PipelineError> {
        match tokio::time::timeout(timeout, self.run(raw, query, previous)).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                warn!(timeout_ms, "Pipeline run timed out");
                Err(PipelineError::Timeout { timeout_ms })
            }
        }
    }

    /// Run without touching the cache.
    pub async fn run_uncached(
        &self,
        raw: &[RawRecord],
        query: &QueryParams,
        previous: Option<&Snapshot>,
    ) -> Result<ResultSet, PipelineError> {
        self.run_uncached_at(raw, query, previous, Utc::now()).await
    }

    /// `run_uncached` with an explicit clock, for reproducible runs.
    pub async fn run_uncached_at(
        &self,
        raw: &[RawRecord],
        query: &QueryParams,
        previous: Option<&Snapshot>,
        now: DateTime<Utc>,
    ) -> Result<ResultSet, PipelineError> {
        let query = query.normalized();
        let fingerprint = Fingerprint::for_query(&query);
        self.compute(raw, &query, &fingerprint, previous, now)
            .await
            .map_err(PipelineError::from)
    }

    async fn compute(
        &self,
        raw: &[RawRecord],
        query: &QueryParams,
        fingerprint: &Fingerprint,
        previous: Option<&Snapshot>,
        now: DateTime<Utc>,
    ) -> Result<ResultSet, StageError> {
        let mut stats = RunStats {
            input_records: raw.len(),
            ..Default::default()
        };
        info!(
            fingerprint = fingerprint.short(),
            subreddit = %query.subreddit,
            records = raw.len(),
            "Starting analysis run"
        );

        // --- Normalize ---
        let keep = raw.len().min(self.config.max_records);
        stats.truncated = raw.len() - keep;
        if stats.truncated > 0 {
            warn!(
                dropped = stats.truncated,
                max_records = self.config.max_records,
                "Input exceeds max_records, truncating"
            );
        }

        let batch = normalize_batch(&raw[..keep]);
        stats.duplicates_removed = batch.duplicates_removed;
        for failure in &batch.failures {
            stats.record_failure(failure);
        }

        let before = batch.records.len();
        let records: Vec<CanonicalRecord> = batch
            .records
            .into_iter()
            .filter(|r| query.matches(r))
            .collect();
        stats.filtered_out = before - records.len();

        tokio::task::yield_now().await;

        // --- Score ---
        let scored = self.scorer.score_batch_counted(&records).await;
        stats.add_scoring(scored.counts);

        let mut kept_records = Vec::with_capacity(records.len());
        let mut annotations: Vec<SentimentAnnotation> = Vec::with_capacity(records.len());
        for (record, annotation) in records.into_iter().zip(scored.annotations) {
            match annotation.check_ranges() {
                Ok(()) => {
                    kept_records.push(record);
                    annotations.push(annotation);
                }
                Err(reason) => stats.record_failure(&RecordError::InvalidSentiment {
                    record_id: record.id,
                    reason,
                }),
            }
        }
        let records = kept_records;

        tokio::task::yield_now().await;

        // --- Aggregate ---
        let features = self.aggregator.aggregate(&records, now, previous);

        // --- Detect ---
        let window = chrono::Duration::seconds(self.config.window_seconds);
        let detection = self
            .detector
            .detect(&features, &annotations, window)
            .map_err(|e| {
                warn!(error = %e, "Detection failed, aborting run");
                StageError::new(Stage::Detect, e)
            })?;

        // --- Insights ---
        let insights = compute_insights(&records, &annotations, &features, query, &self.config);

        stats.analyzed = records.len();
        stats.windows = detection.windows.len();
        stats.anomalies = detection.anomaly_count();
        stats.trend_peaks = detection.peak_count();

        let analyzed: Vec<AnalyzedRecord> = records
            .into_iter()
            .zip(annotations)
            .zip(features)
            .zip(detection.flags)
            .map(|(((record, sentiment), features), anomaly)| AnalyzedRecord {
                record,
                sentiment,
                features,
                anomaly,
            })
            .collect();

        info!(
            fingerprint = fingerprint.short(),
            analyzed = stats.analyzed,
            failed = stats.failed_records,
            anomalies = stats.anomalies,
            peaks = stats.trend_peaks,
            fallbacks = stats.transformer_fallbacks,
            "Analysis run complete"
        );

        Ok(ResultSet {
            run_id: Uuid::new_v4(),
            fingerprint: fingerprint.clone(),
            query: query.clone(),
            computed_at: now,
            records: analyzed,
            windows: detection.windows,
            insights,
            stats,
        })
    }
}
