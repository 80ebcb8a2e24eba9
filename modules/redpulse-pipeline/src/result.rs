use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use redpulse_common::{
    AnomalyFlag, CanonicalRecord, FeatureVector, QueryParams, SentimentAnnotation, WindowStats,
};

use crate::cache::Fingerprint;
use crate::features::Snapshot;
use crate::insights::Insights;
use crate::stats::RunStats;

/// One record with everything derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedRecord {
    pub record: CanonicalRecord,
    pub sentiment: SentimentAnnotation,
    pub features: FeatureVector,
    pub anomaly: AnomalyFlag,
}

impl AnalyzedRecord {
    pub fn id(&self) -> &str {
        &self.record.id
    }
}

/// Consolidated output of one pipeline run. Immutable once built; the
/// cache shares it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub run_id: Uuid,
    pub fingerprint: Fingerprint,
    pub query: QueryParams,
    pub computed_at: DateTime<Utc>,
    /// Surviving records in input order.
    pub records: Vec<AnalyzedRecord>,
    /// Ascending by `bucket_start`.
    pub windows: Vec<WindowStats>,
    pub insights: Insights,
    pub stats: RunStats,
}

impl ResultSet {
    pub fn record(&self, record_id: &str) -> Option<&AnalyzedRecord> {
        self.records.iter().find(|r| r.id() == record_id)
    }

    pub fn by_record_id(&self) -> HashMap<&str, &AnalyzedRecord> {
        self.records.iter().map(|r| (r.id(), r)).collect()
    }

    pub fn window_at(&self, bucket_start: DateTime<Utc>) -> Option<&WindowStats> {
        self.windows
            .binary_search_by_key(&bucket_start, |w| w.bucket_start)
            .ok()
            .map(|i| &self.windows[i])
    }

    pub fn anomalies(&self) -> impl Iterator<Item = &AnalyzedRecord> {
        self.records.iter().filter(|r| r.anomaly.is_anomalous)
    }

    pub fn trend_peaks(&self) -> impl Iterator<Item = &AnalyzedRecord> {
        self.records.iter().filter(|r| r.anomaly.is_trend_peak)
    }

    /// Feature snapshot to pass as `previous` to a later run.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.computed_at,
            self.records.iter().map(|r| r.features.clone()),
        )
    }
}
