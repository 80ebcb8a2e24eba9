//! Per-record engagement and temporal features.

use std::collections::HashMap;
use std::f64::consts::E;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use redpulse_common::{CanonicalRecord, FeatureVector, PipelineConfig};

/// Features from an earlier run, used to compute velocity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub features: HashMap<String, FeatureVector>,
}

impl Snapshot {
    pub fn new(taken_at: DateTime<Utc>, features: impl IntoIterator<Item = FeatureVector>) -> Self {
        Self {
            taken_at,
            features: features
                .into_iter()
                .map(|f| (f.record_id.clone(), f))
                .collect(),
        }
    }

    pub fn get(&self, record_id: &str) -> Option<&FeatureVector> {
        self.features.get(record_id)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

pub struct FeatureAggregator {
    comment_weight: f64,
}

impl FeatureAggregator {
    pub fn new(comment_weight: f64) -> Self {
        Self { comment_weight }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.comment_weight)
    }

    /// One feature vector per record, in order. Pure in its arguments.
    pub fn aggregate(
        &self,
        records: &[CanonicalRecord],
        now: DateTime<Utc>,
        previous: Option<&Snapshot>,
    ) -> Vec<FeatureVector> {
        let elapsed = previous.map(|s| seconds_between(s.taken_at, now));

        records
            .iter()
            .map(|record| {
                let age_seconds = seconds_between(record.created_at, now).max(0.0);
                let engagement_score = engagement(
                    record.upvotes,
                    record.comment_count,
                    age_seconds,
                    self.comment_weight,
                );

                let velocity = match (previous.and_then(|s| s.get(&record.id)), elapsed) {
                    (Some(prev), Some(elapsed)) if elapsed > 0.0 => {
                        (engagement_score - prev.engagement_score) / elapsed
                    }
                    _ => 0.0,
                };

                FeatureVector {
                    record_id: record.id.clone(),
                    created_at: record.created_at,
                    engagement_score,
                    age_seconds,
                    velocity,
                }
            })
            .collect()
    }
}

/// `(upvotes + k * comments) / max(ln(age + e), 1)`. Fresh records are not
/// discounted; older ones decay logarithmically.
pub fn engagement(upvotes: u64, comments: u64, age_seconds: f64, comment_weight: f64) -> f64 {
    let raw = upvotes as f64 + comment_weight * comments as f64;
    raw / (age_seconds + E).ln().max(1.0)
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record_at, t0};
    use chrono::Duration;

    #[test]
    fn fresh_record_is_not_discounted() {
        assert!((engagement(10, 5, 0.0, 2.0) - 20.0).abs() < 1e-12);
    }

    #[test]
    fn engagement_matches_formula() {
        let agg = FeatureAggregator::new(2.0);
        let records = vec![record_at("a", 0, 100, 10)];
        let now = t0() + Duration::seconds(3600);
        let f = &agg.aggregate(&records, now, None)[0];
        assert_eq!(f.age_seconds, 3600.0);
        let expected = 120.0 / (3600.0 + E).ln();
        assert!((f.engagement_score - expected).abs() < 1e-9);
        assert_eq!(f.velocity, 0.0);
        assert_eq!(f.created_at, t0());
    }

    #[test]
    fn future_records_have_zero_age() {
        let agg = FeatureAggregator::new(2.0);
        let records = vec![record_at("a", 600, 3, 0)];
        let f = &agg.aggregate(&records, t0(), None)[0];
        assert_eq!(f.age_seconds, 0.0);
        assert!((f.engagement_score - 3.0).abs() < 1e-12);
    }

    #[test]
    fn aggregate_is_idempotent() {
        let agg = FeatureAggregator::new(2.0);
        let records = vec![record_at("a", 0, 5, 1), record_at("b", -7200, 40, 12)];
        let now = t0() + Duration::seconds(90);
        assert_eq!(agg.aggregate(&records, now, None), agg.aggregate(&records, now, None));
    }

    #[test]
    fn velocity_uses_previous_snapshot() {
        let agg = FeatureAggregator::new(2.0);
        let now = t0() + Duration::seconds(100);
        let records = vec![record_at("a", 0, 50, 0), record_at("new", 0, 50, 0)];
        let current = agg.aggregate(&records, now, None);

        let prev = FeatureVector {
            engagement_score: current[0].engagement_score - 10.0,
            ..current[0].clone()
        };
        let snapshot = Snapshot::new(now - Duration::seconds(20), vec![prev]);

        let with_history = agg.aggregate(&records, now, Some(&snapshot));
        assert!((with_history[0].velocity - 0.5).abs() < 1e-9);
        assert_eq!(with_history[1].velocity, 0.0);
    }

    #[test]
    fn snapshot_taken_now_gives_zero_velocity() {
        let agg = FeatureAggregator::new(2.0);
        let records = vec![record_at("a", 0, 50, 0)];
        let snapshot = Snapshot::new(t0(), agg.aggregate(&records, t0(), None));
        let out = agg.aggregate(&records, t0(), Some(&snapshot));
        assert_eq!(out[0].velocity, 0.0);
    }
}
