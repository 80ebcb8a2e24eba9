//! Windowed statistics, z-score outliers and local trend peaks.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use redpulse_common::{AnomalyFlag, BatchError, FeatureVector, SentimentAnnotation, WindowStats};

/// Detector output: bucket statistics in ascending `bucket_start` order and
/// one flag per input feature, aligned with the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub windows: Vec<WindowStats>,
    pub flags: Vec<AnomalyFlag>,
}

impl Detection {
    pub fn anomaly_count(&self) -> usize {
        self.flags.iter().filter(|f| f.is_anomalous).count()
    }

    pub fn peak_count(&self) -> usize {
        self.flags.iter().filter(|f| f.is_trend_peak).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detector {
    z_threshold: f64,
}

struct Bucket {
    start: DateTime<Utc>,
    members: Vec<usize>,
    mean: f64,
    stddev: f64,
}

impl Detector {
    pub fn new(z_threshold: f64) -> Self {
        Self { z_threshold }
    }

    /// Bucket `features` into `window`-sized intervals and flag outliers
    /// and peaks. Sentiments are joined by record id; a record without one
    /// counts as 0.
    pub fn detect(
        &self,
        features: &[FeatureVector],
        sentiments: &[SentimentAnnotation],
        window: Duration,
    ) -> Result<Detection, BatchError> {
        if !self.z_threshold.is_finite() || self.z_threshold <= 0.0 {
            return Err(BatchError::InvalidThreshold {
                value: self.z_threshold,
            });
        }
        let window_secs = window.num_seconds();
        if window_secs <= 0 {
            return Err(BatchError::InvalidWindow {
                seconds: window_secs,
            });
        }
        if let Some(bad) = features.iter().find(|f| !f.engagement_score.is_finite()) {
            return Err(BatchError::NonFiniteEngagement {
                record_id: bad.record_id.clone(),
            });
        }

        let sentiment: HashMap<&str, f64> = sentiments
            .iter()
            .map(|s| (s.record_id.as_str(), s.score))
            .collect();

        let mut grouped: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, f) in features.iter().enumerate() {
            let start = f.created_at.timestamp().div_euclid(window_secs) * window_secs;
            grouped.entry(start).or_default().push(i);
        }

        let mut windows = Vec::with_capacity(grouped.len());
        let mut bucket_of = vec![0usize; features.len()];
        let mut buckets = Vec::with_capacity(grouped.len());

        for (start, members) in grouped {
            let values: Vec<f64> = members.iter().map(|&i| features[i].engagement_score).collect();
            let (mean, stddev) = mean_and_sample_stddev(&values);
            let mean_sentiment = members
                .iter()
                .map(|&i| sentiment.get(features[i].record_id.as_str()).copied().unwrap_or(0.0))
                .sum::<f64>()
                / members.len() as f64;
            let start = DateTime::from_timestamp(start, 0).unwrap_or_default();

            windows.push(WindowStats {
                bucket_start: start,
                count: members.len(),
                mean_sentiment,
                mean_engagement: mean,
                stddev_engagement: stddev,
            });
            for &i in &members {
                bucket_of[i] = buckets.len();
            }
            buckets.push(Bucket {
                start,
                members,
                mean,
                stddev,
            });
        }

        let peaks = self.trend_peaks(features, &bucket_of, &buckets);

        let flags = features
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let bucket = &buckets[bucket_of[i]];
                let z = if bucket.stddev > 0.0 {
                    (f.engagement_score - bucket.mean) / bucket.stddev
                } else {
                    0.0
                };
                AnomalyFlag {
                    record_id: f.record_id.clone(),
                    bucket_start: bucket.start,
                    z_score: z,
                    is_anomalous: bucket.members.len() >= 2 && z.abs() > self.z_threshold,
                    is_trend_peak: peaks[i],
                }
            })
            .collect();

        let detection = Detection { windows, flags };
        debug!(
            windows = detection.windows.len(),
            anomalies = detection.anomaly_count(),
            peaks = detection.peak_count(),
            "Detection complete"
        );
        Ok(detection)
    }

    /// A peak sits strictly above both temporal neighbours and at least one
    /// standard deviation above its bucket mean. The first and last records
    /// in time are never peaks.
    fn trend_peaks(
        &self,
        features: &[FeatureVector],
        bucket_of: &[usize],
        buckets: &[Bucket],
    ) -> Vec<bool> {
        let mut order: Vec<usize> = (0..features.len()).collect();
        order.sort_by_key(|&i| (features[i].created_at, i));

        let mut peaks = vec![false; features.len()];
        for w in order.windows(3) {
            let (prev, i, next) = (w[0], w[1], w[2]);
            let e = features[i].engagement_score;
            let bucket = &buckets[bucket_of[i]];
            peaks[i] = bucket.members.len() >= 2
                && e > features[prev].engagement_score
                && e > features[next].engagement_score
                && e - bucket.mean >= bucket.stddev;
        }
        peaks
    }
}

fn mean_and_sample_stddev(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    if n < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    (mean, var.sqrt())
}
