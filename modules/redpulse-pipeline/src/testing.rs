// Test mocks for the analytics pipeline.
//
// - MockClassifier (TextClassifier): keyword-driven distributions, with
//   switches for warm-up failure, failing calls, short results and delay
// - Record builders for raw and canonical records at fixed instants

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use inference_client::{ClassScore, TextClassifier};

use redpulse_common::{CanonicalRecord, RawRecord, RecordKind};

// ---------------------------------------------------------------------------
// Test constants
// ---------------------------------------------------------------------------

/// 2024-03-01T12:00:00Z, an hour-aligned instant tests build around.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// MockClassifier
// ---------------------------------------------------------------------------

/// Deterministic classifier. Texts containing a positive keyword get a
/// positive distribution, negative keywords a negative one, anything else
/// neutral. Builder switches: `.unavailable()`, `.failing_batches()`,
/// `.short_results()`, `.with_label_for()`, `.with_delay()`.
pub struct MockClassifier {
    positive: Vec<String>,
    negative: Vec<String>,
    overrides: HashMap<String, String>,
    unavailable: bool,
    failing: bool,
    short: bool,
    delay: Option<Duration>,
    warm_ups: AtomicUsize,
    batches: AtomicUsize,
    texts: AtomicUsize,
}

impl MockClassifier {
    pub fn keyword_driven() -> Self {
        Self {
            positive: ["happy", "great", "love", "moon"].map(String::from).to_vec(),
            negative: ["sad", "terrible", "hate", "crash"].map(String::from).to_vec(),
            overrides: HashMap::new(),
            unavailable: false,
            failing: false,
            short: false,
            delay: None,
            warm_ups: AtomicUsize::new(0),
            batches: AtomicUsize::new(0),
            texts: AtomicUsize::new(0),
        }
    }

    /// Warm-up fails.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Every batch call fails.
    pub fn failing_batches(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Batch calls return one distribution fewer than asked for.
    pub fn short_results(mut self) -> Self {
        self.short = true;
        self
    }

    /// Texts containing `keyword` get a single class named `label`.
    pub fn with_label_for(mut self, keyword: &str, label: &str) -> Self {
        self.overrides.insert(keyword.to_string(), label.to_string());
        self
    }

    /// Sleep this long inside every batch call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn warm_up_calls(&self) -> usize {
        self.warm_ups.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    /// Total texts seen across batch calls.
    pub fn texts_classified(&self) -> usize {
        self.texts.load(Ordering::SeqCst)
    }

    fn distribution(&self, text: &str) -> Vec<ClassScore> {
        if let Some((_, label)) = self.overrides.iter().find(|(k, _)| text.contains(k.as_str())) {
            return vec![ClassScore::new(label.clone(), 0.9)];
        }
        let (pos, neg, neu) = if self.positive.iter().any(|k| text.contains(k.as_str())) {
            (0.9, 0.02, 0.08)
        } else if self.negative.iter().any(|k| text.contains(k.as_str())) {
            (0.02, 0.9, 0.08)
        } else {
            (0.1, 0.1, 0.8)
        };
        vec![
            ClassScore::new("POS", pos),
            ClassScore::new("NEG", neg),
            ClassScore::new("NEU", neu),
        ]
    }
}

#[async_trait]
impl TextClassifier for MockClassifier {
    async fn warm_up(&self) -> Result<()> {
        self.warm_ups.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            bail!("MockClassifier: model not loaded");
        }
        Ok(())
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<Vec<ClassScore>>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            bail!("MockClassifier: 503 Service Unavailable");
        }
        let mut out: Vec<_> = texts.iter().map(|t| self.distribution(t)).collect();
        if self.short {
            out.pop();
        }
        Ok(out)
    }

    fn model_name(&self) -> &str {
        "mock/sentiment"
    }
}

// ---------------------------------------------------------------------------
// Record builders
// ---------------------------------------------------------------------------

/// Raw post with body text, created `offset_secs` after `t0()`.
pub fn raw_post(id: &str, body: &str, offset_secs: i64, upvotes: i64, comments: i64) -> RawRecord {
    RawRecord {
        id: Some(id.to_string()),
        kind: Some(RecordKind::Post),
        author: Some(format!("author_{id}")),
        body: Some(body.to_string()),
        created_utc: Some((t0().timestamp() + offset_secs) as f64),
        score: Some(upvotes),
        num_comments: Some(comments),
        subreddit: Some("stocks".to_string()),
        ..Default::default()
    }
}

/// Canonical post with the given text, created at `t0()`.
pub fn record_with_text(id: &str, text: &str) -> CanonicalRecord {
    CanonicalRecord {
        id: id.to_string(),
        kind: RecordKind::Post,
        author: format!("author_{id}"),
        subreddit: "stocks".to_string(),
        text: text.to_lowercase(),
        display_text: text.to_string(),
        created_at: t0(),
        upvotes: 0,
        comment_count: 0,
        upvote_ratio: 1.0,
        permalink: None,
        fetched_at: None,
        mentions: vec![],
        tickers: vec![],
    }
}

/// Canonical post with engagement counts, created `offset_secs` after `t0()`.
pub fn record_at(id: &str, offset_secs: i64, upvotes: u64, comments: u64) -> CanonicalRecord {
    CanonicalRecord {
        created_at: t0() + chrono::Duration::seconds(offset_secs),
        upvotes,
        comment_count: comments,
        ..record_with_text(id, "")
    }
}
