use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author placeholder for removed or missing accounts.
pub const DELETED_AUTHOR: &str = "[deleted]";

// --- Enums ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    #[default]
    #[serde(alias = "t3", alias = "submission")]
    Post,
    #[serde(alias = "t1")]
    Comment,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Post => write!(f, "post"),
            RecordKind::Comment => write!(f, "comment"),
        }
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "post" | "posts" | "submission" | "t3" => Ok(RecordKind::Post),
            "comment" | "comments" | "t1" => Ok(RecordKind::Comment),
            other => Err(format!("unknown record kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SentimentLabel::Positive => write!(f, "positive"),
            SentimentLabel::Negative => write!(f, "negative"),
            SentimentLabel::Neutral => write!(f, "neutral"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentMethod {
    Transformer,
    Lexicon,
}

impl std::fmt::Display for SentimentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SentimentMethod::Transformer => write!(f, "transformer"),
            SentimentMethod::Lexicon => write!(f, "lexicon"),
        }
    }
}

// --- Raw input ---

/// A post or comment as the platform client hands it over. Every field is
/// optional; the normalizer fills in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub kind: Option<RecordKind>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "selftext", alias = "text")]
    pub body: Option<String>,
    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub created_utc: Option<f64>,
    #[serde(default, alias = "ups")]
    pub score: Option<i64>,
    #[serde(default)]
    pub num_comments: Option<i64>,
    #[serde(default)]
    pub upvote_ratio: Option<f64>,
    #[serde(default)]
    pub subreddit: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    /// When the client fetched this copy. Used to pick the freshest duplicate.
    #[serde(default)]
    pub fetched_at: Option<DateTime<Utc>>,
}

// --- Canonical record ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: String,
    pub kind: RecordKind,
    pub author: String,
    pub subreddit: String,
    /// Cleaned, lowercased text for scoring.
    pub text: String,
    /// Cleaned text with original casing, for display.
    pub display_text: String,
    pub created_at: DateTime<Utc>,
    pub upvotes: u64,
    pub comment_count: u64,
    pub upvote_ratio: f64,
    pub permalink: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub mentions: Vec<String>,
    pub tickers: Vec<String>,
}

// --- Derived data, joined by record_id ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentAnnotation {
    pub record_id: String,
    pub label: SentimentLabel,
    /// Polarity in [-1.0, 1.0].
    pub score: f64,
    pub method: SentimentMethod,
    /// Trust in the label, in [0.0, 1.0].
    pub confidence: f64,
}

impl SentimentAnnotation {
    /// The annotation every scorer returns for empty text.
    pub fn neutral(record_id: impl Into<String>, method: SentimentMethod) -> Self {
        Self {
            record_id: record_id.into(),
            label: SentimentLabel::Neutral,
            score: 0.0,
            method,
            confidence: 0.0,
        }
    }

    /// Check the range invariants. Returns a reason on violation.
    pub fn check_ranges(&self) -> Result<(), String> {
        if !self.score.is_finite() || !(-1.0..=1.0).contains(&self.score) {
            return Err(format!("score {} outside [-1, 1]", self.score));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} outside [0, 1]", self.confidence));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub record_id: String,
    pub created_at: DateTime<Utc>,
    pub engagement_score: f64,
    pub age_seconds: f64,
    /// Engagement change per second since the previous snapshot; 0 without history.
    pub velocity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub bucket_start: DateTime<Utc>,
    pub count: usize,
    pub mean_sentiment: f64,
    pub mean_engagement: f64,
    pub stddev_engagement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFlag {
    pub record_id: String,
    pub bucket_start: DateTime<Utc>,
    pub z_score: f64,
    pub is_anomalous: bool,
    pub is_trend_peak: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_record_accepts_platform_aliases() {
        let json = r#"{"id":"abc","selftext":"body here","ups":12,"kind":"t1"}"#;
        let raw: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(raw.body.as_deref(), Some("body here"));
        assert_eq!(raw.score, Some(12));
        assert_eq!(raw.kind, Some(RecordKind::Comment));
        assert!(raw.created_utc.is_none());
    }

    #[test]
    fn raw_record_tolerates_empty_object() {
        let raw: RawRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(raw, RawRecord::default());
    }

    #[test]
    fn record_kind_parses_loosely() {
        assert_eq!("Comments".parse::<RecordKind>(), Ok(RecordKind::Comment));
        assert_eq!("t3".parse::<RecordKind>(), Ok(RecordKind::Post));
        assert!("video".parse::<RecordKind>().is_err());
    }

    #[test]
    fn check_ranges_rejects_out_of_range_values() {
        let mut a = SentimentAnnotation::neutral("x", SentimentMethod::Lexicon);
        assert!(a.check_ranges().is_ok());
        a.score = 1.5;
        assert!(a.check_ranges().is_err());
        a.score = 0.0;
        a.confidence = f64::NAN;
        assert!(a.check_ranges().is_err());
    }
}
