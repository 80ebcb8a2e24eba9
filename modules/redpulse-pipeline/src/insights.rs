//! Batch-level summary for the dashboard: sentiment mix, trending terms,
//! tickers, engagement leaders, activity by hour and weekday, and the
//! tracked-topic breakdown.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use inference_client::truncate_to_char_boundary;
use serde::{Deserialize, Serialize};

use redpulse_common::{
    CanonicalRecord, FeatureVector, PipelineConfig, QueryParams, SentimentAnnotation,
    SentimentLabel, DELETED_AUTHOR,
};

const TOP_POST_TEXT_BYTES: usize = 120;

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "were", "but", "not", "you", "your", "with", "this", "that",
    "have", "has", "had", "just", "its", "it's", "they", "them", "their", "what", "when", "who",
    "will", "would", "can", "could", "should", "from", "about", "all", "any", "been", "being",
    "did", "does", "doing", "out", "than", "then", "there", "these", "those", "into", "our", "his",
    "her", "she", "him", "how", "why", "one", "get", "got", "like", "more", "some", "also", "only",
    "very", "much", "i'm", "don't", "dont", "im",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub summary: ReportSummary,
    pub sentiment: SentimentSummary,
    pub trending_topics: Vec<TermCount>,
    pub top_tickers: Vec<TermCount>,
    pub ticker_sentiment: BTreeMap<String, TickerSentiment>,
    pub engagement: EngagementSummary,
    pub time: TimeMetrics,
    pub topics: Vec<TopicBreakdown>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_records: usize,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
    pub unique_authors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSummary {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub overall: SentimentLabel,
    pub average_score: f64,
}

impl Default for SentimentSummary {
    fn default() -> Self {
        Self {
            positive: 0,
            negative: 0,
            neutral: 0,
            overall: SentimentLabel::Neutral,
            average_score: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermCount {
    pub term: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerSentiment {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
    pub total_mentions: usize,
    pub positive_ratio: f64,
    pub negative_ratio: f64,
    pub neutral_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementSummary {
    pub avg_upvotes: f64,
    pub avg_comments: f64,
    pub top_posts: Vec<TopPost>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopPost {
    pub record_id: String,
    pub text: String,
    pub engagement_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeMetrics {
    /// UTC hour of day, 0-23.
    pub peak_hour: Option<u32>,
    pub low_hour: Option<u32>,
    pub hourly_std_dev: f64,
    pub peak_day: Option<Weekday>,
    pub low_day: Option<Weekday>,
    pub daily_std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicBreakdown {
    pub topic: String,
    pub mentions: usize,
    pub avg_sentiment: f64,
    pub avg_upvotes: f64,
    pub total_comments: u64,
    pub positive_ratio: f64,
}

/// Summarize a batch. `records`, `annotations` and `features` are aligned
/// by position. `query` should be normalized.
pub fn compute_insights(
    records: &[CanonicalRecord],
    annotations: &[SentimentAnnotation],
    features: &[FeatureVector],
    query: &QueryParams,
    config: &PipelineConfig,
) -> Insights {
    Insights {
        summary: summarize(records),
        sentiment: sentiment_summary(annotations),
        trending_topics: trending_topics(records, config.trending_min_count, config.top_n),
        top_tickers: top_tickers(records, config.top_n),
        ticker_sentiment: ticker_sentiment(records, annotations),
        engagement: engagement_summary(records, features, config.top_posts),
        time: time_metrics(records),
        topics: topic_breakdown(records, annotations, query),
    }
}

fn summarize(records: &[CanonicalRecord]) -> ReportSummary {
    let authors: HashSet<&str> = records
        .iter()
        .map(|r| r.author.as_str())
        .filter(|a| *a != DELETED_AUTHOR)
        .collect();
    ReportSummary {
        total_records: records.len(),
        earliest: records.iter().map(|r| r.created_at).min(),
        latest: records.iter().map(|r| r.created_at).max(),
        unique_authors: authors.len(),
    }
}

fn sentiment_summary(annotations: &[SentimentAnnotation]) -> SentimentSummary {
    let mut summary = SentimentSummary::default();
    for a in annotations {
        match a.label {
            SentimentLabel::Positive => summary.positive += 1,
            SentimentLabel::Negative => summary.negative += 1,
            SentimentLabel::Neutral => summary.neutral += 1,
        }
    }
    if annotations.is_empty() {
        return summary;
    }

    summary.average_score =
        annotations.iter().map(|a| a.score).sum::<f64>() / annotations.len() as f64;
    // mode; ties resolve neutral, positive, negative
    summary.overall = SentimentLabel::Neutral;
    let mut best = summary.neutral;
    if summary.positive > best {
        summary.overall = SentimentLabel::Positive;
        best = summary.positive;
    }
    if summary.negative > best {
        summary.overall = SentimentLabel::Negative;
    }
    summary
}

/// Frequent non-stop-words of more than two characters.
pub fn trending_topics(
    records: &[CanonicalRecord],
    min_count: usize,
    top_n: usize,
) -> Vec<TermCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        for word in record.text.split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            if word.chars().count() > 2 && !STOP_WORDS.contains(&word) {
                *counts.entry(word).or_default() += 1;
            }
        }
    }
    ranked(counts.into_iter().filter(|(_, c)| *c >= min_count), top_n)
}

fn top_tickers(records: &[CanonicalRecord], top_n: usize) -> Vec<TermCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for ticker in records.iter().flat_map(|r| &r.tickers) {
        *counts.entry(ticker.as_str()).or_default() += 1;
    }
    ranked(counts.into_iter(), top_n)
}

/// Count descending, then term ascending.
fn ranked<'a>(counts: impl Iterator<Item = (&'a str, usize)>, top_n: usize) -> Vec<TermCount> {
    let mut out: Vec<TermCount> = counts
        .map(|(term, count)| TermCount {
            term: term.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
    out.truncate(top_n);
    out
}

fn ticker_sentiment(
    records: &[CanonicalRecord],
    annotations: &[SentimentAnnotation],
) -> BTreeMap<String, TickerSentiment> {
    let mut out: BTreeMap<String, TickerSentiment> = BTreeMap::new();
    for (record, annotation) in records.iter().zip(annotations) {
        for ticker in &record.tickers {
            let entry = out.entry(ticker.clone()).or_default();
            match annotation.label {
                SentimentLabel::Positive => entry.positive += 1,
                SentimentLabel::Negative => entry.negative += 1,
                SentimentLabel::Neutral => entry.neutral += 1,
            }
            entry.total_mentions += 1;
        }
    }
    for entry in out.values_mut() {
        let total = entry.total_mentions as f64;
        entry.positive_ratio = entry.positive as f64 / total;
        entry.negative_ratio = entry.negative as f64 / total;
        entry.neutral_ratio = entry.neutral as f64 / total;
    }
    out
}

fn engagement_summary(
    records: &[CanonicalRecord],
    features: &[FeatureVector],
    top_posts: usize,
) -> EngagementSummary {
    if records.is_empty() {
        return EngagementSummary::default();
    }
    let n = records.len() as f64;

    let mut ranked: Vec<(&CanonicalRecord, f64)> = records
        .iter()
        .zip(features)
        .map(|(r, f)| (r, f.engagement_score))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    EngagementSummary {
        avg_upvotes: records.iter().map(|r| r.upvotes as f64).sum::<f64>() / n,
        avg_comments: records.iter().map(|r| r.comment_count as f64).sum::<f64>() / n,
        top_posts: ranked
            .into_iter()
            .take(top_posts)
            .map(|(r, e)| TopPost {
                record_id: r.id.clone(),
                text: truncate_to_char_boundary(&r.display_text, TOP_POST_TEXT_BYTES).to_string(),
                engagement_score: e,
            })
            .collect(),
    }
}

fn time_metrics(records: &[CanonicalRecord]) -> TimeMetrics {
    let mut hourly: BTreeMap<u32, usize> = BTreeMap::new();
    let mut daily: BTreeMap<u32, usize> = BTreeMap::new();
    for r in records {
        *hourly.entry(r.created_at.hour()).or_default() += 1;
        *daily.entry(r.created_at.weekday().num_days_from_monday()).or_default() += 1;
    }

    let (peak_hour, low_hour, hourly_std_dev) = activity_profile(&hourly);
    let (peak_day, low_day, daily_std_dev) = activity_profile(&daily);
    TimeMetrics {
        peak_hour,
        low_hour,
        hourly_std_dev,
        peak_day: peak_day.and_then(weekday_from_monday),
        low_day: low_day.and_then(weekday_from_monday),
        daily_std_dev,
    }
}

/// Busiest key, quietest key (lowest key wins ties) and the sample
/// standard deviation of the observed counts.
fn activity_profile(counts: &BTreeMap<u32, usize>) -> (Option<u32>, Option<u32>, f64) {
    let mut peak: Option<(u32, usize)> = None;
    let mut low: Option<(u32, usize)> = None;
    for (&k, &c) in counts {
        if peak.map_or(true, |(_, best)| c > best) {
            peak = Some((k, c));
        }
        if low.map_or(true, |(_, best)| c < best) {
            low = Some((k, c));
        }
    }

    let n = counts.len();
    let std_dev = if n < 2 {
        0.0
    } else {
        let mean = counts.values().sum::<usize>() as f64 / n as f64;
        let var = counts
            .values()
            .map(|&c| (c as f64 - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64;
        var.sqrt()
    };

    (peak.map(|(k, _)| k), low.map(|(k, _)| k), std_dev)
}

fn weekday_from_monday(n: u32) -> Option<Weekday> {
    Weekday::try_from(u8::try_from(n).ok()?).ok()
}

fn topic_breakdown(
    records: &[CanonicalRecord],
    annotations: &[SentimentAnnotation],
    query: &QueryParams,
) -> Vec<TopicBreakdown> {
    query
        .topics
        .iter()
        .filter_map(|topic| {
            let hits: Vec<(&CanonicalRecord, &SentimentAnnotation)> = records
                .iter()
                .zip(annotations)
                .filter(|(r, _)| r.text.contains(topic.as_str()))
                .collect();
            if hits.is_empty() {
                return None;
            }
            let n = hits.len() as f64;
            Some(TopicBreakdown {
                topic: topic.clone(),
                mentions: hits.len(),
                avg_sentiment: hits.iter().map(|(_, a)| a.score).sum::<f64>() / n,
                avg_upvotes: hits.iter().map(|(r, _)| r.upvotes as f64).sum::<f64>() / n,
                total_comments: hits.iter().map(|(r, _)| r.comment_count).sum(),
                positive_ratio: hits
                    .iter()
                    .filter(|(_, a)| a.label == SentimentLabel::Positive)
                    .count() as f64
                    / n,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record_at, record_with_text, t0};
    use chrono::Duration;
    use redpulse_common::SentimentMethod;

    fn annotation(id: &str, label: SentimentLabel, score: f64) -> SentimentAnnotation {
        SentimentAnnotation {
            record_id: id.into(),
            label,
            score,
            method: SentimentMethod::Lexicon,
            confidence: 0.35,
        }
    }

    fn feature(id: &str, engagement: f64) -> FeatureVector {
        FeatureVector {
            record_id: id.into(),
            created_at: t0(),
            engagement_score: engagement,
            age_seconds: 0.0,
            velocity: 0.0,
        }
    }

    #[test]
    fn trending_topics_respects_min_count_and_stop_words() {
        let records = vec![
            record_with_text("a", "Tesla deliveries beat, the tesla bulls win"),
            record_with_text("b", "tesla? and deliveries"),
            record_with_text("c", "TESLA! deliveries for the win"),
        ];
        let topics = trending_topics(&records, 3, 10);
        assert_eq!(
            topics,
            vec![
                TermCount { term: "tesla".into(), count: 4 },
                TermCount { term: "deliveries".into(), count: 3 },
            ]
        );
    }

    #[test]
    fn overall_sentiment_breaks_ties_toward_neutral() {
        let annotations = vec![
            annotation("a", SentimentLabel::Positive, 0.8),
            annotation("b", SentimentLabel::Neutral, 0.0),
        ];
        let s = sentiment_summary(&annotations);
        assert_eq!(s.overall, SentimentLabel::Neutral);
        assert!((s.average_score - 0.4).abs() < 1e-12);

        let s = sentiment_summary(&[annotation("a", SentimentLabel::Negative, -0.5)]);
        assert_eq!(s.overall, SentimentLabel::Negative);
        assert_eq!(s.negative, 1);
    }

    #[test]
    fn ticker_sentiment_ratios() {
        let mut a = record_with_text("a", "x");
        a.tickers = vec!["GME".into(), "AMC".into()];
        let mut b = record_with_text("b", "y");
        b.tickers = vec!["GME".into()];
        let annotations = vec![
            annotation("a", SentimentLabel::Positive, 0.5),
            annotation("b", SentimentLabel::Negative, -0.5),
        ];
        let out = ticker_sentiment(&[a.clone(), b.clone()], &annotations);
        let gme = &out["GME"];
        assert_eq!(gme.total_mentions, 2);
        assert_eq!(gme.positive_ratio, 0.5);
        assert_eq!(gme.negative_ratio, 0.5);
        assert_eq!(out["AMC"].positive_ratio, 1.0);

        let top = top_tickers(&[a, b], 10);
        assert_eq!(top[0], TermCount { term: "GME".into(), count: 2 });
        assert_eq!(top[1], TermCount { term: "AMC".into(), count: 1 });
    }

    #[test]
    fn engagement_summary_picks_top_posts() {
        let records = vec![record_at("a", 0, 10, 0), record_at("b", 0, 30, 4), record_at("c", 0, 20, 2)];
        let features = vec![feature("a", 10.0), feature("b", 38.0), feature("c", 24.0)];
        let e = engagement_summary(&records, &features, 2);
        assert_eq!(e.avg_upvotes, 20.0);
        assert_eq!(e.avg_comments, 2.0);
        let ids: Vec<_> = e.top_posts.iter().map(|p| p.record_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn time_metrics_peak_low_and_spread() {
        // t0 is Friday 12:00 UTC
        let records = vec![
            record_at("a", 0, 0, 0),
            record_at("b", 60, 0, 0),
            record_at("c", 3600, 0, 0),
            record_at("d", 86_400, 0, 0),
        ];
        let t = time_metrics(&records);
        assert_eq!(t.peak_hour, Some(12));
        assert_eq!(t.low_hour, Some(13));
        assert!((t.hourly_std_dev - 2f64.sqrt()).abs() < 1e-9);
        assert_eq!(t.peak_day, Some(Weekday::Fri));
        assert_eq!(t.low_day, Some(Weekday::Sat));
    }

    #[test]
    fn summary_skips_deleted_authors() {
        let mut deleted = record_at("x", 10, 0, 0);
        deleted.author = DELETED_AUTHOR.into();
        let records = vec![record_at("a", 0, 0, 0), record_at("b", -5, 0, 0), deleted];
        let s = summarize(&records);
        assert_eq!(s.total_records, 3);
        assert_eq!(s.unique_authors, 2);
        assert_eq!(s.earliest, Some(t0() - Duration::seconds(5)));
        assert_eq!(s.latest, Some(t0() + Duration::seconds(10)));
    }

    #[test]
    fn topic_breakdown_omits_unmentioned_topics() {
        let mut a = record_with_text("a", "rivian and tesla");
        a.upvotes = 10;
        a.comment_count = 3;
        let mut b = record_with_text("b", "tesla again");
        b.upvotes = 20;
        b.comment_count = 1;
        let annotations = vec![
            annotation("a", SentimentLabel::Positive, 0.6),
            annotation("b", SentimentLabel::Negative, -0.2),
        ];
        let query = QueryParams::new("stocks").with_topic("tesla").with_topic("lucid");
        let out = topic_breakdown(&[a, b], &annotations, &query.normalized());
        assert_eq!(out.len(), 1);
        let t = &out[0];
        assert_eq!(t.topic, "tesla");
        assert_eq!(t.mentions, 2);
        assert!((t.avg_sentiment - 0.2).abs() < 1e-12);
        assert_eq!(t.avg_upvotes, 15.0);
        assert_eq!(t.total_comments, 4);
        assert_eq!(t.positive_ratio, 0.5);
    }
}
