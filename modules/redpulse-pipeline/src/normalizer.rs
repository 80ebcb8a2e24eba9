//! Raw platform records → canonical records.
//!
//! `normalize` is total: every missing field gets a default. Batch
//! normalization dedupes by id and reports records without an id.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, warn};

use redpulse_common::{
    normalize_subreddit, CanonicalRecord, RawRecord, RecordError, DELETED_AUTHOR,
};

static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>\n]+>").unwrap());
static MD_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").unwrap());
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?://|www\.)\S+").unwrap());
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]{0,3}#{1,6}[ \t]+").unwrap());
static QUOTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:>[ \t]?)+").unwrap());
static LIST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:[-*+]|\d+[.)])[ \t]+").unwrap());
static RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(?:-{3,}|\*{3,}|_{3,})[ \t]*$").unwrap());
static EMPHASIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*{1,3}|_{2,3}|~~|`+|>!|!<|\^").unwrap());
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w/])(?:@|/?u/)([A-Za-z0-9_-]{2,20})").unwrap());
static CASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z]{1,5})\b").unwrap());
static BARE_TICKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{2,5})\b").unwrap());

/// Uppercase words that look like tickers but almost never are.
const TICKER_STOPLIST: &[&str] = &[
    "AM", "AN", "AND", "ANY", "ARE", "AS", "AT", "ATH", "BE", "BUT", "BY", "CEO", "CFO", "DD",
    "DO", "EDIT", "EOD", "EPS", "ETF", "FAQ", "FD", "FOMO", "FOR", "FUD", "GDP", "GO", "HE",
    "HODL", "IF", "IMO", "IN", "IPO", "IRA", "IS", "IT", "ITM", "LOL", "ME", "MY", "NO", "NOT",
    "NYSE", "OF", "OK", "ON", "OP", "OR", "OTM", "PM", "PSA", "SEC", "SO", "THE", "TLDR", "TO",
    "UP", "US", "USA", "USD", "WE", "WSB", "YOLO", "YOU",
];

const HTML_ENTITIES: &[(&str, &str)] = &[
    ("&#x200B;", ""),
    ("&#x200b;", ""),
    ("\u{200B}", ""),
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&#x27;", "'"),
    ("&amp;", "&"),
];

/// Output of batch normalization.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub records: Vec<CanonicalRecord>,
    pub failures: Vec<RecordError>,
    pub duplicates_removed: usize,
}

/// Convert one raw record. Never fails.
pub fn normalize(raw: &RawRecord) -> CanonicalRecord {
    let combined = match (raw.title.as_deref(), raw.body.as_deref()) {
        (Some(t), Some(b)) => format!("{t}\n{b}"),
        (Some(t), None) => t.to_string(),
        (None, Some(b)) => b.to_string(),
        (None, None) => String::new(),
    };
    let display_text = clean_text(&combined);
    let text = display_text.to_lowercase();

    CanonicalRecord {
        id: raw.id.as_deref().map(str::trim).unwrap_or_default().to_string(),
        kind: raw.kind.unwrap_or_default(),
        author: raw
            .author
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(DELETED_AUTHOR)
            .to_string(),
        subreddit: raw
            .subreddit
            .as_deref()
            .map(normalize_subreddit)
            .unwrap_or_default(),
        mentions: extract_mentions(&display_text),
        tickers: extract_tickers(&display_text),
        text,
        display_text,
        created_at: timestamp_from_epoch(raw.created_utc),
        upvotes: raw.score.unwrap_or(0).max(0) as u64,
        comment_count: raw.num_comments.unwrap_or(0).max(0) as u64,
        upvote_ratio: raw
            .upvote_ratio
            .filter(|r| r.is_finite())
            .map(|r| r.clamp(0.0, 1.0))
            .unwrap_or(1.0),
        permalink: raw.permalink.clone(),
        fetched_at: raw.fetched_at,
    }
}

/// Normalize a batch: records without an id fail individually, records
/// sharing an id collapse to the most recently fetched copy, which takes
/// the position of the id's first appearance.
pub fn normalize_batch(raws: &[RawRecord]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    let mut position: HashMap<String, usize> = HashMap::new();

    for (index, raw) in raws.iter().enumerate() {
        let record = normalize(raw);
        if record.id.is_empty() {
            warn!(index, "Dropping record without id");
            batch.failures.push(RecordError::MissingId { index });
            continue;
        }

        match position.get(&record.id) {
            Some(&pos) => {
                batch.duplicates_removed += 1;
                let existing = &batch.records[pos];
                if fetched_later_or_same(record.fetched_at, existing.fetched_at) {
                    debug!(id = %record.id, "Replacing duplicate with fresher copy");
                    batch.records[pos] = record;
                }
            }
            None => {
                position.insert(record.id.clone(), batch.records.len());
                batch.records.push(record);
            }
        }
    }

    batch
}

fn fetched_later_or_same(new: Option<DateTime<Utc>>, existing: Option<DateTime<Utc>>) -> bool {
    match (new, existing) {
        (Some(n), Some(e)) => n >= e,
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => true,
    }
}

fn timestamp_from_epoch(secs: Option<f64>) -> DateTime<Utc> {
    secs.filter(|s| s.is_finite())
        .and_then(|s| {
            let whole = s.floor();
            let nanos = ((s - whole) * 1e9).round().min(999_999_999.0) as u32;
            DateTime::from_timestamp(whole as i64, nanos)
        })
        .unwrap_or_default()
}

/// Strip markup and markdown, collapse whitespace. Keeps case.
pub fn clean_text(input: &str) -> String {
    if input.trim().is_empty() {
        return String::new();
    }

    let mut text = input.to_string();
    for (entity, replacement) in HTML_ENTITIES {
        text = text.replace(entity, replacement);
    }

    let text = HTML_TAG_RE.replace_all(&text, " ");
    let text = MD_LINK_RE.replace_all(&text, "$1");
    let text = URL_RE.replace_all(&text, " ");
    let text = RULE_RE.replace_all(&text, " ");
    let text = HEADING_RE.replace_all(&text, "");
    let text = QUOTE_RE.replace_all(&text, "");
    let text = LIST_RE.replace_all(&text, "");
    let text = EMPHASIS_RE.replace_all(&text, "");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// User mentions (`@name`, `u/name`, `/u/name`), lowercased, sorted, unique.
pub fn extract_mentions(text: &str) -> Vec<String> {
    MENTION_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Cashtags (`$aapl`) and bare uppercase symbols (`TSLA`), uppercased,
/// sorted, unique. Bare symbols on the stop list are ignored.
pub fn extract_tickers(text: &str) -> Vec<String> {
    let mut tickers: BTreeSet<String> = CASHTAG_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
        .collect();

    for m in BARE_TICKER_RE.captures_iter(text).filter_map(|c| c.get(1)) {
        let symbol = m.as_str();
        if !TICKER_STOPLIST.contains(&symbol) {
            tickers.insert(symbol.to_string());
        }
    }

    tickers.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use redpulse_common::RecordKind;

    fn raw(id: &str) -> RawRecord {
        RawRecord {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn empty_raw_record_gets_defaults() {
        let rec = normalize(&RawRecord::default());
        assert_eq!(rec.id, "");
        assert_eq!(rec.text, "");
        assert_eq!(rec.display_text, "");
        assert_eq!(rec.upvotes, 0);
        assert_eq!(rec.comment_count, 0);
        assert_eq!(rec.created_at, DateTime::<Utc>::default());
        assert_eq!(rec.created_at.timestamp(), 0);
        assert_eq!(rec.author, DELETED_AUTHOR);
        assert_eq!(rec.kind, RecordKind::Post);
        assert_eq!(rec.upvote_ratio, 1.0);
        assert!(rec.mentions.is_empty());
        assert!(rec.tickers.is_empty());
    }

    #[test]
    fn negative_and_garbage_numbers_are_floored() {
        let rec = normalize(&RawRecord {
            score: Some(-40),
            num_comments: Some(-1),
            upvote_ratio: Some(f64::NAN),
            created_utc: Some(f64::INFINITY),
            ..raw("a")
        });
        assert_eq!(rec.upvotes, 0);
        assert_eq!(rec.comment_count, 0);
        assert_eq!(rec.upvote_ratio, 1.0);
        assert_eq!(rec.created_at.timestamp(), 0);
    }

    #[test]
    fn fractional_epoch_keeps_subsecond_precision() {
        let rec = normalize(&RawRecord {
            created_utc: Some(1_700_000_000.5),
            ..raw("a")
        });
        assert_eq!(rec.created_at.timestamp(), 1_700_000_000);
        assert_eq!(rec.created_at.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn title_and_body_are_joined_and_cleaned() {
        let rec = normalize(&RawRecord {
            title: Some("**Huge** news".into()),
            body: Some("Read [the filing](https://sec.gov/x) &amp; cheer\n\n> quoted   text".into()),
            ..raw("a")
        });
        assert_eq!(rec.display_text, "Huge news Read the filing & cheer quoted text");
        assert_eq!(rec.text, "huge news read the filing & cheer quoted text");
    }

    #[test]
    fn clean_text_strips_markdown_and_markup() {
        assert_eq!(clean_text("# Heading\n- item one\n- item two"), "Heading item one item two");
        assert_eq!(clean_text("see https://example.com/a?b=c now"), "see now");
        assert_eq!(clean_text("`code` and ~~strike~~ and >!spoiler!<"), "code and strike and spoiler");
        assert_eq!(clean_text("<p>hello</p>&#x200B;"), "hello");
        assert_eq!(clean_text("snake_case stays"), "snake_case stays");
        assert_eq!(clean_text("   \n\t "), "");
    }

    #[test]
    fn subreddit_is_normalized() {
        let rec = normalize(&RawRecord {
            subreddit: Some("r/WallStreetBets".into()),
            ..raw("a")
        });
        assert_eq!(rec.subreddit, "wallstreetbets");
    }

    #[test]
    fn extracts_mentions_and_tickers() {
        let text = "Thanks u/DeepValue and @trader_joe, loading up on $gme and TSLA. YOLO IMO";
        assert_eq!(extract_mentions(text), vec!["deepvalue", "trader_joe"]);
        assert_eq!(extract_tickers(text), vec!["GME", "TSLA"]);
    }

    #[test]
    fn email_is_not_a_mention() {
        assert!(extract_mentions("mail me at bob@example.com").is_empty());
    }

    #[test]
    fn batch_drops_records_without_id() {
        let raws = vec![raw("a"), RawRecord::default(), raw("  ")];
        let batch = normalize_batch(&raws);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(
            batch.failures,
            vec![RecordError::MissingId { index: 1 }, RecordError::MissingId { index: 2 }]
        );
    }

    #[test]
    fn batch_keeps_most_recently_fetched_duplicate() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let raws = vec![
            RawRecord {
                score: Some(5),
                fetched_at: Some(early),
                ..raw("dup")
            },
            raw("other"),
            RawRecord {
                score: Some(99),
                fetched_at: Some(late),
                ..raw("dup")
            },
            RawRecord {
                score: Some(1),
                fetched_at: None,
                ..raw("dup")
            },
        ];
        let batch = normalize_batch(&raws);
        assert_eq!(batch.duplicates_removed, 2);
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].id, "dup");
        assert_eq!(batch.records[0].upvotes, 99);
        assert_eq!(batch.records[1].id, "other");
    }

    #[test]
    fn batch_duplicate_without_fetch_times_keeps_later_copy() {
        let raws = vec![
            RawRecord {
                score: Some(1),
                ..raw("x")
            },
            RawRecord {
                score: Some(2),
                ..raw("x")
            },
        ];
        let batch = normalize_batch(&raws);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].upvotes, 2);
    }
}
