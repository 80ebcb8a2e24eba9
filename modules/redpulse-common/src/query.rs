//! Query parameters for a dashboard request.
//!
//! The normalized form is what the result cache fingerprints, so every
//! collection here is an ordered set and every string is trimmed and
//! lowercased.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CanonicalRecord, RecordKind};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    pub min_upvotes: Option<u64>,
    /// Empty means every kind.
    pub kinds: BTreeSet<RecordKind>,
    /// Keep records whose text contains any of these. Empty means no filter.
    pub keywords: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    pub subreddit: String,
    /// Inclusive lower bound on `created_at`.
    pub range_start: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub range_end: Option<DateTime<Utc>>,
    pub filters: FilterSet,
    /// Topics broken out in the insights, without filtering.
    pub topics: BTreeSet<String>,
}

impl QueryParams {
    pub fn new(subreddit: impl Into<String>) -> Self {
        Self {
            subreddit: subreddit.into(),
            ..Default::default()
        }
    }

    pub fn with_range(mut self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        self.range_start = start;
        self.range_end = end;
        self
    }

    pub fn with_min_upvotes(mut self, min: u64) -> Self {
        self.filters.min_upvotes = Some(min);
        self
    }

    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.filters.kinds.insert(kind);
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.filters.keywords.insert(keyword.into());
        self
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topics.insert(topic.into());
        self
    }

    /// Canonical form: trimmed lowercase strings, `r/` prefix stripped,
    /// blank entries dropped.
    pub fn normalized(&self) -> Self {
        Self {
            subreddit: normalize_subreddit(&self.subreddit),
            range_start: self.range_start,
            range_end: self.range_end,
            filters: FilterSet {
                min_upvotes: self.filters.min_upvotes,
                kinds: self.filters.kinds.clone(),
                keywords: normalize_set(&self.filters.keywords),
            },
            topics: normalize_set(&self.topics),
        }
    }

    /// Whether a normalized record falls inside this query. Call on a
    /// normalized query.
    pub fn matches(&self, record: &CanonicalRecord) -> bool {
        if !self.subreddit.is_empty()
            && self.subreddit != "all"
            && !record.subreddit.is_empty()
            && record.subreddit != self.subreddit
        {
            return false;
        }
        if let Some(start) = self.range_start {
            if record.created_at < start {
                return false;
            }
        }
        if let Some(end) = self.range_end {
            if record.created_at >= end {
                return false;
            }
        }
        if let Some(min) = self.filters.min_upvotes {
            if record.upvotes < min {
                return false;
            }
        }
        if !self.filters.kinds.is_empty() && !self.filters.kinds.contains(&record.kind) {
            return false;
        }
        if !self.filters.keywords.is_empty()
            && !self
                .filters
                .keywords
                .iter()
                .any(|k| record.text.contains(k.as_str()))
        {
            return false;
        }
        true
    }
}

/// Lowercase, trim, and strip a leading `r/` or `/r/`.
pub fn normalize_subreddit(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    lower
        .strip_prefix("/r/")
        .or_else(|| lower.strip_prefix("r/"))
        .unwrap_or(&lower)
        .trim_matches('/')
        .to_string()
}

fn normalize_set(values: &BTreeSet<String>) -> BTreeSet<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}
