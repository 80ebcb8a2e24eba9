use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use redpulse_common::QueryParams;

/// Hex SHA-256 of a canonical JSON key. Equal keys give equal fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint any serializable key.
    pub fn of<K: Serialize>(key: &K) -> serde_json::Result<Self> {
        let bytes = serde_json::to_vec(key)?;
        Ok(Self::digest(&bytes))
    }

    /// Fingerprint of the normalized query. Sets are ordered and strings
    /// lowercased first, so caller-side ordering and case never matter.
    pub fn for_query(query: &QueryParams) -> Self {
        let normalized = query.normalized();
        Self::of(&normalized)
            .unwrap_or_else(|_| Self::digest(format!("{normalized:?}").as_bytes()))
    }

    fn digest(bytes: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use redpulse_common::RecordKind;

    #[test]
    fn same_query_in_any_order_shares_fingerprint() {
        let a = QueryParams::new("r/Stocks")
            .with_keyword("Tesla")
            .with_keyword("apple")
            .with_kind(RecordKind::Comment)
            .with_kind(RecordKind::Post)
            .with_topic("EV");
        let b = QueryParams::new("stocks ")
            .with_topic("ev")
            .with_kind(RecordKind::Post)
            .with_kind(RecordKind::Comment)
            .with_keyword("APPLE")
            .with_keyword("tesla");
        assert_eq!(Fingerprint::for_query(&a), Fingerprint::for_query(&b));
    }

    #[test]
    fn different_queries_differ() {
        let base = QueryParams::new("stocks");
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_ne!(
            Fingerprint::for_query(&base),
            Fingerprint::for_query(&base.clone().with_min_upvotes(10))
        );
        assert_ne!(
            Fingerprint::for_query(&base),
            Fingerprint::for_query(&base.clone().with_range(Some(start), None))
        );
        assert_ne!(
            Fingerprint::for_query(&base),
            Fingerprint::for_query(&QueryParams::new("investing"))
        );
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = Fingerprint::for_query(&QueryParams::new("stocks"));
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp.short().len(), 12);
    }
}
