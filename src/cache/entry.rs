//! Cache entry record.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A single cached translation.
///
/// Serde field names match the JSONL file format
/// (`id, hash, from, to, source, target, count, last_used, created_at`),
/// so text-backend persistence is a plain per-line (de)serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Monotonic identifier, unique within one backend instance.
    pub id: i64,
    /// 64-char lowercase hex SHA-256 of the composite key.
    pub hash: String,
    /// ISO 639-2 source language.
    #[serde(rename = "from")]
    pub from_lang: String,
    /// ISO 639-2 target language.
    #[serde(rename = "to")]
    pub to_lang: String,
    /// Sanitized source text.
    #[serde(rename = "source")]
    pub source_text: String,
    /// Sanitized translated text.
    #[serde(rename = "target")]
    pub translated_text: String,
    /// Confirmation count, always >= 1.
    pub count: u32,
    /// Unix seconds of the last lookup hit or mutation.
    pub last_used: i64,
    /// Unix seconds of insertion.
    pub created_at: i64,
}

impl CacheEntry {
    /// Whether this entry has enough confirmations to be served from cache.
    pub fn is_confirmed(&self, cache_threshold: u32) -> bool {
        self.count >= cache_threshold
    }

    /// Whether `last_used` is older than `days` days relative to `now`.
    pub fn is_expired(&self, now: i64, days: u32) -> bool {
        self.last_used < expiry_cutoff(now, days)
    }
}

/// Current time as Unix seconds.
pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Cutoff timestamp: entries with `last_used` strictly below it are
/// expired.
pub(crate) fn expiry_cutoff(now: i64, days: u32) -> i64 {
    now - i64::from(days) * 86_400
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(count: u32, last_used: i64) -> CacheEntry {
        CacheEntry {
            id: 1,
            hash: "0".repeat(64),
            from_lang: "kor".into(),
            to_lang: "eng".into(),
            source_text: "안녕".into(),
            translated_text: "Hi".into(),
            count,
            last_used,
            created_at: last_used,
        }
    }

    #[test]
    fn confirmation_threshold() {
        assert!(!entry(2, 0).is_confirmed(3));
        assert!(entry(3, 0).is_confirmed(3));
        assert!(entry(4, 0).is_confirmed(3));
    }

    #[test]
    fn expiry_is_strict() {
        let now = 1_000_000_000;
        let cutoff = expiry_cutoff(now, 30);
        assert!(entry(1, cutoff - 1).is_expired(now, 30));
        assert!(!entry(1, cutoff).is_expired(now, 30));
    }

    #[test]
    fn serde_uses_wire_field_names() {
        let json = serde_json::to_value(entry(1, 42)).unwrap();
        for key in [
            "id", "hash", "from", "to", "source", "target", "count", "last_used", "created_at",
        ] {
            assert!(json.get(key).is_some(), "missing field {key}");
        }
        assert!(json.get("from_lang").is_none());
    }
}
