//! Translation cache: façade, storage backends, maintenance loop, and
//! offline migration.
//!
//! The [`TransCache`] façade owns one storage backend behind a single
//! reader/writer lock and is the only thing request handlers, the
//! maintainer, and the offline tool talk to. Backends implement the
//! [`CacheBackend`] capability set; two are provided — a JSONL flat file
//! and SQLite — with `mongodb` and `redis` reserved in the configuration
//! enum for later.
//!
//! Lock discipline: `save`, `stats`, and `scan` take the shared lock;
//! every mutating operation takes the exclusive lock. `lookup` also takes
//! the exclusive lock because the text backend refreshes `last_used`
//! during lookup; entries are returned as owned copies, so no reference
//! into backend storage ever outlives a lock release.

pub mod backend;
pub mod entry;
pub mod key;
pub mod maintainer;
pub mod migrate;
pub mod sqlite;
pub mod text;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::warn;

use crate::error::{HermodError, Result};

pub use backend::{CacheBackend, CacheStats};
pub use entry::CacheEntry;
pub use key::cache_key;
pub use maintainer::{CacheMaintainer, MaintainerConfig};
pub use migrate::MigrationReport;
pub use sqlite::SqliteBackend;
pub use text::TextBackend;

/// Storage engine selector.
///
/// `Mongodb` and `Redis` are reserved: requesting one falls back to the
/// text backend with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Text,
    Sqlite,
    Mongodb,
    Redis,
}

impl CacheBackendKind {
    /// Whether a concrete implementation exists for this kind.
    pub fn is_implemented(self) -> bool {
        matches!(self, CacheBackendKind::Text | CacheBackendKind::Sqlite)
    }
}

impl fmt::Display for CacheBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CacheBackendKind::Text => "text",
            CacheBackendKind::Sqlite => "sqlite",
            CacheBackendKind::Mongodb => "mongodb",
            CacheBackendKind::Redis => "redis",
        };
        f.write_str(name)
    }
}

impl FromStr for CacheBackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(CacheBackendKind::Text),
            "sqlite" => Ok(CacheBackendKind::Sqlite),
            "mongodb" => Ok(CacheBackendKind::Mongodb),
            "redis" => Ok(CacheBackendKind::Redis),
            other => Err(format!(
                "unknown backend kind '{other}' (expected text, sqlite, mongodb, or redis)"
            )),
        }
    }
}

/// Everything needed to open a backend.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub kind: CacheBackendKind,
    /// Cache file (text) or database file (sqlite).
    pub path: PathBuf,
    /// SQLite journal mode (default WAL).
    pub journal_mode: String,
    /// SQLite synchronous mode (default NORMAL).
    pub synchronous: String,
}

impl CacheSettings {
    pub fn new(kind: CacheBackendKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            journal_mode: "WAL".to_string(),
            synchronous: "NORMAL".to_string(),
        }
    }
}

/// Outcome of [`TransCache::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No prior entry; a fresh one was inserted.
    Inserted,
    /// The upstream reproduced the stored translation; count is now this.
    Confirmed { count: u32 },
    /// The upstream diverged; the stored translation was replaced and the
    /// count reset to 1.
    Replaced,
}

/// Backend-agnostic translation cache.
///
/// Shared across all request tasks and the background maintainer; every
/// public operation acquires the internal lock in the appropriate mode,
/// so callers need no locking of their own. The lock is never held across
/// an upstream translation call.
pub struct TransCache {
    kind: CacheBackendKind,
    backend: RwLock<Box<dyn CacheBackend>>,
}

impl TransCache {
    /// Open a cache with the backend named by `settings`.
    ///
    /// Reserved kinds (`mongodb`, `redis`) fall back to the text backend
    /// with a warning rather than failing startup.
    pub fn open(settings: &CacheSettings) -> Result<Self> {
        let (kind, backend): (CacheBackendKind, Box<dyn CacheBackend>) = match settings.kind {
            CacheBackendKind::Text => (
                CacheBackendKind::Text,
                Box::new(TextBackend::open(&settings.path)?),
            ),
            CacheBackendKind::Sqlite => (
                CacheBackendKind::Sqlite,
                Box::new(SqliteBackend::open(
                    &settings.path,
                    &settings.journal_mode,
                    &settings.synchronous,
                )?),
            ),
            unimplemented => {
                warn!(
                    requested = %unimplemented,
                    "backend not implemented, falling back to text backend"
                );
                (
                    CacheBackendKind::Text,
                    Box::new(TextBackend::open(&settings.path)?),
                )
            }
        };

        Ok(Self {
            kind,
            backend: RwLock::new(backend),
        })
    }

    /// The backend kind actually in use (after any fallback).
    pub fn kind(&self) -> CacheBackendKind {
        self.kind
    }

    /// Find the cached entry for `(from, to, text)`, refreshing its
    /// `last_used`. Returns an owned copy.
    pub fn lookup(&self, from_lang: &str, to_lang: &str, text: &str) -> Option<CacheEntry> {
        self.backend.write().lookup(from_lang, to_lang, text)
    }

    /// Insert a fresh entry with `count = 1`.
    pub fn add(
        &self,
        from_lang: &str,
        to_lang: &str,
        source_text: &str,
        translated_text: &str,
    ) -> Result<()> {
        self.backend
            .write()
            .add(from_lang, to_lang, source_text, translated_text)
    }

    /// Record one more confirmation for `entry`.
    pub fn update_count(&self, entry: &mut CacheEntry) -> Result<()> {
        self.backend.write().update_count(entry)
    }

    /// Replace `entry`'s translation, resetting its count to 1.
    pub fn update_translation(&self, entry: &mut CacheEntry, new_translation: &str) -> Result<()> {
        self.backend.write().update_translation(entry, new_translation)
    }

    /// Fold a fresh upstream translation into the cache under one
    /// exclusive lock acquisition.
    ///
    /// Concurrent requests for the same key may all miss and all call the
    /// upstream; their reconciliations serialize here, so the final state
    /// is exactly one entry — inserted by the first writer, then confirmed
    /// or replaced by the rest.
    pub fn reconcile(
        &self,
        from_lang: &str,
        to_lang: &str,
        text: &str,
        translation: &str,
    ) -> Result<ReconcileOutcome> {
        let mut backend = self.backend.write();
        match backend.lookup(from_lang, to_lang, text) {
            None => {
                backend.add(from_lang, to_lang, text, translation)?;
                Ok(ReconcileOutcome::Inserted)
            }
            Some(mut entry) if entry.translated_text == translation => {
                backend.update_count(&mut entry)?;
                Ok(ReconcileOutcome::Confirmed { count: entry.count })
            }
            Some(mut entry) => {
                backend.update_translation(&mut entry, translation)?;
                Ok(ReconcileOutcome::Replaced)
            }
        }
    }

    /// Flush the backend to durable storage.
    pub fn save(&self) -> Result<()> {
        self.backend.read().save()
    }

    /// Remove entries unused for more than `days` days; returns the
    /// number removed.
    pub fn cleanup(&self, days: u32) -> Result<usize> {
        self.backend.write().cleanup(days)
    }

    /// Aggregate entry counters.
    pub fn stats(&self, cache_threshold: u32, days: u32) -> Result<CacheStats> {
        self.backend.read().stats(cache_threshold, days)
    }

    /// Visit every entry in ascending id order.
    pub fn scan(&self, mut visit: impl FnMut(&CacheEntry)) -> Result<()> {
        self.backend.read().scan(&mut visit)
    }

    /// Owned copies of every entry in ascending id order.
    pub fn snapshot(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        self.scan(|e| entries.push(e.clone()))?;
        Ok(entries)
    }

    /// Remove one entry by id; returns whether it existed.
    pub fn delete_by_id(&self, id: i64) -> Result<bool> {
        self.backend.write().delete_by_id(id)
    }

    /// Remove every entry for a language pair; returns the count removed.
    pub fn delete_pair(&self, from_lang: &str, to_lang: &str) -> Result<usize> {
        self.backend.write().delete_pair(from_lang, to_lang)
    }

    /// Remove every entry; returns the count removed.
    pub fn clear(&self) -> Result<usize> {
        self.backend.write().clear()
    }
}

impl fmt::Debug for TransCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransCache")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Open a cache only when the kind has a concrete implementation; used by
/// the migration path, which must fail fast instead of falling back.
pub(crate) fn open_strict(settings: &CacheSettings) -> Result<TransCache> {
    if !settings.kind.is_implemented() {
        return Err(HermodError::UnsupportedBackend(settings.kind.to_string()));
    }
    TransCache::open(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_cache(dir: &tempfile::TempDir) -> TransCache {
        TransCache::open(&CacheSettings::new(
            CacheBackendKind::Text,
            dir.path().join("cache.txt"),
        ))
        .unwrap()
    }

    #[test]
    fn kind_parses_from_str() {
        assert_eq!("text".parse(), Ok(CacheBackendKind::Text));
        assert_eq!("SQLite".parse(), Ok(CacheBackendKind::Sqlite));
        assert!("cassandra".parse::<CacheBackendKind>().is_err());
    }

    #[test]
    fn reserved_kind_falls_back_to_text() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TransCache::open(&CacheSettings::new(
            CacheBackendKind::Redis,
            dir.path().join("cache.txt"),
        ))
        .unwrap();
        assert_eq!(cache.kind(), CacheBackendKind::Text);
    }

    #[test]
    fn open_strict_rejects_reserved_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_strict(&CacheSettings::new(
            CacheBackendKind::Mongodb,
            dir.path().join("cache.txt"),
        ))
        .unwrap_err();
        assert!(matches!(err, HermodError::UnsupportedBackend(_)));
    }

    #[test]
    fn reconcile_inserts_then_confirms_then_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let cache = text_cache(&dir);

        assert_eq!(
            cache.reconcile("kor", "eng", "안녕", "Hi").unwrap(),
            ReconcileOutcome::Inserted
        );
        assert_eq!(
            cache.reconcile("kor", "eng", "안녕", "Hi").unwrap(),
            ReconcileOutcome::Confirmed { count: 2 }
        );
        assert_eq!(
            cache.reconcile("kor", "eng", "안녕", "Hello").unwrap(),
            ReconcileOutcome::Replaced
        );

        let entry = cache.lookup("kor", "eng", "안녕").unwrap();
        assert_eq!(entry.count, 1);
        assert_eq!(entry.translated_text, "Hello");
    }

    #[test]
    fn concurrent_reconciles_keep_one_entry() {
        use std::sync::Arc;
        use std::thread;

        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(text_cache(&dir));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                cache.reconcile("kor", "eng", "안녕", "Hi").unwrap();
            }));
        }
        for h in handles {
            h.join().expect("thread panicked");
        }

        let stats = cache.stats(1, 30).unwrap();
        assert_eq!(stats.total, 1);
        let entry = cache.lookup("kor", "eng", "안녕").unwrap();
        assert_eq!(entry.count, 8);
    }
}
