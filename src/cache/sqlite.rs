//! SQLite storage engine.
//!
//! One row per entry in `trans_cache`, kept compatible with the stock
//! `sqlite3` command-line tool. The connection is opened in full-mutex
//! mode and additionally wrapped in a `Mutex` so shared-lock façade
//! operations (`save`, `stats`, `scan`) can run against `&self`.

use std::path::PathBuf;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use tracing::info;

use crate::error::{HermodError, Result};

use super::backend::{CacheBackend, CacheStats};
use super::entry::{expiry_cutoff, now_unix, CacheEntry};
use super::key::cache_key;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS trans_cache (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  hash TEXT NOT NULL UNIQUE,
  from_lang TEXT NOT NULL,
  to_lang TEXT NOT NULL,
  source_text TEXT NOT NULL,
  translated_text TEXT NOT NULL,
  count INTEGER DEFAULT 1,
  last_used INTEGER NOT NULL,
  created_at INTEGER NOT NULL,
  CHECK(length(hash) = 64),
  CHECK(length(from_lang) = 3),
  CHECK(length(to_lang) = 3),
  CHECK(count >= 1)
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_hash ON trans_cache(hash);
CREATE INDEX IF NOT EXISTS idx_lang_pair ON trans_cache(from_lang, to_lang);
CREATE INDEX IF NOT EXISTS idx_last_used ON trans_cache(last_used);
CREATE INDEX IF NOT EXISTS idx_count ON trans_cache(count DESC);
CREATE INDEX IF NOT EXISTS idx_lang_hash ON trans_cache(from_lang, to_lang, hash);
";

const ENTRY_COLUMNS: &str =
    "id, hash, from_lang, to_lang, source_text, translated_text, count, last_used, created_at";

/// SQLite storage engine.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    #[allow(dead_code)]
    path: PathBuf,
}

impl SqliteBackend {
    /// Open (or create) the database and apply schema and pragmas.
    pub fn open(path: impl Into<PathBuf>, journal_mode: &str, synchronous: &str) -> Result<Self> {
        let path = path.into();
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;

        conn.execute_batch(SCHEMA)?;

        // journal_mode returns a result row, so these go through a batch
        // rather than execute().
        conn.execute_batch(&format!(
            "PRAGMA journal_mode={};
             PRAGMA synchronous={};
             PRAGMA cache_size=2000;
             PRAGMA mmap_size=268435456;",
            sanitize_pragma(journal_mode, "WAL"),
            sanitize_pragma(synchronous, "NORMAL"),
        ))?;

        info!(path = %path.display(), "SQLite cache initialized");

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    fn lookup_by_hash(conn: &Connection, hash: &str) -> Result<Option<CacheEntry>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ENTRY_COLUMNS} FROM trans_cache WHERE hash = ?1"
        ))?;
        let entry = stmt
            .query_row(params![hash], entry_from_row)
            .optional()?;
        Ok(entry)
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
    Ok(CacheEntry {
        id: row.get(0)?,
        hash: row.get(1)?,
        from_lang: row.get(2)?,
        to_lang: row.get(3)?,
        source_text: row.get(4)?,
        translated_text: row.get(5)?,
        count: row.get(6)?,
        last_used: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Pragma values come from configuration; restrict them to bare
/// identifiers so they can be spliced into the PRAGMA statement.
fn sanitize_pragma<'a>(value: &'a str, default: &'a str) -> &'a str {
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        value
    } else {
        default
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl CacheBackend for SqliteBackend {
    fn lookup(&mut self, from_lang: &str, to_lang: &str, text: &str) -> Option<CacheEntry> {
        let hash = cache_key(from_lang, to_lang, text);
        let conn = self.conn.lock();
        Self::lookup_by_hash(&conn, &hash).ok().flatten()
    }

    fn add(
        &mut self,
        from_lang: &str,
        to_lang: &str,
        source_text: &str,
        translated_text: &str,
    ) -> Result<()> {
        if from_lang.is_empty() || to_lang.is_empty() || source_text.is_empty() {
            return Err(HermodError::InvalidInput(
                "language codes and source text must be non-empty".into(),
            ));
        }

        let hash = cache_key(from_lang, to_lang, source_text);
        let now = now_unix();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "INSERT INTO trans_cache \
             (hash, from_lang, to_lang, source_text, translated_text, count, last_used, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)",
        )?;
        stmt.execute(params![
            hash,
            from_lang,
            to_lang,
            source_text,
            translated_text,
            now,
            now
        ])
        .map_err(|e| {
            if is_unique_violation(&e) {
                HermodError::DuplicateEntry
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    fn update_count(&mut self, entry: &mut CacheEntry) -> Result<()> {
        let new_count = entry.count + 1;
        let now = now_unix();
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("UPDATE trans_cache SET count = ?1, last_used = ?2 WHERE hash = ?3")?;
        let changed = stmt.execute(params![new_count, now, entry.hash])?;
        if changed == 0 {
            return Err(HermodError::Cache(format!(
                "no entry for hash {}",
                entry.hash
            )));
        }
        entry.count = new_count;
        entry.last_used = now;
        Ok(())
    }

    fn update_translation(&mut self, entry: &mut CacheEntry, new_translation: &str) -> Result<()> {
        let now = now_unix();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "UPDATE trans_cache SET translated_text = ?1, count = 1, last_used = ?2 WHERE hash = ?3",
        )?;
        let changed = stmt.execute(params![new_translation, now, entry.hash])?;
        if changed == 0 {
            return Err(HermodError::Cache(format!(
                "no entry for hash {}",
                entry.hash
            )));
        }
        entry.translated_text = new_translation.to_string();
        entry.count = 1;
        entry.last_used = now;
        Ok(())
    }

    fn save(&self) -> Result<()> {
        // Writes are transactionally visible; nothing to flush.
        Ok(())
    }

    fn cleanup(&mut self, days: u32) -> Result<usize> {
        if days == 0 {
            return Ok(0);
        }
        let cutoff = expiry_cutoff(now_unix(), days);
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("DELETE FROM trans_cache WHERE last_used < ?1")?;
        Ok(stmt.execute(params![cutoff])?)
    }

    fn stats(&self, cache_threshold: u32, days: u32) -> Result<CacheStats> {
        let cutoff = expiry_cutoff(now_unix(), days);
        let conn = self.conn.lock();
        let total: usize =
            conn.query_row("SELECT COUNT(*) FROM trans_cache", [], |row| row.get(0))?;
        let active: usize = conn.query_row(
            "SELECT COUNT(*) FROM trans_cache WHERE count >= ?1",
            params![cache_threshold],
            |row| row.get(0),
        )?;
        let expired: usize = conn.query_row(
            "SELECT COUNT(*) FROM trans_cache WHERE last_used < ?1",
            params![cutoff],
            |row| row.get(0),
        )?;
        Ok(CacheStats {
            total,
            active,
            expired,
        })
    }

    fn scan(&self, visit: &mut dyn FnMut(&CacheEntry)) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ENTRY_COLUMNS} FROM trans_cache ORDER BY id"
        ))?;
        let rows = stmt.query_map([], entry_from_row)?;
        for row in rows {
            visit(&row?);
        }
        Ok(())
    }

    fn delete_by_id(&mut self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM trans_cache WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn delete_pair(&mut self, from_lang: &str, to_lang: &str) -> Result<usize> {
        let conn = self.conn.lock();
        Ok(conn.execute(
            "DELETE FROM trans_cache WHERE from_lang = ?1 AND to_lang = ?2",
            params![from_lang, to_lang],
        )?)
    }

    fn clear(&mut self) -> Result<usize> {
        let conn = self.conn.lock();
        Ok(conn.execute("DELETE FROM trans_cache", [])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, SqliteBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteBackend::open(dir.path().join("cache.db"), "WAL", "NORMAL").unwrap();
        (dir, backend)
    }

    #[test]
    fn add_then_lookup() {
        let (_dir, mut backend) = open_temp();
        backend.add("kor", "eng", "안녕하세요", "Hello").unwrap();

        let entry = backend.lookup("kor", "eng", "안녕하세요").unwrap();
        assert_eq!(entry.count, 1);
        assert_eq!(entry.translated_text, "Hello");
        assert_eq!(entry.hash, cache_key("kor", "eng", "안녕하세요"));
        assert!(entry.last_used >= entry.created_at);
    }

    #[test]
    fn add_rejects_duplicate_hash() {
        let (_dir, mut backend) = open_temp();
        backend.add("kor", "eng", "안녕", "Hi").unwrap();
        let err = backend.add("kor", "eng", "안녕", "Hello").unwrap_err();
        assert!(matches!(err, HermodError::DuplicateEntry));
    }

    #[test]
    fn update_count_increments_row() {
        let (_dir, mut backend) = open_temp();
        backend.add("kor", "eng", "안녕", "Hi").unwrap();
        let mut entry = backend.lookup("kor", "eng", "안녕").unwrap();

        backend.update_count(&mut entry).unwrap();
        backend.update_count(&mut entry).unwrap();
        assert_eq!(entry.count, 3);

        let reread = backend.lookup("kor", "eng", "안녕").unwrap();
        assert_eq!(reread.count, 3);
    }

    #[test]
    fn update_translation_resets_count() {
        let (_dir, mut backend) = open_temp();
        backend.add("kor", "eng", "안녕", "Hi").unwrap();
        let mut entry = backend.lookup("kor", "eng", "안녕").unwrap();
        backend.update_count(&mut entry).unwrap();

        backend.update_translation(&mut entry, "Hello").unwrap();
        let reread = backend.lookup("kor", "eng", "안녕").unwrap();
        assert_eq!(reread.count, 1);
        assert_eq!(reread.translated_text, "Hello");
    }

    #[test]
    fn update_missing_entry_fails() {
        let (_dir, mut backend) = open_temp();
        let mut ghost = CacheEntry {
            id: 99,
            hash: "f".repeat(64),
            from_lang: "kor".into(),
            to_lang: "eng".into(),
            source_text: "x".into(),
            translated_text: "y".into(),
            count: 1,
            last_used: 0,
            created_at: 0,
        };
        assert!(backend.update_count(&mut ghost).is_err());
        assert!(backend.update_translation(&mut ghost, "z").is_err());
    }

    #[test]
    fn cleanup_deletes_by_age() {
        let (_dir, mut backend) = open_temp();
        backend.add("kor", "eng", "old", "old").unwrap();
        backend.add("kor", "eng", "fresh", "fresh").unwrap();

        let stale = now_unix() - 31 * 86_400;
        let hash = cache_key("kor", "eng", "old");
        backend
            .conn
            .lock()
            .execute(
                "UPDATE trans_cache SET last_used = ?1 WHERE hash = ?2",
                params![stale, hash],
            )
            .unwrap();

        assert_eq!(backend.cleanup(30).unwrap(), 1);
        assert!(backend.lookup("kor", "eng", "old").is_none());
        assert!(backend.lookup("kor", "eng", "fresh").is_some());
    }

    #[test]
    fn stats_counts() {
        let (_dir, mut backend) = open_temp();
        backend.add("kor", "eng", "a", "A").unwrap();
        backend.add("kor", "eng", "b", "B").unwrap();

        let hash = cache_key("kor", "eng", "a");
        backend
            .conn
            .lock()
            .execute(
                "UPDATE trans_cache SET count = 7 WHERE hash = ?1",
                params![hash],
            )
            .unwrap();

        let stats = backend.stats(5, 30).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.expired, 0);
    }

    #[test]
    fn scan_yields_ascending_ids() {
        let (_dir, mut backend) = open_temp();
        backend.add("kor", "eng", "a", "A").unwrap();
        backend.add("kor", "eng", "b", "B").unwrap();
        backend.add("kor", "eng", "c", "C").unwrap();

        let mut ids = Vec::new();
        backend.scan(&mut |e| ids.push(e.id)).unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn schema_enforces_invariants() {
        let (_dir, backend) = open_temp();
        let conn = backend.conn.lock();

        // count >= 1
        let err = conn.execute(
            "INSERT INTO trans_cache \
             (hash, from_lang, to_lang, source_text, translated_text, count, last_used, created_at) \
             VALUES (?1, 'kor', 'eng', 's', 't', 0, 1, 1)",
            params!["a".repeat(64)],
        );
        assert!(err.is_err());

        // lang length = 3
        let err = conn.execute(
            "INSERT INTO trans_cache \
             (hash, from_lang, to_lang, source_text, translated_text, count, last_used, created_at) \
             VALUES (?1, 'ko', 'eng', 's', 't', 1, 1, 1)",
            params!["b".repeat(64)],
        );
        assert!(err.is_err());
    }

    #[test]
    fn database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        {
            let mut backend = SqliteBackend::open(&path, "WAL", "NORMAL").unwrap();
            backend.add("kor", "eng", "안녕", "Hi").unwrap();
        }
        let mut backend = SqliteBackend::open(&path, "WAL", "NORMAL").unwrap();
        let entry = backend.lookup("kor", "eng", "안녕").unwrap();
        assert_eq!(entry.translated_text, "Hi");
    }

    #[test]
    fn bad_pragma_values_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        // A hostile value must not be spliced into the PRAGMA statement.
        let backend =
            SqliteBackend::open(dir.path().join("c.db"), "WAL; DROP TABLE trans_cache", "")
                .unwrap();
        assert!(backend.save().is_ok());
    }
}
