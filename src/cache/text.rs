//! JSONL flat-file backend.
//!
//! Entries live in memory as an ordered sequence and persist as one JSON
//! object per line. Lookup is a linear hash scan; the expected working
//! set for this backend is small enough that an index would not pay for
//! itself.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{HermodError, Result};

use super::backend::{CacheBackend, CacheStats};
use super::entry::{expiry_cutoff, now_unix, CacheEntry};
use super::key::cache_key;

/// In-memory JSONL storage engine.
pub struct TextBackend {
    entries: Vec<CacheEntry>,
    next_id: i64,
    path: PathBuf,
}

impl TextBackend {
    /// Open the backend, loading any existing cache file.
    ///
    /// A missing file is the normal first-run condition. Lines that fail
    /// to parse are skipped with a warning; one bad line never poisons
    /// the rest of the file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut backend = Self {
            entries: Vec::new(),
            next_id: 1,
            path,
        };
        backend.load()?;
        Ok(backend)
    }

    fn load(&mut self) -> Result<()> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "cache file not found, starting empty");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let reader = BufReader::new(file);
        let mut loaded = 0usize;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CacheEntry>(&line) {
                Ok(entry) => {
                    if entry.id >= self.next_id {
                        self.next_id = entry.id + 1;
                    }
                    self.entries.push(entry);
                    loaded += 1;
                }
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        line = line_no + 1,
                        error = %e,
                        "skipping malformed cache line"
                    );
                }
            }
        }

        info!(path = %self.path.display(), loaded, "loaded cache entries");
        Ok(())
    }

    fn position_by_hash(&self, hash: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.hash == hash)
    }
}

impl CacheBackend for TextBackend {
    fn lookup(&mut self, from_lang: &str, to_lang: &str, text: &str) -> Option<CacheEntry> {
        let hash = cache_key(from_lang, to_lang, text);
        let idx = self.position_by_hash(&hash)?;
        self.entries[idx].last_used = now_unix();
        Some(self.entries[idx].clone())
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
        if self.position_by_hash(&hash).is_some() {
            return Err(HermodError::DuplicateEntry);
        }

        let now = now_unix();
        let entry = CacheEntry {
            id: self.next_id,
            hash,
            from_lang: from_lang.to_string(),
            to_lang: to_lang.to_string(),
            source_text: source_text.to_string(),
            translated_text: translated_text.to_string(),
            count: 1,
            last_used: now,
            created_at: now,
        };
        self.next_id += 1;
        self.entries.push(entry);
        Ok(())
    }

    fn update_count(&mut self, entry: &mut CacheEntry) -> Result<()> {
        let idx = self
            .position_by_hash(&entry.hash)
            .ok_or_else(|| HermodError::Cache(format!("no entry for hash {}", entry.hash)))?;
        let stored = &mut self.entries[idx];
        stored.count += 1;
        stored.last_used = now_unix();
        entry.count = stored.count;
        entry.last_used = stored.last_used;
        Ok(())
    }

    fn update_translation(&mut self, entry: &mut CacheEntry, new_translation: &str) -> Result<()> {
        let idx = self
            .position_by_hash(&entry.hash)
            .ok_or_else(|| HermodError::Cache(format!("no entry for hash {}", entry.hash)))?;
        let stored = &mut self.entries[idx];
        stored.translated_text = new_translation.to_string();
        stored.count = 1;
        stored.last_used = now_unix();
        entry.translated_text = stored.translated_text.clone();
        entry.count = 1;
        entry.last_used = stored.last_used;
        Ok(())
    }

    fn save(&self) -> Result<()> {
        // Write to a sibling temp file and rename over the target so a
        // crash mid-save never leaves a half-written file that loads.
        let tmp_path = temp_path(&self.path);
        let mut file = File::create(&tmp_path)?;
        for entry in &self.entries {
            let line = serde_json::to_string(entry)?;
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
        }
        file.flush()?;
        drop(file);
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn cleanup(&mut self, days: u32) -> Result<usize> {
        if days == 0 {
            return Ok(0);
        }
        let cutoff = expiry_cutoff(now_unix(), days);
        let before = self.entries.len();
        self.entries.retain(|e| e.last_used >= cutoff);
        Ok(before - self.entries.len())
    }

    fn stats(&self, cache_threshold: u32, days: u32) -> Result<CacheStats> {
        let cutoff = expiry_cutoff(now_unix(), days);
        let mut stats = CacheStats {
            total: self.entries.len(),
            ..CacheStats::default()
        };
        for entry in &self.entries {
            if entry.count >= cache_threshold {
                stats.active += 1;
            }
            if entry.last_used < cutoff {
                stats.expired += 1;
            }
        }
        Ok(stats)
    }

    fn scan(&self, visit: &mut dyn FnMut(&CacheEntry)) -> Result<()> {
        for entry in &self.entries {
            visit(entry);
        }
        Ok(())
    }

    fn delete_by_id(&mut self, id: i64) -> Result<bool> {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        Ok(self.entries.len() < before)
    }

    fn delete_pair(&mut self, from_lang: &str, to_lang: &str) -> Result<usize> {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.from_lang == from_lang && e.to_lang == to_lang));
        Ok(before - self.entries.len())
    }

    fn clear(&mut self) -> Result<usize> {
        let removed = self.entries.len();
        self.entries.clear();
        Ok(removed)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "cache".into());
    name.push(".tmp");
    path.with_file_name(name)
}
