//! Storage backend capability trait.

use crate::error::Result;

use super::entry::CacheEntry;

/// Aggregate counters reported by [`CacheBackend::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Live entries in the backend.
    pub total: usize,
    /// Entries with `count >= cache_threshold`.
    pub active: usize,
    /// Entries whose `last_used` is older than the cleanup age.
    pub expired: usize,
}

/// The capability set every storage engine implements.
///
/// All methods are invoked by the [`TransCache`](super::TransCache) façade
/// with its lock already held in the required mode; implementations must
/// not take the façade lock themselves. Entries cross the trait boundary
/// by value — callers receive copies, never references into backend
/// storage.
pub trait CacheBackend: Send + Sync {
    /// Find the entry for `(from, to, text)` by composite-key hash.
    ///
    /// May refresh the entry's `last_used` as a side effect.
    fn lookup(&mut self, from_lang: &str, to_lang: &str, text: &str) -> Option<CacheEntry>;

    /// Insert a fresh entry (`count = 1`, both timestamps = now).
    ///
    /// Fails with [`HermodError::DuplicateEntry`](crate::HermodError) when
    /// an entry with the same hash is already live.
    fn add(
        &mut self,
        from_lang: &str,
        to_lang: &str,
        source_text: &str,
        translated_text: &str,
    ) -> Result<()>;

    /// Record one more confirmation: `count += 1`, `last_used = now`.
    ///
    /// The caller's copy is updated to the stored values.
    fn update_count(&mut self, entry: &mut CacheEntry) -> Result<()>;

    /// Replace the stored translation, resetting `count` to 1 and
    /// touching `last_used`. The caller's copy is updated in step.
    fn update_translation(&mut self, entry: &mut CacheEntry, new_translation: &str) -> Result<()>;

    /// Flush in-memory state to durable storage. A no-op for backends
    /// with transparent durability.
    fn save(&self) -> Result<()>;

    /// Remove every entry whose `last_used` is older than `days` days.
    /// Returns the number removed. `days == 0` removes nothing.
    fn cleanup(&mut self, days: u32) -> Result<usize>;

    /// Report total / active / expired entry counts.
    fn stats(&self, cache_threshold: u32, days: u32) -> Result<CacheStats>;

    /// Visit every entry in ascending id order.
    fn scan(&self, visit: &mut dyn FnMut(&CacheEntry)) -> Result<()>;

    /// Remove the entry with the given id. Returns whether one existed.
    fn delete_by_id(&mut self, id: i64) -> Result<bool>;

    /// Remove every entry for a language pair. Returns the number removed.
    fn delete_pair(&mut self, from_lang: &str, to_lang: &str) -> Result<usize>;

    /// Remove every entry. Returns the number removed.
    fn clear(&mut self) -> Result<usize>;
}
