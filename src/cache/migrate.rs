//! Offline backend-to-backend migration.
//!
//! Copies the identity fields of every entry from one backend into
//! another. Counts and timestamps are deliberately not carried over: the
//! destination treats each migrated entry as fresh, so confirmation
//! history restarts on the new backend.

use tracing::{info, warn};

use crate::error::Result;

use super::{open_strict, CacheSettings, TransCache};

/// How often a progress line is emitted, in entries.
const PROGRESS_EVERY: usize = 100;

/// Counters reported after a migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Entries copied into the destination.
    pub migrated: usize,
    /// Entries the destination refused (already present, invalid, ...).
    pub failed: usize,
}

impl MigrationReport {
    /// Whether every source entry made it across.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Open both backends and copy every entry from source to destination.
///
/// Only kinds with concrete implementations are accepted; reserved kinds
/// fail fast instead of silently migrating a text fallback.
pub fn migrate_settings(
    source: &CacheSettings,
    dest: &CacheSettings,
    progress: bool,
) -> Result<MigrationReport> {
    let source_cache = open_strict(source)?;
    let dest_cache = open_strict(dest)?;
    migrate(&source_cache, &dest_cache, progress)
}

/// Copy every entry of `source` into `dest` in ascending id order.
///
/// Entries the destination rejects are counted as failed and skipped; the
/// run always continues to the end. The destination is saved once after
/// the copy.
pub fn migrate(source: &TransCache, dest: &TransCache, progress: bool) -> Result<MigrationReport> {
    let entries = source.snapshot()?;
    info!(
        total = entries.len(),
        from = %source.kind(),
        to = %dest.kind(),
        "starting cache migration"
    );

    let mut report = MigrationReport::default();
    for entry in &entries {
        match dest.add(
            &entry.from_lang,
            &entry.to_lang,
            &entry.source_text,
            &entry.translated_text,
        ) {
            Ok(()) => report.migrated += 1,
            Err(e) => {
                report.failed += 1;
                warn!(id = entry.id, error = %e, "failed to migrate entry");
            }
        }

        if progress && report.migrated > 0 && report.migrated % PROGRESS_EVERY == 0 {
            info!(migrated = report.migrated, total = entries.len(), "migration progress");
        }
    }

    dest.save()?;
    info!(
        migrated = report.migrated,
        failed = report.failed,
        "migration finished"
    );
    Ok(report)
}
