//! Hermod — translation proxy daemon.
//!
//! Hermod fronts an OpenAI-compatible chat-completion endpoint with a
//! persistent, confirmation-gated translation cache. Clients POST
//! `{timestamp, uuid, from, to, text}` to `/translate` and get back
//! `{timestamp, uuid, translatedText}` with the correlation fields echoed
//! byte-for-byte.
//!
//! A translation is only served from cache after the upstream model has
//! produced the same text a configurable number of times (the cache
//! threshold), which guards against caching one-off model noise. Two
//! storage engines are provided behind a common backend trait: a JSONL
//! flat file and SQLite.
//!
//! # Library example
//!
//! ```rust,no_run
//! use hermod::{CacheBackendKind, CacheSettings, TransCache};
//!
//! fn main() -> hermod::Result<()> {
//!     let cache = TransCache::open(&CacheSettings::new(
//!         CacheBackendKind::Text,
//!         "trans_dictionary.txt",
//!     ))?;
//!
//!     cache.add("kor", "eng", "안녕하세요", "Hello")?;
//!     let entry = cache.lookup("kor", "eng", "안녕하세요").unwrap();
//!     assert_eq!(entry.translated_text, "Hello");
//!     assert_eq!(entry.count, 1);
//!     cache.save()?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod lang;
pub mod sanitize;
pub mod server;
pub mod telemetry;
pub mod version;

// Re-export main types at crate root
pub use cache::{
    CacheBackendKind, CacheEntry, CacheSettings, CacheStats, MigrationReport, TransCache,
};
pub use client::{OpenAiTranslator, RetryConfig, Translator, TranslatorConfig};
pub use error::{HermodError, Result};
pub use version::{version_string, GIT_BRANCH, GIT_SHA, PKG_VERSION};
