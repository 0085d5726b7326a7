//! Per-request translation pipeline.
//!
//! Implements the confirmation-by-repetition admission policy: a cached
//! translation is served only once it has been produced by the upstream
//! at least `cache_threshold` times; anything below that re-queries the
//! upstream and folds the answer back into the cache.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::TransCache;
use crate::client::Translator;
use crate::error::Result;
use crate::sanitize::truncate_for_log;
use crate::telemetry;

/// How the translation was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationSource {
    Cache,
    Upstream,
}

/// Handler state shared by all connection tasks.
pub struct TranslateService {
    cache: Arc<TransCache>,
    translator: Arc<dyn Translator>,
    cache_threshold: u32,
}

impl TranslateService {
    pub fn new(
        cache: Arc<TransCache>,
        translator: Arc<dyn Translator>,
        cache_threshold: u32,
    ) -> Self {
        Self {
            cache,
            translator,
            cache_threshold,
        }
    }

    pub fn cache(&self) -> &Arc<TransCache> {
        &self.cache
    }

    /// Translate sanitized `text`, consulting the cache first.
    ///
    /// The cache lock is released before the upstream call and reacquired
    /// for the write-back, so slow upstream responses never block other
    /// request tasks' cache access. A write-back failure is logged and
    /// the translation still returned: caching is best-effort.
    pub async fn translate(
        &self,
        from_lang: &str,
        to_lang: &str,
        text: &str,
        request_id: &str,
    ) -> Result<(String, TranslationSource)> {
        if let Some(mut entry) = self.cache.lookup(from_lang, to_lang, text) {
            if entry.is_confirmed(self.cache_threshold) {
                if let Err(e) = self.cache.update_count(&mut entry) {
                    warn!(request_id, error = %e, "failed to bump cache hit count");
                }
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                info!(
                    request_id,
                    count = entry.count,
                    "serving translation from cache"
                );
                return Ok((entry.translated_text, TranslationSource::Cache));
            }
            debug!(
                request_id,
                count = entry.count,
                threshold = self.cache_threshold,
                "cache entry below confirmation threshold"
            );
        }
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);

        let translation = self
            .translator
            .translate(from_lang, to_lang, text, request_id)
            .await?;

        match self.cache.reconcile(from_lang, to_lang, text, &translation) {
            Ok(outcome) => debug!(request_id, ?outcome, "cache reconciled"),
            Err(e) => warn!(
                request_id,
                error = %e,
                text = %truncate_for_log(text, 50),
                "failed to cache translation"
            ),
        }

        Ok((translation, TranslationSource::Upstream))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::cache::{CacheBackendKind, CacheSettings};
    use crate::error::HermodError;

    use super::*;

    /// Scripted upstream: returns canned answers in order, repeating the
    /// last one, and counts invocations.
    struct ScriptedTranslator {
        answers: Mutex<Vec<String>>,
        calls: AtomicU32,
    }

    impl ScriptedTranslator {
        fn new(answers: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.iter().rev().map(|s| s.to_string()).collect()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Translator for ScriptedTranslator {
        async fn translate(&self, _: &str, _: &str, _: &str, _: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut answers = self.answers.lock();
            if answers.len() > 1 {
                Ok(answers.pop().unwrap())
            } else {
                answers
                    .last()
                    .cloned()
                    .ok_or_else(|| HermodError::Http("no scripted answer".into()))
            }
        }
    }

    fn service(translator: Arc<ScriptedTranslator>, threshold: u32) -> (tempfile::TempDir, TranslateService) {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(
            TransCache::open(&CacheSettings::new(
                CacheBackendKind::Text,
                dir.path().join("cache.txt"),
            ))
            .unwrap(),
        );
        (dir, TranslateService::new(cache, translator, threshold))
    }

    #[tokio::test]
    async fn first_request_populates_cache() {
        let upstream = ScriptedTranslator::new(&["Hello"]);
        let (_dir, svc) = service(Arc::clone(&upstream), 3);

        let (text, source) = svc.translate("kor", "eng", "안녕하세요", "req-1").await.unwrap();
        assert_eq!(text, "Hello");
        assert_eq!(source, TranslationSource::Upstream);
        assert_eq!(upstream.calls(), 1);

        let entry = svc.cache().lookup("kor", "eng", "안녕하세요").unwrap();
        assert_eq!(entry.count, 1);
        assert_eq!(entry.translated_text, "Hello");
    }

    #[tokio::test]
    async fn confirmation_march_with_threshold_three() {
        let upstream = ScriptedTranslator::new(&["Hello"]);
        let (_dir, svc) = service(Arc::clone(&upstream), 3);

        // Three upstream calls: counts go 1, 2, 3.
        for _ in 0..3 {
            let (_, source) = svc.translate("kor", "eng", "안녕", "req").await.unwrap();
            assert_eq!(source, TranslationSource::Upstream);
        }
        assert_eq!(upstream.calls(), 3);
        assert_eq!(svc.cache().lookup("kor", "eng", "안녕").unwrap().count, 3);

        // Confirmed: served from cache, count keeps rising.
        let (text, source) = svc.translate("kor", "eng", "안녕", "req").await.unwrap();
        assert_eq!(text, "Hello");
        assert_eq!(source, TranslationSource::Cache);
        assert_eq!(upstream.calls(), 3);
        assert_eq!(svc.cache().lookup("kor", "eng", "안녕").unwrap().count, 4);
    }

    #[tokio::test]
    async fn divergent_translation_resets_confirmation() {
        let upstream = ScriptedTranslator::new(&["Hi", "Hi", "Hello", "Hello"]);
        let (_dir, svc) = service(Arc::clone(&upstream), 5);

        svc.translate("kor", "eng", "안녕", "req").await.unwrap();
        svc.translate("kor", "eng", "안녕", "req").await.unwrap();
        assert_eq!(svc.cache().lookup("kor", "eng", "안녕").unwrap().count, 2);

        // Upstream diverges: count resets to 1 with the new text.
        svc.translate("kor", "eng", "안녕", "req").await.unwrap();
        let entry = svc.cache().lookup("kor", "eng", "안녕").unwrap();
        assert_eq!(entry.count, 1);
        assert_eq!(entry.translated_text, "Hello");

        // Re-confirmation proceeds from 1.
        svc.translate("kor", "eng", "안녕", "req").await.unwrap();
        assert_eq!(svc.cache().lookup("kor", "eng", "안녕").unwrap().count, 2);
    }

    #[tokio::test]
    async fn upstream_failure_propagates_without_caching() {
        let upstream = ScriptedTranslator::new(&[]);
        let (_dir, svc) = service(Arc::clone(&upstream), 3);

        let err = svc.translate("kor", "eng", "안녕", "req").await.unwrap_err();
        assert!(matches!(err, HermodError::Http(_)));
        assert!(svc.cache().lookup("kor", "eng", "안녕").is_none());
    }
}
