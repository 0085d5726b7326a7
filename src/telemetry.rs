//! Telemetry metric name constants.
//!
//! Centralised metric names for hermod operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `hermod_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `status` — outcome: "ok" or "error"
//! - `operation` — cache operation involved (e.g. "save", "cleanup")

/// Total translation requests handled.
///
/// Labels: `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "hermod_requests_total";

/// Request duration in seconds.
pub const REQUEST_DURATION_SECONDS: &str = "hermod_request_duration_seconds";

/// Total cache hits served without an upstream call.
pub const CACHE_HITS_TOTAL: &str = "hermod_cache_hits_total";

/// Total cache misses (including below-threshold entries).
pub const CACHE_MISSES_TOTAL: &str = "hermod_cache_misses_total";

/// Total upstream translation calls issued.
pub const UPSTREAM_CALLS_TOTAL: &str = "hermod_upstream_calls_total";

/// Total retry attempts against the upstream (not counting the initial
/// request).
pub const RETRIES_TOTAL: &str = "hermod_retries_total";

/// Total cache entries removed by age-based cleanup.
pub const CLEANUP_REMOVED_TOTAL: &str = "hermod_cleanup_removed_total";
