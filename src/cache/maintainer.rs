//! Background persistence and cleanup loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::telemetry;

use super::TransCache;

/// Minimum interval between cleanup checks, regardless of the configured
/// age.
const MIN_CLEANUP_CHECK_SECS: u64 = 3_600;

/// Maintainer cadence configuration.
#[derive(Debug, Clone)]
pub struct MaintainerConfig {
    /// Interval between cache saves. Default: 5 seconds.
    pub save_interval: Duration,
    /// Whether age-based cleanup runs at all.
    pub cleanup_enabled: bool,
    /// Entries unused for longer than this many days are removed.
    pub cleanup_days: u32,
}

impl Default for MaintainerConfig {
    fn default() -> Self {
        Self {
            save_interval: Duration::from_secs(5),
            cleanup_enabled: true,
            cleanup_days: 30,
        }
    }
}

impl MaintainerConfig {
    /// Interval between cleanup checks: a tenth of the cleanup age,
    /// floored at one hour.
    pub fn cleanup_check_interval(&self) -> Duration {
        let tenth = u64::from(self.cleanup_days) * 86_400 / 10;
        Duration::from_secs(tenth.max(MIN_CLEANUP_CHECK_SECS))
    }
}

/// Handle to the background maintainer task.
///
/// Spawned at server start, cancelled and joined at shutdown; the task
/// observes the cancellation token after each sleep, so it drains within
/// one save interval.
pub struct CacheMaintainer {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl CacheMaintainer {
    /// Spawn the maintainer on the current tokio runtime.
    pub fn spawn(cache: Arc<TransCache>, config: MaintainerConfig) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            run(cache, config, task_token).await;
        });
        Self { token, handle }
    }

    /// Signal shutdown and wait for the current iteration to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "maintainer task panicked");
        }
    }
}

async fn run(cache: Arc<TransCache>, config: MaintainerConfig, token: CancellationToken) {
    let check_interval = config.cleanup_check_interval();
    let mut since_cleanup = Duration::ZERO;

    info!(
        save_interval_secs = config.save_interval.as_secs(),
        cleanup_enabled = config.cleanup_enabled,
        cleanup_days = config.cleanup_days,
        "cache maintainer started"
    );

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(config.save_interval) => {}
        }

        if let Err(e) = cache.save() {
            warn!(error = %e, "periodic cache save failed");
        } else {
            debug!("cache saved");
        }

        if config.cleanup_enabled {
            since_cleanup += config.save_interval;
            if since_cleanup >= check_interval {
                since_cleanup = Duration::ZERO;
                match cache.cleanup(config.cleanup_days) {
                    Ok(removed) => {
                        metrics::counter!(telemetry::CLEANUP_REMOVED_TOTAL)
                            .increment(removed as u64);
                        info!(removed, days = config.cleanup_days, "cache cleanup");
                    }
                    Err(e) => warn!(error = %e, "cache cleanup failed"),
                }
            }
        }
    }

    info!("cache maintainer stopped");
}
