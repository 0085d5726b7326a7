//! hermodd — Hermod daemon.
//!
//! Serves `/translate` and `/health` over HTTP, fronting an
//! OpenAI-compatible endpoint with the confirmation-gated translation
//! cache. SIGHUP saves the cache and logs its statistics without
//! shutting down; SIGINT/SIGTERM drain and exit.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hermod::cache::CacheMaintainer;
use hermod::server::{Config, Secrets, TranslateService};
use hermod::{HermodError, OpenAiTranslator, TransCache};

/// Hermod translation proxy daemon.
#[derive(Parser)]
#[command(name = "hermodd")]
#[command(version = hermod::PKG_VERSION)]
#[command(about = "Hermod translation proxy daemon")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "HERMOD_CONFIG")]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging();

    let config = Config::load(args.config.as_deref())?;
    let secrets = Secrets::load()?;
    let api_key = secrets.api_key().ok_or_else(|| {
        HermodError::Configuration(
            "no API key found: set OPENAI_API_KEY or create ~/.hermod/secrets.toml".into(),
        )
    })?;

    let addr: SocketAddr = config
        .server
        .address
        .parse()
        .map_err(|e| HermodError::Configuration(format!("invalid listen address: {e}")))?;

    info!(
        version = hermod::version_string(),
        %addr,
        base_url = %config.openai.base_url,
        model = %config.openai.model,
        backend = %config.cache.backend,
        threshold = config.cache.threshold,
        "hermodd starting"
    );

    let cache = Arc::new(TransCache::open(&config.cache.settings())?);
    let translator = Arc::new(OpenAiTranslator::new(
        config.openai.translator()?,
        api_key,
    )?);
    let service = Arc::new(TranslateService::new(
        Arc::clone(&cache),
        translator,
        config.cache.threshold,
    ));

    let maintainer = CacheMaintainer::spawn(Arc::clone(&cache), config.cache.maintainer());

    let shutdown = CancellationToken::new();
    let server = tokio::spawn(hermod::server::run(addr, service, shutdown.clone()));

    wait_for_shutdown(&config, &cache).await;

    info!("shutting down");
    shutdown.cancel();
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "server exited with error"),
        Err(e) => warn!(error = %e, "server task failed"),
    }
    maintainer.shutdown().await;

    if let Err(e) = cache.save() {
        error!(error = %e, "final cache save failed");
    } else {
        info!("cache saved");
    }
    log_cache_stats(&config, &cache);

    info!("shutdown complete");
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

/// Block until SIGINT or SIGTERM. SIGHUP saves the cache and keeps
/// serving.
async fn wait_for_shutdown(config: &Config, cache: &Arc<TransCache>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to install SIGHUP handler");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("received SIGINT");
                    break;
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM");
                    break;
                }
                _ = sighup.recv() => {
                    info!("received SIGHUP, saving translation cache");
                    match cache.save() {
                        Ok(()) => info!("translation cache saved"),
                        Err(e) => warn!(error = %e, "failed to save translation cache"),
                    }
                    log_cache_stats(config, cache);
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received interrupt");
    }
}

fn log_cache_stats(config: &Config, cache: &Arc<TransCache>) {
    match cache.stats(config.cache.threshold, config.cache.cleanup_days) {
        Ok(stats) => info!(
            total = stats.total,
            active = stats.active,
            expired = stats.expired,
            "cache stats"
        ),
        Err(e) => warn!(error = %e, "failed to read cache stats"),
    }
}
