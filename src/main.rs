//! listing-watch: binary entrypoint.
//! Loads the watch config, opens the state directory and runs the scheduler
//! until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use listing_watch::config::WatchConfig;
use listing_watch::metrics::Metrics;
use listing_watch::{NotifierMux, PageExtractor, Scheduler, SnapshotStore, SourceRunner};

const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
const ENV_RUN_ONCE: &str = "WATCH_RUN_ONCE";

/// Compact logs by default; `LOG_FORMAT=json` for structured output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("listing_watch=info,warn"));

    let json = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = WatchConfig::load_default().context("loading watch config")?;

    // The only fatal runtime condition: nowhere to persist state.
    let store = SnapshotStore::open(&cfg.state_dir)
        .await
        .context("opening state directory")?;

    if let Some(addr) = cfg.metrics_addr {
        let metrics = Metrics::install()?;
        tokio::spawn(async move {
            if let Err(e) = metrics.serve(addr).await {
                warn!(error = ?e, "metrics exporter stopped");
            }
        });
    }

    let extractor = Arc::new(PageExtractor::new(&cfg.extract_settings())?);
    let notifier = Arc::new(NotifierMux::from_config(&cfg));
    info!(
        state_dir = %store.dir().display(),
        channels = ?notifier.channel_names(),
        "listing-watch starting"
    );

    let runner = Arc::new(SourceRunner::new(extractor, notifier, store));
    let scheduler =
        Scheduler::new(cfg.source_definitions(), runner, cfg.interval()).parallel(cfg.parallel);

    let once = std::env::var(ENV_RUN_ONCE).ok().is_some_and(|v| v == "1");
    if once {
        let summary = scheduler.run_cycle().await;
        info!(?summary, "single cycle done");
        return Ok(());
    }

    tokio::select! {
        _ = scheduler.run() => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "ctrl-c handler failed");
            }
            info!("shutting down");
        }
    }
    Ok(())
}
