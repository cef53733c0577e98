use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and describe the watch series.
    /// Can succeed only once per process.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }

    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding metrics listener on {addr}"))?;
        tracing::info!(%addr, "metrics exporter listening");
        axum::serve(listener, self.router())
            .await
            .context("metrics server")
    }
}

fn describe() {
    describe_counter!("watch_cycles_total", "Completed scheduler cycles.");
    describe_counter!("watch_fetch_errors_total", "Source fetches that failed.");
    describe_counter!(
        "watch_empty_extractions_total",
        "Fetches whose selector matched nothing."
    );
    describe_counter!("watch_changes_total", "Cycles that found new listings.");
    describe_counter!(
        "watch_notify_errors_total",
        "Change notifications that were not delivered."
    );
    describe_counter!(
        "watch_snapshot_errors_total",
        "Snapshot reads or writes that failed."
    );
    describe_counter!(
        "watch_source_panics_total",
        "Source tasks that panicked or were aborted."
    );
    describe_histogram!("watch_cycle_seconds", "Wall time of one full cycle.");
    describe_gauge!("watch_last_cycle_ts", "Unix ts when the last cycle finished.");
}
