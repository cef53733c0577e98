// tests/metrics.rs
//
// One recorder per process, so this file holds a single test.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use listing_watch::metrics::Metrics;
use listing_watch::{
    Extractor, FetchError, FetchStrategy, Notifier, Scheduler, SelectorRule, SnapshotMode,
    SnapshotStore, SourceDefinition, SourceRunner, TransportError,
};

struct Down;

#[async_trait]
impl Extractor for Down {
    async fn extract(
        &self,
        url: &str,
        _selector: &SelectorRule,
        _strategy: FetchStrategy,
    ) -> Result<Vec<String>, FetchError> {
        Err(FetchError::RenderTimeout {
            url: url.to_string(),
            secs: 20,
        })
    }
}

struct Silent;

#[async_trait]
impl Notifier for Silent {
    async fn send(&self, _message: &str) -> Result<(), TransportError> {
        Ok(())
    }
    fn name(&self) -> &'static str {
        "silent"
    }
}

#[tokio::test]
async fn cycle_and_fetch_error_series_are_exposed() {
    let metrics = Metrics::install().expect("recorder");

    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::open(dir.path()).await.unwrap();
    let runner = Arc::new(SourceRunner::new(Arc::new(Down), Arc::new(Silent), store));
    let source = SourceDefinition {
        id: "down".into(),
        url: "https://down.example.org/".into(),
        selector: SelectorRule::new("li", "x"),
        strategy: FetchStrategy::Plain,
        mode: SnapshotMode::Set,
        snapshot_file: "down.txt".into(),
    };
    let sched = Scheduler::new(vec![source], runner, Duration::from_secs(900));
    let summary = sched.run_cycle().await;
    assert_eq!(summary.failed, 1);

    let out = metrics.handle.render();
    assert!(out.contains("watch_cycles_total"), "{out}");
    assert!(out.contains("watch_fetch_errors_total"), "{out}");
    assert!(out.contains("watch_last_cycle_ts"), "{out}");
}
