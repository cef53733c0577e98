//! scheduler.rs: drives every source on a fixed start-to-start cadence.
//!
//! Loop: WaitingForCycle -> RunningCycle -> Sleeping -> WaitingForCycle.
//! Each source runs on its own task so an error or a panic in one never
//! reaches the others. Sequential mode still awaits them one at a time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use tokio::task::{self, JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::runner::{CycleOutcome, RunError, SourceRunner};
use crate::source::SourceDefinition;

/// Time left until the next cycle start; never negative.
pub fn sleep_after(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Per-cycle tally. `empty` sources are neither `succeeded` nor `failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub changed: usize,
    pub empty: usize,
    /// Ids of sources that errored or panicked, in completion order.
    pub failed_sources: Vec<String>,
    pub elapsed: Duration,
}

impl CycleSummary {
    fn record(&mut self, id: &str, joined: Result<Result<CycleOutcome, RunError>, JoinError>) {
        match joined {
            Ok(Ok(CycleOutcome::ExtractionEmpty)) => self.empty += 1,
            Ok(Ok(outcome)) => {
                self.succeeded += 1;
                if matches!(outcome, CycleOutcome::Changed { .. }) {
                    self.changed += 1;
                }
            }
            Ok(Err(e)) => {
                self.failed += 1;
                self.failed_sources.push(id.to_string());
                warn!(source = %id, error = %e, "source skipped this cycle");
            }
            Err(e) => {
                self.failed += 1;
                self.failed_sources.push(id.to_string());
                counter!("watch_source_panics_total").increment(1);
                error!(source = %id, error = %e, "source task aborted");
            }
        }
    }
}

pub struct Scheduler {
    sources: Vec<SourceDefinition>,
    runner: Arc<SourceRunner>,
    interval: Duration,
    parallel: bool,
}

impl Scheduler {
    pub fn new(sources: Vec<SourceDefinition>, runner: Arc<SourceRunner>, interval: Duration) -> Self {
        Self {
            sources,
            runner,
            interval,
            parallel: false,
        }
    }

    pub fn parallel(mut self, on: bool) -> Self {
        self.parallel = on;
        self
    }

    /// One pass over all sources. Never fails; failures are counted.
    pub async fn run_cycle(&self) -> CycleSummary {
        let t0 = Instant::now();
        let mut summary = CycleSummary::default();

        if self.parallel {
            let mut set = JoinSet::new();
            // a JoinError only carries the task id
            let mut owners: HashMap<task::Id, String> = HashMap::new();
            for source in self.sources.iter().cloned() {
                let runner = Arc::clone(&self.runner);
                let id = source.id.clone();
                let handle = set.spawn(async move { runner.run(&source).await });
                owners.insert(handle.id(), id);
            }
            while let Some(joined) = set.join_next_with_id().await {
                let task = match &joined {
                    Ok((task, _)) => *task,
                    Err(e) => e.id(),
                };
                let id = owners.remove(&task).unwrap_or_default();
                summary.record(&id, joined.map(|(_, res)| res));
            }
        } else {
            for source in &self.sources {
                let runner = Arc::clone(&self.runner);
                let owned = source.clone();
                let joined = tokio::spawn(async move { runner.run(&owned).await }).await;
                summary.record(&source.id, joined);
            }
        }

        summary.elapsed = t0.elapsed();
        counter!("watch_cycles_total").increment(1);
        histogram!("watch_cycle_seconds").record(summary.elapsed.as_secs_f64());
        gauge!("watch_last_cycle_ts").set(chrono::Utc::now().timestamp() as f64);
        summary
    }

    /// Runs until the process is stopped.
    pub async fn run(&self) {
        info!(
            sources = self.sources.len(),
            interval_secs = self.interval.as_secs(),
            parallel = self.parallel,
            "scheduler started"
        );
        loop {
            let summary = self.run_cycle().await;
            let pause = sleep_after(self.interval, summary.elapsed);
            info!(
                ok = summary.succeeded,
                failed = summary.failed,
                failed_sources = ?summary.failed_sources,
                changed = summary.changed,
                empty = summary.empty,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                sleep_secs = pause.as_secs_f64(),
                finished_at = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                "cycle finished"
            );
            tokio::time::sleep(pause).await;
        }
    }
}
