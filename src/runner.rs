//! runner.rs: one source, one cycle: extract → diff → notify → persist.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::diff::{diff, ChangeEvent};
use crate::extract::{Extractor, FetchError};
use crate::notify::{change_message, Notifier};
use crate::snapshot::{SnapshotStore, StoreError};
use crate::source::SourceDefinition;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// First successful cycle; `stored` tags persisted, nothing sent.
    FirstObservation { stored: usize },
    NoChange,
    Changed { new_tags: usize, delivered: bool },
    /// Selector matched nothing; snapshot left as it was.
    ExtractionEmpty,
}

pub struct SourceRunner {
    extractor: Arc<dyn Extractor>,
    notifier: Arc<dyn Notifier>,
    store: SnapshotStore,
}

impl SourceRunner {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        notifier: Arc<dyn Notifier>,
        store: SnapshotStore,
    ) -> Self {
        Self {
            extractor,
            notifier,
            store,
        }
    }

    /// Any `Err` leaves the stored snapshot untouched, except a failed save
    /// after a notification went out (the next cycle re-derives the change).
    pub async fn run(&self, source: &SourceDefinition) -> Result<CycleOutcome, RunError> {
        let extracted = self
            .extractor
            .extract(&source.url, &source.selector, source.strategy)
            .await
            .inspect_err(|_| counter!("watch_fetch_errors_total").increment(1))?;

        let prior = self
            .store
            .load(source)
            .await
            .inspect_err(|_| counter!("watch_snapshot_errors_total").increment(1))?;

        let result = diff(source.mode, prior.as_ref(), &extracted);
        let stored = result.next.as_ref().map_or(0, |s| s.tags().len());

        let outcome = match result.event {
            ChangeEvent::ExtractionEmpty => {
                counter!("watch_empty_extractions_total").increment(1);
                warn!(
                    source = %source.id,
                    tag = %source.selector.tag,
                    class = %source.selector.class,
                    "selector matched nothing; check the selector or the page layout"
                );
                return Ok(CycleOutcome::ExtractionEmpty);
            }
            ChangeEvent::FirstObservation => {
                info!(source = %source.id, stored, "first observation, no notification");
                CycleOutcome::FirstObservation { stored }
            }
            ChangeEvent::NoChange => {
                debug!(source = %source.id, "no change");
                CycleOutcome::NoChange
            }
            ChangeEvent::Changed(details) => {
                counter!("watch_changes_total").increment(1);
                info!(source = %source.id, new = details.count(), "new listings found");
                let message = change_message(source, &details);
                let delivered = match self.notifier.send(&message).await {
                    Ok(()) => true,
                    Err(e) => {
                        counter!("watch_notify_errors_total").increment(1);
                        warn!(source = %source.id, error = %e, "notification not delivered");
                        false
                    }
                };
                CycleOutcome::Changed {
                    new_tags: details.count(),
                    delivered,
                }
            }
        };

        if let Some(next) = &result.next {
            self.store
                .save(source, next)
                .await
                .inspect_err(|_| counter!("watch_snapshot_errors_total").increment(1))?;
        }
        Ok(outcome)
    }
}
