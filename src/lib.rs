// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod diff;
pub mod extract;
pub mod metrics;
pub mod notify;
pub mod runner;
pub mod scheduler;
pub mod snapshot;
pub mod source;

// ---- Re-exports for stable public API ----
pub use crate::diff::{diff, ChangeDetails, ChangeEvent, Diff};
pub use crate::extract::{Extractor, FetchError, PageExtractor};
pub use crate::notify::{Notifier, NotifierMux, TransportError};
pub use crate::runner::{CycleOutcome, RunError, SourceRunner};
pub use crate::scheduler::{sleep_after, CycleSummary, Scheduler};
pub use crate::snapshot::{Snapshot, SnapshotStore, StoreError};
pub use crate::source::{FetchStrategy, SelectorRule, SnapshotMode, SourceDefinition};
