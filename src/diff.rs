//! diff.rs: classifies a fresh extraction against the stored snapshot.
//! Pure: no I/O, no shared state.

use std::collections::HashSet;

use crate::snapshot::Snapshot;
use crate::source::SnapshotMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeDetails {
    /// `single` mode: the tag that replaced the stored one.
    NewTag(String),
    /// `set` mode: tags absent from the stored set, in extraction order.
    NewTags(Vec<String>),
}

impl ChangeDetails {
    pub fn tags(&self) -> &[String] {
        match self {
            ChangeDetails::NewTag(t) => std::slice::from_ref(t),
            ChangeDetails::NewTags(v) => v,
        }
    }

    pub fn count(&self) -> usize {
        self.tags().len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    NoChange,
    /// No prior snapshot; persist but never notify.
    FirstObservation,
    Changed(ChangeDetails),
    /// Selector matched nothing usable; the stored snapshot must stay as is.
    ExtractionEmpty,
}

/// Classification plus the snapshot that should replace the stored one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
    pub event: ChangeEvent,
    /// `None` only for `ExtractionEmpty`.
    pub next: Option<Snapshot>,
}

pub fn diff(mode: SnapshotMode, prior: Option<&Snapshot>, extracted: &[String]) -> Diff {
    let Some(current) = Snapshot::from_tags(mode, extracted) else {
        return Diff {
            event: ChangeEvent::ExtractionEmpty,
            next: None,
        };
    };

    let event = match prior {
        None => ChangeEvent::FirstObservation,
        Some(prior) => compare(prior, &current),
    };

    Diff {
        event,
        next: Some(current),
    }
}

fn compare(prior: &Snapshot, current: &Snapshot) -> ChangeEvent {
    match current {
        Snapshot::Single(now) => {
            let before = prior.tags().first().map(|t| t.trim()).unwrap_or_default();
            if before == now.trim() {
                ChangeEvent::NoChange
            } else {
                ChangeEvent::Changed(ChangeDetails::NewTag(now.clone()))
            }
        }
        Snapshot::Set(now) => {
            let known: HashSet<&str> = prior.tags().iter().map(String::as_str).collect();
            // `current` is already deduplicated in extraction order.
            let fresh: Vec<String> = now
                .iter()
                .filter(|t| !known.contains(t.as_str()))
                .cloned()
                .collect();
            if fresh.is_empty() {
                ChangeEvent::NoChange
            } else {
                ChangeEvent::Changed(ChangeDetails::NewTags(fresh))
            }
        }
    }
}
