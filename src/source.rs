//! source.rs: immutable description of one watched page.

use serde::{Deserialize, Serialize};

/// How a source's document is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Non-rendering HTTP GET.
    #[default]
    Plain,
    /// Headless browser render, then read the DOM.
    Rendered,
}

/// Shape of the persisted "last seen" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotMode {
    /// Only the latest tag is remembered.
    Single,
    /// Every currently listed tag is remembered.
    #[default]
    Set,
}

/// Tag name + class token that identifies one listing on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorRule {
    pub tag: String,
    pub class: String,
}

impl SelectorRule {
    pub fn new(tag: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            class: class.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDefinition {
    pub id: String,
    pub url: String,
    pub selector: SelectorRule,
    pub strategy: FetchStrategy,
    pub mode: SnapshotMode,
    /// File name inside the state directory; unique per source.
    pub snapshot_file: String,
}
