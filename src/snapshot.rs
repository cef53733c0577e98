//! snapshot.rs: persisted "last seen" state, one plain-text file per source.
//!
//! `single` files hold the raw tag text; `set` files hold one tag per line in
//! insertion order. Writes go through a sibling temp file + rename so a reader
//! sees either the previous file or the new one.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

use crate::source::{SnapshotMode, SourceDefinition};

const PROBE_FILE: &str = ".write-probe";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state directory {path} is not usable: {source}")]
    StateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("reading snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    Single(String),
    Set(Vec<String>),
}

impl Snapshot {
    /// Build a snapshot from extracted tags. Tags are sanitized (no line
    /// breaks, trimmed, non-empty); `Set` keeps the first occurrence of each.
    /// Returns `None` when nothing usable remains.
    pub fn from_tags(mode: SnapshotMode, tags: &[String]) -> Option<Self> {
        let mut clean = tags.iter().filter_map(|t| sanitize_tag(t));
        match mode {
            SnapshotMode::Single => clean.next().map(Snapshot::Single),
            SnapshotMode::Set => {
                let mut seen = HashSet::new();
                let list: Vec<String> = clean.filter(|t| seen.insert(t.clone())).collect();
                (!list.is_empty()).then_some(Snapshot::Set(list))
            }
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            Snapshot::Single(t) => std::slice::from_ref(t),
            Snapshot::Set(v) => v,
        }
    }

    fn encode(&self) -> String {
        self.tags().join("\n")
    }

    fn decode(mode: SnapshotMode, raw: &str) -> Option<Self> {
        match mode {
            SnapshotMode::Single => {
                let t = raw.trim();
                (!t.is_empty()).then(|| Snapshot::Single(t.to_string()))
            }
            SnapshotMode::Set => {
                let lines: Vec<String> = raw.lines().map(str::to_string).collect();
                Snapshot::from_tags(SnapshotMode::Set, &lines)
            }
        }
    }
}

/// Strip line breaks, collapse the resulting whitespace run, trim.
pub fn sanitize_tag(raw: &str) -> Option<String> {
    let joined = raw.replace(['\r', '\n'], " ");
    let t = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    (!t.is_empty()).then_some(t)
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Create the state directory if needed and check we can write into it.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        let state_dir = |source| StoreError::StateDir {
            path: dir.clone(),
            source,
        };
        fs::create_dir_all(&dir).await.map_err(state_dir)?;
        let probe = dir.join(PROBE_FILE);
        fs::write(&probe, b"ok").await.map_err(state_dir)?;
        fs::remove_file(&probe).await.map_err(state_dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, source: &SourceDefinition) -> PathBuf {
        self.dir.join(&source.snapshot_file)
    }

    /// `Ok(None)` means first run: the file is missing or holds no tags.
    pub async fn load(&self, source: &SourceDefinition) -> Result<Option<Snapshot>, StoreError> {
        let path = self.path_for(source);
        match fs::read_to_string(&path).await {
            Ok(raw) => Ok(Snapshot::decode(source.mode, &raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read { path, source }),
        }
    }

    /// Replace the stored snapshot in full.
    pub async fn save(&self, source: &SourceDefinition, snap: &Snapshot) -> Result<(), StoreError> {
        let path = self.path_for(source);
        let tmp = self.dir.join(format!(".{}.tmp", source.snapshot_file));
        let write = |source| StoreError::Write {
            path: path.clone(),
            source,
        };
        fs::write(&tmp, snap.encode()).await.map_err(write)?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(write(e));
        }
        Ok(())
    }
}
