//! Corpus metadata accumulator.
//!
//! The validation pass produces one [`DocumentRecord`] per chapter. Records
//! are collected in a sidecar file (a JSON array) so that separate
//! per-chapter invocations (`chapterwiki validate`) cooperate on one corpus
//! and so the home page can be rendered from the final, ordered list.
//!
//! ## Ordering
//!
//! The sidecar preserves append order, and the orchestrator appends in
//! manifest order, so the sidecar order is the manifest order. Records are
//! never re-sorted. Appending a record whose `source_id` is already present
//! replaces the old record in place: re-validating one chapter updates its
//! entry without moving it.
//!
//! ## Lifecycle
//!
//! A full build calls [`MetadataStore::reset`] so the run owns the sidecar
//! from scratch. Per-chapter invocations call [`MetadataStore::open`] and
//! append to what earlier invocations left. The file is rewritten atomically
//! after every append.

use crate::persist::write_atomic;
use crate::types::DocumentRecord;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default sidecar name, placed next to the manifest.
pub const METADATA_FILENAME: &str = ".wiki-metadata.json";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metadata sidecar {path} is not a valid record list: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Ordered, persisted list of [`DocumentRecord`]s.
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    records: Vec<DocumentRecord>,
}

impl MetadataStore {
    /// Open the sidecar at `path`, keeping whatever it already holds.
    /// A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, MetadataError> {
        let records = match fs::read_to_string(path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| MetadataError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    /// Start an empty store at `path` and write it out, discarding any
    /// previous content.
    pub fn reset(path: &Path) -> Result<Self, MetadataError> {
        let store = Self {
            path: path.to_path_buf(),
            records: Vec::new(),
        };
        store.save()?;
        Ok(store)
    }

    /// Add a finished record and persist the store.
    pub fn append(&mut self, record: DocumentRecord) -> Result<(), MetadataError> {
        match self
            .records
            .iter_mut()
            .find(|r| r.source_id == record.source_id)
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
        self.save()
    }

    pub fn save(&self) -> Result<(), MetadataError> {
        let json = serde_json::to_string_pretty(&self.records)?;
        write_atomic(&self.path, json.as_bytes())?;
        Ok(())
    }

    pub fn records(&self) -> &[DocumentRecord] {
        &self.records
    }

    pub fn get(&self, source_id: &str) -> Option<&DocumentRecord> {
        self.records.iter().find(|r| r.source_id == source_id)
    }

    pub fn into_records(self) -> Vec<DocumentRecord> {
        self.records
    }
}
