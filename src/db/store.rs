//! Flat-file JSON document store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::models::*;

/// Document store error types.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("malformed status document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Thread-safe store for the single status document.
///
/// Saves go through a sibling temporary file and a rename, so a reader sees
/// either the previous document or the new one, never a mix.
#[derive(Clone)]
pub struct Store {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl Store {
    /// Create a store backed by the given file path. The file need not exist.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document, distinguishing "never written" from "unreadable".
    pub fn read(&self) -> Result<Option<StatusDocument>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let doc = serde_json::from_slice(&bytes)?;
        Ok(Some(doc))
    }

    /// Load the last document, or an empty one.
    ///
    /// A missing file is the normal first-run case. An unreadable or corrupt
    /// file is logged and treated the same way.
    pub fn load(&self) -> StatusDocument {
        match self.read() {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                tracing::info!("No status document at {}, starting empty", self.path.display());
                StatusDocument::default()
            }
            Err(e) => {
                tracing::warn!("Ignoring unreadable status document: {}", e);
                StatusDocument::default()
            }
        }
    }

    /// Replace the document on disk.
    pub fn save(&self, doc: &StatusDocument) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(doc)?;

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
            }
        }

        let temp_path = self.temp_path();
        fs::write(&temp_path, &data).map_err(|e| StoreError::Write {
            path: temp_path.clone(),
            source: e,
        })?;

        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(self.write_error(e));
        }

        tracing::debug!("Saved status document ({} bytes) to {}", data.len(), self.path.display());
        Ok(())
    }

    /// Size of the document on disk, if it exists.
    pub fn size_bytes(&self) -> Option<u64> {
        fs::metadata(&self.path).ok().map(|m| m.len())
    }

    /// Sibling file for the next save. Unique per process and per save, so
    /// a `check` run and a server writing the same document never share it.
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "status-data.json".into());
        name.push(format!(".{}.{:08x}.tmp", std::process::id(), rand::random::<u32>()));
        self.path.with_file_name(name)
    }

    fn write_error(&self, source: io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source,
        }
    }
}
