//! Filesystem vault - documents on disk, JSON records, JSONL error log.
//!
//! Layout under the vault root:
//! - note files anywhere below the root (extension-filtered by the host)
//! - `.distill/records/<path-hash>.json` - one record per note
//! - `.distill/errors.jsonl` - append-only failure log, durable across
//!   restarts

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::{IndexError, Result};
use crate::traits::store::{DocumentStore, ErrorSink, RecordStore};
use crate::types::record::{ExtractionFailure, ExtractionRecord};

/// Directory under the vault root holding engine state.
const STATE_DIR: &str = ".distill";

/// Vault stored on the local filesystem.
pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    /// Open a vault rooted at the given directory, creating the state
    /// directories if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let vault = Self { root };
        tokio::fs::create_dir_all(vault.records_dir())
            .await
            .map_err(IndexError::storage)?;
        Ok(vault)
    }

    fn records_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR).join("records")
    }

    fn errors_path(&self) -> PathBuf {
        self.root.join(STATE_DIR).join("errors.jsonl")
    }

    /// Record file for a note path. Keyed by path hash so arbitrary note
    /// paths (slashes, unicode) map to safe filenames.
    fn record_path(&self, note_path: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(note_path.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        self.records_dir().join(format!("{digest}.json"))
    }

    fn absolute(&self, note_path: &str) -> PathBuf {
        self.root.join(note_path)
    }

    fn relative(&self, absolute: &Path) -> Option<String> {
        absolute
            .strip_prefix(&self.root)
            .ok()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
    }
}

#[async_trait]
impl DocumentStore for FsVault {
    async fn read(&self, path: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.absolute(path)).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(IndexError::storage(err)),
        }
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        let absolute = self.absolute(path);
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(IndexError::storage)?;
        }
        tokio::fs::write(absolute, content)
            .await
            .map_err(IndexError::storage)
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let start = if dir.is_empty() {
            self.root.clone()
        } else {
            self.root.join(dir)
        };

        let mut paths = Vec::new();
        let mut stack = vec![start];

        while let Some(current) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(IndexError::storage(err)),
            };

            while let Some(entry) = entries.next_entry().await.map_err(IndexError::storage)? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(IndexError::storage)?;

                if file_type.is_dir() {
                    // Engine state is not part of the corpus.
                    if path.file_name().and_then(|n| n.to_str()) == Some(STATE_DIR) {
                        continue;
                    }
                    stack.push(path);
                } else if let Some(relative) = self.relative(&path) {
                    paths.push(relative);
                }
            }
        }

        paths.sort();
        Ok(paths)
    }
}

#[async_trait]
impl RecordStore for FsVault {
    async fn read_record(&self, path: &str) -> Result<Option<ExtractionRecord>> {
        match tokio::fs::read_to_string(self.record_path(path)).await {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(IndexError::storage(err)),
        }
    }

    async fn write_record(&self, record: &ExtractionRecord) -> Result<()> {
        record.validate()?;
        let json = serde_json::to_string_pretty(record)?;
        tokio::fs::write(self.record_path(&record.path), json)
            .await
            .map_err(IndexError::storage)
    }
}

#[async_trait]
impl ErrorSink for FsVault {
    async fn append(&self, failure: &ExtractionFailure) -> Result<()> {
        let mut line = serde_json::to_string(failure)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.errors_path())
            .await
            .map_err(IndexError::storage)?;
        file.write_all(line.as_bytes())
            .await
            .map_err(IndexError::storage)?;
        file.flush().await.map_err(IndexError::storage)
    }
}
