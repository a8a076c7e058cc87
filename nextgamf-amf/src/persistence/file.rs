//! File-backed state store
//!
//! One JSON file per key in a directory. `:` in keys becomes `_` in file
//! names. Writes go to a temporary file first and are renamed into place, so
//! a crash mid-write leaves the previous record intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{PersistenceError, StateStore};

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    /// Opens (creating if needed) the store directory.
    pub fn open(directory: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory)?;
        debug!(directory = %directory.display(), "File state store opened");
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{EXTENSION}", key.replace(':', "_")))
    }

    fn key_for(file_name: &str) -> Option<String> {
        let stem = file_name.strip_suffix(&format!(".{EXTENSION}"))?;
        // Only the first separator is a namespace colon
        Some(stem.replacen('_', ":", 1))
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), PersistenceError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, PersistenceError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PersistenceError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), PersistenceError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(PersistenceError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, PersistenceError> {
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if let Some(key) = name.to_str().and_then(Self::key_for) {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
