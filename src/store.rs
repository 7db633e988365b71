/*!
 * Persistent storage for translated tracks.
 *
 * Entries are keyed by `{media_key}_{lang}` and hold serialized SRT text.
 * The file store writes through a temporary file and a rename so a reader
 * never observes a half-written track.
 */

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;

use crate::errors::StoreError;

/// Extension of stored tracks
const TRACK_EXTENSION: &str = "srt";

/// Entry name for a media key and a language
pub fn entry_key(media_key: &str, lang: &str) -> String {
    format!("{}_{}", media_key, lang)
}

/// Storage seam used by the job manager and the controller
#[async_trait]
pub trait TrackStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn read(&self, key: &str) -> Result<String, StoreError>;

    /// Replace the entry with `content`
    async fn write(&self, key: &str, content: &str) -> Result<(), StoreError>;

    /// Remove the entry; missing entries are not an error
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// All entry keys, sorted
    async fn list(&self) -> Result<Vec<String>, StoreError>;
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

// @struct: Directory of `{key}.srt` files
#[derive(Debug, Clone)]
pub struct FileTrackStore {
    root: PathBuf,
}

impl FileTrackStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", key, TRACK_EXTENSION))
    }

    fn io_error(key: &str, source: std::io::Error) -> StoreError {
        StoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl TrackStore for FileTrackStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        tokio::fs::try_exists(self.path_for(key))
            .await
            .map_err(|e| Self::io_error(key, e))
    }

    async fn read(&self, key: &str) -> Result<String, StoreError> {
        validate_key(key)?;
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    async fn write(&self, key: &str, content: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Self::io_error(key, e))?;

        let target = self.path_for(key);
        let temp = self.root.join(format!(".{}.{}.tmp", key, TRACK_EXTENSION));

        tokio::fs::write(&temp, content)
            .await
            .map_err(|e| Self::io_error(key, e))?;
        tokio::fs::rename(&temp, &target)
            .await
            .map_err(|e| Self::io_error(key, e))?;

        debug!("Stored {} bytes at {:?}", content.len(), target);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(key, e)),
        }
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_error("*", e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::io_error("*", e))? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == TRACK_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if !stem.starts_with('.') {
                        keys.push(stem.to_string());
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// In-memory store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryTrackStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTrackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrackStore for MemoryTrackStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().contains_key(key))
    }

    async fn read(&self, key: &str) -> Result<String, StoreError> {
        self.entries
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn write(&self, key: &str, content: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        self.entries.lock().insert(key.to_string(), content.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
