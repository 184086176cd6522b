//! Per-user key/value storage for editor state.
//!
//! DESIGN
//! ======
//! The editor keeps the current image and the optional custom API key the
//! way a browser keeps them in local storage: a small string map per user.
//! `FileStore` writes one JSON document per user (named by a SHA-256 of the
//! user id, so ids never touch the filesystem namespace) with a temp-file +
//! rename so a crash never leaves a torn document. `MemoryStore` backs tests
//! and deployments without a storage directory.
//!
//! Values over the configured size limit are refused with `QuotaExceeded`,
//! matching the browser behaviour that large images may not fit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};

pub const CURRENT_IMAGE_KEY: &str = "uploadedImageURI_v2";
pub const CUSTOM_API_KEY_KEY: &str = "geminiApiKey";

/// Room for a maximum-size image as a base64 data URI, plus its header.
pub const DEFAULT_MAX_VALUE_BYTES: usize = crate::image::MAX_IMAGE_BYTES.div_ceil(3) * 4 + 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Could not save to local storage. It might be too large ({size} bytes, limit {limit}).")]
    QuotaExceeded { key: String, size: usize, limit: usize },
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored document is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl crate::error::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::QuotaExceeded { .. } => "E_STORAGE_QUOTA",
            Self::Io(_) => "E_STORAGE_IO",
            Self::Corrupt(_) => "E_STORAGE_CORRUPT",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Async key/value storage scoped by user. Enables mocking in tests.
#[async_trait::async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, user_id: &str, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, user_id: &str, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, user_id: &str, key: &str) -> Result<(), StoreError>;
}

fn check_size(key: &str, value: &str, limit: usize) -> Result<(), StoreError> {
    if value.len() > limit {
        return Err(StoreError::QuotaExceeded { key: key.to_owned(), size: value.len(), limit });
    }
    Ok(())
}

// =============================================================================
// MEMORY STORE
// =============================================================================

pub struct MemoryStore {
    entries: RwLock<HashMap<(String, String), String>>,
    max_value_bytes: usize,
}

impl MemoryStore {
    #[must_use]
    pub fn new(max_value_bytes: usize) -> Self {
        Self { entries: RwLock::new(HashMap::new()), max_value_bytes }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VALUE_BYTES)
    }
}

#[async_trait::async_trait]
impl LocalStore for MemoryStore {
    async fn get(&self, user_id: &str, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(user_id.to_owned(), key.to_owned())).cloned())
    }

    async fn set(&self, user_id: &str, key: &str, value: &str) -> Result<(), StoreError> {
        check_size(key, value, self.max_value_bytes)?;
        let mut entries = self.entries.write().await;
        entries.insert((user_id.to_owned(), key.to_owned()), value.to_owned());
        Ok(())
    }

    async fn remove(&self, user_id: &str, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(&(user_id.to_owned(), key.to_owned()));
        Ok(())
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

pub struct FileStore {
    dir: PathBuf,
    max_value_bytes: usize,
    /// Serializes read-modify-write cycles on user documents.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>, max_value_bytes: usize) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir, max_value_bytes, write_lock: Mutex::new(()) })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, user_id: &str) -> PathBuf {
        let digest = Sha256::digest(user_id.as_bytes());
        self.dir
            .join(format!("{}.json", crate::services::bytes_to_hex(&digest)))
    }

    async fn read_document(&self, user_id: &str) -> Result<HashMap<String, String>, StoreError> {
        match tokio::fs::read(self.document_path(user_id)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, user_id: &str, doc: &HashMap<String, String>) -> Result<(), StoreError> {
        let path = self.document_path(user_id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(doc)?;
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl LocalStore for FileStore {
    async fn get(&self, user_id: &str, key: &str) -> Result<Option<String>, StoreError> {
        let mut doc = self.read_document(user_id).await?;
        Ok(doc.remove(key))
    }

    async fn set(&self, user_id: &str, key: &str, value: &str) -> Result<(), StoreError> {
        check_size(key, value, self.max_value_bytes)?;
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document(user_id).await?;
        doc.insert(key.to_owned(), value.to_owned());
        self.write_document(user_id, &doc).await
    }

    async fn remove(&self, user_id: &str, key: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document(user_id).await?;
        if doc.remove(key).is_some() {
            self.write_document(user_id, &doc).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
