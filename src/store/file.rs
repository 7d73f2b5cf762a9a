//! File-backed persistence for the store document.
//!
//! One JSON file holds the whole document. Loads fall back to an empty
//! document when the file is absent or unparsable; saves go through a temp
//! file + rename so a crash mid-write never leaves a torn document behind.

use crate::store::document::StoreDocument;
use crate::KeygateError;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

/// File-backed store document persistence.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a file store at the given path, ensuring the parent directory
    /// exists.
    pub fn new(path: PathBuf) -> Result<Self, KeygateError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| KeygateError::StoreIo(format!("Failed to create store dir: {}", e)))?;
        }
        Ok(Self { path })
    }

    /// Load the store document.
    ///
    /// A missing file is a fresh deployment; an unparsable file is logged and
    /// treated the same way rather than taking the whole service down.
    pub fn load(&self) -> Result<StoreDocument, KeygateError> {
        if !self.path.exists() {
            return Ok(StoreDocument::default());
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|e| KeygateError::StoreIo(format!("Failed to read store file: {}", e)))?;

        match serde_json::from_str(&raw) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "store file unparsable, starting empty");
                Ok(StoreDocument::default())
            }
        }
    }

    /// Persist the store document atomically.
    pub fn save(&self, doc: &StoreDocument) -> Result<(), KeygateError> {
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| KeygateError::StoreIo(format!("Failed to serialize store: {}", e)))?;

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &json)
            .map_err(|e| KeygateError::StoreIo(format!("Failed to write temp file: {}", e)))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| KeygateError::StoreIo(format!("Failed to rename store file: {}", e)))?;

        Ok(())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}
