//! Key store: document model, file persistence, and the single-writer
//! discipline that keeps them consistent under concurrent callers.

pub mod document;
pub mod file;

use crate::KeygateError;
use self::document::StoreDocument;
use self::file::FileStore;
use std::path::PathBuf;
use std::sync::Mutex;

/// Process-wide key store.
///
/// The underlying file is not safe for uncoordinated writers, so every
/// mutation runs as a read-modify-persist critical section behind one mutex.
/// Mutations are applied to a working copy and only swapped into memory after
/// the save succeeds, so a persistence failure commits nothing anywhere.
///
/// Remote provider calls must never run inside [`KeyStore::mutate`]; callers
/// resolve the remote outcome first and take the lock only to commit it.
pub struct KeyStore {
    backend: FileStore,
    state: Mutex<StoreDocument>,
}

impl KeyStore {
    /// Open the store at the given path, loading any existing document.
    pub fn open(path: PathBuf) -> Result<Self, KeygateError> {
        let backend = FileStore::new(path)?;
        let state = Mutex::new(backend.load()?);
        Ok(Self { backend, state })
    }

    /// Read-only snapshot of the whole document.
    pub fn snapshot(&self) -> StoreDocument {
        self.state.lock().expect("store lock poisoned").clone()
    }

    /// Apply a mutation and persist it, as one critical section.
    ///
    /// `f` runs against a working copy; if the save fails the in-memory
    /// document is left exactly as it was.
    pub fn mutate<T>(
        &self,
        f: impl FnOnce(&mut StoreDocument) -> T,
    ) -> Result<T, KeygateError> {
        let mut guard = self.state.lock().expect("store lock poisoned");
        let mut next = guard.clone();
        let out = f(&mut next);
        self.backend.save(&next)?;
        *guard = next;
        Ok(out)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &PathBuf {
        self.backend.path()
    }
}
