//! Durable per-step answer storage.
//!
//! One session holds the answers of every step. [`MemoryStore`] keeps them in
//! process; [`JsonFileStore`] keeps them in a single JSON file shaped
//! `{ "steps": { "<index>": { key: value } } }`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::values::FieldValueMap;

pub trait StepStore: Send + Sync {
    /// Stored answers of `step`; empty when nothing was saved.
    fn load(&self, step: usize) -> Result<FieldValueMap, StoreError>;

    /// Replace the stored answers of `step`.
    fn save(&self, step: usize, values: &FieldValueMap) -> Result<(), StoreError>;

    /// Drop every step of the session.
    fn clear(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub steps: BTreeMap<usize, FieldValueMap>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    session: Mutex<Session>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the whole session.
    pub fn session(&self) -> Result<Session, StoreError> {
        let guard = self.session.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.clone())
    }
}

impl StepStore for MemoryStore {
    fn load(&self, step: usize) -> Result<FieldValueMap, StoreError> {
        let guard = self.session.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.steps.get(&step).cloned().unwrap_or_default())
    }

    fn save(&self, step: usize, values: &FieldValueMap) -> Result<(), StoreError> {
        let mut guard = self.session.lock().map_err(|_| StoreError::Poisoned)?;
        guard.steps.insert(step, values.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.session.lock().map_err(|_| StoreError::Poisoned)?;
        guard.steps.clear();
        Ok(())
    }
}

/// Session file on disk. Every save rewrites the whole file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_session(&self) -> Result<Session, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Session::default()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(Session::default());
        }
        serde_json::from_str(&raw).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })
    }

    fn write_session(&self, session: &Session) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let raw = serde_json::to_string_pretty(session).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, raw).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl StepStore for JsonFileStore {
    fn load(&self, step: usize) -> Result<FieldValueMap, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let session = self.read_session()?;
        Ok(session.steps.get(&step).cloned().unwrap_or_default())
    }

    fn save(&self, step: usize, values: &FieldValueMap) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        // Other steps live in the same file; never write over one we cannot read.
        let mut session = self.read_session().inspect_err(|e| {
            warn!(path = %self.path.display(), error = %e, "session file unreadable; not saving");
        })?;
        session.steps.insert(step, values.clone());
        self.write_session(&session)?;
        debug!(step, keys = values.len(), path = %self.path.display(), "step saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
