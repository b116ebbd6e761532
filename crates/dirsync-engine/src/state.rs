//! Persisted sync state.
//!
//! A single record holding the hash of the last compared snapshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

/// The last compared snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Snapshot hash of the last compared entry set.
    pub hash: String,
    /// Record id, assigned by the store on first write.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// When the hash was written.
    pub updated_at: DateTime<Utc>,
}

impl SyncState {
    /// New state for `hash`, stamped now.
    pub fn new(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            id: None,
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: Option<Uuid>) -> Self {
        self.id = id;
        self
    }
}

/// Storage for the singleton [`SyncState`].
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the stored state, if any.
    async fn get(&self) -> SyncResult<Option<SyncState>>;

    /// Upsert the state and return what was stored.
    ///
    /// The record keeps its id across writes; a state without an id
    /// replaces the singleton.
    async fn set(&self, state: SyncState) -> SyncResult<SyncState>;
}

fn assign_id(mut state: SyncState, existing: Option<&SyncState>) -> SyncState {
    if state.id.is_none() {
        state.id = Some(existing.and_then(|s| s.id).unwrap_or_else(Uuid::new_v4));
    }
    state
}

/// In-process store, used in tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<SyncState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `state`.
    pub fn with_state(state: SyncState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self) -> SyncResult<Option<SyncState>> {
        Ok(self.state.lock().await.clone())
    }

    async fn set(&self, state: SyncState) -> SyncResult<SyncState> {
        let mut guard = self.state.lock().await;
        let stored = assign_id(state, guard.as_ref());
        *guard = Some(stored.clone());
        Ok(stored)
    }
}

/// JSON file store.
///
/// Writes go to a sibling temporary file that is renamed over the target,
/// so a crash never leaves a half-written state behind.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn read(&self) -> SyncResult<Option<SyncState>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SyncError::state_store_with_source(
                    format!("failed to read {}", self.path.display()),
                    e,
                ))
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            SyncError::state_store_with_source(
                format!("failed to parse {}", self.path.display()),
                e,
            )
        })
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self) -> SyncResult<Option<SyncState>> {
        self.read().await
    }

    async fn set(&self, state: SyncState) -> SyncResult<SyncState> {
        let _guard = self.write_lock.lock().await;

        let existing = self.read().await?;
        let stored = assign_id(state, existing.as_ref());

        let json = serde_json::to_vec_pretty(&stored)
            .map_err(|e| SyncError::state_store_with_source("failed to encode state", e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SyncError::state_store_with_source(
                    format!("failed to create {}", parent.display()),
                    e,
                )
            })?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await.map_err(|e| {
            SyncError::state_store_with_source(format!("failed to write {}", temp.display()), e)
        })?;
        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            SyncError::state_store_with_source(
                format!("failed to replace {}", self.path.display()),
                e,
            )
        })?;

        debug!(path = %self.path.display(), "Sync state persisted");
        Ok(stored)
    }
}
