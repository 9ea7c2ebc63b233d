//! Local record of provisioned resources
//!
//! Manages the `.vmaas/state.json` file which remembers the identifiers and
//! statuses the controllers wrote back, so that later read/delete runs can
//! find the remote resource again.

use crate::error::{CloudError, Result};
use crate::model::{InstanceSpec, SnapshotSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".vmaas";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";

/// All recorded resources of a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Resources indexed by kind:name
    pub resources: HashMap<String, ResourceState>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: HashMap::new(),
        }
    }
}

impl StateFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(kind: ResourceKind, name: &str) -> String {
        format!("{}:{}", kind, name)
    }

    pub fn get(&self, kind: ResourceKind, name: &str) -> Option<&ResourceState> {
        self.resources.get(&Self::key(kind, name))
    }

    /// Add or update a resource
    pub fn set(&mut self, kind: ResourceKind, name: &str, state: ResourceState) {
        self.resources.insert(Self::key(kind, name), state);
        self.updated_at = Utc::now();
    }

    pub fn remove(&mut self, kind: ResourceKind, name: &str) -> Option<ResourceState> {
        let result = self.resources.remove(&Self::key(kind, name));
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    /// Fill the computed fields of `spec` from the recorded state
    pub fn seed_instance(&self, spec: &mut InstanceSpec) {
        if spec.id.is_some() {
            return;
        }
        if let Some(recorded) = self.get(ResourceKind::Instance, &spec.name) {
            spec.id = Some(recorded.id);
            spec.status = recorded.status.clone();
        }
    }

    /// Record the computed fields of `spec`, forgetting it once its id is cleared
    pub fn record_instance(&mut self, spec: &InstanceSpec) {
        let Some(id) = spec.id else {
            self.remove(ResourceKind::Instance, &spec.name);
            return;
        };

        let mut state = self
            .get(ResourceKind::Instance, &spec.name)
            .filter(|existing| existing.id == id)
            .cloned()
            .unwrap_or_else(|| ResourceState::new(id, ResourceKind::Instance));
        state.set_status(spec.status.clone());
        if let Some(clone) = &spec.clone {
            state.set_attribute(
                "source_instance_id",
                serde_json::json!(clone.source_instance_id),
            );
        }
        self.set(ResourceKind::Instance, &spec.name, state);
    }

    pub fn seed_snapshot(&self, spec: &mut SnapshotSpec) {
        if spec.id.is_some() {
            return;
        }
        if let Some(recorded) = self.get(ResourceKind::Snapshot, &snapshot_name(spec)) {
            spec.id = Some(recorded.id);
            spec.status = recorded.status.clone();
            spec.timestamp = recorded.get_attribute("timestamp");
        }
    }

    pub fn record_snapshot(&mut self, spec: &SnapshotSpec) {
        let Some(id) = spec.id else {
            return;
        };

        let mut state = ResourceState::new(id, ResourceKind::Snapshot);
        state.set_status(spec.status.clone());
        state.set_attribute("instance_id", serde_json::json!(spec.instance_id));
        if let Some(timestamp) = spec.timestamp {
            state.set_attribute("timestamp", serde_json::json!(timestamp));
        }
        self.set(ResourceKind::Snapshot, &snapshot_name(spec), state);
    }
}

/// Snapshot names are only unique per parent instance
fn snapshot_name(spec: &SnapshotSpec) -> String {
    format!("{}/{}", spec.instance_id, spec.name)
}

/// Kind of recorded resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Instance,
    Snapshot,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Instance => write!(f, "instance"),
            ResourceKind::Snapshot => write!(f, "snapshot"),
        }
    }
}

/// State of a single resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Backend-assigned id
    pub id: u64,

    pub kind: ResourceKind,

    /// Last status reported by the backend
    pub status: Option<String>,

    /// Extra attributes (source instance, parent instance, timestamps)
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the resource was first recorded
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ResourceState {
    pub fn new(id: u64, kind: ResourceKind) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            status: None,
            attributes: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: Option<String>) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    pub fn get_attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// State manager for reading/writing state files
pub struct StateManager {
    /// Project root directory
    project_root: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    fn state_dir(&self) -> PathBuf {
        self.project_root.join(STATE_DIR)
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir().join(STATE_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.state_dir().join(STATE_BACKUP)
    }

    fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE)
    }

    async fn ensure_state_dir(&self) -> Result<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created state directory: {}", dir.display());
        }
        Ok(())
    }

    /// Load the current state
    pub async fn load(&self) -> Result<StateFile> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(StateFile::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: StateFile = serde_json::from_str(&content)?;

        if state.version > STATE_VERSION {
            return Err(CloudError::StateError(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} resources", state.resources.len());
        Ok(state)
    }

    /// Save the state, keeping the previous file as a backup
    pub async fn save(&self, state: &StateFile) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup");
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved state with {} resources", state.resources.len());
        Ok(())
    }

    /// Acquire a lock for exclusive access
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            // Locks older than an hour are stale
            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < 1 {
                return Err(CloudError::LockError(format!(
                    "State is locked by {} since {}",
                    lock_info.holder, lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
