//! Backing API abstraction
//!
//! The controllers only talk to the CMP through [`CmpBackend`]. Adapters
//! normalize endpoint-specific response conventions into the types below, so
//! the orchestration code never sees how a given endpoint spells success.

use crate::error::Result;
use crate::request::{ProvisionRequest, SnapshotRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remote operations needed to manage instances and snapshots
#[async_trait]
pub trait CmpBackend: Send + Sync {
    /// Backend name used in logs
    fn name(&self) -> &str;

    async fn create_instance(&self, request: &ProvisionRequest) -> Result<Instance>;

    async fn clone_instance(&self, source_id: u64, request: &ProvisionRequest)
    -> Result<Envelope>;

    /// Instances whose name matches `name`
    async fn list_instances(&self, name: &str) -> Result<Vec<Instance>>;

    async fn get_instance(&self, id: u64) -> Result<Instance>;

    async fn delete_instance(&self, id: u64) -> Result<Envelope>;

    /// Virtual images whose name matches `name`
    async fn list_virtual_images(&self, name: &str) -> Result<Vec<VirtualImage>>;

    async fn create_snapshot(&self, instance_id: u64, request: &SnapshotRequest)
    -> Result<Envelope>;

    /// Snapshots of an instance, in backend order
    async fn list_snapshots(&self, instance_id: u64) -> Result<Vec<Snapshot>>;
}

/// Instance as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualImage {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    pub date_created: DateTime<Utc>,
}

/// Normalized success/message result of a mutating call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

impl Envelope {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: String::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
