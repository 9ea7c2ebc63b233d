//! VMaaS provisioning core
//!
//! This crate turns declarative instance and snapshot specs into calls
//! against a cloud-management platform (CMP), masking transient failures
//! with bounded retries and waiting out backend-side asynchronous work.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                    vmaas CLI                     │
//! │        (instance / snapshot <op> spec.yaml)      │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                  vmaas-cloud                     │
//! │  ┌────────────────────┐  ┌───────────────────┐  │
//! │  │ InstanceController │  │ SnapshotController│  │
//! │  └─────────┬──────────┘  └─────────┬─────────┘  │
//! │  ┌─────────▼───────┐  ┌────────────▼──────────┐ │
//! │  │ request builder │  │ retry (RetryPolicy)   │ │
//! │  └─────────────────┘  └────────────┬──────────┘ │
//! │            trait CmpBackend { ... } │            │
//! └─────────────────────────────────────┼───────────┘
//!                                       │
//!                            ┌──────────▼──────────┐
//!                            │   vmaas-cloud-cmp   │
//!                            │   (HTTP adapter)    │
//!                            └─────────────────────┘
//! ```

pub mod backend;
pub mod error;
pub mod instance;
pub mod model;
pub mod request;
pub mod retry;
pub mod snapshot;
pub mod state;

// Re-exports
pub use backend::{CmpBackend, Envelope, Instance, Snapshot, VirtualImage};
pub use error::{CloudError, Result};
pub use instance::InstanceController;
pub use model::{
    CloneSpec, ConfigSpec, InstanceSpec, NetworkSpec, PowerScheduleSpec, SnapshotSpec,
    VMWARE_INSTANCE_CODE, VolumeSpec,
};
pub use request::{ProvisionRequest, SnapshotRequest};
pub use retry::{RetryPolicies, RetryPolicy, retry};
pub use snapshot::SnapshotController;
pub use state::{ResourceKind, ResourceState, StateFile, StateLock, StateManager};
pub use tokio_util::sync::CancellationToken;
