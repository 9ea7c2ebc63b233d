//! Snapshot lifecycle orchestration

use crate::backend::CmpBackend;
use crate::error::{CloudError, Result};
use crate::model::SnapshotSpec;
use crate::request::SnapshotRequest;
use crate::retry::{RetryPolicy, retry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct SnapshotController {
    backend: Arc<dyn CmpBackend>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl SnapshotController {
    pub fn new(backend: Arc<dyn CmpBackend>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Request a snapshot of the parent instance
    pub async fn create(&self, spec: &mut SnapshotSpec) -> Result<()> {
        tracing::debug!("Creating snapshot {} of instance {}", spec.name, spec.instance_id);

        // Pre check
        spec.validate()?;

        let request = SnapshotRequest::new(&spec.name, &spec.description);
        let instance_id = spec.instance_id;
        let backend = self.backend.as_ref();
        let body = &request;
        let envelope = retry(&self.policy, &self.cancel, move || {
            backend.create_snapshot(instance_id, body)
        })
        .await?;

        if !envelope.success {
            // This endpoint reports no message, only the flag
            return Err(CloudError::ApiFailure(envelope.success.to_string()));
        }
        tracing::info!("Snapshot {} requested for instance {}", spec.name, instance_id);

        // Post check
        spec.check_state()
    }

    /// Record id, status and creation time of the instance's snapshot
    ///
    /// The first snapshot listed for the parent instance is taken as-is; it
    /// is not matched against `spec.name`.
    pub async fn read(&self, spec: &mut SnapshotSpec) -> Result<()> {
        spec.validate()?;

        let instance_id = spec.instance_id;
        let backend = self.backend.as_ref();
        let snapshots = retry(&self.policy, &self.cancel, move || {
            backend.list_snapshots(instance_id)
        })
        .await?;

        let first = snapshots.into_iter().next().ok_or_else(|| {
            CloudError::NotFound(format!("no snapshots for instance {}", instance_id))
        })?;

        if first.name != spec.name && !first.name.is_empty() {
            tracing::warn!(
                "Snapshot {} of instance {} is named {}, expected {}",
                first.id,
                instance_id,
                first.name,
                spec.name
            );
        }

        spec.id = Some(first.id);
        spec.status = Some(first.status);
        spec.timestamp = Some(first.date_created);

        spec.check_state()
    }

    pub async fn update(&self, spec: &mut SnapshotSpec) -> Result<()> {
        spec.validate()?;
        Err(CloudError::Unsupported("snapshot update".to_string()))
    }

    pub async fn delete(&self, spec: &mut SnapshotSpec) -> Result<()> {
        spec.validate()?;
        Err(CloudError::Unsupported("snapshot delete".to_string()))
    }
}
