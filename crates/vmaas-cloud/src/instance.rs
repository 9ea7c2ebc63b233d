//! Instance lifecycle orchestration
//!
//! [`InstanceController`] turns an [`InstanceSpec`] into remote calls. Create
//! either provisions directly or clones an existing instance and then polls
//! until the clone is listable. Every remote call runs through [`retry`].

use crate::backend::{CmpBackend, Instance};
use crate::error::{CloudError, Result};
use crate::model::{InstanceSpec, VMWARE_INSTANCE_CODE};
use crate::request::{self, ProvisionRequest};
use crate::retry::{RetryPolicies, retry};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct InstanceController {
    backend: Arc<dyn CmpBackend>,
    policies: RetryPolicies,
    cancel: CancellationToken,
}

impl InstanceController {
    pub fn new(backend: Arc<dyn CmpBackend>, policies: RetryPolicies) -> Self {
        Self {
            backend,
            policies,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight retries and polls when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Provision the instance described by `spec` and record its id
    pub async fn create(&self, spec: &mut InstanceSpec) -> Result<u64> {
        tracing::debug!("Creating instance {} via {}", spec.name, self.backend.name());

        if let Some(id) = spec.id {
            return Err(CloudError::Validation(format!(
                "instance already created with id {}",
                id
            )));
        }

        let mut request = request::provision_request(spec);
        let template = spec.config.template_name().map(str::to_string);

        if spec.instance_code == VMWARE_INSTANCE_CODE && template.is_none() {
            return Err(CloudError::Validation(
                "template should be provided if instance type is vmware".to_string(),
            ));
        }

        // Pre check
        spec.validate()?;

        if let Some(name) = template {
            request.config.template = self.resolve_template(&name).await?;
        }

        let instance = match &spec.clone {
            Some(clone) => self.clone_instance(clone.source_instance_id, request).await?,
            None => self.create_instance(&request).await?,
        };

        tracing::info!("Instance {} provisioned with id {}", spec.name, instance.id);
        spec.id = Some(instance.id);
        if !instance.status.is_empty() {
            spec.status = Some(instance.status);
        }

        // Post check
        spec.check_state()?;
        Ok(instance.id)
    }

    /// Refresh id and status of an existing instance
    pub async fn read(&self, spec: &mut InstanceSpec) -> Result<()> {
        let id = spec.require_id()?;
        tracing::debug!("Reading instance {}", id);

        let backend = self.backend.as_ref();
        let instance = retry(&self.policies.default, &self.cancel, move || {
            backend.get_instance(id)
        })
        .await?;

        spec.id = Some(instance.id);
        spec.status = Some(instance.status);

        spec.check_state()
    }

    /// Delete the instance and clear its id
    ///
    /// A refusal from the backend leaves `spec.id` untouched.
    pub async fn delete(&self, spec: &mut InstanceSpec) -> Result<()> {
        let id = spec.require_id()?;
        tracing::debug!("Deleting instance {}", id);

        let backend = self.backend.as_ref();
        let envelope = retry(&self.policies.default, &self.cancel, move || {
            backend.delete_instance(id)
        })
        .await?;

        if !envelope.success {
            return Err(CloudError::ApiFailure(envelope.message));
        }

        tracing::info!("Instance {} deleted", id);
        spec.id = None;
        spec.status = None;

        spec.check_state()
    }

    /// In-place changes (power state, networks, volumes, labels, tags, group)
    /// are not supported; recreate the instance instead.
    pub async fn update(&self, spec: &mut InstanceSpec) -> Result<()> {
        spec.validate()?;
        let id = spec.require_id()?;
        tracing::debug!("Update requested for instance {}", id);

        Err(CloudError::Unsupported(format!("in-place update of instance {}", id)))
    }

    /// Resolve a virtual image name to exactly one image id
    async fn resolve_template(&self, name: &str) -> Result<u64> {
        let backend = self.backend.as_ref();
        let images = retry(&self.policies.default, &self.cancel, move || {
            backend.list_virtual_images(name)
        })
        .await?;

        match images.as_slice() {
            [image] => {
                tracing::debug!("Template {} resolved to image {}", name, image.id);
                Ok(image.id)
            }
            _ => Err(CloudError::AmbiguousMatch {
                what: "templates".to_string(),
                count: images.len(),
            }),
        }
    }

    async fn create_instance(&self, request: &ProvisionRequest) -> Result<Instance> {
        let backend = self.backend.as_ref();
        retry(&self.policies.default, &self.cancel, move || {
            backend.create_instance(request)
        })
        .await
    }

    async fn clone_instance(&self, source_id: u64, request: ProvisionRequest) -> Result<Instance> {
        let request = request.into_clone();
        let clone_name = request.target_name().to_string();
        let backend = self.backend.as_ref();
        let body = &request;

        tracing::info!("Cloning instance {} as {}", source_id, clone_name);
        let envelope = retry(&self.policies.default, &self.cancel, move || {
            backend.clone_instance(source_id, body)
        })
        .await?;

        if !envelope.success {
            return Err(CloudError::ApiFailure(format!(
                "failed to clone, error: {}",
                envelope.message
            )));
        }

        // The clone is created asynchronously; wait until exactly one
        // instance carries the new name.
        tracing::info!("Waiting for cloned instance {}", clone_name);
        let name = clone_name.as_str();
        retry(&self.policies.clone, &self.cancel, move || async move {
            let mut instances = backend.list_instances(name).await?;
            if instances.len() == 1 {
                Ok(instances.remove(0))
            } else {
                Err(CloudError::CloneNotVisible {
                    name: name.to_string(),
                    count: instances.len(),
                })
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Envelope, Snapshot, VirtualImage};
    use crate::request::SnapshotRequest;
    use async_trait::async_trait;

    /// Backend that fails the test if any call reaches it
    struct Unreachable;

    #[async_trait]
    impl CmpBackend for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }
        async fn create_instance(&self, _: &ProvisionRequest) -> Result<Instance> {
            panic!("unexpected create_instance")
        }
        async fn clone_instance(&self, _: u64, _: &ProvisionRequest) -> Result<Envelope> {
            panic!("unexpected clone_instance")
        }
        async fn list_instances(&self, _: &str) -> Result<Vec<Instance>> {
            panic!("unexpected list_instances")
        }
        async fn get_instance(&self, _: u64) -> Result<Instance> {
            panic!("unexpected get_instance")
        }
        async fn delete_instance(&self, _: u64) -> Result<Envelope> {
            panic!("unexpected delete_instance")
        }
        async fn list_virtual_images(&self, _: &str) -> Result<Vec<VirtualImage>> {
            panic!("unexpected list_virtual_images")
        }
        async fn create_snapshot(&self, _: u64, _: &SnapshotRequest) -> Result<Envelope> {
            panic!("unexpected create_snapshot")
        }
        async fn list_snapshots(&self, _: u64) -> Result<Vec<Snapshot>> {
            panic!("unexpected list_snapshots")
        }
    }

    fn controller() -> InstanceController {
        InstanceController::new(Arc::new(Unreachable), RetryPolicies::default())
    }

    #[tokio::test]
    async fn test_vmware_without_template_fails_locally() {
        let mut spec = InstanceSpec {
            name: "vm".to_string(),
            instance_code: VMWARE_INSTANCE_CODE.to_string(),
            cloud_id: 1,
            plan_id: 1,
            group_id: 1,
            layout_id: 1,
            vm_copies: 1,
            ..Default::default()
        };

        let err = controller().create(&mut spec).await.unwrap_err();
        assert!(matches!(err, CloudError::Validation(ref m) if m.contains("template")));
        assert!(spec.id.is_none());
    }

    #[tokio::test]
    async fn test_invalid_spec_makes_no_remote_call() {
        let mut spec = InstanceSpec {
            name: String::new(),
            instance_code: "kvm".to_string(),
            ..Default::default()
        };

        let err = controller().create(&mut spec).await.unwrap_err();
        assert!(matches!(err, CloudError::Validation(_)));
    }

    #[tokio::test]
    async fn test_read_without_id_makes_no_remote_call() {
        let mut spec = InstanceSpec::default();
        assert!(controller().read(&mut spec).await.is_err());
        assert!(controller().delete(&mut spec).await.is_err());
    }

    #[tokio::test]
    async fn test_update_is_unsupported() {
        let mut spec = InstanceSpec {
            name: "vm".to_string(),
            instance_code: "kvm".to_string(),
            cloud_id: 1,
            plan_id: 1,
            group_id: 1,
            layout_id: 1,
            vm_copies: 1,
            id: Some(5),
            ..Default::default()
        };

        let err = controller().update(&mut spec).await.unwrap_err();
        assert!(matches!(err, CloudError::Unsupported(_)));
        assert_eq!(spec.id, Some(5));
    }
}
