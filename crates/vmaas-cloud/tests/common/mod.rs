use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use vmaas_cloud::{
    CloudError, CmpBackend, Envelope, Instance, InstanceSpec, NetworkSpec, ProvisionRequest,
    Result, RetryPolicies, RetryPolicy, Snapshot, SnapshotRequest, VirtualImage, VolumeSpec,
};

/// Scriptable in-memory backend that records every call
#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<String>>,
    transient_failures: Mutex<HashMap<&'static str, u32>>,
    images: Mutex<Vec<VirtualImage>>,
    instances: Mutex<HashMap<u64, Instance>>,
    next_id: Mutex<u64>,
    clone_envelope: Mutex<Option<Envelope>>,
    clone_requests: Mutex<Vec<(u64, ProvisionRequest)>>,
    create_requests: Mutex<Vec<ProvisionRequest>>,
    list_responses: Mutex<VecDeque<Vec<Instance>>>,
    delete_envelope: Mutex<Option<Envelope>>,
    snapshot_envelope: Mutex<Option<Envelope>>,
    snapshots: Mutex<Vec<Snapshot>>,
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(100),
            ..Default::default()
        }
    }

    pub fn with_images(self, names: &[(u64, &str)]) -> Self {
        *self.images.lock().unwrap() = names
            .iter()
            .map(|(id, name)| VirtualImage {
                id: *id,
                name: name.to_string(),
            })
            .collect();
        self
    }

    /// Make the next `times` calls of `op` fail with a transport error
    pub fn failing(self, op: &'static str, times: u32) -> Self {
        self.transient_failures.lock().unwrap().insert(op, times);
        self
    }

    pub fn with_clone_envelope(self, envelope: Envelope) -> Self {
        *self.clone_envelope.lock().unwrap() = Some(envelope);
        self
    }

    pub fn with_delete_envelope(self, envelope: Envelope) -> Self {
        *self.delete_envelope.lock().unwrap() = Some(envelope);
        self
    }

    pub fn with_snapshot_envelope(self, envelope: Envelope) -> Self {
        *self.snapshot_envelope.lock().unwrap() = Some(envelope);
        self
    }

    /// Responses returned by successive list_instances calls
    pub fn with_list_responses(self, responses: Vec<Vec<Instance>>) -> Self {
        *self.list_responses.lock().unwrap() = responses.into();
        self
    }

    pub fn with_instance(self, id: u64, name: &str, status: &str) -> Self {
        self.instances
            .lock()
            .unwrap()
            .insert(id, instance(id, name, status));
        self
    }

    pub fn with_snapshots(self, snapshots: Vec<Snapshot>) -> Self {
        *self.snapshots.lock().unwrap() = snapshots;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == op).count()
    }

    pub fn clone_requests(&self) -> Vec<(u64, ProvisionRequest)> {
        self.clone_requests.lock().unwrap().clone()
    }

    pub fn create_requests(&self) -> Vec<ProvisionRequest> {
        self.create_requests.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str) -> Result<()> {
        self.calls.lock().unwrap().push(op.to_string());
        let mut failures = self.transient_failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CloudError::Transport(format!("{} unavailable", op)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CmpBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_instance(&self, request: &ProvisionRequest) -> Result<Instance> {
        self.record("create_instance")?;
        self.create_requests.lock().unwrap().push(request.clone());

        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let created = instance(*next_id, &request.instance.name, "provisioning");
        self.instances
            .lock()
            .unwrap()
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn clone_instance(&self, source_id: u64, request: &ProvisionRequest) -> Result<Envelope> {
        self.record("clone_instance")?;
        self.clone_requests
            .lock()
            .unwrap()
            .push((source_id, request.clone()));
        Ok(self
            .clone_envelope
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(Envelope::ok))
    }

    async fn list_instances(&self, name: &str) -> Result<Vec<Instance>> {
        self.record("list_instances")?;
        if let Some(scripted) = self.list_responses.lock().unwrap().pop_front() {
            return Ok(scripted);
        }
        Ok(self
            .instances
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.name == name)
            .cloned()
            .collect())
    }

    async fn get_instance(&self, id: u64) -> Result<Instance> {
        self.record("get_instance")?;
        self.instances
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| CloudError::Api {
                status: 404,
                message: format!("instance {} not found", id),
            })
    }

    async fn delete_instance(&self, id: u64) -> Result<Envelope> {
        self.record("delete_instance")?;
        let envelope = self
            .delete_envelope
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(Envelope::ok);
        if envelope.success {
            self.instances.lock().unwrap().remove(&id);
        }
        Ok(envelope)
    }

    async fn list_virtual_images(&self, _name: &str) -> Result<Vec<VirtualImage>> {
        self.record("list_virtual_images")?;
        Ok(self.images.lock().unwrap().clone())
    }

    async fn create_snapshot(&self, _instance_id: u64, _request: &SnapshotRequest) -> Result<Envelope> {
        self.record("create_snapshot")?;
        Ok(self
            .snapshot_envelope
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(Envelope::ok))
    }

    async fn list_snapshots(&self, _instance_id: u64) -> Result<Vec<Snapshot>> {
        self.record("list_snapshots")?;
        Ok(self.snapshots.lock().unwrap().clone())
    }
}

pub fn instance(id: u64, name: &str, status: &str) -> Instance {
    Instance {
        id,
        name: name.to_string(),
        status: status.to_string(),
    }
}

#[allow(dead_code)]
pub fn snapshot(id: u64, status: &str, created: DateTime<Utc>) -> Snapshot {
    Snapshot {
        id,
        name: format!("snap-{}", id),
        status: status.to_string(),
        date_created: created,
    }
}

/// Short policies so tests run quickly under paused time
#[allow(dead_code)]
pub fn test_policies() -> RetryPolicies {
    RetryPolicies {
        default: RetryPolicy::new(Duration::from_secs(1), Duration::from_secs(30), 3),
        clone: RetryPolicy::new(Duration::from_secs(5), Duration::from_secs(60), 10),
    }
}

/// A valid vmware spec using the "ubuntu" template
#[allow(dead_code)]
pub fn vmware_spec(name: &str) -> InstanceSpec {
    InstanceSpec {
        name: name.to_string(),
        cloud_id: 1,
        instance_code: "vmware".to_string(),
        plan_id: 407,
        group_id: 2,
        layout_id: 1159,
        volumes: vec![VolumeSpec {
            name: "root_vol".to_string(),
            size: 20,
            datastore_id: None,
            root: true,
        }],
        networks: vec![NetworkSpec { id: 9 }],
        config: vmaas_cloud::ConfigSpec {
            template: Some("ubuntu".to_string()),
            ..Default::default()
        },
        vm_copies: 1,
        ..Default::default()
    }
}
