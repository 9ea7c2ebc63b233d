//! Provisioning request construction
//!
//! Pure mapping from an [`InstanceSpec`] to the wire-shaped
//! [`ProvisionRequest`]. Nothing here performs I/O.

use crate::model::{ConfigSpec, InstanceSpec, NetworkSpec, PowerScheduleSpec, VolumeSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Volume id telling the backend to allocate a new volume
const NEW_VOLUME_ID: i64 = -1;

/// Body of the create and clone instance calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    pub zone_id: u64,
    pub instance: InstanceRequest,
    pub volumes: Vec<VolumeRequest>,
    pub network_interfaces: Vec<NetworkInterfaceRequest>,
    pub config: ConfigRequest,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<Tag>,
    pub layout_size: u64,
    /// Set instead of `instance.name` when cloning
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub clone_name: Option<String>,
}

impl ProvisionRequest {
    /// Move the instance name into `cloneName` for the clone call
    pub fn into_clone(mut self) -> Self {
        self.clone_name = Some(std::mem::take(&mut self.instance.name));
        self
    }

    /// Name the instance will be listed under once provisioned
    pub fn target_name(&self) -> &str {
        self.clone_name.as_deref().unwrap_or(&self.instance.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRequest {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub name: String,
    pub instance_type: CodeRef,
    pub plan: IdRef,
    pub site: IdRef,
    pub layout: IdRef,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub host_name: Option<String>,
    /// Free-form tag string
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub power_schedule_type: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub shutdown_days: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expire_days: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeRef {
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRequest {
    pub id: i64,
    pub name: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub datastore_id: Option<serde_json::Value>,
    pub root_volume: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceRequest {
    pub network: IdRef,
}

/// Union of the config fields accepted by both API shapes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRequest {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resource_pool_id: Option<u64>,
    /// Sent as "true"/"false"
    pub no_agent: String,
    #[serde(
        rename = "vmwareFolderId",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub vm_folder_id: Option<String>,
    pub create_user: bool,
    /// Resolved virtual image id, 0 until resolved
    pub template: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

/// Power schedule fields carried on the instance descriptor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerSchedule {
    pub schedule_type: Option<u64>,
    pub shutdown_days: Option<u64>,
    pub expire_days: Option<u64>,
}

/// Body of the snapshot call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    pub snapshot: SnapshotRequestBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRequestBody {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub description: String,
}

impl SnapshotRequest {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            snapshot: SnapshotRequestBody {
                name: name.into(),
                description: description.into(),
            },
        }
    }
}

pub fn volumes(specs: &[VolumeSpec]) -> Vec<VolumeRequest> {
    specs
        .iter()
        .map(|v| VolumeRequest {
            id: NEW_VOLUME_ID,
            name: v.name.clone(),
            size: v.size,
            datastore_id: v.datastore_id.clone(),
            root_volume: v.root,
        })
        .collect()
}

pub fn network_interfaces(specs: &[NetworkSpec]) -> Vec<NetworkInterfaceRequest> {
    specs
        .iter()
        .map(|n| NetworkInterfaceRequest {
            network: IdRef { id: n.id },
        })
        .collect()
}

pub fn config(spec: &ConfigSpec) -> ConfigRequest {
    ConfigRequest {
        resource_pool_id: spec.resource_pool_id,
        no_agent: spec.no_agent.to_string(),
        vm_folder_id: spec.vm_folder.clone().filter(|f| !f.is_empty()),
        create_user: spec.create_user,
        template: 0,
    }
}

/// Tags sorted by name; map iteration order carries no meaning
pub fn tags(map: &HashMap<String, String>) -> Vec<Tag> {
    let mut tags: Vec<Tag> = map
        .iter()
        .map(|(name, value)| Tag {
            name: name.clone(),
            value: value.clone(),
        })
        .collect();
    tags.sort_by(|a, b| a.name.cmp(&b.name));
    tags
}

pub fn power_schedule(spec: Option<&PowerScheduleSpec>) -> PowerSchedule {
    match spec {
        Some(s) => PowerSchedule {
            schedule_type: Some(s.id),
            shutdown_days: Some(s.shutdown_days),
            expire_days: Some(s.expire_days),
        },
        None => PowerSchedule::default(),
    }
}

/// Assemble the full create request for `spec`
pub fn provision_request(spec: &InstanceSpec) -> ProvisionRequest {
    let schedule = power_schedule(spec.power_schedule.as_ref());

    let request = ProvisionRequest {
        zone_id: spec.cloud_id,
        instance: InstanceRequest {
            name: spec.name.clone(),
            instance_type: CodeRef {
                code: spec.instance_code.clone(),
            },
            plan: IdRef { id: spec.plan_id },
            site: IdRef { id: spec.group_id },
            layout: IdRef { id: spec.layout_id },
            kind: spec.instance_code.clone(),
            host_name: spec.hostname.clone(),
            tags: spec.labels.clone(),
            power_schedule_type: schedule.schedule_type,
            shutdown_days: schedule.shutdown_days,
            expire_days: schedule.expire_days,
        },
        volumes: volumes(&spec.volumes),
        network_interfaces: network_interfaces(&spec.networks),
        config: config(&spec.config),
        tags: tags(&spec.tags),
        layout_size: spec.vm_copies,
        clone_name: None,
    };

    tracing::debug!(
        "Built provision request for {} ({} volumes, {} networks)",
        spec.name,
        request.volumes.len(),
        request.network_interfaces.len()
    );
    request
}
