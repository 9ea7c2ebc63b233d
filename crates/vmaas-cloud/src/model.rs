//! Desired-state models for instances and snapshots
//!
//! Specs are loaded from YAML or JSON. Identifier and size fields accept
//! either an integer or a numeric string (`3` or `"3"`), since both forms
//! appear in hand-written specs. Computed fields (`id`, `status`,
//! `timestamp`) are written back by the controllers.

use crate::error::{CloudError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Instance type code whose provisioning requires a VM template
pub const VMWARE_INSTANCE_CODE: &str = "vmware";

/// Desired state of a single VM instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub name: String,

    /// Zone (cloud) the instance is placed in
    #[serde(deserialize_with = "numeric::unsigned")]
    pub cloud_id: u64,

    /// Instance type code, e.g. "vmware"
    pub instance_code: String,

    #[serde(deserialize_with = "numeric::unsigned")]
    pub plan_id: u64,

    /// Group (site) owning the instance
    #[serde(deserialize_with = "numeric::unsigned")]
    pub group_id: u64,

    #[serde(deserialize_with = "numeric::unsigned")]
    pub layout_id: u64,

    #[serde(default)]
    pub hostname: Option<String>,

    /// Free-form tag string stored on the instance itself
    #[serde(default)]
    pub labels: Option<String>,

    /// Name/value tags
    #[serde(default)]
    pub tags: HashMap<String, String>,

    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,

    #[serde(default)]
    pub networks: Vec<NetworkSpec>,

    #[serde(default)]
    pub config: ConfigSpec,

    #[serde(default)]
    pub power_schedule: Option<PowerScheduleSpec>,

    /// Present when the instance is cloned from an existing one
    #[serde(default)]
    pub clone: Option<CloneSpec>,

    /// Number of copies provisioned from the layout
    #[serde(default = "default_vm_copies", deserialize_with = "numeric::unsigned")]
    pub vm_copies: u64,

    /// Backend-assigned identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

fn default_vm_copies() -> u64 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,

    /// Size in GB
    #[serde(deserialize_with = "numeric::unsigned")]
    pub size: u64,

    /// Datastore id or a symbolic value such as "auto"
    #[serde(default)]
    pub datastore_id: Option<serde_json::Value>,

    #[serde(default = "default_true")]
    pub root: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    #[serde(deserialize_with = "numeric::unsigned")]
    pub id: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSpec {
    #[serde(default, deserialize_with = "numeric::optional")]
    pub resource_pool_id: Option<u64>,

    #[serde(default)]
    pub no_agent: bool,

    #[serde(default)]
    pub vm_folder: Option<String>,

    #[serde(default)]
    pub create_user: bool,

    /// Virtual image name, resolved to an id at create time
    #[serde(default)]
    pub template: Option<String>,
}

impl ConfigSpec {
    /// Template name, ignoring blank values
    pub fn template_name(&self) -> Option<&str> {
        self.template
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerScheduleSpec {
    #[serde(deserialize_with = "numeric::unsigned")]
    pub id: u64,

    #[serde(deserialize_with = "numeric::unsigned")]
    pub shutdown_days: u64,

    #[serde(deserialize_with = "numeric::unsigned")]
    pub expire_days: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloneSpec {
    #[serde(deserialize_with = "numeric::unsigned")]
    pub source_instance_id: u64,
}

impl InstanceSpec {
    /// Structural check run before any remote call
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("name", "must not be empty"));
        }
        if self.instance_code.trim().is_empty() {
            return Err(invalid("instance_code", "must not be empty"));
        }
        for (field, value) in [
            ("cloud_id", self.cloud_id),
            ("plan_id", self.plan_id),
            ("group_id", self.group_id),
            ("layout_id", self.layout_id),
            ("vm_copies", self.vm_copies),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than 0"));
            }
        }
        for (i, volume) in self.volumes.iter().enumerate() {
            if volume.name.trim().is_empty() {
                return Err(invalid(&format!("volumes[{}].name", i), "must not be empty"));
            }
            if volume.size == 0 {
                return Err(invalid(
                    &format!("volumes[{}].size", i),
                    "must be greater than 0",
                ));
            }
        }
        for (i, network) in self.networks.iter().enumerate() {
            if network.id == 0 {
                return Err(invalid(&format!("networks[{}].id", i), "must be greater than 0"));
            }
        }
        if let Some(clone) = &self.clone {
            if clone.source_instance_id == 0 {
                return Err(invalid("clone.source_instance_id", "must be greater than 0"));
            }
        }
        if let Some(schedule) = &self.power_schedule {
            if schedule.id == 0 {
                return Err(invalid("power_schedule.id", "must be greater than 0"));
            }
        }
        Ok(())
    }

    /// Identifier of an instance that already exists
    pub fn require_id(&self) -> Result<u64> {
        match self.id {
            Some(id) if id > 0 => Ok(id),
            _ => Err(invalid("id", "instance has not been created")),
        }
    }

    /// Consistency check of the written-back state
    pub fn check_state(&self) -> Result<()> {
        if self.id == Some(0) {
            return Err(invalid("id", "must be greater than 0"));
        }
        if self.id.is_none() && self.status.is_some() {
            return Err(invalid("status", "set on an instance without id"));
        }
        Ok(())
    }

    pub fn is_clone(&self) -> bool {
        self.clone.is_some()
    }
}

/// Desired state of an instance snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSpec {
    /// Parent instance
    #[serde(deserialize_with = "numeric::unsigned")]
    pub instance_id: u64,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Creation time reported by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl SnapshotSpec {
    pub fn validate(&self) -> Result<()> {
        if self.instance_id == 0 {
            return Err(invalid("instance_id", "must be greater than 0"));
        }
        if self.name.trim().is_empty() {
            return Err(invalid("name", "must not be empty"));
        }
        Ok(())
    }

    pub fn check_state(&self) -> Result<()> {
        if self.id == Some(0) {
            return Err(invalid("id", "must be greater than 0"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> CloudError {
    CloudError::Validation(format!("{} : {}", field, reason))
}

/// Deserializers accepting both integers and numeric strings
pub(crate) mod numeric {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        Text(String),
    }

    impl NumberOrString {
        fn into_u64<E: Error>(self) -> Result<u64, E> {
            match self {
                NumberOrString::Number(n) => Ok(n),
                NumberOrString::Text(s) => s
                    .trim()
                    .parse()
                    .map_err(|_| E::custom(format!("expected a number, got {:?}", s))),
            }
        }
    }

    pub fn unsigned<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        NumberOrString::deserialize(deserializer)?.into_u64()
    }

    pub fn optional<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
        match Option::<NumberOrString>::deserialize(deserializer)? {
            Some(NumberOrString::Text(s)) if s.trim().is_empty() => Ok(None),
            Some(value) => value.into_u64().map(Some),
            None => Ok(None),
        }
    }
}
