//! Wire types of the CMP REST API
//!
//! The API is not consistent about how it reports success: most mutating
//! endpoints return `{"success": true, "message": "..."}`, some error bodies
//! carry `success` as a string, and the snapshot endpoint answers with an
//! instance-list shaped body. Everything is folded into
//! [`vmaas_cloud::Envelope`] here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use vmaas_cloud::{Envelope, Instance, Snapshot, VirtualImage};

/// `{"instance": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceResponse {
    pub instance: InstanceBody,
}

/// `{"instances": [...]}`, also returned by the snapshot call
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstancesResponse {
    #[serde(default)]
    pub instances: Vec<InstanceBody>,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub success: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceBody {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
}

impl From<InstanceBody> for Instance {
    fn from(body: InstanceBody) -> Self {
        Self {
            id: body.id,
            name: body.name,
            status: body.status,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualImagesResponse {
    #[serde(default)]
    pub virtual_images: Vec<VirtualImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotsResponse {
    #[serde(default)]
    pub snapshots: Vec<SnapshotBody>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotBody {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    pub date_created: DateTime<Utc>,
}

impl From<SnapshotBody> for Snapshot {
    fn from(body: SnapshotBody) -> Self {
        Self {
            id: body.id,
            name: body.name,
            status: body.status,
            date_created: body.date_created,
        }
    }
}

/// Success/message body of mutating calls and of most error responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageBody {
    #[serde(default, deserialize_with = "flexible_bool")]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    /// Set by unauthorized responses instead of `message`
    #[serde(default)]
    pub error: Option<String>,
}

impl MessageBody {
    /// Human readable text of an error body
    pub fn text(&self) -> Option<String> {
        self.message
            .clone()
            .filter(|m| !m.is_empty())
            .or_else(|| self.error.clone().filter(|e| !e.is_empty()))
    }
}

impl From<MessageBody> for Envelope {
    fn from(body: MessageBody) -> Self {
        Envelope {
            success: body.success.unwrap_or(false),
            message: body.text().unwrap_or_default(),
        }
    }
}

impl From<InstancesResponse> for Envelope {
    fn from(body: InstancesResponse) -> Self {
        Envelope {
            success: body.success.unwrap_or(false),
            message: String::new(),
        }
    }
}

/// Accept `true`, `"true"`, `"TRUE"` and friends
fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Text(String),
    }

    match Option::<BoolOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolOrString::Bool(b)) => Ok(Some(b)),
        Some(BoolOrString::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" | "" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!(
                "invalid success flag: {:?}",
                other
            ))),
        },
    }
}
