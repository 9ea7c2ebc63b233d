//! HTTP client for the CMP REST API

use crate::api::{
    InstanceResponse, InstancesResponse, MessageBody, SnapshotsResponse, VirtualImagesResponse,
};
use crate::error::{CmpError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vmaas_cloud::{
    CmpBackend, Envelope, Instance, ProvisionRequest, Snapshot, SnapshotRequest, VirtualImage,
};

/// URL layout of the target CMP
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApiShape {
    /// `{base}/api/...`
    #[default]
    Legacy,
    /// `{base}/api/v1/serviceinstances/{id}/...`
    ServiceInstance { id: String },
}

impl ApiShape {
    fn prefix(&self, base: &str) -> String {
        let base = base.trim_end_matches('/');
        match self {
            ApiShape::Legacy => format!("{}/api", base),
            ApiShape::ServiceInstance { id } => {
                format!("{}/api/v1/serviceinstances/{}", base, id)
            }
        }
    }
}

/// Per-request timeout unless configured otherwise
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`CmpClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub token: String,
    pub api_shape: ApiShape,
    /// Upper bound for a single HTTP exchange, body included
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            token: token.into(),
            api_shape: ApiShape::Legacy,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_api_shape(mut self, api_shape: ApiShape) -> Self {
        self.api_shape = api_shape;
        self
    }
}

/// CMP backend speaking JSON over HTTPS with a bearer token
pub struct CmpClient {
    client: reqwest::Client,
    token: String,
    prefix: String,
}

impl CmpClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.api_url.trim().is_empty() {
            return Err(CmpError::InvalidConfig("api_url is empty".to_string()));
        }
        if config.token.trim().is_empty() {
            return Err(CmpError::InvalidConfig("token is empty".to_string()));
        }
        if matches!(&config.api_shape, ApiShape::ServiceInstance { id } if id.trim().is_empty()) {
            return Err(CmpError::InvalidConfig(
                "service instance id is empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("vmaas/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            prefix: config.api_shape.prefix(&config.api_url),
            token: config.token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.prefix, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<MessageBody>(&text)
                .ok()
                .and_then(|body| body.text())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("unknown error")
                        .to_string()
                });
            tracing::debug!(endpoint, status = status.as_u16(), %message, "CMP request failed");
            return Err(CmpError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| CmpError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl CmpBackend for CmpClient {
    fn name(&self) -> &str {
        "cmp"
    }

    async fn create_instance(&self, request: &ProvisionRequest) -> vmaas_cloud::Result<Instance> {
        tracing::debug!(name = %request.target_name(), "POST instances");
        let body: InstanceResponse = self
            .send(
                "instances",
                self.client.post(self.url("instances")).json(request),
            )
            .await?;
        Ok(body.instance.into())
    }

    async fn clone_instance(
        &self,
        source_id: u64,
        request: &ProvisionRequest,
    ) -> vmaas_cloud::Result<Envelope> {
        tracing::debug!(source_id, name = %request.target_name(), "POST instances/clone");
        let path = format!("instances/{}/clone", source_id);
        let body: MessageBody = self
            .send(&path, self.client.post(self.url(&path)).json(request))
            .await?;
        Ok(body.into())
    }

    async fn list_instances(&self, name: &str) -> vmaas_cloud::Result<Vec<Instance>> {
        let body: InstancesResponse = self
            .send(
                "instances",
                self.client
                    .get(self.url("instances"))
                    .query(&[("name", name)]),
            )
            .await?;
        Ok(body.instances.into_iter().map(Instance::from).collect())
    }

    async fn get_instance(&self, id: u64) -> vmaas_cloud::Result<Instance> {
        let path = format!("instances/{}", id);
        let body: InstanceResponse = self.send(&path, self.client.get(self.url(&path))).await?;
        Ok(body.instance.into())
    }

    async fn delete_instance(&self, id: u64) -> vmaas_cloud::Result<Envelope> {
        tracing::debug!(id, "DELETE instances");
        let path = format!("instances/{}", id);
        let body: MessageBody = self
            .send(&path, self.client.delete(self.url(&path)))
            .await?;
        Ok(body.into())
    }

    async fn list_virtual_images(&self, name: &str) -> vmaas_cloud::Result<Vec<VirtualImage>> {
        let body: VirtualImagesResponse = self
            .send(
                "virtual-images",
                self.client
                    .get(self.url("virtual-images"))
                    .query(&[("name", name)]),
            )
            .await?;
        Ok(body.virtual_images)
    }

    async fn create_snapshot(
        &self,
        instance_id: u64,
        request: &SnapshotRequest,
    ) -> vmaas_cloud::Result<Envelope> {
        tracing::debug!(instance_id, "PUT instances/snapshot");
        let path = format!("instances/{}/snapshot", instance_id);
        let body: InstancesResponse = self
            .send(&path, self.client.put(self.url(&path)).json(request))
            .await?;
        Ok(body.into())
    }

    async fn list_snapshots(&self, instance_id: u64) -> vmaas_cloud::Result<Vec<Snapshot>> {
        let path = format!("instances/{}/snapshots", instance_id);
        let body: SnapshotsResponse = self.send(&path, self.client.get(self.url(&path))).await?;
        Ok(body.snapshots.into_iter().map(Snapshot::from).collect())
    }
}
