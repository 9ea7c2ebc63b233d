//! CMP REST backend for VMaaS
//!
//! Implements [`vmaas_cloud::CmpBackend`] over the CMP JSON API using a
//! bearer token.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vmaas_cloud::{InstanceController, RetryPolicies};
//! use vmaas_cloud_cmp::{ClientConfig, CmpClient};
//!
//! let client = CmpClient::new(ClientConfig::new("https://cmp.example.com", token))?;
//! let controller = InstanceController::new(Arc::new(client), RetryPolicies::default());
//! let id = controller.create(&mut spec).await?;
//! ```

pub mod api;
pub mod client;
pub mod error;

pub use client::{ApiShape, ClientConfig, CmpClient, DEFAULT_REQUEST_TIMEOUT};
pub use error::{CmpError, Result};
