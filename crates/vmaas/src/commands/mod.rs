pub mod instance;
pub mod snapshot;

use anyhow::Context as _;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use vmaas_cloud::{CancellationToken, CmpBackend, RetryPolicies, StateManager};

/// Lifecycle operation requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Read => write!(f, "read"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

/// Shared handles for a single command run
pub struct Context {
    pub backend: Arc<dyn CmpBackend>,
    pub policies: RetryPolicies,
    pub cancel: CancellationToken,
    pub state: StateManager,
}

pub fn load_spec<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read spec {}", path.display()))?;
    serde_yaml::from_str(&content).with_context(|| format!("invalid spec {}", path.display()))
}
