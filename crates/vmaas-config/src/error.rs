use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config directory not found")]
    ConfigDirNotFound,

    #[error(
        "config file not found. Looked in:\n\
        - current directory: vmaas.yaml\n\
        - ./.vmaas/vmaas.yaml\n\
        - ~/.config/vmaas/config.yaml\n\
        Set VMAAS_CONFIG_PATH to point at a file directly"
    )]
    ConfigFileNotFound,

    #[error("missing setting: {0} (set it in the config file or via {1})")]
    MissingSetting(&'static str, &'static str),

    #[error("invalid retry policy: {0}")]
    InvalidRetry(#[from] vmaas_cloud::CloudError),

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
