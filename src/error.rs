use thiserror::Error;

/// Errors raised while loading or validating a [`SimulationConfig`].
///
/// [`SimulationConfig`]: crate::config::SimulationConfig
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported config format: {0} (expected yaml, yml or json)")]
    UnsupportedFormat(String),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
