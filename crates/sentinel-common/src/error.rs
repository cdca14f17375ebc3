//! Error taxonomy for Fabric Sentinel.
//!
//! Each variant corresponds to one of the error kinds the pipeline
//! distinguishes operationally: the ones marked fatal abort startup or
//! trigger an orderly shutdown, the rest are counted and handled locally by
//! the component that produced them.

use thiserror::Error;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing role, dangling neighbor id, unknown role value. Fatal at startup.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Isolation Forest model unreadable or schema-mismatched. Fatal at
    /// startup unless `--allow-bgp-only` is set.
    #[error("model load failure: {0}")]
    ModelLoad(String),

    /// Cannot subscribe/publish to the transport. Fatal at startup; retried
    /// with backoff at runtime.
    #[error("transport unavailable: {0}")]
    Transport(String),

    /// A BGPUpdate or SNMPSample record failed to decode. Local: drop and count.
    #[error("malformed input record: {0}")]
    MalformedInput(String),

    /// SNMPFeatureVector schema hash does not match the loaded model. Local.
    #[error("feature schema mismatch: expected {expected}, got {actual}")]
    SchemaMismatch { expected: String, actual: String },

    /// NaN/Inf encountered in a feature or distance computation. Local.
    #[error("numeric anomaly in {0}")]
    NumericAnomaly(String),

    /// Device id not present in the loaded topology. Local, degraded triage.
    #[error("topology lookup miss for device {0}")]
    TopologyMiss(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("other: {0}")]
    Generic(#[from] anyhow::Error),
}

impl Error {
    /// Whether the runtime should retry the operation that raised this error
    /// rather than treating it as an immediately local/fatal condition.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Whether this error kind aborts startup (§7 items 1–3) rather than
    /// being handled locally by the component that raised it.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::ModelLoad(_) | Error::Transport(_)
        )
    }

    /// Category label used as the `kind` tag on error counters.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration",
            Error::ModelLoad(_) => "model_load",
            Error::Transport(_) => "transport",
            Error::MalformedInput(_) => "malformed_input",
            Error::SchemaMismatch { .. } => "schema_mismatch",
            Error::NumericAnomaly(_) => "numeric_anomaly",
            Error::TopologyMiss(_) => "topology_miss",
            Error::Serialization(_) => "serialization",
            Error::Yaml(_) => "yaml",
            Error::Toml(_) => "toml",
            Error::Io(_) => "io",
            Error::Generic(_) => "generic",
        }
    }
}
