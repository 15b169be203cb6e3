//! Operator error types

use std::path::PathBuf;

/// Errors that abort the current dispatch.
///
/// Unmet preconditions (missing relations, data not yet published, an
/// unreachable container) are reported as a unit status instead.
#[derive(Debug, thiserror::Error)]
pub enum OperatorError {
    #[error("Workload I/O error on {path}: {source}")]
    WorkloadIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot connect to workload container {0}")]
    ContainerUnreachable(String),

    #[error("YAML rendering error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to resolve pod IP: {0}")]
    PodIp(String),

    #[error("Unknown relation id {0}")]
    UnknownRelation(u32),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl OperatorError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WorkloadIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, OperatorError>;
