//! Error types for pvcscaler
//!
//! Provides structured error types for cluster access, workload discovery,
//! scaling, and the state file.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for pvcscaler
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Operation cancelled")]
    Cancelled,

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Kubeconfig error: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("Unsupported workload kind: {0}")]
    UnsupportedKind(String),

    // =========================================================================
    // Scaling Errors
    // =========================================================================
    #[error("Invalid replica count {replicas} for {workload}")]
    InvalidReplicas { workload: String, replicas: i32 },

    #[error("Failed to scale {workload} after retries: {source}")]
    ScaleFailed {
        workload: String,
        #[source]
        source: Box<Error>,
    },

    // =========================================================================
    // State File Errors
    // =========================================================================
    #[error("State file already exists: {} (use --force to overwrite)", .0.display())]
    StateFileExists(PathBuf),

    #[error("State file {}: {source}", .path.display())]
    StateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

impl Error {
    /// Check if this error is transient and the request may be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Kube(kube::Error::Api(resp)) => {
                resp.code == 409 || resp.code == 429 || resp.code >= 500
            }
            Error::Kube(kube::Error::HyperError(_)) | Error::Kube(kube::Error::Service(_)) => {
                true
            }
            _ => false,
        }
    }

    /// Check if this error means the object does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::ResourceNotFound { .. } => true,
            Error::Kube(err) => is_kube_not_found(err),
            _ => false,
        }
    }
}

/// Check if a raw kube error is an HTTP 404
pub(crate) fn is_kube_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

/// Result type alias for pvcscaler
pub type Result<T> = std::result::Result<T, Error>;
