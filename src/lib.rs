//! pvcscaler - scale down and restore workloads by storage class
//!
//! Finds Deployments and StatefulSets that mount PersistentVolumeClaims of a
//! given storage class, scales them to zero while recording their replica
//! counts in a state file, and later restores them from that file.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         PvcScaler (orchestrator)                  │
//! │        list · down (discover → state file → scale to 0) · up      │
//! ├───────────────────────────────┬──────────────────────────────────┤
//! │     Discovery (per namespace) │           Scaler                  │
//! │  pods → owner chain           │  scale subresource + backoff      │
//! │  PVC storage class matching   │                                   │
//! │  Deployment / StatefulSet specs                                   │
//! ├───────────────────────────────┴──────────────────────────────────┤
//! │                     ClusterApi (domain port)                      │
//! │           KubeCluster (kube::Api)  ·  FakeCluster (tests)         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`orchestrator`]: namespace fan-out, `down`, `up`
//! - [`discovery`]: owner resolution, PVC matching, namespace scanning
//! - [`scaler`]: replica reads and writes with retry
//! - [`dataset`]: the JSON state file
//! - [`cluster`]: Kubernetes adapter
//! - [`domain`]: workload types and the cluster port
//! - [`output`]: table / JSON / YAML rendering
//! - [`error`]: Error types and handling

pub mod cluster;
pub mod dataset;
pub mod discovery;
pub mod domain;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod scaler;

// Re-export commonly used types
pub use cluster::{connect, ClusterConfig, KubeCluster};
pub use dataset::Dataset;
pub use domain::ports::{ClusterApi, ClusterApiRef, Workload, WorkloadKind, WorkloadRef};
pub use error::{Error, Result};
pub use orchestrator::{
    Discovery, Failure, NamespaceSelector, PvcScaler, Report, ScalerConfig, ALL_NAMESPACES,
};
pub use output::{render, OutputFormat};
pub use scaler::{RetryPolicy, Scaler};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Git commit the binary was built from
pub const GIT_COMMIT: &str = match option_env!("PVCSCALER_GIT_COMMIT") {
    Some(commit) => commit,
    None => "0000000000000000000000000000000000000000",
};

/// Build date of the binary
pub const BUILD_DATE: &str = match option_env!("PVCSCALER_BUILD_DATE") {
    Some(date) => date,
    None => "unknown",
};
