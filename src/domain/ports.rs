//! Domain Ports - Core types and the cluster boundary
//!
//! The [`ClusterApi`] trait is the only way discovery and scaling code talks to
//! the Kubernetes API server. The production adapter lives in
//! [`crate::cluster::kubernetes`]; tests use an in-memory implementation.

use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

// =============================================================================
// Workload Types
// =============================================================================

/// Workload controllers that can be scaled through the scale subresource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
}

impl WorkloadKind {
    /// Kubernetes kind string
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::StatefulSet => "StatefulSet",
        }
    }
}

impl std::fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkloadKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Deployment" => Ok(WorkloadKind::Deployment),
            "StatefulSet" => Ok(WorkloadKind::StatefulSet),
            other => Err(Error::UnsupportedKind(other.to_string())),
        }
    }
}

/// Identity of a workload in the cluster
///
/// Ordering is namespace, then kind, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkloadRef {
    pub namespace: String,
    pub kind: WorkloadKind,
    pub name: String,
}

impl WorkloadRef {
    pub fn new(kind: WorkloadKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            name: name.into(),
        }
    }

    /// Attach a replica count, producing a state file record
    pub fn with_replicas(self, replicas: i32) -> Workload {
        Workload {
            kind: self.kind,
            name: self.name,
            namespace: self.namespace,
            replicas,
        }
    }
}

impl std::fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// A discovered workload and the replica count it had before scale-down
///
/// Field order is the key order of the state file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub kind: WorkloadKind,
    pub name: String,
    pub namespace: String,
    pub replicas: i32,
}

impl Workload {
    pub fn reference(&self) -> WorkloadRef {
        WorkloadRef::new(self.kind, self.namespace.clone(), self.name.clone())
    }
}

// =============================================================================
// Cluster Port
// =============================================================================

/// Port for the Kubernetes API operations pvcscaler needs
///
/// Lookups that may legitimately miss return `Option`; everything else maps
/// API failures into [`Error`].
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Names of all namespaces in the cluster
    async fn list_namespaces(&self) -> Result<Vec<String>>;

    /// All pods in a namespace
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>>;

    /// A ReplicaSet by name
    async fn get_replica_set(&self, namespace: &str, name: &str) -> Result<Option<ReplicaSet>>;

    /// A PersistentVolumeClaim by name
    async fn get_pvc(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>>;

    /// All Deployments in a namespace
    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>>;

    /// All StatefulSets in a namespace
    async fn list_stateful_sets(&self, namespace: &str) -> Result<Vec<StatefulSet>>;

    /// Desired replicas read from the scale subresource
    async fn get_scale(&self, workload: &WorkloadRef) -> Result<i32>;

    /// Set desired replicas through the scale subresource
    async fn set_scale(&self, workload: &WorkloadRef, replicas: i32, dry_run: bool) -> Result<()>;
}

pub type ClusterApiRef = Arc<dyn ClusterApi>;
