//! Cluster adapters
//!
//! - `kubernetes`: live API server via `kube`
//! - `fake`: in-memory cluster used by the test suite

pub mod kubernetes;

#[cfg(test)]
pub(crate) mod fake;

pub use kubernetes::{connect, ClusterConfig, KubeCluster};
