//! Workload resolver
//!
//! Walks a Pod's owner chain up to the workload that controls it:
//! Pod → ReplicaSet → Deployment, or Pod → StatefulSet.

use crate::domain::ports::{ClusterApi, WorkloadKind, WorkloadRef};
use crate::error::Result;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;
use tracing::debug;

/// Outcome of resolving a pod's owner chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The pod is controlled by a scalable workload
    Workload(WorkloadRef),
    /// The pod cannot be scaled through a Deployment or StatefulSet
    Unmanaged { reason: String },
}

impl Resolution {
    fn unmanaged(reason: impl Into<String>) -> Self {
        Resolution::Unmanaged {
            reason: reason.into(),
        }
    }
}

/// The controlling owner reference, or the first owner if none is flagged
pub fn controller_of(meta: &ObjectMeta) -> Option<&OwnerReference> {
    let owners = meta.owner_references.as_deref()?;
    owners
        .iter()
        .find(|o| o.controller == Some(true))
        .or_else(|| owners.first())
}

/// Resolve the workload controlling `pod`
pub async fn resolve_pod_owner(
    api: &dyn ClusterApi,
    namespace: &str,
    pod: &Pod,
) -> Result<Resolution> {
    let Some(owner) = controller_of(&pod.metadata) else {
        return Ok(Resolution::unmanaged("pod has no owner"));
    };

    match owner.kind.as_str() {
        "StatefulSet" => Ok(Resolution::Workload(WorkloadRef::new(
            WorkloadKind::StatefulSet,
            namespace,
            owner.name.clone(),
        ))),
        "ReplicaSet" => resolve_replica_set(api, namespace, &owner.name).await,
        other => Ok(Resolution::unmanaged(format!(
            "pod {} is owned by {} {}",
            pod.name_any(),
            other,
            owner.name
        ))),
    }
}

async fn resolve_replica_set(
    api: &dyn ClusterApi,
    namespace: &str,
    rs_name: &str,
) -> Result<Resolution> {
    let Some(rs) = api.get_replica_set(namespace, rs_name).await? else {
        return Ok(Resolution::unmanaged(format!(
            "replica set {rs_name} no longer exists"
        )));
    };

    match controller_of(&rs.metadata) {
        Some(owner) if owner.kind == "Deployment" => {
            debug!("ReplicaSet {}/{} belongs to Deployment {}", namespace, rs_name, owner.name);
            Ok(Resolution::Workload(WorkloadRef::new(
                WorkloadKind::Deployment,
                namespace,
                owner.name.clone(),
            )))
        }
        Some(owner) => Ok(Resolution::unmanaged(format!(
            "replica set {rs_name} is owned by {} {}",
            owner.kind, owner.name
        ))),
        None => Ok(Resolution::unmanaged(format!(
            "replica set {rs_name} has no owning deployment"
        ))),
    }
}
