//! Namespace scanner
//!
//! Finds every scalable workload in one namespace that mounts a PVC of the
//! target storage class, and records its current replica count.

use crate::discovery::owner::{resolve_pod_owner, Resolution};
use crate::discovery::pvc::{
    claim_has_storage_class, first_matching_claim, mounted_claims, pvc_matches_storage_class,
};
use crate::domain::ports::{ClusterApi, Workload, WorkloadKind, WorkloadRef};
use crate::error::Result;
use kube::ResourceExt;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Discover workloads in `namespace` using `storage_class`
///
/// Running pods are resolved through their owner chain. Deployment and
/// StatefulSet specs are checked as well so workloads without running pods
/// are found too. Workloads already at zero replicas are left out. The result
/// is sorted and free of duplicates.
pub async fn discover_namespace(
    api: &dyn ClusterApi,
    namespace: &str,
    storage_class: &str,
) -> Result<Vec<Workload>> {
    let mut refs = BTreeSet::new();

    scan_pods(api, namespace, storage_class, &mut refs).await?;
    scan_specs(api, namespace, storage_class, &mut refs).await?;

    let mut workloads = Vec::with_capacity(refs.len());
    for workload in refs {
        let replicas = match api.get_scale(&workload).await {
            Ok(replicas) => replicas,
            Err(e) if e.is_not_found() => {
                debug!("{} disappeared during discovery", workload);
                continue;
            }
            Err(e) => return Err(e),
        };

        if replicas == 0 {
            debug!("{} is already scaled to zero, skipping", workload);
            continue;
        }

        info!(
            "{} uses a PVC of storage class {:?} ({} replicas)",
            workload, storage_class, replicas
        );
        workloads.push(workload.with_replicas(replicas));
    }

    Ok(workloads)
}

async fn scan_pods(
    api: &dyn ClusterApi,
    namespace: &str,
    storage_class: &str,
    refs: &mut BTreeSet<WorkloadRef>,
) -> Result<()> {
    for pod in api.list_pods(namespace).await? {
        let Some(claim) = first_matching_claim(api, namespace, &pod, storage_class).await? else {
            continue;
        };

        match resolve_pod_owner(api, namespace, &pod).await? {
            Resolution::Workload(workload) => {
                debug!("Pod {}/{} (claim {}) resolved to {}", namespace, pod.name_any(), claim, workload);
                refs.insert(workload);
            }
            Resolution::Unmanaged { reason } => {
                warn!(
                    "Pod {}/{} mounts {} but cannot be scaled: {}",
                    namespace,
                    pod.name_any(),
                    claim,
                    reason
                );
            }
        }
    }
    Ok(())
}

async fn scan_specs(
    api: &dyn ClusterApi,
    namespace: &str,
    storage_class: &str,
    refs: &mut BTreeSet<WorkloadRef>,
) -> Result<()> {
    for deployment in api.list_deployments(namespace).await? {
        let template = deployment
            .spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref());

        for claim in mounted_claims(template) {
            if pvc_matches_storage_class(api, namespace, claim, storage_class).await? {
                refs.insert(WorkloadRef::new(
                    WorkloadKind::Deployment,
                    namespace,
                    deployment.name_any(),
                ));
                break;
            }
        }
    }

    for sts in api.list_stateful_sets(namespace).await? {
        let templates = sts
            .spec
            .as_ref()
            .and_then(|s| s.volume_claim_templates.as_deref())
            .unwrap_or_default();

        if templates
            .iter()
            .any(|t| claim_has_storage_class(t, storage_class))
        {
            refs.insert(WorkloadRef::new(
                WorkloadKind::StatefulSet,
                namespace,
                sts.name_any(),
            ));
        }
    }

    Ok(())
}
