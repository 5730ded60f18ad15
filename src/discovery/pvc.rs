//! PVC matcher

use crate::domain::ports::ClusterApi;
use crate::error::Result;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, PodSpec};

/// Whether the claim's storage class is exactly `storage_class`
pub fn claim_has_storage_class(pvc: &PersistentVolumeClaim, storage_class: &str) -> bool {
    pvc.spec
        .as_ref()
        .and_then(|s| s.storage_class_name.as_deref())
        == Some(storage_class)
}

/// Look up a claim and compare its storage class
///
/// A claim that does not exist never matches.
pub async fn pvc_matches_storage_class(
    api: &dyn ClusterApi,
    namespace: &str,
    claim: &str,
    storage_class: &str,
) -> Result<bool> {
    Ok(api
        .get_pvc(namespace, claim)
        .await?
        .is_some_and(|pvc| claim_has_storage_class(&pvc, storage_class)))
}

/// Names of the PVCs a pod spec mounts
pub fn mounted_claims(spec: Option<&PodSpec>) -> Vec<&str> {
    spec.and_then(|s| s.volumes.as_deref())
        .unwrap_or_default()
        .iter()
        .filter_map(|v| v.persistent_volume_claim.as_ref())
        .map(|c| c.claim_name.as_str())
        .collect()
}

/// First claim mounted by `pod` that matches the storage class
pub async fn first_matching_claim<'a>(
    api: &dyn ClusterApi,
    namespace: &str,
    pod: &'a Pod,
    storage_class: &str,
) -> Result<Option<&'a str>> {
    for claim in mounted_claims(pod.spec.as_ref()) {
        if pvc_matches_storage_class(api, namespace, claim, storage_class).await? {
            return Ok(Some(claim));
        }
    }
    Ok(None)
}
