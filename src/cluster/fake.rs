//! In-memory cluster for tests
//!
//! Holds `k8s-openapi` objects in maps and implements [`ClusterApi`] over them.
//! Namespaces can be marked as failing and scale writes can be made to fail a
//! number of times before succeeding. Pod listing can be slowed down to
//! observe how many namespaces are scanned at once.

use crate::domain::ports::{ClusterApi, WorkloadKind, WorkloadRef};
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentSpec, ReplicaSet, StatefulSet, StatefulSetSpec,
};
use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource, Pod,
    PodSpec, PodTemplateSpec, Volume,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::error::ErrorResponse;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// A recorded `set_scale` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleCall {
    pub workload: WorkloadRef,
    pub replicas: i32,
    pub dry_run: bool,
}

#[derive(Default)]
struct State {
    namespaces: BTreeSet<String>,
    pods: BTreeMap<Key, Pod>,
    replica_sets: BTreeMap<Key, ReplicaSet>,
    pvcs: BTreeMap<Key, PersistentVolumeClaim>,
    deployments: BTreeMap<Key, Deployment>,
    stateful_sets: BTreeMap<Key, StatefulSet>,
    failing_namespaces: BTreeSet<String>,
    scale_failures: BTreeMap<WorkloadRef, (u32, u16)>,
    scale_calls: Vec<ScaleCall>,
    list_delay: Duration,
}

#[derive(Default)]
pub struct FakeCluster {
    state: RwLock<State>,
    pod_lists_in_flight: AtomicUsize,
    max_pod_lists_in_flight: AtomicUsize,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_namespace(&self, namespace: &str) {
        self.state.write().namespaces.insert(namespace.to_string());
    }

    pub fn add_pod(&self, pod: Pod) {
        let mut state = self.state.write();
        let k = object_key(&pod.metadata);
        state.namespaces.insert(k.0.clone());
        state.pods.insert(k, pod);
    }

    pub fn add_replica_set(&self, rs: ReplicaSet) {
        let k = object_key(&rs.metadata);
        self.state.write().replica_sets.insert(k, rs);
    }

    pub fn add_pvc(&self, pvc: PersistentVolumeClaim) {
        let k = object_key(&pvc.metadata);
        self.state.write().pvcs.insert(k, pvc);
    }

    pub fn add_deployment(&self, deployment: Deployment) {
        let mut state = self.state.write();
        let k = object_key(&deployment.metadata);
        state.namespaces.insert(k.0.clone());
        state.deployments.insert(k, deployment);
    }

    pub fn add_stateful_set(&self, sts: StatefulSet) {
        let mut state = self.state.write();
        let k = object_key(&sts.metadata);
        state.namespaces.insert(k.0.clone());
        state.stateful_sets.insert(k, sts);
    }

    /// Every list call in this namespace fails with a server error
    pub fn fail_namespace(&self, namespace: &str) {
        self.state.write().failing_namespaces.insert(namespace.to_string());
    }

    /// The next `times` scale writes to `workload` fail with HTTP `code`
    pub fn fail_scale(&self, workload: WorkloadRef, times: u32, code: u16) {
        self.state.write().scale_failures.insert(workload, (times, code));
    }

    /// Every `list_pods` call sleeps for `delay`
    pub fn delay_pod_lists(&self, delay: Duration) {
        self.state.write().list_delay = delay;
    }

    /// Highest number of `list_pods` calls seen running at the same time
    pub fn max_pod_lists_in_flight(&self) -> usize {
        self.max_pod_lists_in_flight.load(Ordering::SeqCst)
    }

    pub fn scale_calls(&self) -> Vec<ScaleCall> {
        self.state.read().scale_calls.clone()
    }

    /// Current replicas without going through the port
    pub fn replicas(&self, workload: &WorkloadRef) -> Option<i32> {
        let state = self.state.read();
        let k = key(&workload.namespace, &workload.name);
        match workload.kind {
            WorkloadKind::Deployment => state
                .deployments
                .get(&k)
                .map(|d| d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1)),
            WorkloadKind::StatefulSet => state
                .stateful_sets
                .get(&k)
                .map(|s| s.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1)),
        }
    }

    fn check_namespace(&self, namespace: &str) -> Result<()> {
        if self.state.read().failing_namespaces.contains(namespace) {
            return Err(api_error(500, &format!("namespace {namespace} unavailable")));
        }
        Ok(())
    }
}

fn object_key(meta: &ObjectMeta) -> Key {
    key(
        meta.namespace.as_deref().unwrap_or("default"),
        meta.name.as_deref().unwrap_or_default(),
    )
}

fn api_error(code: u16, message: &str) -> Error {
    Error::Kube(kube::Error::Api(ErrorResponse {
        status: "Failure".into(),
        message: message.into(),
        reason: "Fake".into(),
        code,
    }))
}

fn in_namespace<T: Clone>(map: &BTreeMap<Key, T>, namespace: &str) -> Vec<T> {
    map.iter()
        .filter(|((ns, _), _)| ns == namespace)
        .map(|(_, v)| v.clone())
        .collect()
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(self.state.read().namespaces.iter().cloned().collect())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
        self.check_namespace(namespace)?;

        let delay = self.state.read().list_delay;
        let running = self.pod_lists_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_pod_lists_in_flight.fetch_max(running, Ordering::SeqCst);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.pod_lists_in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(in_namespace(&self.state.read().pods, namespace))
    }

    async fn get_replica_set(&self, namespace: &str, name: &str) -> Result<Option<ReplicaSet>> {
        Ok(self.state.read().replica_sets.get(&key(namespace, name)).cloned())
    }

    async fn get_pvc(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>> {
        Ok(self.state.read().pvcs.get(&key(namespace, name)).cloned())
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>> {
        self.check_namespace(namespace)?;
        Ok(in_namespace(&self.state.read().deployments, namespace))
    }

    async fn list_stateful_sets(&self, namespace: &str) -> Result<Vec<StatefulSet>> {
        self.check_namespace(namespace)?;
        Ok(in_namespace(&self.state.read().stateful_sets, namespace))
    }

    async fn get_scale(&self, workload: &WorkloadRef) -> Result<i32> {
        self.replicas(workload).ok_or_else(|| Error::ResourceNotFound {
            kind: workload.kind.to_string(),
            name: format!("{}/{}", workload.namespace, workload.name),
        })
    }

    async fn set_scale(&self, workload: &WorkloadRef, replicas: i32, dry_run: bool) -> Result<()> {
        let mut state = self.state.write();
        state.scale_calls.push(ScaleCall {
            workload: workload.clone(),
            replicas,
            dry_run,
        });

        if let Some((remaining, code)) = state.scale_failures.get_mut(workload) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(api_error(*code, "injected scale failure"));
            }
        }

        let k = key(&workload.namespace, &workload.name);
        let spec_replicas = match workload.kind {
            WorkloadKind::Deployment => state
                .deployments
                .get_mut(&k)
                .map(|d| &mut d.spec.get_or_insert_with(Default::default).replicas),
            WorkloadKind::StatefulSet => state
                .stateful_sets
                .get_mut(&k)
                .map(|s| &mut s.spec.get_or_insert_with(Default::default).replicas),
        };

        match spec_replicas {
            Some(slot) => {
                if !dry_run {
                    *slot = Some(replicas);
                }
                Ok(())
            }
            None => Err(Error::ResourceNotFound {
                kind: workload.kind.to_string(),
                name: format!("{}/{}", workload.namespace, workload.name),
            }),
        }
    }
}

// =============================================================================
// Object Builders
// =============================================================================

fn meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

fn owner(kind: &str, name: &str, controller: bool) -> OwnerReference {
    OwnerReference {
        api_version: "apps/v1".to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
        uid: format!("uid-{name}"),
        controller: Some(controller),
        ..Default::default()
    }
}

fn claim_volumes(claims: &[&str]) -> Option<Vec<Volume>> {
    Some(
        claims
            .iter()
            .map(|claim| Volume {
                name: claim.to_string(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: claim.to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .collect(),
    )
}

/// A pod with an optional controlling owner, mounting the given claims
pub fn pod(namespace: &str, name: &str, controller: Option<(&str, &str)>, claims: &[&str]) -> Pod {
    let mut metadata = meta(namespace, name);
    metadata.owner_references = controller.map(|(kind, n)| vec![owner(kind, n, true)]);
    Pod {
        metadata,
        spec: Some(PodSpec {
            volumes: claim_volumes(claims),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A ReplicaSet, optionally controlled by a Deployment
pub fn replica_set(namespace: &str, name: &str, deployment: Option<&str>) -> ReplicaSet {
    let mut metadata = meta(namespace, name);
    metadata.owner_references = deployment.map(|d| vec![owner("Deployment", d, true)]);
    ReplicaSet {
        metadata,
        ..Default::default()
    }
}

pub fn pvc(namespace: &str, name: &str, storage_class: Option<&str>) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: meta(namespace, name),
        spec: Some(PersistentVolumeClaimSpec {
            storage_class_name: storage_class.map(str::to_string),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A Deployment whose pod template mounts the given claims
pub fn deployment(namespace: &str, name: &str, replicas: i32, claims: &[&str]) -> Deployment {
    Deployment {
        metadata: meta(namespace, name),
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            template: PodTemplateSpec {
                spec: Some(PodSpec {
                    volumes: claim_volumes(claims),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A StatefulSet with one volume claim template per storage class given
pub fn stateful_set(
    namespace: &str,
    name: &str,
    replicas: i32,
    template_classes: &[Option<&str>],
) -> StatefulSet {
    let templates = template_classes
        .iter()
        .enumerate()
        .map(|(i, class)| PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(format!("data-{i}")),
                ..Default::default()
            },
            spec: Some(PersistentVolumeClaimSpec {
                storage_class_name: class.map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect::<Vec<_>>();

    StatefulSet {
        metadata: meta(namespace, name),
        spec: Some(StatefulSetSpec {
            replicas: Some(replicas),
            service_name: name.to_string(),
            volume_claim_templates: (!templates.is_empty()).then_some(templates),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Add an owner reference that is not flagged as controller
pub fn with_extra_owner(mut pod: Pod, kind: &str, name: &str) -> Pod {
    pod.metadata
        .owner_references
        .get_or_insert_with(Vec::new)
        .insert(0, owner(kind, name, false));
    pod
}
