//! Kubernetes cluster adapter
//!
//! Implements [`ClusterApi`] on top of `kube::Api`. Replica counts are read and
//! written exclusively through the scale subresource.

use crate::domain::ports::{ClusterApi, WorkloadKind, WorkloadRef};
use crate::error::{is_kube_not_found, Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::autoscaling::v1::Scale;
use k8s_openapi::api::core::v1::{Namespace, PersistentVolumeClaim, Pod};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::fmt::Debug;
use std::path::PathBuf;
use tracing::{debug, info};

// =============================================================================
// Configuration
// =============================================================================

/// How to reach the cluster
#[derive(Debug, Clone, Default)]
pub struct ClusterConfig {
    /// Explicit kubeconfig path; falls back to in-cluster / `~/.kube/config`
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context to use instead of the current one
    pub context: Option<String>,
}

/// Build a kube client from the configuration
pub async fn connect(config: &ClusterConfig) -> Result<Client> {
    let options = KubeConfigOptions {
        context: config.context.clone(),
        ..KubeConfigOptions::default()
    };

    let client = match (&config.kubeconfig, &config.context) {
        (Some(path), _) => {
            info!("Loading kubeconfig from {}", path.display());
            let kubeconfig = Kubeconfig::read_from(path)?;
            let cfg = Config::from_custom_kubeconfig(kubeconfig, &options).await?;
            Client::try_from(cfg)?
        }
        (None, Some(_)) => {
            let cfg = Config::from_kubeconfig(&options).await?;
            Client::try_from(cfg)?
        }
        (None, None) => Client::try_default().await?,
    };

    Ok(client)
}

// =============================================================================
// Kube Adapter
// =============================================================================

/// [`ClusterApi`] backed by a live Kubernetes API server
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn read_scale<K>(&self, workload: &WorkloadRef) -> Result<Scale>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        self.namespaced::<K>(&workload.namespace)
            .get_scale(&workload.name)
            .await
            .map_err(|e| not_found_or(e, workload))
    }

    async fn write_scale<K>(&self, workload: &WorkloadRef, replicas: i32, dry_run: bool) -> Result<Scale>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let params = PatchParams {
            dry_run,
            ..PatchParams::default()
        };
        let patch = Patch::Merge(json!({ "spec": { "replicas": replicas } }));

        self.namespaced::<K>(&workload.namespace)
            .patch_scale(&workload.name, &params, &patch)
            .await
            .map_err(|e| not_found_or(e, workload))
    }
}

fn not_found_or(err: kube::Error, workload: &WorkloadRef) -> Error {
    if is_kube_not_found(&err) {
        Error::ResourceNotFound {
            kind: workload.kind.to_string(),
            name: format!("{}/{}", workload.namespace, workload.name),
        }
    } else {
        Error::Kube(err)
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items.iter().map(|ns| ns.name_any()).collect())
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
        let list = self.namespaced::<Pod>(namespace).list(&ListParams::default()).await?;
        debug!("Listed {} pods in {}", list.items.len(), namespace);
        Ok(list.items)
    }

    async fn get_replica_set(&self, namespace: &str, name: &str) -> Result<Option<ReplicaSet>> {
        Ok(self.namespaced::<ReplicaSet>(namespace).get_opt(name).await?)
    }

    async fn get_pvc(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>> {
        Ok(self
            .namespaced::<PersistentVolumeClaim>(namespace)
            .get_opt(name)
            .await?)
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>> {
        let list = self
            .namespaced::<Deployment>(namespace)
            .list(&ListParams::default())
            .await?;
        Ok(list.items)
    }

    async fn list_stateful_sets(&self, namespace: &str) -> Result<Vec<StatefulSet>> {
        let list = self
            .namespaced::<StatefulSet>(namespace)
            .list(&ListParams::default())
            .await?;
        Ok(list.items)
    }

    async fn get_scale(&self, workload: &WorkloadRef) -> Result<i32> {
        let scale = match workload.kind {
            WorkloadKind::Deployment => self.read_scale::<Deployment>(workload).await?,
            WorkloadKind::StatefulSet => self.read_scale::<StatefulSet>(workload).await?,
        };
        Ok(scale.spec.and_then(|s| s.replicas).unwrap_or(0))
    }

    async fn set_scale(&self, workload: &WorkloadRef, replicas: i32, dry_run: bool) -> Result<()> {
        match workload.kind {
            WorkloadKind::Deployment => {
                self.write_scale::<Deployment>(workload, replicas, dry_run).await?;
            }
            WorkloadKind::StatefulSet => {
                self.write_scale::<StatefulSet>(workload, replicas, dry_run).await?;
            }
        }
        Ok(())
    }
}
