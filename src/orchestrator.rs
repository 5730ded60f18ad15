//! Orchestrator
//!
//! Coordinates the three user-facing operations:
//! - `list`: discover matching workloads across namespaces
//! - `down`: discover, record replica counts to the state file, scale to zero
//! - `up`: read the state file and restore each workload
//!
//! Discovery fans out across namespaces with bounded concurrency. A namespace
//! that fails is recorded and does not stop the others. Scaling is serial.

use crate::dataset::Dataset;
use crate::discovery::discover_namespace;
use crate::domain::ports::{ClusterApiRef, Workload};
use crate::error::{Error, Result};
use crate::scaler::{RetryPolicy, Scaler};
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Namespace name that selects every namespace
pub const ALL_NAMESPACES: &str = "all";

// =============================================================================
// Configuration
// =============================================================================

/// Which namespaces to scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceSelector {
    All,
    Named(Vec<String>),
}

impl NamespaceSelector {
    /// Build a selector from CLI values
    ///
    /// An empty list selects all namespaces. `all` cannot be combined with
    /// named namespaces.
    pub fn from_args(values: &[String]) -> Result<Self> {
        if values.is_empty() {
            return Ok(NamespaceSelector::All);
        }

        if values.iter().any(|v| v == ALL_NAMESPACES) {
            if values.len() > 1 {
                return Err(Error::Configuration(
                    "invalid namespace, cannot mix `all` with other namespaces".into(),
                ));
            }
            return Ok(NamespaceSelector::All);
        }

        let mut seen = BTreeSet::new();
        let named = values
            .iter()
            .filter(|v| seen.insert(v.as_str()))
            .cloned()
            .collect();
        Ok(NamespaceSelector::Named(named))
    }
}

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct ScalerConfig {
    /// Namespaces to scan
    pub namespaces: NamespaceSelector,
    /// Storage class whose PVCs select workloads
    pub storage_class: String,
    /// Send writes with `dryRun=All` and skip writing the state file
    pub dry_run: bool,
    /// Maximum namespaces scanned at once
    pub concurrency: usize,
    /// Backoff for scale writes
    pub retry: RetryPolicy,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            namespaces: NamespaceSelector::All,
            storage_class: "default".to_string(),
            dry_run: false,
            concurrency: 10,
            retry: RetryPolicy::default(),
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// A namespace or workload that could not be processed
#[derive(Debug)]
pub struct Failure {
    pub target: String,
    pub error: Error,
}

/// Workloads found by discovery, plus namespaces that failed
#[derive(Debug, Default)]
pub struct Discovery {
    pub workloads: Vec<Workload>,
    pub failures: Vec<Failure>,
}

/// Outcome of a `down` or `up` run
#[derive(Debug, Default)]
pub struct Report {
    /// Workloads scaled successfully
    pub succeeded: Vec<Workload>,
    /// Namespaces or workloads that failed
    pub failures: Vec<Failure>,
    /// Workloads left untouched because the run was cancelled
    pub pending: Vec<Workload>,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.pending.is_empty()
    }

    fn record(&mut self, workload: Workload, result: Result<()>, action: &str) {
        match result {
            Ok(()) => self.succeeded.push(workload),
            Err(Error::Cancelled) => self.pending.push(workload),
            Err(error) => {
                warn!("Failed to {} {}: {}", action, workload.reference(), error);
                self.failures.push(Failure {
                    target: workload.reference().to_string(),
                    error,
                });
            }
        }
    }
}

// =============================================================================
// PvcScaler
// =============================================================================

pub struct PvcScaler {
    api: ClusterApiRef,
    config: ScalerConfig,
    scaler: Scaler,
}

impl PvcScaler {
    pub fn new(api: ClusterApiRef, config: ScalerConfig) -> Self {
        let scaler = Scaler::new(api.clone(), config.dry_run).with_retry(config.retry);
        Self { api, config, scaler }
    }

    /// Concrete namespace names for the configured selector
    pub async fn resolve_namespaces(&self) -> Result<Vec<String>> {
        match &self.config.namespaces {
            NamespaceSelector::All => self.api.list_namespaces().await,
            NamespaceSelector::Named(names) => Ok(names.clone()),
        }
    }

    /// Discover matching workloads in all selected namespaces
    pub async fn discover(&self, cancel: &CancellationToken) -> Result<Discovery> {
        let namespaces = self.resolve_namespaces().await?;
        let storage_class = self.config.storage_class.as_str();
        let api = self.api.as_ref();

        info!(
            "Scanning {} namespaces for PVCs of storage class {:?}",
            namespaces.len(),
            storage_class
        );

        let results: Vec<(String, Result<Vec<Workload>>)> = stream::iter(namespaces)
            .take_until(cancel.cancelled())
            .map(|namespace| async move {
                let result = discover_namespace(api, &namespace, storage_class).await;
                (namespace, result)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut discovery = Discovery::default();
        for (namespace, result) in results {
            match result {
                Ok(workloads) => {
                    debug!("Namespace {}: {} workloads", namespace, workloads.len());
                    discovery.workloads.extend(workloads);
                }
                Err(error) => {
                    warn!("Discovery failed in namespace {}: {}", namespace, error);
                    discovery.failures.push(Failure {
                        target: format!("namespace {namespace}"),
                        error,
                    });
                }
            }
        }

        discovery.workloads.sort_by_key(Workload::reference);
        discovery.workloads.dedup();
        discovery.failures.sort_by(|a, b| a.target.cmp(&b.target));
        Ok(discovery)
    }

    /// Report matching workloads without changing anything
    pub async fn list(&self, cancel: &CancellationToken) -> Result<Discovery> {
        let discovery = self.discover(cancel).await?;
        info!(
            "Found {} workloads using storage class {:?}",
            discovery.workloads.len(),
            self.config.storage_class
        );
        Ok(discovery)
    }

    /// Discover, record, and scale matching workloads to zero
    ///
    /// The state file is written before any workload is touched. An empty
    /// discovery writes `[]` only when no state file exists yet, so a repeated
    /// run never clobbers a previous state file, not even with `overwrite`.
    /// Workloads not scaled when `cancel` fires are reported as pending.
    pub async fn down(
        &self,
        state_file: &Path,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> Result<Report> {
        let discovery = self.discover(cancel).await?;
        let mut report = Report {
            failures: discovery.failures,
            ..Report::default()
        };

        if discovery.workloads.is_empty() {
            info!("No workloads to scale down");
            if !self.config.dry_run {
                match Dataset::default().write_to_file(state_file, false).await {
                    Ok(()) => {}
                    Err(Error::StateFileExists(_)) => {
                        debug!("Keeping existing state file {}", state_file.display());
                    }
                    Err(e) => return Err(e),
                }
            }
            return Ok(report);
        }

        let dataset = Dataset::new(discovery.workloads);
        if self.config.dry_run {
            info!(
                "Dry run: not writing state file {}:\n{}",
                state_file.display(),
                dataset.to_json()?
            );
        } else {
            dataset.write_to_file(state_file, overwrite).await?;
        }

        for workload in dataset.into_workloads() {
            if cancel.is_cancelled() {
                report.pending.push(workload);
                continue;
            }

            let result = self.scaler.scale_down(&workload.reference(), cancel).await;
            report.record(workload, result, "scale down");
        }

        if !report.pending.is_empty() {
            warn!(
                "Cancelled: {} workloads were not scaled down",
                report.pending.len()
            );
        }
        Ok(report)
    }

    /// Restore every workload in the state file to its recorded replicas
    pub async fn up(&self, state_file: &Path, cancel: &CancellationToken) -> Result<Report> {
        let dataset = Dataset::read_from_file(state_file).await?;
        info!(
            "Restoring {} workloads from {}",
            dataset.len(),
            state_file.display()
        );

        let mut report = Report::default();
        for workload in dataset.into_workloads() {
            if cancel.is_cancelled() {
                report.pending.push(workload);
                continue;
            }

            let result = self
                .scaler
                .scale_up(&workload.reference(), workload.replicas, cancel)
                .await;
            report.record(workload, result, "scale up");
        }

        if !report.pending.is_empty() {
            warn!(
                "Cancelled: {} workloads were not scaled up",
                report.pending.len()
            );
        }
        Ok(report)
    }
}
