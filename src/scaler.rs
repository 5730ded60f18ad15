//! Scaler
//!
//! Reads and writes workload replica counts through the scale subresource.
//! Writes that fail with a transient API error are retried with exponential
//! backoff until the retry budget runs out or the run is cancelled.

use crate::domain::ports::{ClusterApiRef, WorkloadRef};
use crate::error::{Error, Result};
use backoff::ExponentialBackoff;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// =============================================================================
// Retry Policy
// =============================================================================

/// Backoff settings for scale writes
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub initial_interval: Duration,
    /// Give up once this much time has passed since the first attempt
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_elapsed: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_interval,
            current_interval: self.initial_interval,
            max_elapsed_time: Some(self.max_elapsed),
            ..ExponentialBackoff::default()
        }
    }
}

// =============================================================================
// Scaler
// =============================================================================

pub struct Scaler {
    api: ClusterApiRef,
    dry_run: bool,
    retry: RetryPolicy,
}

impl Scaler {
    pub fn new(api: ClusterApiRef, dry_run: bool) -> Self {
        Self {
            api,
            dry_run,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Desired replicas currently set on the workload
    pub async fn current_replicas(&self, workload: &WorkloadRef) -> Result<i32> {
        self.api.get_scale(workload).await
    }

    /// Scale the workload to zero replicas
    pub async fn scale_down(
        &self,
        workload: &WorkloadRef,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.scale(workload, 0, cancel).await
    }

    /// Restore the workload to `replicas`
    pub async fn scale_up(
        &self,
        workload: &WorkloadRef,
        replicas: i32,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.scale(workload, replicas, cancel).await
    }

    /// Set replicas, retrying transient failures
    ///
    /// Returns [`Error::Cancelled`] as soon as `cancel` fires, including while
    /// waiting between retries.
    async fn scale(
        &self,
        workload: &WorkloadRef,
        replicas: i32,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if replicas < 0 {
            return Err(Error::InvalidReplicas {
                workload: workload.to_string(),
                replicas,
            });
        }

        let attempts = backoff::future::retry(self.retry.backoff(), || async {
            self.api
                .set_scale(workload, replicas, self.dry_run)
                .await
                .map_err(|e| {
                    if e.is_transient() {
                        warn!("Scaling {} failed, retrying: {}", workload, e);
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
        });

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = attempts => result,
        };

        // A transient error here means the retry budget ran out.
        result.map_err(|e| {
            if e.is_transient() {
                Error::ScaleFailed {
                    workload: workload.to_string(),
                    source: Box::new(e),
                }
            } else {
                e
            }
        })?;

        if self.dry_run {
            info!("{} would be scaled to {} (dry run)", workload, replicas);
        } else {
            info!("{} scaled to {}", workload, replicas);
        }
        Ok(())
    }
}
