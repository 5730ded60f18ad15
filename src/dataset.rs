//! State file
//!
//! The dataset is the contract between `down` and `up`: a pretty-printed JSON
//! array of `{kind, name, namespace, replicas}` records.

use crate::domain::ports::Workload;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Workloads recorded by a scale-down
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    workloads: Vec<Workload>,
}

impl Dataset {
    pub fn new(workloads: Vec<Workload>) -> Self {
        Self { workloads }
    }

    pub fn workloads(&self) -> &[Workload] {
        &self.workloads
    }

    pub fn into_workloads(self) -> Vec<Workload> {
        self.workloads
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }

    /// Serialize with 2-space indentation
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.workloads)?)
    }

    /// Parse a state file body
    ///
    /// `null` is accepted as an empty dataset. Negative replica counts are
    /// rejected.
    pub fn from_json(data: &str) -> Result<Self> {
        let workloads: Option<Vec<Workload>> = serde_json::from_str(data)?;
        let workloads = workloads.unwrap_or_default();

        if let Some(bad) = workloads.iter().find(|w| w.replicas < 0) {
            return Err(Error::InvalidReplicas {
                workload: bad.reference().to_string(),
                replicas: bad.replicas,
            });
        }

        Ok(Self { workloads })
    }

    /// Write the dataset to `path`
    ///
    /// Fails with [`Error::StateFileExists`] if the file exists and
    /// `overwrite` is false. The file is written to a sibling temp file and
    /// moved into place; without `overwrite` the move never replaces a file,
    /// even one created after the existence check.
    pub async fn write_to_file(&self, path: &Path, overwrite: bool) -> Result<()> {
        let io_err = |source| Error::StateFile {
            path: path.to_path_buf(),
            source,
        };

        if !overwrite && fs::try_exists(path).await.map_err(io_err)? {
            return Err(Error::StateFileExists(path.to_path_buf()));
        }

        let tmp = temp_path(path).ok_or_else(|| {
            io_err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path has no file name",
            ))
        })?;

        let mut body = self.to_json()?;
        body.push('\n');

        fs::write(&tmp, body).await.map_err(io_err)?;
        persist(&tmp, path, overwrite).await?;

        info!("Wrote {} workloads to {}", self.len(), path.display());
        Ok(())
    }

    /// Read a dataset previously written by [`Dataset::write_to_file`]
    pub async fn read_from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .await
            .map_err(|source| Error::StateFile {
                path: path.to_path_buf(),
                source,
            })?;

        let dataset = Self::from_json(&data)?;
        debug!("Read {} workloads from {}", dataset.len(), path.display());
        Ok(dataset)
    }
}

impl From<Vec<Workload>> for Dataset {
    fn from(workloads: Vec<Workload>) -> Self {
        Self::new(workloads)
    }
}

fn temp_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_string_lossy();
    Some(path.with_file_name(format!(".{name}.tmp")))
}

/// Move `tmp` to `path`
///
/// `hard_link` fails with `AlreadyExists` rather than replacing `path`.
async fn persist(tmp: &Path, path: &Path, overwrite: bool) -> Result<()> {
    let result = if overwrite {
        fs::rename(tmp, path).await
    } else {
        fs::hard_link(tmp, path).await
    };
    let _ = fs::remove_file(tmp).await;

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            Err(Error::StateFileExists(path.to_path_buf()))
        }
        Err(source) => Err(Error::StateFile {
            path: path.to_path_buf(),
            source,
        }),
    }
}
