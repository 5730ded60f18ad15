//! Workload discovery
//!
//! - `owner`: Pod → controlling workload resolution
//! - `pvc`: storage class matching for claims
//! - `scan`: per-namespace discovery combining both

pub mod owner;
pub mod pvc;
pub mod scan;

pub use owner::{controller_of, resolve_pod_owner, Resolution};
pub use pvc::{claim_has_storage_class, pvc_matches_storage_class};
pub use scan::discover_namespace;
