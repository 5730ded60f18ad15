//! Domain layer - Workload types and the cluster port
//!
//! This module defines the types shared by discovery, scaling and the state
//! file, plus the trait that cluster adapters implement.

pub mod ports;

pub use ports::*;
