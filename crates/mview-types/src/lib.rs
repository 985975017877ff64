//! Core identifier types shared across the mview crates.

pub mod ids;
pub mod workload;

pub use ids::*;
pub use workload::WorkloadId;
