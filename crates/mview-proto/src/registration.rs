//! Metric registration request/response pair.
//!
//! A producer submits a registration once per metric; the response tells it
//! which pool it landed in and the byte offset of the value field, which it
//! may then update directly without further round trips.

use serde::{Deserialize, Serialize};

use mview_codec::MetricKind;
use mview_types::WorkloadId;

/// Request to register one metric for a workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRegistration {
    pub workload_id: WorkloadId,
    pub name: String,
    pub kind: MetricKind,
    /// Initial value written at registration time.
    pub value: f64,
}

/// Where the registered metric lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricLocation {
    /// Identity of the shared pool holding the record.
    pub pool_name: String,
    /// Absolute byte offset of the value field from the pool base.
    pub value_byte_offset: usize,
}
