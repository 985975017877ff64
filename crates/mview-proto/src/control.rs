//! Page geometry metadata: the contract that lets a collector slice raw
//! region bytes back into typed pages.

use serde::{Deserialize, Serialize};

use mview_types::WorkloadId;

/// The allocator-side geometry of one page, as published to collectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageGeometry {
    /// Owning workload.
    pub workload_id: WorkloadId,
    /// Byte offset of the page from the pool base.
    pub page_offset: usize,
    /// Number of records written so far.
    pub occupancy: usize,
    /// Maximum number of records the page holds.
    pub capacity: usize,
}

/// What a collector needs to decode one page inside a read result: whose
/// page it is, how many records are live, and how wide the page window is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageControl {
    pub workload_id: WorkloadId,
    pub occupancy: usize,
    pub page_size_bytes: usize,
}

/// Per-read-target page lists, in the same order as the descriptors the
/// reader was assigned. `control_info[i][j]` describes the page at relative
/// slot `j` inside read result `i`.
pub type ControlInfo = Vec<Vec<PageControl>>;
