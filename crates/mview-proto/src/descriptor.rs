//! Remote descriptors for queue pairs and registered memory regions.

use serde::{Deserialize, Serialize};

use mview_types::{QpNum, Rkey};

/// Identity of one queue pair, handed to the peer so it can drive its own
/// end of the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePairDescriptor {
    /// Channel number of the queue pair.
    pub qp_num: QpNum,
    /// Local address identity (GID for RoCE, formatted as text).
    pub gid: String,
}

impl QueuePairDescriptor {
    /// Serialize a set of descriptors to a JSON string for out-of-band
    /// exchange (file drop, control-plane response body).
    pub fn save_set(descriptors: &[QueuePairDescriptor]) -> serde_json::Result<String> {
        serde_json::to_string_pretty(descriptors)
    }

    /// Inverse of [`QueuePairDescriptor::save_set`].
    pub fn load_set(json: &str) -> serde_json::Result<Vec<QueuePairDescriptor>> {
        serde_json::from_str(json)
    }
}

/// A remotely readable memory region: where it is, the key that unlocks it,
/// and how long it is.
///
/// The address is a wire token only meaningful to the transport that issued
/// it; local code never dereferences it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionDescriptor {
    /// Name identifier for this region.
    pub name: String,
    /// Remote address token.
    pub addr: u64,
    /// Remote key authorizing one-sided reads.
    pub rkey: Rkey,
    /// Region length in bytes.
    pub length: u64,
}

impl RegionDescriptor {
    /// Return a sub-range of this region, or `None` if it does not fit.
    pub fn subrange(&self, offset: u64, length: u64) -> Option<RegionDescriptor> {
        if offset.checked_add(length)? > self.length {
            return None;
        }
        Some(RegionDescriptor {
            name: self.name.clone(),
            addr: self.addr + offset,
            rkey: self.rkey,
            length,
        })
    }
}
