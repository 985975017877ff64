use std::time::Duration;

use thiserror::Error;

/// Errors from the RDMA layer.
#[derive(Debug, Error)]
pub enum RdmaError {
    /// Region size does not divide the pool into whole pages.
    #[error("invalid region size: {mr_size} bytes is not a multiple of page size {page_size}")]
    InvalidRegionSize { mr_size: usize, page_size: usize },

    /// Descriptors and regions disagree about geometry.
    #[error("region mismatch: {0}")]
    RegionMismatch(String),

    /// A region has not been registered yet.
    #[error("region {0} is not registered")]
    NotRegistered(u32),

    /// The connection state machine could not reach ready-to-send.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// Queue pair index outside the pool.
    #[error("queue pair index {index} out of range (pool size {size})")]
    QpIndexOutOfRange { index: usize, size: usize },

    /// The queue pair is not in a state that allows posting reads.
    #[error("queue pair {0} is not connected")]
    NotConnected(u32),

    /// Posted reads did not all complete within the deadline.
    #[error("read timed out after {waited:?}")]
    ReadTimeout { waited: Duration },

    /// A work request completed with an error, or the transport itself
    /// failed.
    #[error("transport error: {0}")]
    Transport(String),
}
