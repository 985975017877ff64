use mview_types::WorkloadId;
use thiserror::Error;

/// Errors from the shared pool and page allocator.
#[derive(Debug, Error)]
pub enum ShmError {
    /// All page slots in the pool are allocated.
    #[error("pool exhausted: all {max_pages} pages allocated")]
    PoolExhausted { max_pages: usize },

    /// The workload's page has no free record slots left.
    #[error("page full for workload {workload}: capacity {capacity}")]
    PageFull {
        workload: WorkloadId,
        capacity: usize,
    },

    /// A page already exists for this workload.
    #[error("workload {0} already owns a page")]
    WorkloadExists(WorkloadId),

    /// No page exists for this workload.
    #[error("unknown workload {0}")]
    UnknownWorkload(WorkloadId),

    /// An access would fall outside the pool buffer.
    #[error("out of bounds: offset {offset} + len {len} exceeds pool size {pool_len}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        pool_len: usize,
    },

    /// The pool/page/region sizes are inconsistent.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// A record failed to encode.
    #[error(transparent)]
    Codec(#[from] mview_codec::CodecError),
}
