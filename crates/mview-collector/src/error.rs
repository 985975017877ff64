use thiserror::Error;

use mview_codec::CodecError;
use mview_rdma::RdmaError;

/// Errors from planning and running a collector.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// A page maps to a region index past the registered region list.
    #[error("region index {index} out of range ({regions} regions)")]
    RegionOutOfRange { index: usize, regions: usize },

    /// Page geometry and region descriptors disagree.
    #[error("geometry mismatch: {0}")]
    GeometryMismatch(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Rdma(#[from] RdmaError),

    #[error("export failed: {0}")]
    Export(String),
}
