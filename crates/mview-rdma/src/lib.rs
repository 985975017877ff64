//! RDMA plumbing for remote metric collection: memory-region registration,
//! queue-pair pool and handshake, and the batched one-sided reader.
//!
//! All hardware interaction goes through the [`Transport`] trait. The
//! default [`LoopbackTransport`] completes one-sided reads directly from a
//! registered [`mview_shm::SharedPool`], so everything here compiles and
//! tests without `libibverbs`; a verbs-backed transport sits behind the
//! `verbs` feature flag.

pub mod config;
pub mod error;
pub mod qp;
pub mod reader;
pub mod region;
pub mod transport;

pub use config::RdmaConfig;
pub use error::RdmaError;
pub use qp::{QpState, QueuePair, QueuePairPool, QueuePairStatus};
pub use reader::OneSidedReader;
pub use region::{MemoryRegion, MemoryRegionRegistry};
pub use transport::{Completion, LoopbackTransport, Transport, VerbsTransport};
