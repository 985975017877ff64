//! Shared-memory pool and page allocator.
//!
//! One contiguous pool is carved into fixed-size pages, one page per
//! workload. Records are appended in arrival order and never moved; pages
//! are never reclaimed individually — whole-pool teardown is the only
//! release path. The allocator is the single writer of page occupancy.

pub mod allocator;
pub mod error;
pub mod handle;
pub mod pool;
pub mod registry;

pub use allocator::{PageAllocator, PageState};
pub use error::ShmError;
pub use handle::MetricHandle;
pub use pool::SharedPool;
pub use registry::MetricRegistry;
