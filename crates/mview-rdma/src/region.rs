//! Memory region registry: partitions the shared pool into fixed-size
//! regions and registers each one with the transport for remote read.

use std::sync::Arc;

use parking_lot::Mutex;

use mview_proto::RegionDescriptor;
use mview_shm::SharedPool;
use mview_types::RegionId;

use crate::error::RdmaError;
use crate::transport::Transport;

/// One registered slice of the pool.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    pub id: RegionId,
    /// Offset of the region within the pool.
    pub byte_offset: usize,
    pub length: usize,
    pub descriptor: RegionDescriptor,
}

/// Partitions a [`SharedPool`] into regions of `mr_size_bytes` each and
/// tracks their registrations. Region order always follows pool offset
/// order, so region index `i` covers bytes `[i * mr_size, (i+1) * mr_size)`.
pub struct MemoryRegionRegistry {
    transport: Arc<dyn Transport>,
    pool: SharedPool,
    mr_size: usize,
    regions: Mutex<Vec<MemoryRegion>>,
}

impl std::fmt::Debug for MemoryRegionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegionRegistry")
            .field("mr_size", &self.mr_size)
            .finish_non_exhaustive()
    }
}

impl MemoryRegionRegistry {
    /// Validate the partition geometry. Registration itself is deferred to
    /// [`MemoryRegionRegistry::register_all`].
    pub fn new(
        transport: Arc<dyn Transport>,
        pool: SharedPool,
        mr_size_bytes: usize,
    ) -> Result<Self, RdmaError> {
        let page_size = pool.page_size();
        if mr_size_bytes == 0 || mr_size_bytes % page_size != 0 {
            return Err(RdmaError::InvalidRegionSize {
                mr_size: mr_size_bytes,
                page_size,
            });
        }
        if pool.len() % mr_size_bytes != 0 {
            return Err(RdmaError::RegionMismatch(format!(
                "pool size {} is not a whole number of {mr_size_bytes}-byte regions",
                pool.len()
            )));
        }

        Ok(Self {
            transport,
            pool,
            mr_size: mr_size_bytes,
            regions: Mutex::new(Vec::new()),
        })
    }

    pub fn mr_size(&self) -> usize {
        self.mr_size
    }

    pub fn num_regions(&self) -> usize {
        self.pool.len() / self.mr_size
    }

    /// Register every region with the transport. All-or-nothing: a failure
    /// part way through rolls back the registrations already made.
    pub fn register_all(&self) -> Result<Vec<RegionDescriptor>, RdmaError> {
        let mut regions = self.regions.lock();
        if !regions.is_empty() {
            return Err(RdmaError::RegionMismatch(
                "regions already registered".to_string(),
            ));
        }

        let mut registered = Vec::with_capacity(self.num_regions());
        for i in 0..self.num_regions() {
            let byte_offset = i * self.mr_size;
            let name = format!("{}-mr-{i}", self.pool.name());
            match self
                .transport
                .register_region(&self.pool, byte_offset, self.mr_size, &name)
            {
                Ok(descriptor) => registered.push(MemoryRegion {
                    id: RegionId(i as u32),
                    byte_offset,
                    length: self.mr_size,
                    descriptor,
                }),
                Err(e) => {
                    tracing::error!(region = i, error = %e, "region registration failed, rolling back");
                    for region in &registered {
                        if let Err(e) = self.transport.unregister_region(&region.descriptor) {
                            tracing::warn!(region = %region.id, error = %e, "rollback unregister failed");
                        }
                    }
                    return Err(e);
                }
            }
        }

        tracing::info!(
            regions = registered.len(),
            mr_size = self.mr_size,
            pool = self.pool.name(),
            "registered memory regions"
        );
        let descriptors = registered.iter().map(|r| r.descriptor.clone()).collect();
        *regions = registered;
        Ok(descriptors)
    }

    /// Descriptors in pool offset order. Empty before registration.
    pub fn list(&self) -> Vec<RegionDescriptor> {
        self.regions
            .lock()
            .iter()
            .map(|r| r.descriptor.clone())
            .collect()
    }

    /// Split a pool byte range into remote read targets, one per region it
    /// touches. Targets come back in pool offset order.
    pub fn read_targets(
        &self,
        byte_offset: usize,
        length: usize,
    ) -> Result<Vec<RegionDescriptor>, RdmaError> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let end = byte_offset
            .checked_add(length)
            .filter(|&end| end <= self.pool.len())
            .ok_or_else(|| {
                RdmaError::RegionMismatch(format!(
                    "range {byte_offset}+{length} exceeds pool size {}",
                    self.pool.len()
                ))
            })?;

        let regions = self.regions.lock();
        let mut targets = Vec::new();
        let mut cursor = byte_offset;
        while cursor < end {
            let index = cursor / self.mr_size;
            let region = regions
                .get(index)
                .ok_or(RdmaError::NotRegistered(index as u32))?;
            let within = cursor - region.byte_offset;
            let take = (end - cursor).min(self.mr_size - within);
            let target = region
                .descriptor
                .subrange(within as u64, take as u64)
                .ok_or_else(|| {
                    RdmaError::RegionMismatch(format!(
                        "subrange {within}+{take} does not fit region {}",
                        region.id
                    ))
                })?;
            targets.push(target);
            cursor += take;
        }
        Ok(targets)
    }

    /// Unregister everything. Safe to call when nothing is registered.
    pub fn unregister_all(&self) -> Result<(), RdmaError> {
        let mut regions = self.regions.lock();
        for region in regions.drain(..) {
            self.transport.unregister_region(&region.descriptor)?;
        }
        Ok(())
    }
}
