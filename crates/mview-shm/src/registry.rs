//! Registration facade over the page allocator.
//!
//! This is the library surface behind the external registration endpoint:
//! a producer submits `{workload_id, name, kind, value}` and gets back the
//! pool identity and the byte offset of the value field it may update
//! directly. Page creation is lazy on a workload's first metric.

use parking_lot::Mutex;

use mview_proto::{ControlInfo, MetricLocation, MetricRegistration, PageControl, PageGeometry};

use crate::allocator::PageAllocator;
use crate::error::ShmError;
use crate::handle::MetricHandle;
use crate::pool::SharedPool;

/// Thread-safe metric registration over one shared pool.
pub struct MetricRegistry {
    allocator: Mutex<PageAllocator>,
    pool: SharedPool,
}

impl MetricRegistry {
    pub fn new(pool: SharedPool) -> Self {
        Self {
            allocator: Mutex::new(PageAllocator::new(pool.clone())),
            pool,
        }
    }

    pub fn pool(&self) -> &SharedPool {
        &self.pool
    }

    /// Register one metric, allocating the workload's page on first use.
    pub fn register(&self, req: &MetricRegistration) -> Result<MetricLocation, ShmError> {
        let mut alloc = self.allocator.lock();
        alloc.ensure_page(&req.workload_id)?;
        let value_byte_offset =
            alloc.append_record(&req.workload_id, &req.name, req.kind, req.value)?;
        Ok(MetricLocation {
            pool_name: self.pool.name().to_string(),
            value_byte_offset,
        })
    }

    /// Handle for updating a registered metric in place.
    pub fn handle(&self, location: &MetricLocation) -> MetricHandle {
        MetricHandle::new(self.pool.clone(), location.value_byte_offset)
    }

    /// Snapshot of the allocator's page geometry.
    pub fn geometry(&self) -> Vec<PageGeometry> {
        self.allocator.lock().geometry()
    }

    /// Build per-region control info for the given region size: pages
    /// grouped by `region_index = page_offset / mr_size_bytes`, one entry
    /// per region in address order, covering the whole pool.
    ///
    /// Fails with `InvalidGeometry` when the region size is not a multiple
    /// of the page size.
    pub fn control_info(&self, mr_size_bytes: usize) -> Result<ControlInfo, ShmError> {
        let page_size = self.pool.page_size();
        if mr_size_bytes == 0 || mr_size_bytes % page_size != 0 {
            return Err(ShmError::InvalidGeometry(format!(
                "region size {mr_size_bytes} is not a multiple of page size {page_size}"
            )));
        }

        let num_regions = self.pool.len() / mr_size_bytes;
        let mut info: ControlInfo = vec![Vec::new(); num_regions];

        let mut geometry = self.geometry();
        geometry.sort_by_key(|g| g.page_offset);
        for page in geometry {
            let region = page.page_offset / mr_size_bytes;
            if region >= num_regions {
                return Err(ShmError::InvalidGeometry(format!(
                    "page offset {} outside the {num_regions} registered regions",
                    page.page_offset
                )));
            }
            info[region].push(PageControl {
                workload_id: page.workload_id,
                occupancy: page.occupancy,
                page_size_bytes: page_size,
            });
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mview_codec::MetricKind;

    fn registration(workload: &str, name: &str, value: f64) -> MetricRegistration {
        MetricRegistration {
            workload_id: workload.into(),
            name: name.to_string(),
            kind: MetricKind::Gauge,
            value,
        }
    }

    #[test]
    fn test_register_and_update() {
        let pool = SharedPool::new("reg", 2 * 4096, 4096).unwrap();
        let registry = MetricRegistry::new(pool);

        let loc = registry.register(&registration("web", "inflight", 2.0)).unwrap();
        assert_eq!(loc.pool_name, "reg");
        assert_eq!(loc.value_byte_offset, 72);

        let handle = registry.handle(&loc);
        assert_eq!(handle.get().unwrap(), 2.0);
        handle.set(9.0).unwrap();
        assert_eq!(handle.get().unwrap(), 9.0);
    }

    #[test]
    fn test_lazy_page_per_workload() {
        let pool = SharedPool::new("lazy", 2 * 4096, 4096).unwrap();
        let registry = MetricRegistry::new(pool);

        registry.register(&registration("a", "m1", 0.0)).unwrap();
        registry.register(&registration("a", "m2", 0.0)).unwrap();
        registry.register(&registration("b", "m1", 0.0)).unwrap();

        let geom = registry.geometry();
        assert_eq!(geom.len(), 2);
        assert_eq!(geom[0].occupancy, 2);
        assert_eq!(geom[1].occupancy, 1);
    }

    #[test]
    fn test_registration_fails_when_pool_full() {
        let pool = SharedPool::new("tiny", 4096, 4096).unwrap();
        let registry = MetricRegistry::new(pool);
        registry.register(&registration("a", "m", 0.0)).unwrap();
        let err = registry.register(&registration("b", "m", 0.0)).unwrap_err();
        assert!(matches!(err, ShmError::PoolExhausted { .. }));
    }

    #[test]
    fn test_control_info() {
        // 4 pages, regions of 2 pages each.
        let pool = SharedPool::new("ci", 4 * 4096, 4096).unwrap();
        let registry = MetricRegistry::new(pool);
        for w in ["a", "b", "c"] {
            registry.register(&registration(w, "m", 1.0)).unwrap();
        }

        let info = registry.control_info(2 * 4096).unwrap();
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].len(), 2);
        assert_eq!(info[1].len(), 1);
        assert_eq!(info[0][0].workload_id, "a".into());
        assert_eq!(info[0][1].workload_id, "b".into());
        assert_eq!(info[1][0].workload_id, "c".into());
        assert!(info.iter().flatten().all(|pc| pc.page_size_bytes == 4096));
    }

    #[test]
    fn test_control_info_invalid_region_size() {
        let pool = SharedPool::new("bad", 4 * 4096, 4096).unwrap();
        let registry = MetricRegistry::new(pool);
        assert!(matches!(
            registry.control_info(5000).unwrap_err(),
            ShmError::InvalidGeometry(_)
        ));
        assert!(registry.control_info(0).is_err());
    }
}
