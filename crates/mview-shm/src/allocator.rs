//! Page allocator: one page per workload inside the bounded pool.
//!
//! Pages are assigned sequentially increasing offsets and are never reused
//! within a run. Records are appended to the next free slot; the allocator
//! is the only writer of the occupancy counter.

use std::collections::HashMap;

use mview_codec::{self as codec, MetricKind};
use mview_proto::PageGeometry;
use mview_types::{PageId, WorkloadId};

use crate::error::ShmError;
use crate::pool::SharedPool;

/// Allocator-side state of one page. Pages live in a dense arena indexed by
/// `PageId`; the workload lookup goes through a separate map so page state
/// never moves.
#[derive(Debug, Clone)]
pub struct PageState {
    pub id: PageId,
    pub workload: WorkloadId,
    /// Byte offset of the page from the pool base.
    pub byte_offset: usize,
    /// Record capacity, computed once from the page and record sizes.
    pub capacity: usize,
    /// Records written so far.
    pub occupancy: usize,
}

/// Carves the shared pool into pages and appends records to them.
pub struct PageAllocator {
    pool: SharedPool,
    pages: Vec<PageState>,
    by_workload: HashMap<WorkloadId, PageId>,
}

impl PageAllocator {
    pub fn new(pool: SharedPool) -> Self {
        Self {
            pool,
            pages: Vec::new(),
            by_workload: HashMap::new(),
        }
    }

    pub fn pool(&self) -> &SharedPool {
        &self.pool
    }

    pub fn allocated_pages(&self) -> usize {
        self.pages.len()
    }

    /// Look up the page owned by a workload.
    pub fn page_of(&self, workload: &WorkloadId) -> Option<&PageState> {
        self.by_workload
            .get(workload)
            .map(|id| &self.pages[id.0 as usize])
    }

    /// Allocate the next free page slot for a workload.
    ///
    /// Fails with `PoolExhausted` once every slot is taken, and with
    /// `WorkloadExists` if the workload already owns a page.
    pub fn allocate_page(&mut self, workload: &WorkloadId) -> Result<PageId, ShmError> {
        if self.by_workload.contains_key(workload) {
            return Err(ShmError::WorkloadExists(workload.clone()));
        }
        let max_pages = self.pool.max_pages();
        if self.pages.len() >= max_pages {
            return Err(ShmError::PoolExhausted { max_pages });
        }

        let id = PageId(self.pages.len() as u32);
        let byte_offset = self.pages.len() * self.pool.page_size();
        let capacity = codec::records_per_page(self.pool.page_size());

        self.pages.push(PageState {
            id,
            workload: workload.clone(),
            byte_offset,
            capacity,
            occupancy: 0,
        });
        self.by_workload.insert(workload.clone(), id);

        tracing::info!(
            %workload,
            page = %id,
            byte_offset,
            capacity,
            "allocated page"
        );
        Ok(id)
    }

    /// Return the workload's page id, allocating one on first use.
    pub fn ensure_page(&mut self, workload: &WorkloadId) -> Result<PageId, ShmError> {
        if let Some(id) = self.by_workload.get(workload) {
            return Ok(*id);
        }
        self.allocate_page(workload)
    }

    /// Append an encoded record to the workload's page and return the
    /// absolute byte offset of its value field.
    ///
    /// The record is written before the occupancy counter moves, so a
    /// concurrent remote read sees either the old occupancy or a fully
    /// written record.
    pub fn append_record(
        &mut self,
        workload: &WorkloadId,
        name: &str,
        kind: MetricKind,
        value: f64,
    ) -> Result<usize, ShmError> {
        let id = *self
            .by_workload
            .get(workload)
            .ok_or_else(|| ShmError::UnknownWorkload(workload.clone()))?;
        let page = &self.pages[id.0 as usize];

        if page.occupancy >= page.capacity {
            return Err(ShmError::PageFull {
                workload: workload.clone(),
                capacity: page.capacity,
            });
        }

        let encoded = codec::encode(name, kind, value)?;
        let slot = page.occupancy;
        let record_offset = page.byte_offset + slot * codec::RECORD_SIZE;
        self.pool.write_at(record_offset, &encoded)?;

        let page = &mut self.pages[id.0 as usize];
        page.occupancy += 1;

        let value_offset = page.byte_offset + codec::value_byte_offset(slot);
        tracing::debug!(
            %workload,
            metric = name,
            slot,
            value_offset,
            "appended record"
        );
        Ok(value_offset)
    }

    /// Per-record deallocation is deliberately unimplemented: pages are
    /// the unit of release and the whole pool tears down together. This
    /// is a documented no-op, not a delete.
    pub fn deallocate(&mut self, workload: &WorkloadId) {
        tracing::warn!(%workload, "deallocate requested; records are never reclaimed individually");
    }

    /// Current geometry of every allocated page, in page-id order.
    pub fn geometry(&self) -> Vec<PageGeometry> {
        self.pages
            .iter()
            .map(|p| PageGeometry {
                workload_id: p.workload.clone(),
                page_offset: p.byte_offset,
                occupancy: p.occupancy,
                capacity: p.capacity,
            })
            .collect()
    }
}
