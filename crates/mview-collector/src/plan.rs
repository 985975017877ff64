//! Read planning: turn grouped pages into per-channel remote read targets
//! aligned with the control info needed to decode each result.
//!
//! A group that straddles a region boundary is split, one target per
//! region touched, because a single work request cannot cross remote
//! registrations.

use mview_proto::{PageControl, PageGeometry, RegionDescriptor};
use mview_types::ChannelId;

use crate::error::CollectorError;
use crate::grouping::PageGroup;

/// One remote read plus the page list that decodes its result. The pages
/// cover the target's bytes exactly, in offset order.
#[derive(Debug, Clone)]
pub struct ReadTarget {
    pub descriptor: RegionDescriptor,
    pub pages: Vec<PageControl>,
}

/// Everything one collector worker reads each tick.
#[derive(Debug, Clone)]
pub struct ChannelPlan {
    pub channel: ChannelId,
    pub targets: Vec<ReadTarget>,
}

impl ChannelPlan {
    pub fn descriptors(&self) -> Vec<RegionDescriptor> {
        self.targets.iter().map(|t| t.descriptor.clone()).collect()
    }

    pub fn num_pages(&self) -> usize {
        self.targets.iter().map(|t| t.pages.len()).sum()
    }
}

fn control(page: &PageGeometry, page_size: usize) -> PageControl {
    PageControl {
        workload_id: page.workload_id.clone(),
        occupancy: page.occupancy,
        page_size_bytes: page_size,
    }
}

/// Build per-channel plans from the registered region descriptors (in
/// partition order, each `mr_size_bytes` long) and the grouped pages.
pub fn build_plan(
    regions: &[RegionDescriptor],
    mr_size_bytes: usize,
    page_size: usize,
    channels: &[Vec<PageGroup>],
) -> Result<Vec<ChannelPlan>, CollectorError> {
    let mut plans = Vec::with_capacity(channels.len());
    for (c, groups) in channels.iter().enumerate() {
        let mut targets = Vec::new();
        for group in groups {
            let mut run: Vec<&PageGeometry> = Vec::new();
            let mut run_region = 0usize;
            for page in &group.pages {
                let region = page.page_offset / mr_size_bytes;
                if !run.is_empty() && region != run_region {
                    targets.push(close_run(regions, mr_size_bytes, page_size, run_region, &run)?);
                    run.clear();
                }
                run_region = region;
                run.push(page);
            }
            if !run.is_empty() {
                targets.push(close_run(regions, mr_size_bytes, page_size, run_region, &run)?);
            }
        }
        plans.push(ChannelPlan {
            channel: ChannelId(c as u32),
            targets,
        });
    }
    Ok(plans)
}

fn close_run(
    regions: &[RegionDescriptor],
    mr_size_bytes: usize,
    page_size: usize,
    region_index: usize,
    run: &[&PageGeometry],
) -> Result<ReadTarget, CollectorError> {
    let region = regions
        .get(region_index)
        .ok_or(CollectorError::RegionOutOfRange {
            index: region_index,
            regions: regions.len(),
        })?;

    let start = run[0].page_offset - region_index * mr_size_bytes;
    let length = run.len() * page_size;
    let descriptor = region
        .subrange(start as u64, length as u64)
        .ok_or_else(|| {
            CollectorError::GeometryMismatch(format!(
                "pages at region offset {start}+{length} do not fit region {} (length {})",
                region.name, region.length
            ))
        })?;

    Ok(ReadTarget {
        descriptor,
        pages: run.iter().map(|p| control(p, page_size)).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::{contiguous_groups, distribute_groups};
    use mview_types::Rkey;

    fn region(i: usize, mr_size: u64) -> RegionDescriptor {
        RegionDescriptor {
            name: format!("mr-{i}"),
            addr: 0x1000 + i as u64 * mr_size,
            rkey: Rkey(i as u32 + 1),
            length: mr_size,
        }
    }

    fn page(workload: &str, offset: usize, occupancy: usize) -> PageGeometry {
        PageGeometry {
            workload_id: workload.into(),
            page_offset: offset,
            occupancy,
            capacity: 51,
        }
    }

    #[test]
    fn test_plan_single_region() {
        let regions = vec![region(0, 4 * 4096)];
        let geometry = vec![page("a", 0, 2), page("b", 4096, 1)];
        let channels =
            distribute_groups(contiguous_groups(&geometry, 4096, 64 * 1024), 1);

        let plans = build_plan(&regions, 4 * 4096, 4096, &channels).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].targets.len(), 1);

        let target = &plans[0].targets[0];
        assert_eq!(target.descriptor.addr, 0x1000);
        assert_eq!(target.descriptor.length, 2 * 4096);
        assert_eq!(target.pages.len(), 2);
        assert_eq!(target.pages[0].workload_id, "a".into());
        assert_eq!(target.pages[0].occupancy, 2);
        assert_eq!(plans[0].num_pages(), 2);
    }

    #[test]
    fn test_group_split_at_region_boundary() {
        // Two 2-page regions; a contiguous 3-page group starting at page 1
        // touches both.
        let mr_size = 2 * 4096;
        let regions = vec![region(0, mr_size as u64), region(1, mr_size as u64)];
        let geometry = vec![page("a", 4096, 1), page("b", 8192, 1), page("c", 12288, 1)];
        let channels =
            distribute_groups(contiguous_groups(&geometry, 4096, 64 * 1024), 1);

        let plans = build_plan(&regions, mr_size, 4096, &channels).unwrap();
        let targets = &plans[0].targets;
        assert_eq!(targets.len(), 2);

        assert_eq!(targets[0].descriptor.addr, regions[0].addr + 4096);
        assert_eq!(targets[0].descriptor.length, 4096);
        assert_eq!(targets[0].pages.len(), 1);

        assert_eq!(targets[1].descriptor.addr, regions[1].addr);
        assert_eq!(targets[1].descriptor.length, 2 * 4096);
        assert_eq!(targets[1].pages.len(), 2);
        assert_eq!(targets[1].pages[1].workload_id, "c".into());
    }

    #[test]
    fn test_page_outside_registered_regions() {
        let regions = vec![region(0, 4096)];
        let geometry = vec![page("a", 8192, 1)];
        let channels = distribute_groups(contiguous_groups(&geometry, 4096, 64 * 1024), 1);

        let err = build_plan(&regions, 4096, 4096, &channels).unwrap_err();
        assert!(matches!(
            err,
            CollectorError::RegionOutOfRange { index: 2, regions: 1 }
        ));
    }

    #[test]
    fn test_descriptors_follow_target_order() {
        let mr_size = 4 * 4096;
        let regions = vec![region(0, mr_size as u64)];
        let geometry = vec![page("a", 0, 1), page("b", 8192, 1)];
        let channels = distribute_groups(contiguous_groups(&geometry, 4096, 64 * 1024), 1);

        let plans = build_plan(&regions, mr_size, 4096, &channels).unwrap();
        let descs = plans[0].descriptors();
        assert_eq!(descs.len(), 2);
        assert!(descs[0].addr < descs[1].addr);
    }
}
