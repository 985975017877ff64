//! Page grouping: partition the producer's page geometry into contiguous,
//! size-bounded read batches and spread them across channels.
//!
//! The output is deterministic for identical inputs; the collector relies
//! on that to keep its control info aligned with the reads it posts.

use mview_proto::PageGeometry;

/// One batch of pairwise-contiguous pages, read with a single remote read
/// when it does not straddle a region boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageGroup {
    pub pages: Vec<PageGeometry>,
}

impl PageGroup {
    /// Pool offset of the first page in the group.
    pub fn byte_offset(&self) -> usize {
        self.pages[0].page_offset
    }

    pub fn len_bytes(&self, page_size: usize) -> usize {
        self.pages.len() * page_size
    }
}

/// Sort pages by pool offset and split them into groups of strictly
/// contiguous pages, each at most `max_group_size_bytes` long.
pub fn contiguous_groups(
    geometry: &[PageGeometry],
    page_size: usize,
    max_group_size_bytes: usize,
) -> Vec<PageGroup> {
    let mut pages: Vec<PageGeometry> = geometry.to_vec();
    pages.sort_by_key(|p| p.page_offset);

    let max_pages_per_group = (max_group_size_bytes / page_size).max(1);
    let mut groups = Vec::new();
    let mut current: Vec<PageGeometry> = Vec::new();
    for page in pages {
        let contiguous = current
            .last()
            .map(|prev| page.page_offset == prev.page_offset + page_size)
            .unwrap_or(false);
        if !contiguous || current.len() >= max_pages_per_group {
            if !current.is_empty() {
                groups.push(PageGroup { pages: current });
            }
            current = Vec::new();
        }
        current.push(page);
    }
    if !current.is_empty() {
        groups.push(PageGroup { pages: current });
    }
    groups
}

/// Distribute groups round-robin over `min(num_channels, groups.len())`
/// channels, keeping group order within each channel.
pub fn distribute_groups(groups: Vec<PageGroup>, num_channels: usize) -> Vec<Vec<PageGroup>> {
    if num_channels == 0 {
        tracing::warn!("group distribution requested over zero channels");
        return Vec::new();
    }
    if groups.is_empty() {
        return Vec::new();
    }

    let channels = num_channels.min(groups.len());
    let mut assigned: Vec<Vec<PageGroup>> = vec![Vec::new(); channels];
    for (i, group) in groups.into_iter().enumerate() {
        assigned[i % channels].push(group);
    }
    assigned
}

/// Flatten each channel's groups into one ordered page list.
pub fn channel_pages(channels: &[Vec<PageGroup>]) -> Vec<Vec<PageGeometry>> {
    channels
        .iter()
        .map(|groups| {
            groups
                .iter()
                .flat_map(|g| g.pages.iter().cloned())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(workload: &str, offset: usize) -> PageGeometry {
        PageGeometry {
            workload_id: workload.into(),
            page_offset: offset,
            occupancy: 1,
            capacity: 4,
        }
    }

    #[test]
    fn test_three_pages_two_channels() {
        // 64-byte pages at 0, 64, 128 with a 128-byte group ceiling: the
        // group closes after two pages even though all three are
        // contiguous.
        let geometry = vec![page("a", 0), page("b", 64), page("c", 128)];
        let groups = contiguous_groups(&geometry, 64, 128);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].pages.len(), 2);
        assert_eq!(groups[1].pages.len(), 1);

        let channels = distribute_groups(groups, 2);
        assert_eq!(channels.len(), 2);
        let flat = channel_pages(&channels);
        assert_eq!(
            flat[0].iter().map(|p| p.page_offset).collect::<Vec<_>>(),
            vec![0, 64]
        );
        assert_eq!(
            flat[1].iter().map(|p| p.page_offset).collect::<Vec<_>>(),
            vec![128]
        );
    }

    #[test]
    fn test_gap_splits_group() {
        let geometry = vec![page("a", 0), page("b", 64), page("c", 256)];
        let groups = contiguous_groups(&geometry, 64, 1024);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].pages.len(), 2);
        assert_eq!(groups[1].byte_offset(), 256);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let a = vec![page("a", 0), page("b", 64), page("c", 128)];
        let b = vec![page("c", 128), page("a", 0), page("b", 64)];
        assert_eq!(
            contiguous_groups(&a, 64, 128),
            contiguous_groups(&b, 64, 128)
        );
    }

    #[test]
    fn test_group_size_bound() {
        let page_size = 4096;
        let geometry: Vec<PageGeometry> = (0..40)
            .map(|i| page(&format!("w{i}"), i * page_size))
            .collect();
        let groups = contiguous_groups(&geometry, page_size, 64 * 1024);
        for group in &groups {
            assert!(group.len_bytes(page_size) <= 64 * 1024);
            for pair in group.pages.windows(2) {
                assert_eq!(pair[1].page_offset, pair[0].page_offset + page_size);
            }
        }
        // 40 pages of 4KiB against a 16-page ceiling.
        assert_eq!(
            groups.iter().map(|g| g.pages.len()).collect::<Vec<_>>(),
            vec![16, 16, 8]
        );
    }

    #[test]
    fn test_distribution_covers_all_pages_exactly_once() {
        let page_size = 64;
        let geometry: Vec<PageGeometry> = [0, 64, 256, 320, 384, 1024]
            .iter()
            .enumerate()
            .map(|(i, &off)| page(&format!("w{i}"), off))
            .collect();
        let groups = contiguous_groups(&geometry, page_size, 128);
        let channels = distribute_groups(groups, 3);

        let mut offsets: Vec<usize> = channel_pages(&channels)
            .iter()
            .flatten()
            .map(|p| p.page_offset)
            .collect();
        offsets.sort_unstable();
        assert_eq!(offsets, vec![0, 64, 256, 320, 384, 1024]);
    }

    #[test]
    fn test_more_channels_than_groups() {
        let geometry = vec![page("a", 0)];
        let groups = contiguous_groups(&geometry, 64, 128);
        let channels = distribute_groups(groups, 8);
        assert_eq!(channels.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(contiguous_groups(&[], 64, 128).is_empty());
        assert!(distribute_groups(Vec::new(), 2).is_empty());
    }

    #[test]
    fn test_zero_channels() {
        let geometry = vec![page("a", 0)];
        let groups = contiguous_groups(&geometry, 64, 128);
        assert!(distribute_groups(groups, 0).is_empty());
    }

    #[test]
    fn test_single_page_larger_than_ceiling_still_grouped() {
        let geometry = vec![page("a", 0), page("b", 4096)];
        let groups = contiguous_groups(&geometry, 4096, 1024);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].pages.len(), 1);
    }
}
