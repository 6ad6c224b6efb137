use std::sync::Arc;

/// Mapping between genomic coordinates and bin numbers along one side of a
/// matrix.
#[derive(Clone, Debug, PartialEq)]
pub enum GridAxis {
    Fixed(FixedGridAxis),
    Fragment(FragmentGridAxis),
}

impl GridAxis {
    pub fn genomic_start(&self, bin: u32) -> u64 {
        match self {
            GridAxis::Fixed(a) => a.genomic_start(bin),
            GridAxis::Fragment(a) => a.genomic_start(bin),
        }
    }

    pub fn genomic_end(&self, bin: u32) -> u64 {
        match self {
            GridAxis::Fixed(a) => a.genomic_end(bin),
            GridAxis::Fragment(a) => a.genomic_end(bin),
        }
    }

    pub fn genomic_mid(&self, bin: u32) -> u64 {
        let start = self.genomic_start(bin);
        start + (self.genomic_end(bin) - start) / 2
    }

    pub fn bin_for_genomic_position(&self, pos: u64) -> u32 {
        match self {
            GridAxis::Fixed(a) => a.bin_for_genomic_position(pos),
            GridAxis::Fragment(a) => a.bin_for_genomic_position(pos),
        }
    }

    pub fn bin_for_fragment(&self, fragment: usize) -> Option<u32> {
        match self {
            GridAxis::Fixed(a) => a.bin_for_fragment(fragment),
            GridAxis::Fragment(a) => Some(a.bin_for_fragment(fragment)),
        }
    }

    pub fn bin_count(&self) -> u32 {
        match self {
            GridAxis::Fixed(a) => a.bin_count,
            GridAxis::Fragment(a) => a.bin_count(),
        }
    }
}

/// Bins of constant width in base pairs.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedGridAxis {
    bin_size: u32,
    bin_count: u32,
    sites: Option<Arc<Vec<u32>>>,
}

impl FixedGridAxis {
    /// `max_bins` is the capacity of the block grid.
    pub fn new(bin_size: u32, chr_length: u64, max_bins: usize, sites: Option<Arc<Vec<u32>>>) -> FixedGridAxis {
        let bin_size = bin_size.max(1);
        let by_length = (chr_length / bin_size as u64) as usize + 1;
        FixedGridAxis {
            bin_size,
            bin_count: by_length.min(max_bins) as u32,
            sites,
        }
    }

    pub fn genomic_start(&self, bin: u32) -> u64 {
        bin as u64 * self.bin_size as u64
    }

    pub fn genomic_end(&self, bin: u32) -> u64 {
        (bin as u64 + 1) * self.bin_size as u64
    }

    pub fn bin_for_genomic_position(&self, pos: u64) -> u32 {
        (pos / self.bin_size as u64) as u32
    }

    pub fn bin_for_fragment(&self, fragment: usize) -> Option<u32> {
        self.sites.as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| s[fragment.min(s.len() - 1)] / self.bin_size)
    }
}

/// Variable-width bins grouping `frags_per_bin` consecutive restriction
/// fragments. `sites[i]` is the end position of fragment `i`.
#[derive(Clone, Debug, PartialEq)]
pub struct FragmentGridAxis {
    frags_per_bin: u32,
    sites: Arc<Vec<u32>>,
}

impl FragmentGridAxis {
    pub fn new(frags_per_bin: u32, sites: Arc<Vec<u32>>, chr_length: u64) -> FragmentGridAxis {
        let sites = if sites.is_empty() { Arc::new(vec![chr_length as u32]) } else { sites };
        FragmentGridAxis { frags_per_bin: frags_per_bin.max(1), sites }
    }

    pub fn bin_count(&self) -> u32 {
        let n = self.sites.len() as u32;
        (n + self.frags_per_bin - 1) / self.frags_per_bin
    }

    fn last_fragment(&self) -> usize {
        self.sites.len() - 1
    }

    pub fn genomic_start(&self, bin: u32) -> u64 {
        let fragment = (bin as usize * self.frags_per_bin as usize).min(self.last_fragment());
        if fragment == 0 { 0 } else { self.sites[fragment - 1] as u64 }
    }

    pub fn genomic_end(&self, bin: u32) -> u64 {
        let fragment = ((bin as usize + 1) * self.frags_per_bin as usize)
            .saturating_sub(1)
            .min(self.last_fragment());
        self.sites[fragment] as u64
    }

    /// Positions at or beyond the last boundary map to the final bin.
    pub fn bin_for_genomic_position(&self, pos: u64) -> u32 {
        let fragment = self.sites.partition_point(|&s| s as u64 <= pos);
        self.bin_for_fragment(fragment)
    }

    pub fn bin_for_fragment(&self, fragment: usize) -> u32 {
        (fragment.min(self.last_fragment()) / self.frags_per_bin as usize) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_axis_is_contiguous_and_monotonic() {
        let axis = GridAxis::Fixed(FixedGridAxis::new(100, 1050, 1_000, None));
        assert_eq!(axis.bin_count(), 11);
        let mut prev = 0;
        for pos in (0..1100).step_by(7) {
            let bin = axis.bin_for_genomic_position(pos);
            assert!(bin >= prev);
            prev = bin;
        }
        for bin in 0..10 {
            assert!(axis.genomic_start(bin) <= axis.genomic_end(bin));
            assert_eq!(axis.genomic_start(bin + 1), axis.genomic_end(bin));
        }
        assert_eq!(axis.genomic_mid(3), 350);
        assert_eq!(axis.bin_for_fragment(4), None);
    }

    #[test]
    fn fixed_axis_capped_by_block_grid() {
        let axis = FixedGridAxis::new(10, 1_000, 40, None);
        assert_eq!(axis.bin_count, 40);
    }

    #[test]
    fn fixed_axis_maps_fragments_through_sites() {
        let sites = Arc::new(vec![120, 480, 990]);
        let axis = GridAxis::Fixed(FixedGridAxis::new(100, 1_000, 100, Some(sites)));
        assert_eq!(axis.bin_for_fragment(1), Some(4));
        assert_eq!(axis.bin_for_fragment(10), Some(9));
    }

    #[test]
    fn fragment_axis_binary_search_and_clamp() {
        let sites = Arc::new(vec![100, 250, 400, 1000]);
        let axis = GridAxis::Fragment(FragmentGridAxis::new(1, sites, 1000));
        assert_eq!(axis.bin_count(), 4);
        assert_eq!(axis.bin_for_genomic_position(0), 0);
        assert_eq!(axis.bin_for_genomic_position(99), 0);
        assert_eq!(axis.bin_for_genomic_position(100), 1);
        assert_eq!(axis.bin_for_genomic_position(399), 2);
        assert_eq!(axis.bin_for_genomic_position(999), 3);
        assert_eq!(axis.bin_for_genomic_position(5_000), 3);
        assert_eq!(axis.genomic_start(1), 100);
        assert_eq!(axis.genomic_end(1), 250);
        assert_eq!(axis.genomic_mid(1), 175);
    }

    #[test]
    fn fragment_axis_groups_fragments() {
        let sites = Arc::new(vec![10, 20, 30, 40, 50]);
        let axis = FragmentGridAxis::new(2, sites, 50);
        assert_eq!(axis.bin_count(), 3);
        assert_eq!(axis.genomic_start(1), 20);
        assert_eq!(axis.genomic_end(1), 40);
        assert_eq!(axis.genomic_end(2), 50);
        assert_eq!(axis.bin_for_genomic_position(35), 1);
        assert_eq!(axis.bin_for_fragment(4), 2);
    }

    #[test]
    fn fragment_axis_without_sites_is_one_bin() {
        let axis = FragmentGridAxis::new(1, Arc::new(vec![]), 500);
        assert_eq!(axis.bin_count(), 1);
        assert_eq!(axis.genomic_end(0), 500);
        assert_eq!(axis.bin_for_genomic_position(10_000), 0);
    }
}
