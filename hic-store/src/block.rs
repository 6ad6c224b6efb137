use super::zoom::HiCZoom;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactRecord {
    bin_x: u32,
    bin_y: u32,
    counts: f32,
}

impl ContactRecord {
    pub fn new(bin_x: u32, bin_y: u32, counts: f32) -> ContactRecord {
        ContactRecord { bin_x, bin_y, counts }
    }

    pub fn get_bin_x(&self) -> u32 {
        self.bin_x
    }

    pub fn get_bin_y(&self) -> u32 {
        self.bin_y
    }

    pub fn get_counts(&self) -> f32 {
        self.counts
    }
}

/// Sparse contents of one square sub-region of a matrix.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Block {
    number: u32,
    records: Vec<ContactRecord>,
}

impl Block {
    pub fn new(number: u32, records: Vec<ContactRecord>) -> Block {
        Block { number, records }
    }

    pub fn empty(number: u32) -> Block {
        Block { number, records: Vec::new() }
    }

    pub fn get_number(&self) -> u32 {
        self.number
    }

    pub fn get_contact_records(&self) -> &[ContactRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Identifies the matrix pair of a chromosome index pair, lower index first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatrixKey {
    chr1_idx: usize,
    chr2_idx: usize,
}

impl MatrixKey {
    pub fn new(chr_a: usize, chr_b: usize) -> MatrixKey {
        MatrixKey { chr1_idx: chr_a.min(chr_b), chr2_idx: chr_a.max(chr_b) }
    }

    pub fn get_chr1_idx(&self) -> usize {
        self.chr1_idx
    }

    pub fn get_chr2_idx(&self) -> usize {
        self.chr2_idx
    }

    pub fn is_intra(&self) -> bool {
        self.chr1_idx == self.chr2_idx
    }
}

/// Identifies one resolution of one matrix towards a reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ZoomDataKey {
    pub chr1_idx: usize,
    pub chr2_idx: usize,
    pub zoom: HiCZoom,
}

impl ZoomDataKey {
    pub fn new(key: MatrixKey, zoom: HiCZoom) -> ZoomDataKey {
        ZoomDataKey { chr1_idx: key.chr1_idx, chr2_idx: key.chr2_idx, zoom }
    }

    pub fn matrix_key(&self) -> MatrixKey {
        MatrixKey::new(self.chr1_idx, self.chr2_idx)
    }
}

/// Block geometry of one zoom level of a matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockLayout {
    pub block_bin_count: u32,
    pub block_column_count: u32,
}

impl BlockLayout {
    pub fn new(block_bin_count: u32, block_column_count: u32) -> BlockLayout {
        BlockLayout { block_bin_count, block_column_count }
    }

    /// Layout needed to hold `n_bins` bins per side.
    pub fn covering(block_bin_count: u32, n_bins: usize) -> BlockLayout {
        let bbc = block_bin_count.max(1) as usize;
        let columns = ((n_bins + bbc - 1) / bbc).max(1);
        BlockLayout::new(bbc as u32, columns as u32)
    }

    pub fn block_number(&self, bin_x: u32, bin_y: u32) -> u32 {
        let col = bin_x / self.block_bin_count;
        let row = bin_y / self.block_bin_count;
        row * self.block_column_count + col
    }

    pub fn total_bins(&self) -> usize {
        self.block_bin_count as usize * self.block_column_count as usize
    }
}
