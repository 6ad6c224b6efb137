pub const BLOCK_CACHE_CAPACITY: usize = 20;
pub const MAX_CONCURRENT_BLOCK_LOADS: usize = 8;
pub const PEARSON_BIN_LIMIT: u32 = 1000;
pub const NORM_VECTOR_CACHE_CAPACITY: usize = 20;
pub const EIGENVECTOR_CACHE_CAPACITY: usize = 20;

/// Tunables of a `Dataset` and everything it creates.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreConfig {
    pub block_cache_capacity: usize,
    /// Upper bound of blocks read in parallel by one query.
    pub max_concurrent_block_loads: usize,
    /// Live Pearson computation is allowed below this many bins per side.
    pub pearson_bin_limit: u32,
    pub norm_vector_cache_capacity: usize,
    pub eigenvector_cache_capacity: usize,
    pub caching: bool,
}

impl Default for StoreConfig {
    fn default() -> StoreConfig {
        StoreConfig {
            block_cache_capacity: BLOCK_CACHE_CAPACITY,
            max_concurrent_block_loads: MAX_CONCURRENT_BLOCK_LOADS,
            pearson_bin_limit: PEARSON_BIN_LIMIT,
            norm_vector_cache_capacity: NORM_VECTOR_CACHE_CAPACITY,
            eigenvector_cache_capacity: EIGENVECTOR_CACHE_CAPACITY,
            caching: true,
        }
    }
}

impl StoreConfig {
    pub fn with_max_concurrent_block_loads(mut self, n: usize) -> StoreConfig {
        self.max_concurrent_block_loads = n.max(1);
        self
    }

    pub fn with_block_cache_capacity(mut self, n: usize) -> StoreConfig {
        self.block_cache_capacity = n;
        self
    }

    pub fn with_pearson_bin_limit(mut self, n: u32) -> StoreConfig {
        self.pearson_bin_limit = n;
        self
    }

    pub fn without_caching(mut self) -> StoreConfig {
        self.caching = false;
        self
    }
}
