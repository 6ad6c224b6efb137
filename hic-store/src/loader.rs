use std::iter::FromIterator;
use std::sync::{mpsc, Arc, Mutex};

use ahash::AHashMap;
use itertools::Itertools;
use log::{debug, warn};
use threadpool::ThreadPool;

use super::block::{Block, ZoomDataKey};
use super::cache::{self, LruCache};
use super::errors::ReadError;
use super::normalization::{NormVectorStore, NormalizationType};
use super::reader::DatasetReader;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockKey {
    pub zoom_data: ZoomDataKey,
    pub number: u32,
    pub norm: NormalizationType,
}

impl BlockKey {
    pub fn new(zoom_data: ZoomDataKey, number: u32, norm: NormalizationType) -> BlockKey {
        BlockKey { zoom_data, number, norm }
    }
}

/// Serves blocks of one zoom data from an LRU cache, reading the missing ones
/// on a bounded pool of worker threads. Normalized blocks are divided by the
/// vectors of the owning dataset.
pub struct BlockLoader {
    reader: Arc<dyn DatasetReader>,
    vectors: Arc<NormVectorStore>,
    cache: Mutex<LruCache<BlockKey, Arc<Block>>>,
    use_cache: bool,
    max_in_flight: usize,
}

impl BlockLoader {
    pub fn new(reader: Arc<dyn DatasetReader>, vectors: Arc<NormVectorStore>, cache_capacity: usize,
               use_cache: bool, max_in_flight: usize) -> BlockLoader {
        BlockLoader {
            reader,
            vectors,
            cache: Mutex::new(LruCache::new(cache_capacity)),
            use_cache,
            max_in_flight: max_in_flight.max(1),
        }
    }

    pub fn get_reader(&self) -> &Arc<dyn DatasetReader> {
        &self.reader
    }

    /// Blocks for all requested numbers, in no particular order. A block
    /// that fails to load is returned empty and left out of the cache.
    pub fn load(&self, zd: &ZoomDataKey, norm: NormalizationType, numbers: &[u32]) -> Vec<Arc<Block>> {
        let mut blocks = Vec::with_capacity(numbers.len());
        let mut missing = Vec::new();
        if self.use_cache {
            let mut cache = cache::lock(&self.cache);
            for &n in numbers {
                match cache.get(&BlockKey::new(*zd, n, norm)) {
                    Some(block) => blocks.push(block),
                    None => missing.push(n),
                }
            }
        } else {
            missing.extend_from_slice(numbers);
        }

        if missing.is_empty() {
            return blocks;
        }
        debug!("Loading {} of {} blocks of {}:{} at {}", missing.len(), numbers.len(),
               zd.chr1_idx, zd.chr2_idx, zd.zoom);

        let loaded = self.fetch(zd, norm, &missing);
        let mut cache = if self.use_cache { Some(cache::lock(&self.cache)) } else { None };
        for (n, result) in loaded {
            match result {
                Ok(block) => {
                    let block = Arc::new(block);
                    if let Some(cache) = cache.as_mut() {
                        cache.put(BlockKey::new(*zd, n, norm), Arc::clone(&block));
                    }
                    blocks.push(block);
                },
                Err(e) => {
                    warn!("Block {} of {}:{} at {} could not be loaded: {}", n, zd.chr1_idx, zd.chr2_idx, zd.zoom, e);
                    blocks.push(Arc::new(Block::empty(n)));
                }
            }
        }
        blocks
    }

    /// Loads blocks straight from the reader without touching the cache.
    pub fn load_uncached(&self, zd: &ZoomDataKey, norm: NormalizationType, numbers: &[u32]) -> Vec<Block> {
        self.fetch(zd, norm, numbers).into_iter()
            .map(|(n, result)| result.unwrap_or_else(|e| {
                warn!("Block {} of {}:{} at {} could not be loaded: {}", n, zd.chr1_idx, zd.chr2_idx, zd.zoom, e);
                Block::empty(n)
            }))
            .collect()
    }

    pub fn is_cached(&self, key: &BlockKey) -> bool {
        cache::lock(&self.cache).contains_key(key)
    }

    fn fetch(&self, zd: &ZoomDataKey, norm: NormalizationType, numbers: &[u32]) -> Vec<(u32, Result<Block, ReadError>)> {
        let numbers = Vec::from_iter(numbers.iter().copied().unique());
        if numbers.len() <= 1 {
            return numbers.iter()
                .map(|&n| (n, read_or_empty(self.reader.as_ref(), &self.vectors, zd, n, norm)))
                .collect();
        }

        let pool = ThreadPool::with_name("block-loader".into(), self.max_in_flight.min(numbers.len()));
        let (tx, rx) = mpsc::channel();
        for &n in numbers.iter() {
            let tx = tx.clone();
            let reader = Arc::clone(&self.reader);
            let vectors = Arc::clone(&self.vectors);
            let zd = *zd;
            pool.execute(move || {
                let result = read_or_empty(reader.as_ref(), &vectors, &zd, n, norm);
                let _ = tx.send((n, result));
            });
        }
        drop(tx);

        // Returns once every worker has sent or dropped its sender.
        let mut received: AHashMap<u32, Result<Block, ReadError>> = rx.iter().collect();
        numbers.iter()
            .map(|&n| {
                let result = received.remove(&n)
                    .unwrap_or_else(|| Err(ReadError::Backend(format!("worker loading block {} died", n))));
                (n, result)
            })
            .collect()
    }
}

fn read_or_empty(reader: &dyn DatasetReader, vectors: &NormVectorStore, zd: &ZoomDataKey, n: u32,
                 norm: NormalizationType) -> Result<Block, ReadError> {
    match reader.read_block(zd, n)? {
        Some(block) => vectors.normalize(zd, block, norm),
        None => Ok(Block::empty(n)),
    }
}
