pub mod block;
pub mod cache;
pub mod config;
pub mod correlation;
pub mod dataset;
pub mod dump;
pub mod errors;
pub mod expected;
pub mod features2d;
pub mod genome;
pub mod grid_axis;
pub mod loader;
pub mod matrix;
pub mod memory;
pub mod normalization;
pub mod reader;
pub mod sparse;
pub mod zoom;
pub mod zoom_data;
pub mod builders;
pub mod balancer;
pub mod utils;
#[cfg(feature = "hdf5")]
pub mod h5store;

use std::error::Error;
use std::path::Path;

pub use self::balancer::Balancer;
pub use self::block::{Block, BlockLayout, ContactRecord, MatrixKey, ZoomDataKey};
pub use self::builders::{DatasetBuilder, PairsReader};
pub use self::config::StoreConfig;
pub use self::dataset::Dataset;
pub use self::dump::{DumpFormat, DumpKind};
pub use self::errors::{FormatError, MissingData, ReadError, UnsupportedOperation};
pub use self::expected::{ExpectedValueFunction, ExpectedValueTable};
pub use self::features2d::{Feature2D, Feature2DList, LoopLists};
pub use self::genome::Chromosome;
pub use self::matrix::Matrix;
pub use self::memory::MemoryReader;
pub use self::normalization::{NormalizationType, NormalizationVector};
pub use self::reader::{DatasetHeader, DatasetReader};
pub use self::zoom::{HiCZoom, Unit};
pub use self::zoom_data::MatrixZoomData;
#[cfg(feature = "hdf5")]
pub use self::h5store::{H5Reader, H5Writer};

/// Bins a pairs file at the given BP resolutions into an in-memory dataset.
pub fn build_from_pairs(pairs_file: &Path, chrom_sizes_file: &Path, resolutions: &[u32], block_bin_count: u32,
                        norms: &[NormalizationType]) -> Result<MemoryReader, Box<dyn Error>> {
    let chromosomes = utils::parse_chrom_sizes(chrom_sizes_file)?;
    let mut builder = DatasetBuilder::new(chromosomes, resolutions, block_bin_count)
        .with_normalizations(norms);
    builder.add_pairs_file(pairs_file)?;
    Ok(builder.build())
}

#[cfg(feature = "hdf5")]
pub fn create_dataset_from_pairs(pairs_file: &Path, chrom_sizes_file: &Path, dataset_file: &Path,
                                 resolutions: &[u32], block_bin_count: u32,
                                 norms: &[NormalizationType]) -> Result<(), Box<dyn Error>> {
    let dataset = build_from_pairs(pairs_file, chrom_sizes_file, resolutions, block_bin_count, norms)?;
    H5Writer::create(dataset_file)?.write(&dataset)?;
    Ok(())
}

#[cfg(feature = "hdf5")]
pub fn open_dataset(dataset_file: &Path, config: StoreConfig) -> Result<Dataset, Box<dyn Error>> {
    let reader = H5Reader::open(dataset_file)?;
    Ok(Dataset::with_config(std::sync::Arc::new(reader), config)?)
}
