use std::sync::Arc;

use ahash::AHashMap;
use ndarray::Array2;

use super::block::{Block, BlockLayout, MatrixKey, ZoomDataKey};
use super::errors::ReadError;
use super::expected::ExpectedValueTable;
use super::genome::Chromosome;
use super::normalization::{self, NormalizationType, NormalizationVector};
use super::zoom::HiCZoom;

/// Everything a backend knows about a dataset before any matrix is touched.
#[derive(Clone, Debug, Default)]
pub struct DatasetHeader {
    pub genome_id: Option<String>,
    pub chromosomes: Vec<Chromosome>,
    /// Bin sizes in file order, coarsest first.
    pub bp_bin_sizes: Vec<u32>,
    pub frag_bin_sizes: Vec<u32>,
    pub attributes: AHashMap<String, String>,
    pub expected_values: Vec<ExpectedValueTable>,
    pub normalization_types: Vec<NormalizationType>,
    /// Restriction site positions per chromosome index.
    pub fragment_sites: AHashMap<usize, Arc<Vec<u32>>>,
}

/// Block index of one chromosome pair: the zoom levels stored for it.
#[derive(Clone, Debug, PartialEq)]
pub struct MatrixIndex {
    pub key: MatrixKey,
    pub zooms: Vec<(HiCZoom, BlockLayout)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EigenvectorKey {
    pub chr_idx: usize,
    pub zoom: HiCZoom,
    pub number: usize,
    pub norm: NormalizationType,
}

impl EigenvectorKey {
    pub fn new(chr_idx: usize, zoom: HiCZoom, number: usize, norm: NormalizationType) -> EigenvectorKey {
        EigenvectorKey { chr_idx, zoom, number, norm }
    }
}

/// Backend decoding a stored dataset. Implementations must tolerate concurrent
/// calls to `read_block`.
pub trait DatasetReader: Send + Sync {
    fn get_version(&self) -> u32;

    fn read_header(&self) -> Result<DatasetHeader, ReadError>;

    fn read_matrix(&self, key: MatrixKey) -> Result<Option<MatrixIndex>, ReadError>;

    /// Raw block, `None` when the block holds no data.
    fn read_block(&self, zd: &ZoomDataKey, block_number: u32) -> Result<Option<Block>, ReadError>;

    /// Numbers of the blocks physically stored for the zoom data.
    fn get_block_numbers(&self, zd: &ZoomDataKey) -> Result<Vec<u32>, ReadError>;

    fn read_normalization_vector(&self, norm: NormalizationType, chr_idx: usize, zoom: HiCZoom)
        -> Result<Option<NormalizationVector>, ReadError>;

    fn read_eigenvector(&self, chr: &Chromosome, zoom: HiCZoom, number: usize, norm: NormalizationType)
        -> Result<Option<Vec<f64>>, ReadError>;

    fn read_pearsons(&self, chr1: &Chromosome, chr2: &Chromosome, zoom: HiCZoom, norm: NormalizationType)
        -> Result<Option<Array2<f64>>, ReadError>;

    /// Block with counts divided by the row and column normalization factors.
    fn read_normalized_block(&self, zd: &ZoomDataKey, block_number: u32, norm: NormalizationType)
        -> Result<Option<Block>, ReadError> {
        let block = match self.read_block(zd, block_number)? {
            Some(b) => b,
            None => return Ok(None),
        };
        if norm == NormalizationType::NONE {
            return Ok(Some(block));
        }

        let nv1 = self.read_normalization_vector(norm, zd.chr1_idx, zd.zoom)?
            .ok_or(ReadError::MissingNormalization(zd.chr1_idx, zd.zoom, norm))?;
        let normalized = if zd.chr1_idx == zd.chr2_idx {
            normalization::normalize_block(&block, &nv1, &nv1)
        } else {
            let nv2 = self.read_normalization_vector(norm, zd.chr2_idx, zd.zoom)?
                .ok_or(ReadError::MissingNormalization(zd.chr2_idx, zd.zoom, norm))?;
            normalization::normalize_block(&block, &nv1, &nv2)
        };
        Ok(Some(normalized))
    }
}
