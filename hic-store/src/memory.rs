use std::collections::BTreeMap;

use ahash::AHashMap;
use ndarray::Array2;

use super::block::{Block, BlockLayout, MatrixKey, ZoomDataKey};
use super::errors::ReadError;
use super::expected::ExpectedValueTable;
use super::genome::Chromosome;
use super::normalization::{NormalizationType, NormVectorKey, NormalizationVector};
use super::reader::{DatasetHeader, DatasetReader, EigenvectorKey, MatrixIndex};
use super::zoom::HiCZoom;

pub const MEMORY_FORMAT_VERSION: u32 = 1;

/// Dataset held entirely in memory. Produced by the dataset builder, read
/// back from HDF5 or assembled by hand.
#[derive(Clone, Debug, Default)]
pub struct MemoryReader {
    header: DatasetHeader,
    matrices: BTreeMap<MatrixKey, MatrixIndex>,
    blocks: AHashMap<ZoomDataKey, BTreeMap<u32, Block>>,
    norm_vectors: AHashMap<NormVectorKey, NormalizationVector>,
    eigenvectors: AHashMap<EigenvectorKey, Vec<f64>>,
    pearsons: AHashMap<(ZoomDataKey, NormalizationType), Array2<f64>>,
}

impl MemoryReader {
    pub fn new(header: DatasetHeader) -> MemoryReader {
        MemoryReader { header, ..Default::default() }
    }

    pub fn get_header(&self) -> &DatasetHeader {
        &self.header
    }

    pub fn get_header_mut(&mut self) -> &mut DatasetHeader {
        &mut self.header
    }

    /// Declares a zoom level of a chromosome pair with its block geometry.
    pub fn add_zoom_data(&mut self, key: MatrixKey, zoom: HiCZoom, layout: BlockLayout) {
        let index = self.matrices.entry(key).or_insert_with(|| MatrixIndex { key, zooms: Vec::new() });
        match index.zooms.iter_mut().find(|(z, _)| *z == zoom) {
            Some(entry) => entry.1 = layout,
            None => index.zooms.push((zoom, layout)),
        }
    }

    /// Stores a block, replacing a previous one with the same number. Empty
    /// blocks are not stored.
    pub fn add_block(&mut self, zd: ZoomDataKey, block: Block) {
        if block.is_empty() {
            return;
        }
        self.blocks.entry(zd).or_insert_with(BTreeMap::new).insert(block.get_number(), block);
    }

    pub fn add_normalization_vector(&mut self, nv: NormalizationVector) {
        if !self.header.normalization_types.contains(&nv.get_type()) {
            self.header.normalization_types.push(nv.get_type());
        }
        self.norm_vectors.insert(nv.get_key(), nv);
    }

    pub fn add_expected_values(&mut self, table: ExpectedValueTable) {
        let key = table.get_key();
        self.header.expected_values.retain(|t| t.get_key() != key);
        self.header.expected_values.push(table);
    }

    pub fn add_eigenvector(&mut self, chr_idx: usize, zoom: HiCZoom, number: usize, norm: NormalizationType, data: Vec<f64>) {
        self.eigenvectors.insert(EigenvectorKey::new(chr_idx, zoom, number, norm), data);
    }

    pub fn add_pearsons(&mut self, zd: ZoomDataKey, norm: NormalizationType, matrix: Array2<f64>) {
        self.pearsons.insert((zd, norm), matrix);
    }

    pub fn matrices(&self) -> impl Iterator<Item = &MatrixIndex> {
        self.matrices.values()
    }

    /// Stored blocks of a zoom data in block number order.
    pub fn blocks(&self, zd: &ZoomDataKey) -> impl Iterator<Item = &Block> {
        self.blocks.get(zd).into_iter().flat_map(|b| b.values())
    }

    pub fn normalization_vectors(&self) -> impl Iterator<Item = &NormalizationVector> {
        self.norm_vectors.values()
    }

    pub fn eigenvectors(&self) -> impl Iterator<Item = (&EigenvectorKey, &Vec<f64>)> {
        self.eigenvectors.iter()
    }
}

impl DatasetReader for MemoryReader {
    fn get_version(&self) -> u32 {
        MEMORY_FORMAT_VERSION
    }

    fn read_header(&self) -> Result<DatasetHeader, ReadError> {
        Ok(self.header.clone())
    }

    fn read_matrix(&self, key: MatrixKey) -> Result<Option<MatrixIndex>, ReadError> {
        Ok(self.matrices.get(&key).cloned())
    }

    fn read_block(&self, zd: &ZoomDataKey, block_number: u32) -> Result<Option<Block>, ReadError> {
        Ok(self.blocks.get(zd).and_then(|b| b.get(&block_number)).cloned())
    }

    fn get_block_numbers(&self, zd: &ZoomDataKey) -> Result<Vec<u32>, ReadError> {
        Ok(self.blocks.get(zd).map(|b| b.keys().copied().collect()).unwrap_or_default())
    }

    fn read_normalization_vector(&self, norm: NormalizationType, chr_idx: usize, zoom: HiCZoom)
        -> Result<Option<NormalizationVector>, ReadError> {
        Ok(self.norm_vectors.get(&NormVectorKey::new(norm, chr_idx, zoom)).cloned())
    }

    fn read_eigenvector(&self, chr: &Chromosome, zoom: HiCZoom, number: usize, norm: NormalizationType)
        -> Result<Option<Vec<f64>>, ReadError> {
        let key = EigenvectorKey::new(chr.get_index(), zoom, number, norm);
        Ok(self.eigenvectors.get(&key).cloned())
    }

    fn read_pearsons(&self, chr1: &Chromosome, chr2: &Chromosome, zoom: HiCZoom, norm: NormalizationType)
        -> Result<Option<Array2<f64>>, ReadError> {
        let zd = ZoomDataKey::new(MatrixKey::new(chr1.get_index(), chr2.get_index()), zoom);
        Ok(self.pearsons.get(&(zd, norm)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::ContactRecord;

    fn zd() -> ZoomDataKey {
        ZoomDataKey::new(MatrixKey::new(1, 1), HiCZoom::bp(100))
    }

    #[test]
    fn blocks_are_listed_in_order() {
        let mut reader = MemoryReader::default();
        reader.add_zoom_data(MatrixKey::new(1, 1), HiCZoom::bp(100), BlockLayout::new(10, 2));
        reader.add_block(zd(), Block::new(3, vec![ContactRecord::new(10, 10, 1.0)]));
        reader.add_block(zd(), Block::new(0, vec![ContactRecord::new(0, 1, 2.0)]));
        reader.add_block(zd(), Block::empty(1));
        assert_eq!(reader.get_block_numbers(&zd()).unwrap(), vec![0, 3]);
        assert!(reader.read_block(&zd(), 1).unwrap().is_none());
        assert_eq!(reader.blocks(&zd()).count(), 2);
    }

    #[test]
    fn normalized_block_requires_vector() {
        let mut reader = MemoryReader::default();
        reader.add_block(zd(), Block::new(0, vec![ContactRecord::new(0, 1, 2.0)]));
        match reader.read_normalized_block(&zd(), 0, NormalizationType::KR) {
            Err(ReadError::MissingNormalization(1, _, NormalizationType::KR)) => (),
            other => panic!("unexpected {:?}", other),
        }

        reader.add_normalization_vector(NormalizationVector::new(NormalizationType::KR, 1, HiCZoom::bp(100), vec![2.0, 0.5]));
        let block = reader.read_normalized_block(&zd(), 0, NormalizationType::KR).unwrap().unwrap();
        assert_eq!(block.get_contact_records()[0].get_counts(), 2.0);
        assert_eq!(reader.get_header().normalization_types, vec![NormalizationType::KR]);
    }

    #[test]
    fn re_adding_zoom_updates_layout() {
        let mut reader = MemoryReader::default();
        let key = MatrixKey::new(2, 1);
        reader.add_zoom_data(key, HiCZoom::bp(100), BlockLayout::new(10, 2));
        reader.add_zoom_data(key, HiCZoom::bp(100), BlockLayout::new(10, 4));
        let index = reader.read_matrix(key).unwrap().unwrap();
        assert_eq!(index.zooms, vec![(HiCZoom::bp(100), BlockLayout::new(10, 4))]);
    }
}
