use std::iter::FromIterator;
use std::sync::Arc;

use ahash::AHashMap;

use super::block::MatrixKey;
use super::config::StoreConfig;
use super::genome::Chromosome;
use super::normalization::NormVectorStore;
use super::reader::{DatasetReader, MatrixIndex};
use super::zoom::{HiCZoom, Unit};
use super::zoom_data::MatrixZoomData;

/// All stored resolutions of the contact matrix of one chromosome pair.
pub struct Matrix {
    key: MatrixKey,
    chr1: Chromosome,
    chr2: Chromosome,
    zooms: Vec<HiCZoom>,
    zoom_data: AHashMap<HiCZoom, Arc<MatrixZoomData>>,
}

impl Matrix {
    /// `chr1` and `chr2` are the chromosomes of `index.key`, lower index
    /// first. Fragment sites are only needed for FRAG zooms and BP fragment
    /// lookups.
    pub fn new(index: &MatrixIndex, chr1: Chromosome, chr2: Chromosome,
               sites: (Option<Arc<Vec<u32>>>, Option<Arc<Vec<u32>>>),
               reader: Arc<dyn DatasetReader>, vectors: Arc<NormVectorStore>, config: &StoreConfig) -> Matrix {
        let zoom_data = index.zooms.iter()
            .map(|&(zoom, layout)| {
                let zd = MatrixZoomData::new(chr1.clone(), chr2.clone(), zoom, layout,
                                             sites.0.clone(), sites.1.clone(), Arc::clone(&reader),
                                             Arc::clone(&vectors), config);
                (zoom, Arc::new(zd))
            })
            .collect();

        Matrix {
            key: index.key,
            chr1,
            chr2,
            zooms: Vec::from_iter(index.zooms.iter().map(|(z, _)| *z)),
            zoom_data,
        }
    }

    pub fn get_key(&self) -> MatrixKey {
        self.key
    }

    pub fn get_chr1(&self) -> &Chromosome {
        &self.chr1
    }

    pub fn get_chr2(&self) -> &Chromosome {
        &self.chr2
    }

    pub fn is_intra(&self) -> bool {
        self.key.is_intra()
    }

    pub fn zoom_data(&self, zoom: HiCZoom) -> Option<Arc<MatrixZoomData>> {
        self.zoom_data.get(&zoom).cloned()
    }

    /// Zoom levels in storage order.
    pub fn get_zooms(&self) -> &[HiCZoom] {
        &self.zooms
    }

    pub fn get_zooms_of(&self, unit: Unit) -> Vec<HiCZoom> {
        Vec::from_iter(self.zooms.iter().copied().filter(|z| z.get_unit() == unit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockLayout;
    use crate::genome::chrom;
    use crate::memory::MemoryReader;

    #[test]
    fn one_zoom_data_per_listed_zoom() {
        let index = MatrixIndex {
            key: MatrixKey::new(1, 2),
            zooms: vec![(HiCZoom::bp(1000), BlockLayout::new(10, 2)), (HiCZoom::frag(1), BlockLayout::new(10, 1))],
        };
        let reader: Arc<dyn DatasetReader> = Arc::new(MemoryReader::default());
        let vectors = Arc::new(NormVectorStore::new(Arc::clone(&reader), 4));
        let matrix = Matrix::new(&index, chrom(1, "chr1", 10_000), chrom(2, "chr2", 5_000), (None, None),
                                 reader, vectors, &StoreConfig::default());
        assert!(!matrix.is_intra());
        assert_eq!(matrix.get_zooms().len(), 2);
        assert_eq!(matrix.get_zooms_of(Unit::FRAG), vec![HiCZoom::frag(1)]);
        let zd = matrix.zoom_data(HiCZoom::bp(1000)).unwrap();
        assert_eq!(zd.get_block_column_count(), 2);
        assert_eq!(zd.get_chr2().get_name().as_str(), "chr2");
        assert!(matrix.zoom_data(HiCZoom::bp(5)).is_none());
    }
}
