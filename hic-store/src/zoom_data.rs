use std::error::Error;
use std::fmt;
use std::io::Write;
use std::iter::FromIterator;
use std::sync::{Arc, Mutex};

use ahash::{AHashMap, AHashSet};
use itertools::Itertools;
use log::{debug, error, info, warn};
use ndarray::{Array2, Axis};

use super::block::{Block, BlockLayout, ContactRecord, MatrixKey, ZoomDataKey};
use super::cache;
use super::config::StoreConfig;
use super::correlation;
use super::dump::{self, DumpFormat, DumpKind};
use super::errors::{MissingData, ReadError, UnsupportedOperation};
use super::expected::ExpectedValueFunction;
use super::genome::Chromosome;
use super::grid_axis::{FixedGridAxis, FragmentGridAxis, GridAxis};
use super::loader::BlockLoader;
use super::normalization::{NormVectorStore, NormalizationType, NormalizationVector};
use super::reader::DatasetReader;
use super::sparse::SparseContactMatrix;
use super::zoom::{HiCZoom, Unit};

/// One resolution of the contact matrix of a chromosome pair.
pub struct MatrixZoomData {
    chr1: Chromosome,
    chr2: Chromosome,
    zoom: HiCZoom,
    layout: BlockLayout,
    x_axis: GridAxis,
    y_axis: GridAxis,
    loader: BlockLoader,
    pearson_bin_limit: u32,
    pearsons: Mutex<AHashMap<NormalizationType, Arc<Array2<f64>>>>,
    missing_pearsons: Mutex<AHashSet<NormalizationType>>,
    non_centromere_columns: Mutex<Option<Arc<Vec<usize>>>>,
}

impl MatrixZoomData {
    pub fn new(chr1: Chromosome, chr2: Chromosome, zoom: HiCZoom, layout: BlockLayout,
               x_sites: Option<Arc<Vec<u32>>>, y_sites: Option<Arc<Vec<u32>>>,
               reader: Arc<dyn DatasetReader>, vectors: Arc<NormVectorStore>, config: &StoreConfig) -> MatrixZoomData {
        let (x_axis, y_axis) = match zoom.get_unit() {
            Unit::BP => (
                GridAxis::Fixed(FixedGridAxis::new(zoom.get_bin_size(), chr1.get_length(), layout.total_bins(), x_sites)),
                GridAxis::Fixed(FixedGridAxis::new(zoom.get_bin_size(), chr2.get_length(), layout.total_bins(), y_sites)),
            ),
            Unit::FRAG => (
                GridAxis::Fragment(FragmentGridAxis::new(zoom.get_bin_size(), x_sites.unwrap_or_default(), chr1.get_length())),
                GridAxis::Fragment(FragmentGridAxis::new(zoom.get_bin_size(), y_sites.unwrap_or_default(), chr2.get_length())),
            ),
        };

        MatrixZoomData {
            chr1,
            chr2,
            zoom,
            layout,
            x_axis,
            y_axis,
            loader: BlockLoader::new(reader, vectors, config.block_cache_capacity, config.caching,
                                     config.max_concurrent_block_loads),
            pearson_bin_limit: config.pearson_bin_limit,
            pearsons: Mutex::new(AHashMap::default()),
            missing_pearsons: Mutex::new(AHashSet::default()),
            non_centromere_columns: Mutex::new(None),
        }
    }

    pub fn get_chr1(&self) -> &Chromosome {
        &self.chr1
    }

    pub fn get_chr2(&self) -> &Chromosome {
        &self.chr2
    }

    pub fn get_chr1_idx(&self) -> usize {
        self.chr1.get_index()
    }

    pub fn get_chr2_idx(&self) -> usize {
        self.chr2.get_index()
    }

    pub fn get_zoom(&self) -> HiCZoom {
        self.zoom
    }

    pub fn get_bin_size(&self) -> u32 {
        self.zoom.get_bin_size()
    }

    pub fn get_x_grid_axis(&self) -> &GridAxis {
        &self.x_axis
    }

    pub fn get_y_grid_axis(&self) -> &GridAxis {
        &self.y_axis
    }

    pub fn get_block_bin_count(&self) -> u32 {
        self.layout.block_bin_count
    }

    pub fn get_block_column_count(&self) -> u32 {
        self.layout.block_column_count
    }

    pub fn get_layout(&self) -> BlockLayout {
        self.layout
    }

    pub fn get_key(&self) -> ZoomDataKey {
        ZoomDataKey::new(MatrixKey::new(self.chr1.get_index(), self.chr2.get_index()), self.zoom)
    }

    pub fn is_intra(&self) -> bool {
        self.chr1.get_index() == self.chr2.get_index()
    }

    pub fn get_block_loader(&self) -> &BlockLoader {
        &self.loader
    }

    fn reader(&self) -> &dyn DatasetReader {
        self.loader.get_reader().as_ref()
    }

    /// Occupied blocks, ascending.
    pub fn get_block_numbers(&self) -> Result<Vec<u32>, ReadError> {
        let mut numbers = self.reader().get_block_numbers(&self.get_key())?;
        numbers.sort_unstable();
        Ok(numbers)
    }

    /// Normalized blocks covering the inclusive bin rectangle. Blocks are not
    /// checked against the occupied list, absent ones come back empty.
    pub fn blocks_overlapping(&self, bin_x1: u32, bin_y1: u32, bin_x2: u32, bin_y2: u32,
                              norm: NormalizationType) -> Vec<Arc<Block>> {
        let bbc = self.layout.block_bin_count;
        let (col1, row1) = (bin_x1 / bbc, bin_y1 / bbc);
        let (col2, row2) = (bin_x2 / bbc, bin_y2 / bbc);
        let numbers = Vec::from_iter((row1..=row2)
            .cartesian_product(col1..=col2)
            .map(|(r, c)| r * self.layout.block_column_count + c));
        self.loader.load(&self.get_key(), norm, &numbers)
    }

    /// Stored value at a bin pair, zero when nothing is recorded.
    pub fn observed_value(&self, bin_x: u32, bin_y: u32, norm: NormalizationType) -> f32 {
        let (x, y) = if self.is_intra() && bin_x > bin_y { (bin_y, bin_x) } else { (bin_x, bin_y) };
        self.blocks_overlapping(x, y, x, y, norm).iter()
            .flat_map(|b| b.get_contact_records().iter())
            .find(|rec| rec.get_bin_x() == x && rec.get_bin_y() == y)
            .map(|rec| rec.get_counts())
            .unwrap_or(0.0)
    }

    /// Row of the matrix through `center_bin`, restricted to
    /// `[start_bin, end_bin]`, as ascending (bin, value) pairs.
    pub fn slice(&self, start_bin: u32, end_bin: u32, center_bin: u32, norm: NormalizationType)
        -> Result<Vec<(u32, f32)>, UnsupportedOperation> {
        if !self.is_intra() {
            return Err(UnsupportedOperation { operation: "slice" });
        }
        let in_range = |bin: u32| bin >= start_bin && bin <= end_bin;
        let mut bin_values = Vec::new();

        for block in self.blocks_overlapping(start_bin, center_bin, center_bin, center_bin, norm) {
            bin_values.extend(block.get_contact_records().iter()
                .filter(|rec| rec.get_bin_y() == center_bin && rec.get_bin_x() <= center_bin && in_range(rec.get_bin_x()))
                .map(|rec| (rec.get_bin_x(), rec.get_counts())));
        }
        for block in self.blocks_overlapping(center_bin, center_bin, center_bin, end_bin, norm) {
            bin_values.extend(block.get_contact_records().iter()
                .filter(|rec| rec.get_bin_x() == center_bin && rec.get_bin_y() >= center_bin && in_range(rec.get_bin_y()))
                .map(|rec| (rec.get_bin_y(), rec.get_counts())));
        }

        Ok(merge_bin_values(bin_values))
    }

    /// Raw records of every occupied block in block number order. Blocks
    /// are read lazily; a failing block ends the iteration.
    pub fn contact_records(&self) -> Result<ContactRecordIter, ReadError> {
        Ok(ContactRecordIter {
            zd: self,
            block_numbers: self.get_block_numbers()?,
            next_block: 0,
            current: Vec::new().into_iter(),
        })
    }

    /// Observed over expected for the whole chromosome, stored symmetrically,
    /// and the indices of rows holding any signal.
    pub fn compute_oe(&self, expected: &dyn ExpectedValueFunction, norm: NormalizationType)
        -> Result<(SparseContactMatrix, Arc<Vec<usize>>), Box<dyn Error>> {
        if !self.is_intra() {
            return Err(UnsupportedOperation { operation: "O/E" }.into());
        }
        let n_bins = match self.zoom.get_unit() {
            Unit::BP => self.chr1.bin_count(self.zoom.get_bin_size()),
            Unit::FRAG => self.x_axis.bin_count() as usize,
        };
        let chr_idx = self.chr1.get_index();

        let mut oe = SparseContactMatrix::new(n_bins);
        let numbers = self.get_block_numbers()?;
        for block in self.loader.load_uncached(&self.get_key(), norm, &numbers) {
            for rec in block.get_contact_records() {
                let (x, y) = (rec.get_bin_x() as usize, rec.get_bin_y() as usize);
                let dist = if x > y { x - y } else { y - x };
                let value = rec.get_counts() as f64 / expected.get_expected_value(chr_idx, dist);
                oe.add(x, y, value);
                if x != y {
                    oe.add(y, x, value);
                }
            }
        }

        let columns = Arc::new(oe.nonzero_rows());
        debug!("O/E of {}: {} of {} rows hold signal", self.description(), columns.len(), n_bins);
        *cache::lock(&self.non_centromere_columns) = Some(Arc::clone(&columns));
        Ok((oe, columns))
    }

    /// Indices of the rows found to hold signal by the last O/E computation.
    pub fn non_centromere_columns(&self) -> Option<Arc<Vec<usize>>> {
        cache::lock(&self.non_centromere_columns).clone()
    }

    /// Correlation between columns of the row-centred O/E matrix. Rows and
    /// columns without signal are NaN.
    pub fn compute_pearsons(&self, expected: &dyn ExpectedValueFunction, norm: NormalizationType)
        -> Result<Arc<Array2<f64>>, Box<dyn Error>> {
        let (oe, columns) = self.compute_oe(expected, norm)?;
        let mut dense = oe.to_dense();
        for &i in columns.iter() {
            let mean = correlation::nan_mean(dense.row(i).iter());
            dense.row_mut(i).mapv_inplace(|v| v - mean);
        }

        let mut corr = correlation::column_correlation(&dense);
        let mut keep = vec![false; corr.nrows()];
        columns.iter().for_each(|&i| keep[i] = true);
        for i in (0..keep.len()).filter(|&i| !keep[i]) {
            corr.row_mut(i).fill(std::f64::NAN);
            corr.column_mut(i).fill(std::f64::NAN);
        }

        let corr = Arc::new(corr);
        cache::lock(&self.pearsons).insert(norm, Arc::clone(&corr));
        Ok(corr)
    }

    /// Cached Pearson matrix, otherwise the precomputed one of the reader.
    /// Types the reader lacks are remembered and not asked for again.
    pub fn pearsons(&self, norm: NormalizationType) -> Option<Arc<Array2<f64>>> {
        if let Some(p) = cache::lock(&self.pearsons).get(&norm) {
            return Some(Arc::clone(p));
        }
        if cache::lock(&self.missing_pearsons).contains(&norm) {
            return None;
        }

        match self.reader().read_pearsons(&self.chr1, &self.chr2, self.zoom, norm) {
            Ok(Some(p)) => {
                let p = Arc::new(p);
                cache::lock(&self.pearsons).insert(norm, Arc::clone(&p));
                Some(p)
            },
            Ok(None) => {
                cache::lock(&self.missing_pearsons).insert(norm);
                None
            },
            Err(e) => {
                warn!("Pearson matrix of {} ({}) could not be read: {}", self.description(), norm, e);
                cache::lock(&self.missing_pearsons).insert(norm);
                None
            }
        }
    }

    pub fn pearson_value(&self, bin_x: u32, bin_y: u32, norm: NormalizationType) -> f32 {
        cache::lock(&self.pearsons).get(&norm)
            .and_then(|p| p.get([bin_x as usize, bin_y as usize]).copied())
            .map(|v| v as f32)
            .unwrap_or(0.0)
    }

    /// True when Pearson data for the type is cached or precomputed by the
    /// reader, or when the matrix is below the bin limit.
    pub fn is_small_enough_for_pearson(&self, norm: NormalizationType) -> bool {
        self.pearsons(norm).is_some()
            || (self.layout.total_bins() as u64) < self.pearson_bin_limit as u64
    }

    /// Eigenvector of the `which`-th largest eigenvalue of the Pearson matrix
    /// restricted to rows with signal. Other positions are NaN.
    pub fn compute_eigenvector(&self, expected: &dyn ExpectedValueFunction, which: usize, norm: NormalizationType)
        -> Result<Vec<f64>, Box<dyn Error>> {
        if !self.is_intra() {
            return Err(UnsupportedOperation { operation: "eigenvector" }.into());
        }
        let pearsons = match self.pearsons(norm) {
            Some(p) => p,
            None => self.compute_pearsons(expected, norm)?,
        };
        let columns = match self.non_centromere_columns() {
            Some(c) if c.iter().all(|&i| i < pearsons.nrows()) => c,
            _ => Arc::new(finite_rows(&pearsons)),
        };
        if which >= columns.len() {
            return Err(MissingData::EigenvectorIndex(which, columns.len()).into());
        }

        let mut sub = pearsons.select(Axis(0), &columns).select(Axis(1), &columns);
        sub.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });
        info!("Computing eigenvector {} of {} over {} bins", which, self.description(), columns.len());
        let (_, vectors) = correlation::symmetric_eigen(&sub);

        let mut eigenvector = vec![std::f64::NAN; pearsons.nrows()];
        for (k, &i) in columns.iter().enumerate() {
            eigenvector[i] = vectors[[k, which]];
        }
        Ok(eigenvector)
    }

    /// Writes every raw record, optionally normalized by the two vectors.
    pub fn dump<W: Write>(&self, out: &mut W, format: DumpFormat,
                          norm: Option<(&NormalizationVector, &NormalizationVector)>) -> Result<usize, Box<dyn Error>> {
        let norm = norm.map(|(nv1, nv2)| (nv1.get_data(), nv2.get_data()));
        let mut written = 0;
        for n in self.get_block_numbers()? {
            if let Some(block) = self.reader().read_block(&self.get_key(), n)? {
                written += dump::write_records(out, format, block.get_contact_records().iter().copied(),
                                               self.get_bin_size(), norm)?;
            }
        }
        out.flush()?;
        Ok(written)
    }

    /// Writes the dense O/E or Pearson matrix. O/E rows and columns without
    /// signal are written as NaN.
    pub fn dump_oe<W: Write>(&self, out: &mut W, expected: &dyn ExpectedValueFunction, kind: DumpKind,
                             norm: NormalizationType, format: DumpFormat) -> Result<(), Box<dyn Error>> {
        let matrix = match kind {
            DumpKind::Oe => {
                let (oe, columns) = self.compute_oe(expected, norm)?;
                let mut dense = Array2::from_elem((oe.get_n_bins(), oe.get_n_bins()), std::f64::NAN);
                for &i in columns.iter() {
                    for &j in columns.iter() {
                        dense[[i, j]] = oe.get(i, j);
                    }
                }
                dense
            },
            DumpKind::Pearson => {
                let pearsons = self.compute_pearsons(expected, norm)?;
                Array2::clone(&*pearsons)
            },
        };
        dump::write_dense(out, format, &matrix)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!("{}-{} {}", self.chr1, self.chr2, self.zoom)
    }
}

impl fmt::Display for MatrixZoomData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Chromosomes: {} - {}", self.chr1, self.chr2)?;
        writeln!(f, "unit: {}", self.zoom.get_unit())?;
        writeln!(f, "binSize ({}): {}", self.zoom.get_unit(), self.zoom.get_bin_size())?;
        writeln!(f, "blockBinCount (bins): {}", self.layout.block_bin_count)?;
        write!(f, "blockColumnCount (columns): {}", self.layout.block_column_count)
    }
}

/// Sorts (bin, value) pairs by bin and sums the values of equal bins.
pub fn merge_bin_values(mut bin_values: Vec<(u32, f32)>) -> Vec<(u32, f32)> {
    bin_values.sort_by_key(|&(bin, _)| bin);
    bin_values.into_iter()
        .coalesce(|a, b| if a.0 == b.0 { Ok((a.0, a.1 + b.1)) } else { Err((a, b)) })
        .collect()
}

fn finite_rows(matrix: &Array2<f64>) -> Vec<usize> {
    matrix.outer_iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|v| !v.is_nan()))
        .map(|(i, _)| i)
        .collect()
}

pub struct ContactRecordIter<'a> {
    zd: &'a MatrixZoomData,
    block_numbers: Vec<u32>,
    next_block: usize,
    current: std::vec::IntoIter<ContactRecord>,
}

impl<'a> Iterator for ContactRecordIter<'a> {
    type Item = ContactRecord;

    fn next(&mut self) -> Option<ContactRecord> {
        loop {
            if let Some(rec) = self.current.next() {
                return Some(rec);
            }
            let n = *self.block_numbers.get(self.next_block)?;
            self.next_block += 1;
            match self.zd.reader().read_block(&self.zd.get_key(), n) {
                Ok(Some(block)) => self.current = block.get_contact_records().to_vec().into_iter(),
                Ok(None) => (),
                Err(e) => {
                    error!("Error fetching block {} of {}: {}", n, self.zd.description(), e);
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expected::ExpectedValueTable;
    use crate::genome::chrom;
    use crate::loader::BlockKey;
    use crate::memory::MemoryReader;

    fn open_zoom_data(reader: MemoryReader, config: &StoreConfig) -> MatrixZoomData {
        let reader: Arc<dyn DatasetReader> = Arc::new(reader);
        let vectors = Arc::new(NormVectorStore::new(Arc::clone(&reader), 4));
        MatrixZoomData::new(chrom(1, "chr1", 1_950), chrom(1, "chr1", 1_950), HiCZoom::bp(100),
                            BlockLayout::new(10, 2), None, None, reader, vectors, config)
    }

    fn zoom_data_with(records: Vec<ContactRecord>, config: &StoreConfig) -> (MatrixZoomData, Arc<MemoryReader>) {
        let zoom = HiCZoom::bp(100);
        let layout = BlockLayout::new(10, 2);
        let key = MatrixKey::new(1, 1);
        let zd_key = ZoomDataKey::new(key, zoom);
        let mut reader = MemoryReader::default();
        reader.add_zoom_data(key, zoom, layout);
        let grouped = records.into_iter()
            .map(|r| (layout.block_number(r.get_bin_x(), r.get_bin_y()), r))
            .into_group_map();
        for (n, recs) in grouped {
            reader.add_block(zd_key, Block::new(n, recs));
        }
        let reader = Arc::new(reader);
        let vectors = Arc::new(NormVectorStore::new(reader.clone(), 4));
        let zd = MatrixZoomData::new(chrom(1, "chr1", 1_950), chrom(1, "chr1", 1_950), zoom, layout,
                                     None, None, reader.clone(), vectors, config);
        (zd, reader)
    }

    fn flat_expected(value: f64) -> ExpectedValueTable {
        ExpectedValueTable::new(NormalizationType::NONE, HiCZoom::bp(100), vec![value], AHashMap::default())
    }

    fn sample_records() -> Vec<ContactRecord> {
        vec![
            ContactRecord::new(0, 0, 4.0),
            ContactRecord::new(0, 1, 2.0),
            ContactRecord::new(1, 1, 6.0),
            ContactRecord::new(1, 2, 3.0),
            ContactRecord::new(2, 2, 5.0),
            ContactRecord::new(2, 12, 1.0),
            ContactRecord::new(12, 12, 7.0),
            ContactRecord::new(0, 12, 2.0),
        ]
    }

    #[test]
    fn observed_value_is_symmetric() {
        let (zd, _) = zoom_data_with(sample_records(), &StoreConfig::default());
        assert_eq!(zd.observed_value(1, 2, NormalizationType::NONE), 3.0);
        assert_eq!(zd.observed_value(2, 1, NormalizationType::NONE), 3.0);
        assert_eq!(zd.observed_value(12, 2, NormalizationType::NONE), 1.0);
        assert_eq!(zd.observed_value(5, 7, NormalizationType::NONE), 0.0);
    }

    #[test]
    fn blocks_overlapping_covers_rectangle() {
        let (zd, _) = zoom_data_with(sample_records(), &StoreConfig::default());
        let mut numbers = Vec::from_iter(zd.blocks_overlapping(0, 0, 15, 15, NormalizationType::NONE)
            .iter().map(|b| b.get_number()));
        numbers.sort();
        assert_eq!(numbers, vec![0, 1, 2, 3]);
        let empty = zd.blocks_overlapping(10, 0, 10, 0, NormalizationType::NONE);
        assert_eq!(empty.len(), 1);
        assert!(empty[0].is_empty());
    }

    #[test]
    fn cached_blocks_match_reader() {
        let (zd, reader) = zoom_data_with(sample_records(), &StoreConfig::default());
        let first = zd.blocks_overlapping(0, 0, 0, 0, NormalizationType::NONE);
        assert!(zd.get_block_loader().is_cached(&BlockKey::new(zd.get_key(), 0, NormalizationType::NONE)));
        let second = zd.blocks_overlapping(0, 0, 0, 0, NormalizationType::NONE);
        let direct = reader.read_block(&zd.get_key(), 0).unwrap().unwrap();
        assert_eq!(first[0].as_ref(), &direct);
        assert_eq!(second[0].as_ref(), &direct);
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let (zd, _) = zoom_data_with(sample_records(), &StoreConfig::default().without_caching());
        zd.blocks_overlapping(0, 0, 0, 0, NormalizationType::NONE);
        assert!(!zd.get_block_loader().is_cached(&BlockKey::new(zd.get_key(), 0, NormalizationType::NONE)));
    }

    #[test]
    fn slice_merges_both_sides() {
        let records = vec![
            ContactRecord::new(1, 5, 3.0),
            ContactRecord::new(5, 5, 2.0),
            ContactRecord::new(3, 5, 1.0),
            ContactRecord::new(5, 9, 4.0),
            ContactRecord::new(5, 15, 8.0),
            ContactRecord::new(4, 9, 9.0),
        ];
        let (zd, _) = zoom_data_with(records, &StoreConfig::default());
        let slice = zd.slice(2, 12, 5, NormalizationType::NONE).unwrap();
        assert_eq!(slice, vec![(3, 1.0), (5, 4.0), (9, 4.0)]);
    }

    #[test]
    fn merge_sums_equal_bins() {
        let merged = merge_bin_values(vec![(100, 3.0), (50, 1.0), (100, 2.0)]);
        assert_eq!(merged, vec![(50, 1.0), (100, 5.0)]);
    }

    #[test]
    fn oe_is_symmetric_and_excludes_empty_rows() {
        let (zd, _) = zoom_data_with(sample_records(), &StoreConfig::default());
        let (oe, columns) = zd.compute_oe(&flat_expected(2.0), NormalizationType::NONE).unwrap();
        assert_eq!(oe.get_n_bins(), 20);
        assert_eq!(oe.get(0, 1), 1.0);
        assert_eq!(oe.get(1, 0), 1.0);
        assert_eq!(oe.get(12, 0), 1.0);
        assert_eq!(oe.get(2, 2), 2.5);
        assert_eq!(columns.as_ref(), &vec![0, 1, 2, 12]);
        assert_eq!(zd.non_centromere_columns(), Some(columns));
    }

    #[test]
    fn pearson_marks_excluded_bins_nan() {
        let (zd, _) = zoom_data_with(sample_records(), &StoreConfig::default());
        let pearsons = zd.compute_pearsons(&flat_expected(1.0), NormalizationType::NONE).unwrap();
        assert_eq!(pearsons.dim(), (20, 20));
        for i in 0..20 {
            assert!(pearsons[[5, i]].is_nan());
            assert!(pearsons[[i, 5]].is_nan());
        }
        assert!(pearsons[[0, 1]].is_finite());
        assert!((pearsons[[0, 1]] - pearsons[[1, 0]]).abs() < 1e-12);
        assert_eq!(zd.pearson_value(0, 1, NormalizationType::NONE), pearsons[[0, 1]] as f32);
        assert_eq!(zd.pearson_value(100, 1, NormalizationType::NONE), 0.0);
    }

    #[test]
    fn eigenvector_has_nan_outside_signal() {
        let (zd, _) = zoom_data_with(sample_records(), &StoreConfig::default());
        let ev = zd.compute_eigenvector(&flat_expected(1.0), 0, NormalizationType::NONE).unwrap();
        assert_eq!(ev.len(), 20);
        assert!(ev[5].is_nan());
        assert!(ev[0].is_finite() && ev[12].is_finite());
        assert!(zd.compute_eigenvector(&flat_expected(1.0), 4, NormalizationType::NONE).is_err());
    }

    #[test]
    fn pearson_size_gate() {
        // 20 bins in total
        let (zd, _) = zoom_data_with(vec![], &StoreConfig::default().with_pearson_bin_limit(10));
        assert!(!zd.is_small_enough_for_pearson(NormalizationType::KR));
        assert!(zd.pearsons(NormalizationType::KR).is_none());
        let (zd, _) = zoom_data_with(vec![], &StoreConfig::default());
        assert!(zd.is_small_enough_for_pearson(NormalizationType::KR));
    }

    #[test]
    fn precomputed_pearsons_pass_size_gate() {
        let zoom = HiCZoom::bp(100);
        let key = ZoomDataKey::new(MatrixKey::new(1, 1), zoom);
        let mut reader = MemoryReader::default();
        reader.add_zoom_data(key.matrix_key(), zoom, BlockLayout::new(10, 2));
        reader.add_pearsons(key, NormalizationType::KR, Array2::eye(20));
        let zd = open_zoom_data(reader, &StoreConfig::default().with_pearson_bin_limit(10));
        assert!(zd.is_small_enough_for_pearson(NormalizationType::KR));
        assert!(!zd.is_small_enough_for_pearson(NormalizationType::VC));
        assert_eq!(zd.pearson_value(3, 3, NormalizationType::KR), 1.0);
    }

    #[test]
    fn pearson_cache_follows_requested_normalization() {
        let (zd, _) = zoom_data_with(sample_records(), &StoreConfig::default());
        // expected values of another type than the requested one
        let pearsons = zd.compute_pearsons(&flat_expected(1.0), NormalizationType::VC).unwrap();
        assert!(Arc::ptr_eq(&zd.pearsons(NormalizationType::VC).unwrap(), &pearsons));
        assert_eq!(zd.pearson_value(0, 1, NormalizationType::NONE), 0.0);
    }

    #[test]
    fn normalized_blocks_use_shared_vectors() {
        let (zd, reader) = zoom_data_with(sample_records(), &StoreConfig::default());
        assert_eq!(zd.observed_value(0, 1, NormalizationType::LOADED), 0.0);
        let vectors = NormVectorStore::new(reader, 4);
        vectors.put_loaded(NormalizationVector::new(NormalizationType::LOADED, 1, HiCZoom::bp(100), vec![2.0; 20]));
        let block = vectors.normalize(&zd.get_key(), reader_block(&zd, 0), NormalizationType::LOADED).unwrap();
        assert_eq!(block.get_contact_records()[1], ContactRecord::new(0, 1, 0.5));
    }

    fn reader_block(zd: &MatrixZoomData, n: u32) -> Block {
        zd.reader().read_block(&zd.get_key(), n).unwrap().unwrap()
    }

    #[test]
    fn dump_writes_blocks_in_order() {
        let (zd, _) = zoom_data_with(vec![ContactRecord::new(12, 12, 7.0), ContactRecord::new(0, 1, 2.0)],
                                     &StoreConfig::default());
        let mut out = Vec::new();
        assert_eq!(zd.dump(&mut out, DumpFormat::Text, None).unwrap(), 2);
        assert_eq!(String::from_utf8(out).unwrap(), "0\t100\t2\n1200\t1200\t7\n");
        assert_eq!(zd.contact_records().unwrap().count(), 2);
    }

    #[test]
    fn inter_matrix_rejects_intra_operations() {
        let zoom = HiCZoom::bp(100);
        let reader: Arc<dyn DatasetReader> = Arc::new(MemoryReader::default());
        let vectors = Arc::new(NormVectorStore::new(Arc::clone(&reader), 4));
        let zd = MatrixZoomData::new(chrom(1, "chr1", 1_000), chrom(2, "chr2", 1_000), zoom,
                                     BlockLayout::new(10, 2), None, None, reader, vectors, &StoreConfig::default());
        assert!(zd.slice(0, 5, 2, NormalizationType::NONE).is_err());
        assert!(zd.compute_oe(&flat_expected(1.0), NormalizationType::NONE).is_err());
        assert!(zd.compute_eigenvector(&flat_expected(1.0), 0, NormalizationType::NONE).is_err());
    }
}
