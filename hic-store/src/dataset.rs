use std::error::Error;
use std::fs::File;
use std::io::{BufReader, Read};
use std::iter::FromIterator;
use std::path::Path;
use std::sync::{Arc, Mutex};

use ahash::AHashMap;
use log::{error, info};

use super::block::MatrixKey;
use super::cache::{self, LruCache};
use super::config::StoreConfig;
use super::errors::{FormatError, MissingData, ReadError};
use super::expected::{ExpectedKey, ExpectedValueFunction, ExpectedValueTable};
use super::genome::Chromosome;
use super::matrix::Matrix;
use super::normalization::{NormalizationFile, NormalizationType, NormVectorStore, NormalizationVector};
use super::reader::{DatasetReader, EigenvectorKey};
use super::zoom::{HiCZoom, Unit};

pub const STATISTICS_ATTRIBUTE: &str = "statistics";
pub const GRAPHS_ATTRIBUTE: &str = "graphs";

/// An opened Hi-C dataset: the chromosome and zoom registry plus every
/// cache sitting in front of the reader.
pub struct Dataset {
    reader: Arc<dyn DatasetReader>,
    config: StoreConfig,
    chromosomes: Vec<Chromosome>,
    genome_id: Option<String>,
    bp_zooms: Vec<HiCZoom>,
    frag_zooms: Vec<HiCZoom>,
    attributes: AHashMap<String, String>,
    fragment_sites: AHashMap<usize, Arc<Vec<u32>>>,
    normalization_types: Vec<NormalizationType>,
    expected_values: AHashMap<ExpectedKey, Arc<ExpectedValueTable>>,
    vectors: Arc<NormVectorStore>,
    matrices: Mutex<AHashMap<MatrixKey, Arc<Matrix>>>,
    eigenvector_cache: Mutex<LruCache<EigenvectorKey, Option<Arc<Vec<f64>>>>>,
}

impl Dataset {
    pub fn new(reader: Arc<dyn DatasetReader>) -> Result<Dataset, ReadError> {
        Dataset::with_config(reader, StoreConfig::default())
    }

    pub fn with_config(reader: Arc<dyn DatasetReader>, config: StoreConfig) -> Result<Dataset, ReadError> {
        let header = reader.read_header()?;
        info!("Opened dataset with {} chromosomes, {} BP and {} FRAG resolutions (format version {})",
              header.chromosomes.len(), header.bp_bin_sizes.len(), header.frag_bin_sizes.len(), reader.get_version());

        let expected_values = header.expected_values.into_iter()
            .map(|t| (t.get_key(), Arc::new(t)))
            .collect();

        Ok(Dataset {
            vectors: Arc::new(NormVectorStore::new(Arc::clone(&reader), config.norm_vector_cache_capacity)),
            eigenvector_cache: Mutex::new(LruCache::new(config.eigenvector_cache_capacity)),
            reader,
            config,
            chromosomes: header.chromosomes,
            genome_id: header.genome_id,
            bp_zooms: Vec::from_iter(header.bp_bin_sizes.into_iter().map(HiCZoom::bp)),
            frag_zooms: Vec::from_iter(header.frag_bin_sizes.into_iter().map(HiCZoom::frag)),
            attributes: header.attributes,
            fragment_sites: header.fragment_sites,
            normalization_types: header.normalization_types,
            expected_values,
            matrices: Mutex::new(AHashMap::default()),
        })
    }

    pub fn get_version(&self) -> u32 {
        self.reader.get_version()
    }

    pub fn get_config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn get_chromosomes(&self) -> &[Chromosome] {
        &self.chromosomes
    }

    pub fn get_chromosome(&self, index: usize) -> Option<&Chromosome> {
        self.chromosomes.iter().find(|c| c.get_index() == index)
    }

    pub fn get_genome_id(&self) -> Option<&str> {
        self.genome_id.as_deref()
    }

    pub fn get_bp_zooms(&self) -> &[HiCZoom] {
        &self.bp_zooms
    }

    pub fn get_frag_zooms(&self) -> &[HiCZoom] {
        &self.frag_zooms
    }

    pub fn has_frags(&self) -> bool {
        !self.frag_zooms.is_empty()
    }

    fn zooms_of(&self, unit: Unit) -> &[HiCZoom] {
        match unit {
            Unit::BP => &self.bp_zooms,
            Unit::FRAG => &self.frag_zooms,
        }
    }

    pub fn number_of_zooms(&self, unit: Unit) -> usize {
        self.zooms_of(unit).len()
    }

    pub fn get_zoom(&self, unit: Unit, index: usize) -> Option<HiCZoom> {
        self.zooms_of(unit).get(index).copied()
    }

    /// Neighbouring zoom in the direction of higher (`increasing`) or lower
    /// resolution. Both ends of the list saturate.
    pub fn next_zoom(&self, zoom: HiCZoom, increasing: bool) -> HiCZoom {
        let zooms = self.zooms_of(zoom.get_unit());
        let position = zooms.iter().position(|z| *z == zoom);
        let next = if increasing {
            match position {
                Some(i) if i + 1 < zooms.len() => zooms.get(i + 1),
                _ => zooms.last(),
            }
        } else {
            match position {
                Some(i) if i > 0 => zooms.get(i - 1),
                _ => zooms.first(),
            }
        };
        next.copied().unwrap_or(zoom)
    }

    /// Matrix of a chromosome pair in either order, `None` when nothing is
    /// stored for the pair.
    pub fn matrix(&self, chr1_idx: usize, chr2_idx: usize) -> Result<Option<Arc<Matrix>>, ReadError> {
        let key = MatrixKey::new(chr1_idx, chr2_idx);
        if let Some(m) = cache::lock(&self.matrices).get(&key) {
            return Ok(Some(Arc::clone(m)));
        }

        let (chr1, chr2) = match (self.get_chromosome(key.get_chr1_idx()), self.get_chromosome(key.get_chr2_idx())) {
            (Some(c1), Some(c2)) => (c1.clone(), c2.clone()),
            _ => return Ok(None),
        };
        let index = match self.reader.read_matrix(key) {
            Ok(Some(index)) => index,
            Ok(None) => return Ok(None),
            Err(e) => {
                error!("Error fetching matrix for {}-{}: {}", chr1, chr2, e);
                return Err(e);
            }
        };

        let sites = (self.fragment_sites.get(&chr1.get_index()).cloned(),
                     self.fragment_sites.get(&chr2.get_index()).cloned());
        let matrix = Arc::new(Matrix::new(&index, chr1, chr2, sites, Arc::clone(&self.reader),
                                          Arc::clone(&self.vectors), &self.config));
        if self.config.caching {
            cache::lock(&self.matrices).insert(key, Arc::clone(&matrix));
        }
        Ok(Some(matrix))
    }

    /// Normalization vector of a chromosome. NONE has no vector, LOADED
    /// vectors come from `put_loaded_normalization_vector`, all others from
    /// the reader with both hits and misses remembered. Normalized block
    /// queries of every matrix go through the same lookup.
    pub fn normalization_vector(&self, chr_idx: usize, zoom: HiCZoom, norm: NormalizationType)
        -> Option<Arc<NormalizationVector>> {
        self.vectors.get(chr_idx, zoom, norm)
    }

    pub fn expected_values(&self, zoom: HiCZoom, norm: NormalizationType) -> Option<Arc<ExpectedValueTable>> {
        self.expected_values.get(&ExpectedKey::new(zoom, norm)).cloned()
    }

    /// Eigenvector of an intra-chromosomal matrix: precomputed by the reader
    /// if available, otherwise computed when the matrix is small enough.
    /// Results, including unavailability, are remembered.
    pub fn eigenvector(&self, chr_idx: usize, zoom: HiCZoom, number: usize, norm: NormalizationType)
        -> Result<Arc<Vec<f64>>, Box<dyn Error>> {
        let key = EigenvectorKey::new(chr_idx, zoom, number, norm);
        if let Some(cached) = cache::lock(&self.eigenvector_cache).get(&key) {
            return cached.ok_or_else(|| MissingData::EigenvectorUnavailable(zoom).into());
        }

        let chr = self.get_chromosome(chr_idx).ok_or(MissingData::Matrix(chr_idx, chr_idx))?;
        let eigenvector = match self.reader.read_eigenvector(chr, zoom, number, norm)? {
            Some(ev) => Some(ev),
            None => self.compute_eigenvector(chr_idx, zoom, number, norm)?,
        };

        let eigenvector = eigenvector.map(Arc::new);
        cache::lock(&self.eigenvector_cache).put(key, eigenvector.clone());
        eigenvector.ok_or_else(|| {
            info!("Eigenvector not available for chromosome {} at {}", chr_idx, zoom);
            MissingData::EigenvectorUnavailable(zoom).into()
        })
    }

    fn compute_eigenvector(&self, chr_idx: usize, zoom: HiCZoom, number: usize, norm: NormalizationType)
        -> Result<Option<Vec<f64>>, Box<dyn Error>> {
        let expected = match self.expected_values(zoom, norm) {
            Some(e) => e,
            None => return Ok(None),
        };
        let matrix = self.matrix(chr_idx, chr_idx)?.ok_or(MissingData::Matrix(chr_idx, chr_idx))?;
        let zd = matrix.zoom_data(zoom).ok_or(MissingData::Zoom(zoom))?;
        if !zd.is_small_enough_for_pearson(norm) {
            return Ok(None);
        }
        Ok(Some(zd.compute_eigenvector(expected.as_ref(), number, norm)?))
    }

    pub fn get_normalization_types(&self) -> &[NormalizationType] {
        &self.normalization_types
    }

    pub fn add_normalization_type(&mut self, norm: NormalizationType) {
        if !self.normalization_types.contains(&norm) {
            self.normalization_types.push(norm);
        }
    }

    /// Registers a user supplied LOADED vector for a chromosome and the
    /// matching LOADED expected values at the BP resolution. The expected
    /// values reuse the per-chromosome factors of the KR table, which must
    /// exist at that resolution.
    pub fn put_loaded_normalization_vector(&mut self, chr_idx: usize, resolution: u32, data: Vec<f64>,
                                           expected: Vec<f64>) -> Result<(), MissingData> {
        let zoom = HiCZoom::bp(resolution);
        let kr = self.expected_values(zoom, NormalizationType::KR)
            .ok_or(MissingData::ExpectedValues(zoom, NormalizationType::KR))?;

        self.vectors.put_loaded(NormalizationVector::new(NormalizationType::LOADED, chr_idx, zoom, data));
        let table = ExpectedValueTable::new(NormalizationType::LOADED, zoom, expected, kr.get_norm_factors().clone());
        self.expected_values.insert(table.get_key(), Arc::new(table));
        self.add_normalization_type(NormalizationType::LOADED);
        Ok(())
    }

    pub fn load_normalization_file(&mut self, path: &Path) -> Result<(), Box<dyn Error>> {
        info!("Loading normalization vectors from {}", path.display());
        let file = File::open(path)?;
        self.load_normalization(BufReader::new(file))
    }

    /// Splits a genome-wide vector into per-chromosome LOADED vectors, in
    /// chromosome order with the whole genome skipped.
    pub fn load_normalization<R: Read>(&mut self, input: R) -> Result<(), Box<dyn Error>> {
        let file = NormalizationFile::parse(input)?;
        let chromosomes = Vec::from_iter(self.chromosomes.iter()
            .filter(|c| !c.is_whole_genome())
            .map(|c| (c.get_index(), c.bin_count(file.resolution))));

        let needed: usize = chromosomes.iter().map(|(_, n)| n).sum();
        if file.vector.len() < needed {
            return Err(FormatError::new(format!(
                "normalization vector holds {} values but the genome needs {} at resolution {}",
                file.vector.len(), needed, file.resolution)).into());
        }

        let mut offset = 0;
        for (chr_idx, n_bins) in chromosomes {
            let data = file.vector[offset..offset + n_bins].to_vec();
            offset += n_bins;
            self.put_loaded_normalization_vector(chr_idx, file.resolution, data, file.expected.clone())?;
        }
        Ok(())
    }

    pub fn get_attributes(&self) -> &AHashMap<String, String> {
        &self.attributes
    }

    pub fn set_attribute(&mut self, key: String, value: String) {
        self.attributes.insert(key, value);
    }

    pub fn get_statistics(&self) -> Option<&str> {
        self.attributes.get(STATISTICS_ATTRIBUTE).map(|s| s.as_str())
    }

    pub fn get_graphs(&self) -> Option<&str> {
        self.attributes.get(GRAPHS_ATTRIBUTE).map(|s| s.as_str())
    }

    /// Number of restriction fragments per chromosome name.
    pub fn fragment_counts(&self) -> AHashMap<String, usize> {
        self.chromosomes.iter()
            .filter_map(|c| self.fragment_sites.get(&c.get_index())
                .map(|sites| (c.get_name().to_string(), sites.len())))
            .collect()
    }

    /// Disabling caching drops the matrices loaded so far; matrices loaded
    /// afterwards keep no blocks either.
    pub fn set_caching(&mut self, caching: bool) {
        self.config.caching = caching;
        if !caching {
            cache::lock(&self.matrices).clear();
        }
    }
}
