use std::error::Error;
use std::iter::FromIterator;
use std::path::Path;

use ahash::AHashMap;
use itertools::Itertools;
use log::{debug, info, warn};
use ndarray::Array1;

use super::pair_builder::{PairsReader, PairStats};
use super::super::balancer::Balancer;
use super::super::block::{Block, BlockLayout, ContactRecord, MatrixKey, ZoomDataKey};
use super::super::expected::ExpectedValueTable;
use super::super::genome::Chromosome;
use super::super::memory::MemoryReader;
use super::super::normalization::{normalize_counts, NormalizationType, NormalizationVector};
use super::super::reader::DatasetHeader;
use super::super::zoom::HiCZoom;

pub const DEFAULT_BLOCK_BIN_COUNT: u32 = 1000;

type Pixels = AHashMap<(u32, u32), f32>;

/// Bins contacts at several BP resolutions and assembles an in-memory
/// dataset with blocks, expected values and normalization vectors.
pub struct DatasetBuilder {
    chromosomes: Vec<Chromosome>,
    resolutions: Vec<u32>,
    block_bin_count: u32,
    genome_id: Option<String>,
    attributes: AHashMap<String, String>,
    normalizations: Vec<NormalizationType>,
    balancer: Balancer,
    pixels: Vec<AHashMap<MatrixKey, Pixels>>,
    n_contacts: usize,
}

impl DatasetBuilder {
    /// Resolutions are kept coarsest first; zero bin sizes are dropped.
    pub fn new(chromosomes: Vec<Chromosome>, resolutions: &[u32], block_bin_count: u32) -> DatasetBuilder {
        let mut resolutions = Vec::from_iter(resolutions.iter().copied().filter(|&r| r > 0).unique());
        resolutions.sort_by(|a, b| b.cmp(a));

        DatasetBuilder {
            chromosomes,
            pixels: resolutions.iter().map(|_| AHashMap::default()).collect(),
            resolutions,
            block_bin_count: block_bin_count.max(1),
            genome_id: None,
            attributes: AHashMap::default(),
            normalizations: Vec::new(),
            balancer: Balancer::new(),
            n_contacts: 0,
        }
    }

    pub fn with_genome_id(mut self, genome_id: &str) -> DatasetBuilder {
        self.genome_id = Some(genome_id.to_string());
        self
    }

    pub fn with_attribute(mut self, key: &str, value: &str) -> DatasetBuilder {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    /// Only VC, VC_SQRT and KR can be computed from contacts.
    pub fn with_normalizations(mut self, norms: &[NormalizationType]) -> DatasetBuilder {
        for &norm in norms {
            match norm {
                NormalizationType::VC | NormalizationType::VC_SQRT | NormalizationType::KR => {
                    if !self.normalizations.contains(&norm) {
                        self.normalizations.push(norm);
                    }
                }
                NormalizationType::NONE => (),
                other => warn!("{} normalization cannot be computed from contacts, ignoring", other),
            }
        }
        self
    }

    pub fn with_balancer(mut self, balancer: Balancer) -> DatasetBuilder {
        self.balancer = balancer;
        self
    }

    pub fn get_chromosomes(&self) -> &[Chromosome] {
        &self.chromosomes
    }

    pub fn get_contact_count(&self) -> usize {
        self.n_contacts
    }

    /// Adds one read pair. Positions past the chromosome end are clamped.
    /// Returns false when either chromosome is unknown or the whole genome.
    pub fn add_contact(&mut self, chr1_idx: usize, pos1: u64, chr2_idx: usize, pos2: u64) -> bool {
        self.add_count(chr1_idx, pos1, chr2_idx, pos2, 1.0)
    }

    pub fn add_count(&mut self, chr1_idx: usize, pos1: u64, chr2_idx: usize, pos2: u64, count: f32) -> bool {
        let (len1, len2) = match (self.length_of(chr1_idx), self.length_of(chr2_idx)) {
            (Some(l1), Some(l2)) => (l1, l2),
            _ => return false,
        };
        let (pos1, pos2) = (pos1.min(len1), pos2.min(len2));
        let ((c1, p1), (c2, p2)) = if chr1_idx <= chr2_idx {
            ((chr1_idx, pos1), (chr2_idx, pos2))
        } else {
            ((chr2_idx, pos2), (chr1_idx, pos1))
        };

        let key = MatrixKey::new(c1, c2);
        for (&bin_size, pixels) in self.resolutions.iter().zip(self.pixels.iter_mut()) {
            let (x, y) = ((p1 / bin_size as u64) as u32, (p2 / bin_size as u64) as u32);
            let (x, y) = if c1 == c2 && x > y { (y, x) } else { (x, y) };
            *pixels.entry(key).or_insert_with(AHashMap::default).entry((x, y)).or_insert(0.0) += count;
        }
        self.n_contacts += 1;
        true
    }

    pub fn add_pairs_file(&mut self, pairs_file: &Path) -> Result<PairStats, Box<dyn Error>> {
        let reader = PairsReader::new(&self.chromosomes);
        reader.read_file(pairs_file, self)
    }

    pub fn build(self) -> MemoryReader {
        info!("Building dataset from {} contacts at resolutions {:?}", self.n_contacts, self.resolutions);
        let header = DatasetHeader {
            genome_id: self.genome_id.clone(),
            chromosomes: self.chromosomes.clone(),
            bp_bin_sizes: self.resolutions.clone(),
            attributes: self.attributes.clone(),
            ..Default::default()
        };
        let mut reader = MemoryReader::new(header);

        for (&bin_size, pixels) in self.resolutions.iter().zip(self.pixels.iter()) {
            let zoom = HiCZoom::bp(bin_size);
            for (&key, matrix_pixels) in pixels.iter().sorted_by_key(|(k, _)| **k) {
                self.write_blocks(&mut reader, key, zoom, matrix_pixels);
            }

            let intra = self.intra_pixels(pixels);
            reader.add_expected_values(self.expected_table(NormalizationType::NONE, zoom, &intra, &AHashMap::default()));

            for &norm in &self.normalizations {
                let vectors = self.normalization_vectors(norm, bin_size, &intra);
                if vectors.is_empty() {
                    warn!("No {} vectors could be computed at {}", norm, zoom);
                    continue;
                }
                reader.add_expected_values(self.expected_table(norm, zoom, &intra, &vectors));
                for (chr_idx, data) in vectors {
                    reader.add_normalization_vector(NormalizationVector::new(norm, chr_idx, zoom, data));
                }
            }
        }
        reader
    }

    fn length_of(&self, chr_idx: usize) -> Option<u64> {
        self.chromosomes.get(chr_idx)
            .filter(|c| !c.is_whole_genome())
            .map(|c| c.get_length())
    }

    fn write_blocks(&self, reader: &mut MemoryReader, key: MatrixKey, zoom: HiCZoom, pixels: &Pixels) {
        let bin_size = zoom.get_bin_size();
        let n_bins = self.chromosomes[key.get_chr1_idx()].bin_count(bin_size)
            .max(self.chromosomes[key.get_chr2_idx()].bin_count(bin_size));
        let layout = BlockLayout::covering(self.block_bin_count, n_bins);
        reader.add_zoom_data(key, zoom, layout);

        let zd = ZoomDataKey::new(key, zoom);
        let blocks = pixels.iter()
            .map(|(&(x, y), &c)| (layout.block_number(x, y), ContactRecord::new(x, y, c)))
            .into_group_map();
        debug!("{} at {}: {} pixels in {} blocks", key_name(&self.chromosomes, key), zoom, pixels.len(), blocks.len());

        for (number, mut records) in blocks {
            records.sort_by_key(|r| (r.get_bin_y(), r.get_bin_x()));
            reader.add_block(zd, Block::new(number, records));
        }
    }

    /// Upper triangle pixels of every intra-chromosomal matrix, as parallel
    /// arrays per chromosome index.
    fn intra_pixels(&self, pixels: &AHashMap<MatrixKey, Pixels>) -> Vec<(usize, Array1<u32>, Array1<u32>, Array1<f64>)> {
        pixels.iter()
            .filter(|(k, _)| k.is_intra())
            .sorted_by_key(|(k, _)| **k)
            .map(|(k, p)| {
                let bins1 = Array1::from_iter(p.keys().map(|b| b.0));
                let bins2 = Array1::from_iter(p.keys().map(|b| b.1));
                let counts = Array1::from_iter(p.values().map(|&c| c as f64));
                (k.get_chr1_idx(), bins1, bins2, counts)
            })
            .collect()
    }

    fn normalization_vectors(&self, norm: NormalizationType, bin_size: u32,
                             intra: &[(usize, Array1<u32>, Array1<u32>, Array1<f64>)]) -> AHashMap<usize, Vec<f64>> {
        let mut vectors = AHashMap::default();
        for (chr_idx, bins1, bins2, counts) in intra {
            let n_bins = self.chromosomes[*chr_idx].bin_count(bin_size);
            let data = match norm {
                NormalizationType::VC | NormalizationType::VC_SQRT => {
                    let coverage = self.balancer.coverage(n_bins, bins1.view(), bins2.view(), counts.view());
                    let mean = nonzero_mean(coverage.iter());
                    let vc = coverage.mapv(|c| if c > 0.0 { c / mean } else { std::f64::NAN });
                    if norm == NormalizationType::VC_SQRT { vc.mapv(f64::sqrt) } else { vc }
                }
                _ => match self.balancer.balance(n_bins, bins1.view(), bins2.view(), counts.view()) {
                    Some(bias) => {
                        let nv = bias.mapv(|b| 1.0 / b);
                        scale_to_raw_sum(nv, bins1.view(), bins2.view(), counts.view())
                    }
                    None => {
                        warn!("Balancing of chromosome {} at {} did not converge", chr_idx, bin_size);
                        continue;
                    }
                },
            };
            vectors.insert(*chr_idx, data.to_vec());
        }
        vectors
    }

    /// Genome-wide mean contact count per diagonal distance over all
    /// intra-chromosomal matrices, with per-chromosome factors
    /// `expected sum / observed sum`.
    fn expected_table(&self, norm: NormalizationType, zoom: HiCZoom,
                      intra: &[(usize, Array1<u32>, Array1<u32>, Array1<f64>)],
                      vectors: &AHashMap<usize, Vec<f64>>) -> ExpectedValueTable {
        let bin_size = zoom.get_bin_size();
        let chr_bins = Vec::from_iter(self.chromosomes.iter()
            .filter(|c| !c.is_whole_genome())
            .map(|c| (c.get_index(), c.bin_count(bin_size))));
        let max_bins = chr_bins.iter().map(|(_, n)| *n).max().unwrap_or(0);

        let mut sums = vec![0.0; max_bins];
        let mut observed: AHashMap<usize, f64> = AHashMap::default();
        for (chr_idx, bins1, bins2, counts) in intra {
            let nv = vectors.get(chr_idx);
            if norm != NormalizationType::NONE && nv.is_none() {
                continue;
            }
            for k in 0..counts.len() {
                let value = match nv {
                    Some(nv) => normalize_counts(counts[k] as f32, nv[bins1[k] as usize], nv[bins2[k] as usize]) as f64,
                    None => counts[k],
                };
                if !value.is_finite() {
                    continue;
                }
                let distance = (bins2[k] - bins1[k]) as usize;
                if distance < max_bins {
                    sums[distance] += value;
                }
                *observed.entry(*chr_idx).or_insert(0.0) += value;
            }
        }

        let mut possible = vec![0.0; max_bins];
        for (chr_idx, n_bins) in &chr_bins {
            if norm != NormalizationType::NONE && !vectors.contains_key(chr_idx) {
                continue;
            }
            for (d, p) in possible.iter_mut().enumerate().take(*n_bins) {
                *p += (*n_bins - d) as f64;
            }
        }

        let values = Vec::from_iter(sums.iter().zip(possible.iter())
            .map(|(s, p)| if *p > 0.0 { s / p } else { 0.0 }));

        let factors = chr_bins.iter()
            .filter_map(|&(chr_idx, n_bins)| {
                let obs = *observed.get(&chr_idx)?;
                let expected: f64 = values.iter().take(n_bins).enumerate()
                    .map(|(d, v)| v * (n_bins - d) as f64)
                    .sum();
                if obs > 0.0 { Some((chr_idx, expected / obs)) } else { None }
            })
            .collect();

        ExpectedValueTable::new(norm, zoom, values, factors)
    }
}

fn key_name(chromosomes: &[Chromosome], key: MatrixKey) -> String {
    format!("{}-{}", chromosomes[key.get_chr1_idx()], chromosomes[key.get_chr2_idx()])
}

fn nonzero_mean<'a, I: Iterator<Item = &'a f64>>(values: I) -> f64 {
    let (sum, n) = values.filter(|v| **v > 0.0).fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n > 0 { sum / n as f64 } else { std::f64::NAN }
}

/// Rescales a vector so that the normalized matrix keeps the raw total.
fn scale_to_raw_sum(nv: Array1<f64>, bins1: ndarray::ArrayView1<u32>, bins2: ndarray::ArrayView1<u32>,
                    counts: ndarray::ArrayView1<f64>) -> Array1<f64> {
    let mut raw = 0.0;
    let mut normalized = 0.0;
    for k in 0..counts.len() {
        let value = normalize_counts(counts[k] as f32, nv[bins1[k] as usize], nv[bins2[k] as usize]) as f64;
        if value.is_finite() {
            raw += counts[k];
            normalized += value;
        }
    }
    if normalized > 0.0 && raw > 0.0 {
        let scale = (normalized / raw).sqrt();
        nv.mapv(|v| v * scale)
    } else {
        nv
    }
}
