use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use ahash::AHashMap;
use log::warn;
use serde::Deserialize;

use super::block::{Block, ContactRecord, ZoomDataKey};
use super::cache::{self, LruCache};
use super::errors::{FormatError, ReadError};
use super::reader::DatasetReader;
use super::zoom::{HiCZoom, Unit};

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NormalizationType {
    NONE,
    VC,
    VC_SQRT,
    KR,
    GW_KR,
    GW_VC,
    INTER_KR,
    INTER_VC,
    LOADED,
}

impl NormalizationType {
    pub fn as_str(&self) -> &'static str {
        match *self {
            NormalizationType::NONE => "NONE",
            NormalizationType::VC => "VC",
            NormalizationType::VC_SQRT => "VC_SQRT",
            NormalizationType::KR => "KR",
            NormalizationType::GW_KR => "GW_KR",
            NormalizationType::GW_VC => "GW_VC",
            NormalizationType::INTER_KR => "INTER_KR",
            NormalizationType::INTER_VC => "INTER_VC",
            NormalizationType::LOADED => "LOADED",
        }
    }
}

impl fmt::Display for NormalizationType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NormalizationType {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(NormalizationType::NONE),
            "VC" => Ok(NormalizationType::VC),
            "VC_SQRT" => Ok(NormalizationType::VC_SQRT),
            "KR" => Ok(NormalizationType::KR),
            "GW_KR" => Ok(NormalizationType::GW_KR),
            "GW_VC" => Ok(NormalizationType::GW_VC),
            "INTER_KR" => Ok(NormalizationType::INTER_KR),
            "INTER_VC" => Ok(NormalizationType::INTER_VC),
            "LOADED" => Ok(NormalizationType::LOADED),
            other => Err(FormatError::new(format!("unknown normalization {}", other))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NormVectorKey {
    pub norm: NormalizationType,
    pub chr_idx: usize,
    pub unit: Unit,
    pub bin_size: u32,
}

impl NormVectorKey {
    pub fn new(norm: NormalizationType, chr_idx: usize, zoom: HiCZoom) -> NormVectorKey {
        NormVectorKey { norm, chr_idx, unit: zoom.get_unit(), bin_size: zoom.get_bin_size() }
    }
}

/// Dense per-bin scale factors of one chromosome at one resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizationVector {
    norm: NormalizationType,
    chr_idx: usize,
    zoom: HiCZoom,
    data: Vec<f64>,
}

impl NormalizationVector {
    pub fn new(norm: NormalizationType, chr_idx: usize, zoom: HiCZoom, data: Vec<f64>) -> NormalizationVector {
        NormalizationVector { norm, chr_idx, zoom, data }
    }

    pub fn get_key(&self) -> NormVectorKey {
        NormVectorKey::new(self.norm, self.chr_idx, self.zoom)
    }

    pub fn get_type(&self) -> NormalizationType {
        self.norm
    }

    pub fn get_chr_idx(&self) -> usize {
        self.chr_idx
    }

    pub fn get_zoom(&self) -> HiCZoom {
        self.zoom
    }

    pub fn get_data(&self) -> &[f64] {
        &self.data
    }

    /// Factor for a bin, NaN outside the vector.
    pub fn factor(&self, bin: u32) -> f64 {
        self.data.get(bin as usize).copied().unwrap_or(std::f64::NAN)
    }
}

/// `counts / (nv1[x] * nv2[y])`, NaN when either factor is zero or NaN.
pub fn normalize_counts(counts: f32, nv1: f64, nv2: f64) -> f32 {
    if nv1 != 0.0 && nv2 != 0.0 && !nv1.is_nan() && !nv2.is_nan() {
        (counts as f64 / (nv1 * nv2)) as f32
    } else {
        std::f32::NAN
    }
}

/// Divides every record of a raw block by the row and column factors.
/// Records that end up non-finite are dropped.
pub fn normalize_block(block: &Block, nv1: &NormalizationVector, nv2: &NormalizationVector) -> Block {
    let records = block.get_contact_records().iter()
        .filter_map(|rec| {
            let counts = normalize_counts(rec.get_counts(), nv1.factor(rec.get_bin_x()), nv2.factor(rec.get_bin_y()));
            if counts.is_finite() {
                Some(ContactRecord::new(rec.get_bin_x(), rec.get_bin_y(), counts))
            } else {
                None
            }
        })
        .collect();
    Block::new(block.get_number(), records)
}

/// Normalization vectors of a dataset, shared with every matrix it opens.
/// LOADED vectors live in an unbounded map, all other types are read from
/// the backend through an LRU remembering both hits and misses.
pub struct NormVectorStore {
    reader: Arc<dyn DatasetReader>,
    loaded: Mutex<AHashMap<NormVectorKey, Arc<NormalizationVector>>>,
    cache: Mutex<LruCache<NormVectorKey, Option<Arc<NormalizationVector>>>>,
}

impl NormVectorStore {
    pub fn new(reader: Arc<dyn DatasetReader>, cache_capacity: usize) -> NormVectorStore {
        NormVectorStore {
            reader,
            loaded: Mutex::new(AHashMap::default()),
            cache: Mutex::new(LruCache::new(cache_capacity)),
        }
    }

    pub fn get(&self, chr_idx: usize, zoom: HiCZoom, norm: NormalizationType) -> Option<Arc<NormalizationVector>> {
        let key = NormVectorKey::new(norm, chr_idx, zoom);
        match norm {
            NormalizationType::NONE => None,
            NormalizationType::LOADED => cache::lock(&self.loaded).get(&key).cloned(),
            _ => {
                if let Some(cached) = cache::lock(&self.cache).get(&key) {
                    return cached;
                }
                let nv = match self.reader.read_normalization_vector(norm, chr_idx, zoom) {
                    Ok(nv) => nv.map(Arc::new),
                    Err(e) => {
                        warn!("Normalization vector {} of chromosome {} at {} could not be read: {}", norm, chr_idx, zoom, e);
                        None
                    }
                };
                cache::lock(&self.cache).put(key, nv.clone());
                nv
            }
        }
    }

    /// Replaces the LOADED vector of the chromosome and resolution.
    pub fn put_loaded(&self, nv: NormalizationVector) {
        cache::lock(&self.loaded).insert(nv.get_key(), Arc::new(nv));
    }

    /// Divides a raw block of the zoom data by the vectors of both axes.
    pub fn normalize(&self, zd: &ZoomDataKey, block: Block, norm: NormalizationType) -> Result<Block, ReadError> {
        if norm == NormalizationType::NONE {
            return Ok(block);
        }
        let nv1 = self.get(zd.chr1_idx, zd.zoom, norm)
            .ok_or(ReadError::MissingNormalization(zd.chr1_idx, zd.zoom, norm))?;
        let nv2 = if zd.chr1_idx == zd.chr2_idx {
            Arc::clone(&nv1)
        } else {
            self.get(zd.chr2_idx, zd.zoom, norm)
                .ok_or(ReadError::MissingNormalization(zd.chr2_idx, zd.zoom, norm))?
        };
        Ok(normalize_block(&block, &nv1, &nv2))
    }
}

#[derive(Debug, Deserialize)]
struct NormFileHeader {
    resolution: u32,
    vector_length: usize,
    expected_length: usize,
}

#[derive(Debug, Deserialize)]
struct NormFileValue {
    value: f64,
}

/// Contents of an externally authored normalization file: a genome-wide
/// vector (chromosomes concatenated, whole genome excluded) and the matching
/// expected values for one BP resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationFile {
    pub resolution: u32,
    pub vector: Vec<f64>,
    pub expected: Vec<f64>,
}

impl NormalizationFile {
    pub fn parse<R: Read>(input: R) -> Result<NormalizationFile, FormatError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(input);
        let mut raw_record = csv::ByteRecord::new();

        let read_next = |rdr: &mut csv::Reader<R>, raw: &mut csv::ByteRecord, line: usize| -> Result<(), FormatError> {
            match rdr.read_byte_record(raw) {
                Ok(true) => Ok(()),
                Ok(false) => Err(FormatError::at_line(line, "unexpected end of file")),
                Err(e) => Err(FormatError::at_line(line, e.to_string())),
            }
        };

        read_next(&mut rdr, &mut raw_record, 1)?;
        let header: NormFileHeader = raw_record.deserialize(None)
            .map_err(|e| FormatError::at_line(1, format!("bad header: {}", e)))?;

        let total = header.vector_length.checked_add(header.expected_length)
            .ok_or_else(|| FormatError::at_line(1, "declared lengths overflow"))?;
        let mut vector = Vec::new();
        let mut expected = Vec::new();
        for i in 0..total {
            let line = i + 2;
            read_next(&mut rdr, &mut raw_record, line)?;
            let rec: NormFileValue = raw_record.deserialize(None)
                .map_err(|e| FormatError::at_line(line, e.to_string()))?;
            if i < header.vector_length { vector.push(rec.value) } else { expected.push(rec.value) }
        }

        if rdr.read_byte_record(&mut raw_record).unwrap_or(false) && raw_record.iter().any(|f| !f.is_empty()) {
            return Err(FormatError::at_line(total + 2, "more values than declared in the header"));
        }

        Ok(NormalizationFile { resolution: header.resolution, vector, expected })
    }
}
