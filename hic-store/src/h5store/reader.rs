use std::iter::FromIterator;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use ascii::AsciiString;
use itertools::izip;
use log::debug;
use ndarray::Array2;
use hdf5::types;

use super::{eigen_name, find_group, matrix_group_name, read_dataset, read_strings};
use super::{ATTRIBUTES, BLOCKS, CHROMS, EIGEN, EXPECTED, GENOME, MATRICES, NORM, VERSION, ZOOMS};
use super::super::block::{Block, BlockLayout, ContactRecord, MatrixKey, ZoomDataKey};
use super::super::errors::ReadError;
use super::super::expected::ExpectedValueTable;
use super::super::genome::Chromosome;
use super::super::normalization::{NormalizationType, NormalizationVector};
use super::super::reader::{DatasetHeader, DatasetReader, MatrixIndex};
use super::super::zoom::HiCZoom;

/// Reads the HDF5 layout written by `H5Writer`. Every call opens its own
/// file handle, so the reader can be shared between threads.
#[derive(Clone, Debug)]
pub struct H5Reader {
    path: PathBuf,
    version: u32,
}

impl H5Reader {
    pub fn open(path: &Path) -> Result<H5Reader, ReadError> {
        let file = hdf5::File::open(path)?;
        let version = read_dataset::<u32>(&file, VERSION)?
            .get(0)
            .copied()
            .ok_or_else(|| ReadError::Corrupt(format!("{} has no format version", path.display())))?;
        debug!("Opened {} (format version {})", path.display(), version);
        Ok(H5Reader { path: path.to_path_buf(), version })
    }

    pub fn get_path(&self) -> &Path {
        &self.path
    }

    fn file(&self) -> Result<hdf5::File, ReadError> {
        Ok(hdf5::File::open(&self.path)?)
    }

    fn read_chromosomes(&self, file: &hdf5::File) -> Result<Vec<Chromosome>, ReadError> {
        let grp = file.group(CHROMS)?;
        let names = read_dataset::<types::VarLenAscii>(&grp, "name")?;
        let lengths = read_dataset::<u64>(&grp, "length")?;
        if names.len() != lengths.len() {
            return Err(ReadError::Corrupt(format!("{} chromosome names but {} lengths", names.len(), lengths.len())));
        }
        izip!(names.iter(), lengths.iter()).enumerate()
            .map(|(i, (name, &length))| -> Result<Chromosome, ReadError> {
                let name = AsciiString::from_ascii(name.as_bytes())
                    .map_err(|e| ReadError::Corrupt(e.to_string()))?;
                Ok(Chromosome::new(i, name, length))
            })
            .collect()
    }

    fn read_fragment_sites(&self, file: &hdf5::File) -> Result<AHashMap<usize, Arc<Vec<u32>>>, ReadError> {
        let mut sites = AHashMap::default();
        if let Some(grp) = find_group(file, &[CHROMS, "sites"])? {
            for name in grp.member_names()? {
                let idx = name.parse::<usize>()
                    .map_err(|_| ReadError::Corrupt(format!("bad fragment site entry {}", name)))?;
                sites.insert(idx, Arc::new(read_dataset::<u32>(&grp, &name)?.to_vec()));
            }
        }
        Ok(sites)
    }

    fn read_expected_values(&self, file: &hdf5::File) -> Result<Vec<ExpectedValueTable>, ReadError> {
        let mut tables = Vec::new();
        let root = match find_group(file, &[EXPECTED])? {
            Some(root) => root,
            None => return Ok(tables),
        };
        for norm_name in root.member_names()? {
            let norm = parse_norm(&norm_name)?;
            let norm_grp = root.group(&norm_name)?;
            for zoom_name in norm_grp.member_names()? {
                let zoom = parse_zoom(&zoom_name)?;
                let grp = norm_grp.group(&zoom_name)?;
                let values = read_dataset::<f64>(&grp, "values")?.to_vec();
                let chrs = read_dataset::<u64>(&grp, "factor_chr")?;
                let factors = read_dataset::<f64>(&grp, "factor_value")?;
                let norm_factors = izip!(chrs.iter(), factors.iter())
                    .map(|(&chr, &f)| (chr as usize, f))
                    .collect();
                tables.push(ExpectedValueTable::new(norm, zoom, values, norm_factors));
            }
        }
        Ok(tables)
    }

    fn zoom_group(&self, file: &hdf5::File, zd: &ZoomDataKey) -> Result<Option<hdf5::Group>, ReadError> {
        let name = matrix_group_name(zd.chr1_idx, zd.chr2_idx);
        Ok(find_group(file, &[MATRICES, &name, &zd.zoom.get_key()])?)
    }
}

fn parse_norm(name: &str) -> Result<NormalizationType, ReadError> {
    name.parse::<NormalizationType>().map_err(|e| ReadError::Corrupt(e.to_string()))
}

fn parse_zoom(name: &str) -> Result<HiCZoom, ReadError> {
    name.parse::<HiCZoom>().map_err(|e| ReadError::Corrupt(e.to_string()))
}

impl DatasetReader for H5Reader {
    fn get_version(&self) -> u32 {
        self.version
    }

    fn read_header(&self) -> Result<DatasetHeader, ReadError> {
        let file = self.file()?;
        let zooms = file.group(ZOOMS)?;
        let attributes = file.group(ATTRIBUTES)?;
        let keys = read_strings(&attributes, "key")?;
        let values = read_strings(&attributes, "value")?;

        let normalization_types = match find_group(&file, &[NORM])? {
            Some(grp) => grp.member_names()?.iter().map(|n| parse_norm(n)).collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(DatasetHeader {
            genome_id: read_strings(&file, GENOME)?.into_iter().next(),
            chromosomes: self.read_chromosomes(&file)?,
            bp_bin_sizes: read_dataset::<u32>(&zooms, "BP")?.to_vec(),
            frag_bin_sizes: read_dataset::<u32>(&zooms, "FRAG")?.to_vec(),
            attributes: keys.into_iter().zip(values.into_iter()).collect(),
            expected_values: self.read_expected_values(&file)?,
            normalization_types,
            fragment_sites: self.read_fragment_sites(&file)?,
        })
    }

    fn read_matrix(&self, key: MatrixKey) -> Result<Option<MatrixIndex>, ReadError> {
        let file = self.file()?;
        let grp = match find_group(&file, &[MATRICES, &matrix_group_name(key.get_chr1_idx(), key.get_chr2_idx())])? {
            Some(grp) => grp,
            None => return Ok(None),
        };

        let mut zooms = Vec::new();
        for zoom_name in grp.member_names()? {
            let zoom = parse_zoom(&zoom_name)?;
            let layout = read_dataset::<u32>(&grp.group(&zoom_name)?, "layout")?;
            if layout.len() != 2 {
                return Err(ReadError::Corrupt(format!("bad block layout of {} at {}", key.get_chr1_idx(), zoom)));
            }
            zooms.push((zoom, BlockLayout::new(layout[0], layout[1])));
        }
        zooms.sort_by_key(|(z, _)| (z.get_unit(), std::cmp::Reverse(z.get_bin_size())));
        Ok(Some(MatrixIndex { key, zooms }))
    }

    fn read_block(&self, zd: &ZoomDataKey, block_number: u32) -> Result<Option<Block>, ReadError> {
        let file = self.file()?;
        let grp = match self.zoom_group(&file, zd)? {
            Some(grp) => grp,
            None => return Ok(None),
        };
        let grp = match find_group(&grp, &[BLOCKS, &block_number.to_string()])? {
            Some(grp) => grp,
            None => return Ok(None),
        };

        let bins_x = read_dataset::<u32>(&grp, "bin_x")?;
        let bins_y = read_dataset::<u32>(&grp, "bin_y")?;
        let counts = read_dataset::<f32>(&grp, "count")?;
        if bins_x.len() != bins_y.len() || bins_x.len() != counts.len() {
            return Err(ReadError::Corrupt(format!("block {} has columns of different length", block_number)));
        }
        let records = Vec::from_iter(izip!(bins_x.iter(), bins_y.iter(), counts.iter())
            .map(|(&x, &y, &c)| ContactRecord::new(x, y, c)));
        Ok(Some(Block::new(block_number, records)))
    }

    fn get_block_numbers(&self, zd: &ZoomDataKey) -> Result<Vec<u32>, ReadError> {
        let file = self.file()?;
        let grp = match self.zoom_group(&file, zd)?.map(|g| find_group(&g, &[BLOCKS])).transpose()?.flatten() {
            Some(grp) => grp,
            None => return Ok(Vec::new()),
        };
        let mut numbers = grp.member_names()?.iter()
            .map(|n| n.parse::<u32>().map_err(|_| ReadError::Corrupt(format!("bad block name {}", n))))
            .collect::<Result<Vec<_>, _>>()?;
        numbers.sort();
        Ok(numbers)
    }

    fn read_normalization_vector(&self, norm: NormalizationType, chr_idx: usize, zoom: HiCZoom)
        -> Result<Option<NormalizationVector>, ReadError> {
        let file = self.file()?;
        let name = chr_idx.to_string();
        match find_group(&file, &[NORM, norm.as_str(), &zoom.get_key()])? {
            Some(grp) if grp.link_exists(&name) => {
                let data = read_dataset::<f64>(&grp, &name)?.to_vec();
                Ok(Some(NormalizationVector::new(norm, chr_idx, zoom, data)))
            }
            _ => Ok(None),
        }
    }

    fn read_eigenvector(&self, chr: &Chromosome, zoom: HiCZoom, number: usize, norm: NormalizationType)
        -> Result<Option<Vec<f64>>, ReadError> {
        let file = self.file()?;
        let name = eigen_name(chr.get_index(), number);
        match find_group(&file, &[EIGEN, norm.as_str(), &zoom.get_key()])? {
            Some(grp) if grp.link_exists(&name) => Ok(Some(read_dataset::<f64>(&grp, &name)?.to_vec())),
            _ => Ok(None),
        }
    }

    /// Pearson matrices are always computed on demand.
    fn read_pearsons(&self, _chr1: &Chromosome, _chr2: &Chromosome, _zoom: HiCZoom, _norm: NormalizationType)
        -> Result<Option<Array2<f64>>, ReadError> {
        Ok(None)
    }
}
