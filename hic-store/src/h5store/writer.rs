use std::error::Error;
use std::iter::FromIterator;
use std::path::Path;

use itertools::Itertools;
use log::{debug, info};
use ndarray::{arr1, Array1};
use hdf5::types;

use super::{ensure_group, eigen_name, matrix_group_name, write_dataset, write_strings};
use super::{ATTRIBUTES, BLOCKS, CHROMS, EIGEN, EXPECTED, GENOME, H5_FORMAT_VERSION, MATRICES, NORM, VERSION, ZOOMS};
use super::super::block::ZoomDataKey;
use super::super::expected::ExpectedValueFunction;
use super::super::memory::MemoryReader;
use super::super::reader::DatasetHeader;

/// Writes a complete in-memory dataset to a new HDF5 file.
pub struct H5Writer {
    file: hdf5::File,
}

impl H5Writer {
    /// Truncates an existing file.
    pub fn create(filename: &Path) -> hdf5::Result<H5Writer> {
        Ok(H5Writer { file: hdf5::File::create(filename)? })
    }

    pub fn get_file_handler(&self) -> &hdf5::File {
        &self.file
    }

    pub fn write(&self, dataset: &MemoryReader) -> Result<(), Box<dyn Error>> {
        info!("Writing dataset to {}", self.file.filename());
        write_dataset(&self.file, VERSION, arr1(&[H5_FORMAT_VERSION]).view())?;
        self.write_header(dataset.get_header())?;
        self.write_matrices(dataset)?;
        self.write_normalization_vectors(dataset)?;
        self.write_eigenvectors(dataset)?;
        self.file.flush()?;
        Ok(())
    }

    fn write_header(&self, header: &DatasetHeader) -> hdf5::Result<()> {
        write_strings(&self.file, GENOME, header.genome_id.iter().map(|g| g.as_str()))?;

        let grp = ensure_group(&self.file, &[CHROMS])?;
        let names = header.chromosomes.iter()
            .map(|c| types::VarLenAscii::from_ascii(c.get_name().as_bytes())
                .map_err(|e| hdf5::Error::Internal(e.to_string())))
            .collect::<hdf5::Result<Vec<_>>>()?;
        write_dataset(&grp, "name", Array1::from(names).view())?;
        let lengths = Array1::from_iter(header.chromosomes.iter().map(|c| c.get_length()));
        write_dataset(&grp, "length", lengths.view())?;
        if !header.fragment_sites.is_empty() {
            let sites_grp = ensure_group(&grp, &["sites"])?;
            for (idx, sites) in header.fragment_sites.iter() {
                write_dataset(&sites_grp, &idx.to_string(), Array1::from(sites.to_vec()).view())?;
            }
        }

        let grp = ensure_group(&self.file, &[ZOOMS])?;
        write_dataset(&grp, "BP", Array1::from(header.bp_bin_sizes.clone()).view())?;
        write_dataset(&grp, "FRAG", Array1::from(header.frag_bin_sizes.clone()).view())?;

        let grp = ensure_group(&self.file, &[ATTRIBUTES])?;
        let attributes = Vec::from_iter(header.attributes.iter().sorted());
        write_strings(&grp, "key", attributes.iter().map(|(k, _)| k.as_str()))?;
        write_strings(&grp, "value", attributes.iter().map(|(_, v)| v.as_str()))?;

        for table in &header.expected_values {
            let key = table.get_key();
            let grp = ensure_group(&self.file, &[EXPECTED, key.norm.as_str(), &key.zoom.get_key()])?;
            write_dataset(&grp, "values", Array1::from(table.get_expected_values().to_vec()).view())?;
            let factors = Vec::from_iter(table.get_norm_factors().iter().sorted_by_key(|(chr, _)| **chr));
            write_dataset(&grp, "factor_chr", Array1::from_iter(factors.iter().map(|(chr, _)| **chr as u64)).view())?;
            write_dataset(&grp, "factor_value", Array1::from_iter(factors.iter().map(|(_, f)| **f)).view())?;
        }
        Ok(())
    }

    fn write_matrices(&self, dataset: &MemoryReader) -> hdf5::Result<()> {
        for index in dataset.matrices() {
            let name = matrix_group_name(index.key.get_chr1_idx(), index.key.get_chr2_idx());
            for (zoom, layout) in &index.zooms {
                let grp = ensure_group(&self.file, &[MATRICES, &name, &zoom.get_key()])?;
                write_dataset(&grp, "layout", arr1(&[layout.block_bin_count, layout.block_column_count]).view())?;

                let blocks_grp = ensure_group(&grp, &[BLOCKS])?;
                let mut n_blocks = 0;
                for block in dataset.blocks(&ZoomDataKey::new(index.key, *zoom)) {
                    let block_grp = blocks_grp.create_group(&block.get_number().to_string())?;
                    let records = block.get_contact_records();
                    write_dataset(&block_grp, "bin_x", Array1::from_iter(records.iter().map(|r| r.get_bin_x())).view())?;
                    write_dataset(&block_grp, "bin_y", Array1::from_iter(records.iter().map(|r| r.get_bin_y())).view())?;
                    write_dataset(&block_grp, "count", Array1::from_iter(records.iter().map(|r| r.get_counts())).view())?;
                    n_blocks += 1;
                }
                debug!("Matrix {} at {}: {} blocks written", name, zoom, n_blocks);
            }
        }
        Ok(())
    }

    fn write_normalization_vectors(&self, dataset: &MemoryReader) -> hdf5::Result<()> {
        for nv in dataset.normalization_vectors() {
            let grp = ensure_group(&self.file, &[NORM, nv.get_type().as_str(), &nv.get_zoom().get_key()])?;
            write_dataset(&grp, &nv.get_chr_idx().to_string(), Array1::from(nv.get_data().to_vec()).view())?;
        }
        Ok(())
    }

    fn write_eigenvectors(&self, dataset: &MemoryReader) -> hdf5::Result<()> {
        for (key, data) in dataset.eigenvectors() {
            let grp = ensure_group(&self.file, &[EIGEN, key.norm.as_str(), &key.zoom.get_key()])?;
            write_dataset(&grp, &eigen_name(key.chr_idx, key.number), Array1::from(data.clone()).view())?;
        }
        Ok(())
    }
}
