//! HDF5 storage of a dataset.
//!
//! ```text
//! /format_version, /genome
//! /chroms/name, /chroms/length, /chroms/sites/<idx>
//! /zooms/BP, /zooms/FRAG
//! /attributes/key, /attributes/value
//! /matrices/<c1>_<c2>/<UNIT>_<bs>/layout
//! /matrices/<c1>_<c2>/<UNIT>_<bs>/blocks/<n>/{bin_x,bin_y,count}
//! /norm/<TYPE>/<UNIT>_<bs>/<chr>
//! /expected/<TYPE>/<UNIT>_<bs>/{values,factor_chr,factor_value}
//! /eigen/<TYPE>/<UNIT>_<bs>/<chr>_<n>
//! ```
//! Empty arrays are not written; a missing dataset reads back as empty.

mod reader;
mod writer;

use ndarray::{Array1, ArrayView1};

pub use self::reader::H5Reader;
pub use self::writer::H5Writer;

pub const H5_FORMAT_VERSION: u32 = 1;

const VERSION: &str = "format_version";
const GENOME: &str = "genome";
const CHROMS: &str = "chroms";
const ZOOMS: &str = "zooms";
const ATTRIBUTES: &str = "attributes";
const MATRICES: &str = "matrices";
const BLOCKS: &str = "blocks";
const NORM: &str = "norm";
const EXPECTED: &str = "expected";
const EIGEN: &str = "eigen";

fn matrix_group_name(chr1_idx: usize, chr2_idx: usize) -> String {
    format!("{}_{}", chr1_idx, chr2_idx)
}

fn eigen_name(chr_idx: usize, number: usize) -> String {
    format!("{}_{}", chr_idx, number)
}

/// Walks down `path`, `None` as soon as a link is missing.
fn find_group(root: &hdf5::Group, path: &[&str]) -> hdf5::Result<Option<hdf5::Group>> {
    let mut grp = root.group(".")?;
    for name in path {
        if !grp.link_exists(name) {
            return Ok(None);
        }
        grp = grp.group(name)?;
    }
    Ok(Some(grp))
}

/// Opens or creates every group along `path`.
fn ensure_group(root: &hdf5::Group, path: &[&str]) -> hdf5::Result<hdf5::Group> {
    let mut grp = root.group(".")?;
    for name in path {
        grp = if grp.link_exists(name) { grp.group(name)? } else { grp.create_group(name)? };
    }
    Ok(grp)
}

fn write_dataset<Q: hdf5::H5Type>(grp: &hdf5::Group, name: &str, ar: ArrayView1<Q>) -> hdf5::Result<()> {
    if ar.is_empty() {
        return Ok(());
    }
    let dts = grp.new_dataset::<Q>().create(name, ar.len())?;
    dts.write(ar)?;
    Ok(())
}

fn read_dataset<T: hdf5::H5Type>(grp: &hdf5::Group, name: &str) -> hdf5::Result<Array1<T>> {
    if !grp.link_exists(name) {
        return Ok(Array1::from(Vec::new()));
    }
    grp.dataset(name)?.read_1d::<T>()
}

fn write_strings<'a, I: Iterator<Item = &'a str>>(grp: &hdf5::Group, name: &str, strings: I) -> hdf5::Result<()> {
    let values = strings
        .map(|s| s.parse::<hdf5::types::VarLenUnicode>()
            .map_err(|e| hdf5::Error::Internal(format!("cannot store {}: {}", s, e))))
        .collect::<hdf5::Result<Vec<_>>>()?;
    write_dataset(grp, name, Array1::from(values).view())
}

fn read_strings(grp: &hdf5::Group, name: &str) -> hdf5::Result<Vec<String>> {
    Ok(read_dataset::<hdf5::types::VarLenUnicode>(grp, name)?
        .iter()
        .map(|s| s.as_str().to_string())
        .collect())
}
