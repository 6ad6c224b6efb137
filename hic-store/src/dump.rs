use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use byteorder::{LittleEndian, WriteBytesExt};
use itertools::Itertools;
use ndarray::Array2;

use super::block::ContactRecord;
use super::errors::FormatError;
use super::normalization;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpFormat {
    Text,
    Binary,
}

impl FromStr for DumpFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "ascii" => Ok(DumpFormat::Text),
            "binary" => Ok(DumpFormat::Binary),
            other => Err(FormatError::new(format!("unknown dump format {}", other))),
        }
    }
}

/// Derived matrix written by `MatrixZoomData::dump_oe`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpKind {
    Oe,
    Pearson,
}

impl fmt::Display for DumpKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DumpKind::Oe => write!(f, "oe"),
            DumpKind::Pearson => write!(f, "pearsons"),
        }
    }
}

impl FromStr for DumpKind {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "oe" => Ok(DumpKind::Oe),
            "pearson" | "pearsons" => Ok(DumpKind::Pearson),
            other => Err(FormatError::new(format!("unknown matrix type {}", other))),
        }
    }
}

/// Writes contact records, optionally divided by a pair of normalization
/// vectors. Text lines hold genomic coordinates, binary triples hold bins.
pub fn write_records<W, I>(out: &mut W, format: DumpFormat, records: I, bin_size: u32,
                           norm: Option<(&[f64], &[f64])>) -> io::Result<usize>
    where W: Write, I: IntoIterator<Item = ContactRecord> {
    let mut written = 0;
    for rec in records {
        let (x, y) = (rec.get_bin_x(), rec.get_bin_y());
        let counts = match norm {
            Some((nv1, nv2)) => normalization::normalize_counts(
                rec.get_counts(),
                nv1.get(x as usize).copied().unwrap_or(std::f64::NAN),
                nv2.get(y as usize).copied().unwrap_or(std::f64::NAN)),
            None => rec.get_counts(),
        };
        match format {
            DumpFormat::Text => {
                writeln!(out, "{}\t{}\t{}", x as u64 * bin_size as u64, y as u64 * bin_size as u64, counts)?;
            },
            DumpFormat::Binary => {
                out.write_i32::<LittleEndian>(x as i32)?;
                out.write_i32::<LittleEndian>(y as i32)?;
                out.write_f32::<LittleEndian>(counts)?;
            }
        }
        written += 1;
    }
    Ok(written)
}

/// Writes a square matrix: space separated rows of text, or the row count
/// followed by row-major floats.
pub fn write_dense<W: Write>(out: &mut W, format: DumpFormat, matrix: &Array2<f64>) -> io::Result<()> {
    match format {
        DumpFormat::Text => {
            for row in matrix.outer_iter() {
                writeln!(out, "{}", row.iter().map(|&v| v as f32).join(" "))?;
            }
        },
        DumpFormat::Binary => {
            out.write_i32::<LittleEndian>(matrix.nrows() as i32)?;
            for &v in matrix.iter() {
                out.write_f32::<LittleEndian>(v as f32)?;
            }
        }
    }
    out.flush()
}
