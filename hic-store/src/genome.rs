use std::fmt;
use ascii::{AsciiString, AsciiStr};

/// Name of the whole-genome pseudo chromosome.
pub const CHR_ALL: &str = "All";

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Chromosome {
    index: usize,
    name: AsciiString,
    length: u64,
}

impl Chromosome {
    pub fn new(index: usize, name: AsciiString, length: u64) -> Chromosome {
        Chromosome { index, name, length }
    }

    pub fn get_index(&self) -> usize {
        self.index
    }

    pub fn get_name(&self) -> &AsciiStr {
        &self.name
    }

    pub fn get_length(&self) -> u64 {
        self.length
    }

    pub fn is_whole_genome(&self) -> bool {
        self.name.as_str().eq_ignore_ascii_case(CHR_ALL)
    }

    /// Number of fixed-width bins covering the chromosome.
    pub fn bin_count(&self, bin_size: u32) -> usize {
        (self.length / bin_size as u64) as usize + 1
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

pub fn find_by_name<'a>(chromosomes: &'a [Chromosome], name: &str) -> Option<&'a Chromosome> {
    chromosomes.iter().find(|c| c.name.as_str() == name)
}

#[cfg(test)]
pub(crate) fn chrom(index: usize, name: &str, length: u64) -> Chromosome {
    Chromosome::new(index, AsciiString::from_ascii(name).unwrap(), length)
}
