use std::error::Error;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use ahash::AHashMap;
use ascii::{AsciiString, AsAsciiStr, AsAsciiStrError};
use log::{info, warn};
use serde::Deserialize;

use super::dataset_builder::DatasetBuilder;
use super::super::genome::Chromosome;

/// Feeds a tab separated pairs file into a `DatasetBuilder`.
pub struct PairsReader {
    name2order: AHashMap<AsciiString, usize>,
}

#[derive(Debug, Deserialize)]
struct PairRecord<'a> {
    read_name: &'a str,
    chr1: &'a str,
    pos1: u64,
    chr2: &'a str,
    pos2: u64,
    strand1: char,
    strand2: char,
}

/// Pairs read from a file: accepted ones and those on unknown chromosomes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PairStats {
    pub accepted: usize,
    pub skipped: usize,
}

impl PairsReader {
    pub fn new(chromosomes: &[Chromosome]) -> PairsReader {
        PairsReader {
            name2order: chromosomes.iter()
                .filter(|c| !c.is_whole_genome())
                .map(|c| (AsciiString::from(c.get_name()), c.get_index()))
                .collect(),
        }
    }

    pub fn read_file(&self, pairs_file: &Path, builder: &mut DatasetBuilder) -> Result<PairStats, Box<dyn Error>> {
        info!("Reading pairs from {}", pairs_file.display());
        let file = File::open(pairs_file)?;
        self.read(BufReader::new(file), builder)
    }

    /// Columns: `read chr1 pos1 chr2 pos2 strand1 strand2`, `#` starts a comment.
    pub fn read<R: Read>(&self, input: R, builder: &mut DatasetBuilder) -> Result<PairStats, Box<dyn Error>> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .comment(Some(b'#'))
            .has_headers(false)
            .from_reader(input);
        let mut raw_record = csv::ByteRecord::new();
        let mut stats = PairStats::default();
        let mut total: usize = 0;

        while rdr.read_byte_record(&mut raw_record)? {
            total += 1;
            let record: PairRecord = raw_record.deserialize(None)?;

            match self.pair_to_chr_ids(&record)? {
                Some((c1, c2)) if builder.add_contact(c1, record.pos1, c2, record.pos2) => stats.accepted += 1,
                _ => {
                    if stats.skipped == 0 {
                        warn!("Pair {} lies on an unknown chromosome ({} / {}), skipping such pairs",
                              record.read_name, record.chr1, record.chr2);
                    }
                    stats.skipped += 1;
                }
            }

            if total % 1_000_000 == 0 {
                info!("{} hic pairs were converted to bins", total);
            }
        }

        if stats.skipped > 0 {
            warn!("{} of {} pairs were skipped", stats.skipped, total);
        }
        Ok(stats)
    }

    fn pair_to_chr_ids(&self, record: &PairRecord) -> Result<Option<(usize, usize)>, AsAsciiStrError> {
        let chr1 = record.chr1.as_ascii_str()?;
        let chr2 = record.chr2.as_ascii_str()?;
        Ok(self.name2order.get(chr1).copied().zip(self.name2order.get(chr2).copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::chrom;

    #[test]
    fn pairs_are_binned() {
        let chromosomes = vec![chrom(0, "All", 3), chrom(1, "chr1", 1000), chrom(2, "chr2", 500)];
        let mut builder = DatasetBuilder::new(chromosomes.clone(), &[100], 10);
        let text = "#comment\n\
                    r1\tchr1\t150\tchr1\t250\t+\t-\n\
                    r2\tchr2\t10\tchr1\t990\t+\t+\n\
                    r3\tchrZ\t10\tchr1\t990\t+\t+\n";
        let stats = PairsReader::new(&chromosomes).read(text.as_bytes(), &mut builder).unwrap();
        assert_eq!(stats, PairStats { accepted: 2, skipped: 1 });
        assert_eq!(builder.get_contact_count(), 2);
    }

    #[test]
    fn malformed_position_is_an_error() {
        let chromosomes = vec![chrom(0, "All", 3), chrom(1, "chr1", 1000)];
        let mut builder = DatasetBuilder::new(chromosomes.clone(), &[100], 10);
        let text = "r1\tchr1\tabc\tchr1\t250\t+\t-\n";
        assert!(PairsReader::new(&chromosomes).read(text.as_bytes(), &mut builder).is_err());
    }
}
