use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ahash::AHashMap;
use log::{error, info};

use super::block::MatrixKey;
use super::errors::FormatError;
use super::genome::{self, Chromosome};

const COLOR_COLUMN: usize = 6;
const FIRST_ATTRIBUTE_COLUMN: usize = 7;
const MAX_LOGGED_SKIPS: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl FromStr for Rgb {
    type Err = FormatError;

    /// `r,g,b` or `#rrggbb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bad = || FormatError::new(format!("bad color {}", s));
        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(bad());
            }
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad());
            return Ok(Rgb(channel(0)?, channel(2)?, channel(4)?));
        }
        let parts: Vec<&str> = s.split(',').map(|p| p.trim()).collect();
        if parts.len() != 3 {
            return Err(bad());
        }
        let channel = |p: &str| p.parse::<u8>().map_err(|_| bad());
        Ok(Rgb(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{},{}", self.0, self.1, self.2)
    }
}

/// A pair of genomic intervals, e.g. a chromatin loop. The first interval
/// lies on the chromosome with the lower index.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature2D {
    pub chr1: String,
    pub start1: u64,
    pub end1: u64,
    pub chr2: String,
    pub start2: u64,
    pub end2: u64,
    pub color: Rgb,
    /// Extra columns in file order, keyed by header name.
    pub attributes: Vec<(String, String)>,
}

impl Feature2D {
    pub fn get_attribute(&self, key: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

/// Features of one loop list grouped by chromosome pair.
#[derive(Clone, Debug, Default)]
pub struct Feature2DList {
    features: AHashMap<MatrixKey, Vec<Feature2D>>,
    visible: bool,
}

impl Feature2DList {
    pub fn new() -> Feature2DList {
        Feature2DList { features: AHashMap::default(), visible: true }
    }

    pub fn add(&mut self, chr1_idx: usize, chr2_idx: usize, feature: Feature2D) {
        self.features.entry(MatrixKey::new(chr1_idx, chr2_idx)).or_insert_with(Vec::new).push(feature);
    }

    pub fn get(&self, chr1_idx: usize, chr2_idx: usize) -> Option<&[Feature2D]> {
        self.features.get(&MatrixKey::new(chr1_idx, chr2_idx)).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.features.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Parses a tab separated loop list whose first line names the columns:
    /// `chr1 x1 x2 chr2 y1 y2 [color] [attributes...]`. Rows on unknown
    /// chromosomes are skipped.
    pub fn parse<R: Read>(input: R, chromosomes: &[Chromosome]) -> Result<Feature2DList, FormatError> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(input);
        let mut record = csv::StringRecord::new();

        let mut read_next = |record: &mut csv::StringRecord| -> Result<bool, FormatError> {
            rdr.read_record(record).map_err(|e| {
                let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
                FormatError::at_line(line, e.to_string())
            })
        };

        if !read_next(&mut record)? {
            return Err(FormatError::at_line(1, "missing header line"));
        }
        let headers: Vec<String> = record.iter().map(|h| h.to_string()).collect();

        let mut list = Feature2DList::new();
        let mut skipped = 0;
        let mut line = 1;
        while read_next(&mut record)? {
            line += 1;
            if record.len() > headers.len() {
                return Err(FormatError::at_line(line, format!("{} columns but the header names {}", record.len(), headers.len())));
            }
            if record.len() < 6 {
                return Err(FormatError::at_line(line, format!("expected at least 6 columns, found {}", record.len())));
            }

            let coord = |i: usize| record[i].trim().parse::<u64>()
                .map_err(|e| FormatError::at_line(line, format!("bad coordinate {}: {}", &record[i], e)));
            let (start1, end1, start2, end2) = (coord(1)?, coord(2)?, coord(4)?, coord(5)?);

            let (chr1, chr2) = match (genome::find_by_name(chromosomes, &record[0]), genome::find_by_name(chromosomes, &record[3])) {
                (Some(c1), Some(c2)) => (c1, c2),
                _ => {
                    if skipped < MAX_LOGGED_SKIPS {
                        error!("Skipping line {}: {}", line, record.iter().collect::<Vec<_>>().join("\t"));
                    } else if skipped == MAX_LOGGED_SKIPS {
                        error!("Maximum error count exceeded. Further errors will not be logged");
                    }
                    skipped += 1;
                    continue;
                }
            };

            let color = match record.get(COLOR_COLUMN) {
                Some(c) => c.parse::<Rgb>().map_err(|e| FormatError::at_line(line, e.message))?,
                None => Rgb::default(),
            };
            let attributes = (FIRST_ATTRIBUTE_COLUMN..record.len())
                .map(|i| (headers[i].clone(), record[i].to_string()))
                .collect();

            let feature = if chr1.get_index() <= chr2.get_index() {
                Feature2D { chr1: record[0].to_string(), start1, end1, chr2: record[3].to_string(), start2, end2, color, attributes }
            } else {
                Feature2D { chr1: record[3].to_string(), start1: start2, end1: end2, chr2: record[0].to_string(),
                            start2: start1, end2: end1, color, attributes }
            };
            list.add(chr1.get_index(), chr2.get_index(), feature);
        }

        if skipped > 0 {
            info!("{} loop list rows on unknown chromosomes were skipped", skipped);
        }
        Ok(list)
    }
}

/// Loop lists loaded so far, keyed by path. Reloading a known path only
/// makes it visible again.
#[derive(Debug, Default)]
pub struct LoopLists {
    lists: AHashMap<PathBuf, Feature2DList>,
    show: bool,
}

impl LoopLists {
    pub fn new() -> LoopLists {
        LoopLists { lists: AHashMap::default(), show: true }
    }

    pub fn load(&mut self, path: &Path, chromosomes: &[Chromosome]) -> Result<(), Box<dyn Error>> {
        if let Some(list) = self.lists.get_mut(path) {
            list.set_visible(true);
            return Ok(());
        }
        let list = Feature2DList::parse(BufReader::new(File::open(path)?), chromosomes)?;
        info!("Loaded {} features from {}", list.len(), path.display());
        self.lists.insert(path.to_path_buf(), list);
        Ok(())
    }

    pub fn insert(&mut self, path: PathBuf, list: Feature2DList) {
        self.lists.insert(path, list);
    }

    pub fn set_invisible(&mut self, path: &Path) {
        if let Some(list) = self.lists.get_mut(path) {
            list.set_visible(false);
        }
    }

    pub fn set_show(&mut self, show: bool) {
        self.show = show;
    }

    /// Features of all visible lists for a chromosome pair, `None` when loops
    /// are hidden altogether.
    pub fn visible_features(&self, chr1_idx: usize, chr2_idx: usize) -> Option<Vec<&Feature2D>> {
        if !self.show {
            return None;
        }
        Some(self.lists.values()
            .filter(|l| l.is_visible())
            .filter_map(|l| l.get(chr1_idx, chr2_idx))
            .flat_map(|f| f.iter())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::chrom;

    fn chromosomes() -> Vec<Chromosome> {
        vec![chrom(0, "All", 100), chrom(1, "chr1", 1_000_000), chrom(2, "chr2", 800_000)]
    }

    const HEADER: &str = "chr1\tx1\tx2\tchr2\ty1\ty2\tcolor\tscore\tname\n";

    #[test]
    fn parses_and_orders_pairs() {
        let text = format!("{}{}{}", HEADER,
                           "chr2\t100\t200\tchr1\t300\t400\t255,0,0\t0.9\tloopA\n",
                           "chr1\t10\t20\tchr1\t50\t60\n");
        let list = Feature2DList::parse(text.as_bytes(), &chromosomes()).unwrap();
        assert_eq!(list.len(), 2);

        let inter = &list.get(2, 1).unwrap()[0];
        assert_eq!((inter.chr1.as_str(), inter.start1, inter.end1), ("chr1", 300, 400));
        assert_eq!((inter.chr2.as_str(), inter.start2, inter.end2), ("chr2", 100, 200));
        assert_eq!(inter.color, Rgb(255, 0, 0));
        assert_eq!(inter.get_attribute("score"), Some("0.9"));
        assert_eq!(inter.get_attribute("name"), Some("loopA"));

        let intra = &list.get(1, 1).unwrap()[0];
        assert_eq!(intra.color, Rgb(0, 0, 0));
        assert!(intra.attributes.is_empty());
    }

    #[test]
    fn unknown_chromosomes_are_skipped() {
        let text = format!("{}{}{}", HEADER,
                           "chrZ\t1\t2\tchr1\t3\t4\n",
                           "chr1\t1\t2\tchr1\t3\t4\n");
        let list = Feature2DList::parse(text.as_bytes(), &chromosomes()).unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn too_many_or_too_few_columns_fail() {
        let short = "a\tb\tc\td\te\tf\nchr1\t1\t2\tchr1\t3\n";
        let err = Feature2DList::parse(short.as_bytes(), &chromosomes()).unwrap_err();
        assert_eq!(err.line, Some(2));

        let long = "a\tb\tc\td\te\tf\nchr1\t1\t2\tchr1\t3\t4\t0,0,255\n";
        assert!(Feature2DList::parse(long.as_bytes(), &chromosomes()).is_err());
    }

    #[test]
    fn color_parsing() {
        assert_eq!("#00ff10".parse::<Rgb>().unwrap(), Rgb(0, 255, 16));
        assert_eq!(" 1, 2 ,3".parse::<Rgb>().unwrap(), Rgb(1, 2, 3));
        assert!("red".parse::<Rgb>().is_err());
        assert!("#1é234".parse::<Rgb>().is_err());
        assert!("#+1+2+3".parse::<Rgb>().is_err());
    }

    #[test]
    fn visibility_of_loop_lists() {
        let text = format!("{}{}", HEADER, "chr1\t10\t20\tchr2\t50\t60\n");
        let mut lists = LoopLists::new();
        lists.insert(PathBuf::from("a.txt"), Feature2DList::parse(text.as_bytes(), &chromosomes()).unwrap());
        assert_eq!(lists.visible_features(1, 2).unwrap().len(), 1);
        lists.set_invisible(Path::new("a.txt"));
        assert!(lists.visible_features(1, 2).unwrap().is_empty());
        lists.set_show(false);
        assert!(lists.visible_features(1, 2).is_none());
    }
}
