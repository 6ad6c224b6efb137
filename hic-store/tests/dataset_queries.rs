use std::sync::Arc;

use ndarray::Array2;

use hic_store::block::{Block, MatrixKey, ZoomDataKey};
use hic_store::errors::ReadError;
use hic_store::genome::Chromosome;
use hic_store::loader::BlockKey;
use hic_store::reader::{DatasetHeader, DatasetReader, MatrixIndex};
use hic_store::utils::read_chrom_sizes;
use hic_store::{Dataset, DatasetBuilder, DumpFormat, DumpKind, HiCZoom, MemoryReader, NormalizationType,
                NormalizationVector, StoreConfig};

const SIZES: &str = "chr1\t10000\nchr2\t5000\n";

fn sample_dataset() -> MemoryReader {
    let chromosomes = read_chrom_sizes(SIZES.as_bytes()).unwrap();
    let mut builder = DatasetBuilder::new(chromosomes, &[1000, 500], 4)
        .with_genome_id("test")
        .with_normalizations(&[NormalizationType::VC]);
    for _ in 0..3 {
        builder.add_contact(1, 1500, 1, 3500);
    }
    for i in 0..6u64 {
        for j in i..6 {
            builder.add_contact(1, i * 1000 + 10, 1, j * 1000 + 20);
            if (i + j) % 2 == 0 {
                builder.add_contact(1, i * 1000 + 30, 1, j * 1000 + 40);
            }
        }
    }
    builder.add_contact(2, 4200, 1, 8100);
    builder.build()
}

fn open(reader: MemoryReader) -> Dataset {
    Dataset::new(Arc::new(reader)).unwrap()
}

#[test]
fn observed_values_are_symmetric() {
    let dataset = open(sample_dataset());
    assert_eq!(dataset.get_genome_id(), Some("test"));
    let zd = dataset.matrix(1, 1).unwrap().unwrap().zoom_data(HiCZoom::bp(1000)).unwrap();
    assert_eq!(zd.observed_value(1, 3, NormalizationType::NONE), 5.0);
    assert_eq!(zd.observed_value(3, 1, NormalizationType::NONE), 5.0);
    assert_eq!(zd.observed_value(9, 9, NormalizationType::NONE), 0.0);

    // the pair is stored lower chromosome index first
    let inter = dataset.matrix(2, 1).unwrap().unwrap().zoom_data(HiCZoom::bp(1000)).unwrap();
    assert_eq!(inter.get_chr1().get_name().as_str(), "chr1");
    assert_eq!(inter.observed_value(8, 4, NormalizationType::NONE), 1.0);
    assert!(inter.slice(0, 5, 2, NormalizationType::NONE).is_err());
}

#[test]
fn slice_reads_row_across_blocks() {
    let dataset = open(sample_dataset());
    let zd = dataset.matrix(1, 1).unwrap().unwrap().zoom_data(HiCZoom::bp(1000)).unwrap();
    let row = zd.slice(0, 10, 3, NormalizationType::NONE).unwrap();
    let bins: Vec<u32> = row.iter().map(|(b, _)| *b).collect();
    assert_eq!(bins, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(row[1], (1, 5.0));
    // the diagonal bin is found by both the row and the column scan
    assert_eq!(row[3], (3, 4.0));
}

#[test]
fn text_dump_round_trips() {
    let dataset = open(sample_dataset());
    let zd = dataset.matrix(1, 1).unwrap().unwrap().zoom_data(HiCZoom::bp(500)).unwrap();

    let mut out = Vec::new();
    let written = zd.dump(&mut out, DumpFormat::Text, None).unwrap();

    let mut dumped: Vec<(u32, u32, f32)> = String::from_utf8(out).unwrap().lines()
        .map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            (fields[0].parse::<u32>().unwrap() / 500, fields[1].parse::<u32>().unwrap() / 500,
             fields[2].parse::<f32>().unwrap())
        })
        .collect();
    let mut stored: Vec<(u32, u32, f32)> = zd.contact_records().unwrap()
        .map(|r| (r.get_bin_x(), r.get_bin_y(), r.get_counts()))
        .collect();
    assert_eq!(written, stored.len());

    dumped.sort_by(|a, b| a.partial_cmp(b).unwrap());
    stored.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(dumped, stored);
}

#[test]
fn normalized_dump_uses_both_vectors() {
    let dataset = open(sample_dataset());
    let zoom = HiCZoom::bp(1000);
    let zd = dataset.matrix(1, 1).unwrap().unwrap().zoom_data(zoom).unwrap();
    let nv = dataset.normalization_vector(1, zoom, NormalizationType::VC).unwrap();

    let mut out = Vec::new();
    zd.dump(&mut out, DumpFormat::Text, Some((&*nv, &*nv))).unwrap();
    let text = String::from_utf8(out).unwrap();
    let line = text.lines().find(|l| l.starts_with("1000\t3000\t")).unwrap();
    let value: f64 = line.split('\t').nth(2).unwrap().parse().unwrap();
    let expected = 5.0 / (nv.get_data()[1] * nv.get_data()[3]);
    assert!((value - expected).abs() < 1e-4);
}

#[test]
fn pearson_dump_marks_empty_rows() {
    let dataset = open(sample_dataset());
    let zoom = HiCZoom::bp(1000);
    let zd = dataset.matrix(1, 1).unwrap().unwrap().zoom_data(zoom).unwrap();
    let expected = dataset.expected_values(zoom, NormalizationType::NONE).unwrap();

    let mut out = Vec::new();
    zd.dump_oe(&mut out, &*expected, DumpKind::Pearson, NormalizationType::NONE, DumpFormat::Text).unwrap();
    let rows: Vec<Vec<f32>> = String::from_utf8(out).unwrap().lines()
        .map(|l| l.split(' ').map(|v| v.parse::<f32>().unwrap()).collect())
        .collect();

    assert_eq!(rows.len(), 11);
    assert!(rows.iter().all(|r| r.len() == 11));
    assert!(rows[10].iter().all(|v| v.is_nan()));
    assert!((rows[0][0] - 1.0).abs() < 1e-5);

    let eigenvector = dataset.eigenvector(1, zoom, 0, NormalizationType::NONE).unwrap();
    assert_eq!(eigenvector.len(), 11);
}

#[test]
fn missing_zoom_and_matrix() {
    let dataset = open(sample_dataset());
    assert!(dataset.matrix(1, 1).unwrap().unwrap().zoom_data(HiCZoom::bp(250)).is_none());
    assert!(dataset.matrix(2, 2).unwrap().is_none());
    assert!(dataset.normalization_vector(1, HiCZoom::bp(1000), NormalizationType::KR).is_none());
}

/// Fails every read of the listed blocks.
struct FailingReader {
    inner: MemoryReader,
    failing: Vec<u32>,
}

impl DatasetReader for FailingReader {
    fn get_version(&self) -> u32 {
        self.inner.get_version()
    }

    fn read_header(&self) -> Result<DatasetHeader, ReadError> {
        self.inner.read_header()
    }

    fn read_matrix(&self, key: MatrixKey) -> Result<Option<MatrixIndex>, ReadError> {
        self.inner.read_matrix(key)
    }

    fn read_block(&self, zd: &ZoomDataKey, block_number: u32) -> Result<Option<Block>, ReadError> {
        if self.failing.contains(&block_number) {
            return Err(ReadError::Corrupt(format!("block {} is unreadable", block_number)));
        }
        self.inner.read_block(zd, block_number)
    }

    fn get_block_numbers(&self, zd: &ZoomDataKey) -> Result<Vec<u32>, ReadError> {
        self.inner.get_block_numbers(zd)
    }

    fn read_normalization_vector(&self, norm: NormalizationType, chr_idx: usize, zoom: HiCZoom)
        -> Result<Option<NormalizationVector>, ReadError> {
        self.inner.read_normalization_vector(norm, chr_idx, zoom)
    }

    fn read_eigenvector(&self, chr: &Chromosome, zoom: HiCZoom, number: usize, norm: NormalizationType)
        -> Result<Option<Vec<f64>>, ReadError> {
        self.inner.read_eigenvector(chr, zoom, number, norm)
    }

    fn read_pearsons(&self, chr1: &Chromosome, chr2: &Chromosome, zoom: HiCZoom, norm: NormalizationType)
        -> Result<Option<Array2<f64>>, ReadError> {
        self.inner.read_pearsons(chr1, chr2, zoom, norm)
    }
}

#[test]
fn failed_blocks_degrade_to_empty() {
    // at 1000 bp chr1 has 11 bins: blocks of 4 bins, 3 columns
    let reader = FailingReader { inner: sample_dataset(), failing: vec![0] };
    let dataset = Dataset::with_config(Arc::new(reader), StoreConfig::default().with_max_concurrent_block_loads(2)).unwrap();
    let zd = dataset.matrix(1, 1).unwrap().unwrap().zoom_data(HiCZoom::bp(1000)).unwrap();

    assert_eq!(zd.observed_value(1, 3, NormalizationType::NONE), 0.0);
    assert_eq!(zd.observed_value(2, 4, NormalizationType::NONE), 2.0);

    let blocks = zd.blocks_overlapping(0, 0, 7, 7, NormalizationType::NONE);
    assert_eq!(blocks.len(), 4);
    assert!(blocks.iter().find(|b| b.get_number() == 0).unwrap().is_empty());
    assert!(!zd.get_block_loader().is_cached(&BlockKey::new(zd.get_key(), 0, NormalizationType::NONE)));
}
