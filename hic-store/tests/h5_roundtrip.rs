#![cfg(feature = "hdf5")]

use std::sync::Arc;

use hic_store::utils::read_chrom_sizes;
use hic_store::{Dataset, DatasetBuilder, DatasetReader, ExpectedValueFunction, H5Reader, H5Writer, HiCZoom,
                NormalizationType};

#[test]
fn written_dataset_reads_back() {
    let chromosomes = read_chrom_sizes("chr1\t10000\nchr2\t5000\n".as_bytes()).unwrap();
    let mut builder = DatasetBuilder::new(chromosomes, &[1000, 500], 4)
        .with_genome_id("test")
        .with_attribute("software", "hic-store")
        .with_normalizations(&[NormalizationType::VC]);
    for i in 0..8u64 {
        builder.add_contact(1, i * 1000 + 100, 1, (i + 1) * 1000 + 100);
        builder.add_contact(1, i * 1000 + 200, 1, i * 1000 + 300);
    }
    builder.add_contact(2, 1200, 1, 7100);
    let memory = Arc::new(builder.build());

    let path = std::env::temp_dir().join(format!("hic_store_roundtrip_{}.h5", std::process::id()));
    H5Writer::create(&path).unwrap().write(&memory).unwrap();

    let reader = H5Reader::open(&path).unwrap();
    assert_eq!(reader.get_version(), 1);
    let stored = Dataset::new(Arc::new(reader)).unwrap();
    let built = Dataset::new(memory).unwrap();

    assert_eq!(stored.get_genome_id(), Some("test"));
    assert_eq!(stored.get_chromosomes().len(), 3);
    assert_eq!(stored.get_chromosomes()[1].get_length(), 10000);

    for &(c1, c2) in &[(1, 1), (1, 2)] {
        for &bin_size in &[1000, 500] {
            let zoom = HiCZoom::bp(bin_size);
            let a = stored.matrix(c1, c2).unwrap().unwrap().zoom_data(zoom).unwrap();
            let b = built.matrix(c1, c2).unwrap().unwrap().zoom_data(zoom).unwrap();
            let mut ra: Vec<_> = a.contact_records().unwrap().map(|r| (r.get_bin_x(), r.get_bin_y(), r.get_counts())).collect();
            let mut rb: Vec<_> = b.contact_records().unwrap().map(|r| (r.get_bin_x(), r.get_bin_y(), r.get_counts())).collect();
            ra.sort_by(|x, y| x.partial_cmp(y).unwrap());
            rb.sort_by(|x, y| x.partial_cmp(y).unwrap());
            assert!(!ra.is_empty());
            assert_eq!(ra, rb);
        }
    }

    let zoom = HiCZoom::bp(1000);
    let nv_a = stored.normalization_vector(1, zoom, NormalizationType::VC).unwrap();
    let nv_b = built.normalization_vector(1, zoom, NormalizationType::VC).unwrap();
    assert_eq!(nv_a.get_data().len(), nv_b.get_data().len());
    for (x, y) in nv_a.get_data().iter().zip(nv_b.get_data().iter()) {
        assert!((x.is_nan() && y.is_nan()) || (x - y).abs() < 1e-12);
    }

    let ev_a = stored.expected_values(zoom, NormalizationType::NONE).unwrap();
    let ev_b = built.expected_values(zoom, NormalizationType::NONE).unwrap();
    assert_eq!(ev_a.get_expected_values(), ev_b.get_expected_values());

    std::fs::remove_file(&path).ok();
}
