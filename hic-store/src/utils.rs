use std::cmp::Ordering;
use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::ops;
use std::path::Path;

use ascii::{AsciiString, AsAsciiStr};
use log::error;
use ndarray::{self, azip, Array1, ArrayView1};
use num_traits::identities;
use serde::Deserialize;

use super::genome::{Chromosome, CHR_ALL};

#[derive(Debug, Deserialize)]
struct Record<'a> {
    chr_name: &'a str,
    length: u64,
}

pub fn parse_chrom_sizes(file_name: &Path) -> Result<Vec<Chromosome>, Box<dyn Error>> {
    read_chrom_sizes(File::open(file_name)?)
}

/// Reads a `name \t length` table. The whole-genome pseudo chromosome is
/// put at index 0, file order is kept for the rest.
pub fn read_chrom_sizes<R: Read>(input: R) -> Result<Vec<Chromosome>, Box<dyn Error>> {
    let mut chr_lengths: Vec<(AsciiString, u64)> = Vec::new();

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .has_headers(false)
        .from_reader(input);
    let mut raw_record = csv::ByteRecord::new();

    while rdr.read_byte_record(&mut raw_record)? {
        let record: Record = raw_record.deserialize(None)?;
        if record.chr_name.eq_ignore_ascii_case(CHR_ALL) {
            continue;
        }
        let nm = AsciiString::from(record.chr_name.as_ascii_str()?);
        chr_lengths.push((nm, record.length));
    }

    let genome_length: u64 = chr_lengths.iter().map(|x| x.1).sum();
    let mut chromosomes = Vec::with_capacity(chr_lengths.len() + 1);
    chromosomes.push(Chromosome::new(0, AsciiString::from(CHR_ALL.as_ascii_str()?), genome_length / 1000));
    chromosomes.extend(chr_lengths.into_iter().enumerate()
        .map(|(i, (nm, len))| Chromosome::new(i + 1, nm, len)));
    Ok(chromosomes)
}

pub fn get_array_wrt_predicate<T: Copy>(predicate: ArrayView1<bool>, array: ArrayView1<T>) -> Vec<T> {
    assert_eq!(predicate.len(), array.len());
    ndarray::Zip::from(predicate).and(array).fold(Vec::<T>::new(), |mut v, &p, &a| {
        if p { v.push(a) };
        v
    })
}

pub fn bincount<Q>(length: usize, array: ArrayView1<u32>, weights: ArrayView1<Q>) -> Array1<Q>
    where Q: Copy + ops::AddAssign + identities::Zero {
    let mut counts: Array1<Q> = Array1::zeros((length,));

    if array.len() != weights.len() {
        error!("Cannot count {} bins with {} weights", array.len(), weights.len());
        return counts;
    }

    azip!((&array in array, &weights in weights) counts[array as usize] += weights);
    counts
}

pub fn mad(mut data: Vec<f64>) -> Option<f64> {
    median(&data).and_then(|med| {
        data.iter_mut().for_each(|x| { *x = (*x - med).abs(); });
        median(&data)
    })
}

/// `None` for empty input or input holding NaN or infinities.
pub fn median(data: &[f64]) -> Option<f64> {
    if data.iter().any(|x| !x.is_finite()) {
        return None;
    }

    let size = data.len();
    match size {
        0 => None,
        even if even % 2 == 0 => {
            let fst_med = select(data, (even / 2) - 1);
            let snd_med = select(data, even / 2);

            match (fst_med, snd_med) {
                (Some(fst), Some(snd)) => Some((fst + snd) / 2.0),
                _ => None
            }
        },
        odd => select(data, odd / 2)
    }
}

fn select(data: &[f64], k: usize) -> Option<f64> {
    let part = partition(data);

    match part {
        None => None,
        Some((left, pivot, right)) => {
            let pivot_idx = left.len();

            match pivot_idx.cmp(&k) {
                Ordering::Equal => Some(pivot),
                Ordering::Greater => select(&left, k),
                Ordering::Less => select(&right, k - (pivot_idx + 1)),
            }
        },
    }
}

fn partition(data: &[f64]) -> Option<(Vec<f64>, f64, Vec<f64>)> {
    match data.len() {
        0 => None,
        _ => {
            let (pivot_slice, tail) = data.split_at(1);
            let pivot = pivot_slice[0];
            let (left, right) = tail.iter()
                .fold((vec![], vec![]), |mut splits, next| {
                    {
                        let (ref mut left, ref mut right) = &mut splits;
                        if next < &pivot {
                            left.push(*next);
                        } else {
                            right.push(*next);
                        }
                    }
                    splits
                });

            Some((left, pivot, right))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn chrom_sizes_get_whole_genome_first() {
        let text = "chr1\t2000000\n#skipped\nchr2\t1000000\n";
        let chromosomes = read_chrom_sizes(text.as_bytes()).unwrap();
        assert_eq!(chromosomes.len(), 3);
        assert!(chromosomes[0].is_whole_genome());
        assert_eq!(chromosomes[0].get_length(), 3000);
        assert_eq!(chromosomes[2].get_name().as_str(), "chr2");
        assert_eq!(chromosomes[2].get_index(), 2);
    }

    #[test]
    fn medians() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[1.0, std::f64::NAN]), None);
        assert_eq!(mad(vec![1.0, 2.0, 3.0, 4.0, 100.0]), Some(1.0));
    }

    #[test]
    fn bincount_sums_weights() {
        let counts = bincount(4, arr1(&[0u32, 2, 2, 3]).view(), arr1(&[1.0, 2.0, 3.0, 4.0]).view());
        assert_eq!(counts, arr1(&[1.0, 0.0, 5.0, 4.0]));
    }
}
