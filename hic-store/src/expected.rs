use ahash::AHashMap;

use super::normalization::NormalizationType;
use super::zoom::HiCZoom;

/// Expected contact count as a function of distance from the diagonal.
pub trait ExpectedValueFunction: Send + Sync {
    fn get_expected_value(&self, chr_idx: usize, distance: usize) -> f64;

    fn get_length(&self) -> usize;

    fn get_type(&self) -> NormalizationType;

    fn get_zoom(&self) -> HiCZoom;

    fn get_expected_values(&self) -> &[f64];
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExpectedKey {
    pub zoom: HiCZoom,
    pub norm: NormalizationType,
}

impl ExpectedKey {
    pub fn new(zoom: HiCZoom, norm: NormalizationType) -> ExpectedKey {
        ExpectedKey { zoom, norm }
    }
}

/// Genome-wide expected values plus per-chromosome scaling factors.
#[derive(Clone, Debug)]
pub struct ExpectedValueTable {
    norm: NormalizationType,
    zoom: HiCZoom,
    values: Vec<f64>,
    norm_factors: AHashMap<usize, f64>,
}

impl ExpectedValueTable {
    pub fn new(norm: NormalizationType, zoom: HiCZoom, values: Vec<f64>,
               norm_factors: AHashMap<usize, f64>) -> ExpectedValueTable {
        ExpectedValueTable { norm, zoom, values, norm_factors }
    }

    pub fn get_key(&self) -> ExpectedKey {
        ExpectedKey::new(self.zoom, self.norm)
    }

    pub fn get_norm_factors(&self) -> &AHashMap<usize, f64> {
        &self.norm_factors
    }
}

impl ExpectedValueFunction for ExpectedValueTable {
    /// Distances past the end of the table reuse the last value.
    fn get_expected_value(&self, chr_idx: usize, distance: usize) -> f64 {
        if self.values.is_empty() {
            return std::f64::NAN;
        }
        let value = self.values[distance.min(self.values.len() - 1)];
        match self.norm_factors.get(&chr_idx) {
            Some(factor) => value / factor,
            None => value,
        }
    }

    fn get_length(&self) -> usize {
        self.values.len()
    }

    fn get_type(&self) -> NormalizationType {
        self.norm
    }

    fn get_zoom(&self) -> HiCZoom {
        self.zoom
    }

    fn get_expected_values(&self) -> &[f64] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_value_lookup() {
        let mut factors = AHashMap::default();
        factors.insert(2, 2.0);
        let table = ExpectedValueTable::new(NormalizationType::KR, HiCZoom::bp(100), vec![8.0, 4.0, 2.0], factors);
        assert_eq!(table.get_expected_value(1, 0), 8.0);
        assert_eq!(table.get_expected_value(1, 2), 2.0);
        assert_eq!(table.get_expected_value(1, 50), 2.0);
        assert_eq!(table.get_expected_value(2, 1), 2.0);
        assert_eq!(table.get_length(), 3);
    }

    #[test]
    fn empty_table_gives_nan() {
        let table = ExpectedValueTable::new(NormalizationType::NONE, HiCZoom::bp(100), vec![], AHashMap::default());
        assert!(table.get_expected_value(0, 0).is_nan());
    }
}
