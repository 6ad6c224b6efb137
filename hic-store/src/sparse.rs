use ahash::AHashMap;
use ndarray::Array2;

/// Square bin-pair -> value map, one hash map per row.
#[derive(Clone, Debug, Default)]
pub struct SparseContactMatrix {
    rows: Vec<AHashMap<usize, f64>>,
}

impl SparseContactMatrix {
    pub fn new(n_bins: usize) -> SparseContactMatrix {
        SparseContactMatrix { rows: vec![AHashMap::default(); n_bins] }
    }

    pub fn get_n_bins(&self) -> usize {
        self.rows.len()
    }

    /// Adds to the stored value. Non-finite values and out of range
    /// coordinates are ignored.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if !value.is_finite() || row >= self.rows.len() || col >= self.rows.len() {
            return;
        }
        *self.rows[row].entry(col).or_insert(0.0) += value;
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows.get(row)
            .and_then(|r| r.get(&col))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    /// Rows holding at least one nonzero entry.
    pub fn nonzero_rows(&self) -> Vec<usize> {
        self.rows.iter()
            .enumerate()
            .filter(|(_, r)| r.values().any(|&v| v != 0.0))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn to_dense(&self) -> Array2<f64> {
        let n = self.rows.len();
        let mut dense = Array2::<f64>::zeros((n, n));
        for (i, row) in self.rows.iter().enumerate() {
            for (&j, &v) in row.iter() {
                dense[[i, j]] = v;
            }
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_and_skips_non_finite() {
        let mut m = SparseContactMatrix::new(4);
        m.add(1, 2, 1.5);
        m.add(1, 2, 0.5);
        m.add(0, 0, std::f64::NAN);
        m.add(3, 3, std::f64::INFINITY);
        m.add(7, 0, 1.0);
        assert_eq!(m.get(1, 2), 2.0);
        assert_eq!(m.get(0, 0), 0.0);
        assert_eq!(m.nnz(), 1);
        assert_eq!(m.nonzero_rows(), vec![1]);
    }

    #[test]
    fn dense_copy() {
        let mut m = SparseContactMatrix::new(3);
        m.add(0, 1, 2.0);
        m.add(1, 0, 2.0);
        let dense = m.to_dense();
        assert_eq!(dense[[0, 1]], 2.0);
        assert_eq!(dense[[1, 0]], 2.0);
        assert_eq!(dense[[2, 2]], 0.0);
    }
}
