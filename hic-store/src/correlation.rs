use std::iter::FromIterator;

use ndarray::{Array2, Axis};

const JACOBI_MAX_SWEEPS: usize = 100;
const JACOBI_TOLERANCE: f64 = 1e-12;

/// Mean of the non-NaN entries, NaN when there are none.
pub fn nan_mean<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> f64 {
    let (sum, count) = values.into_iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
    if count == 0 { std::f64::NAN } else { sum / count as f64 }
}

/// Pearson correlation between every pair of columns. Columns with zero
/// variance correlate as NaN.
pub fn column_correlation(data: &Array2<f64>) -> Array2<f64> {
    let n_cols = data.ncols();
    let mut centred = data.to_owned();
    for mut col in centred.axis_iter_mut(Axis(1)) {
        let mean = col.sum() / col.len().max(1) as f64;
        col.mapv_inplace(|v| v - mean);
    }
    let norms = Vec::from_iter(centred.axis_iter(Axis(1)).map(|col| col.dot(&col).sqrt()));

    let mut corr = centred.t().dot(&centred);
    for i in 0..n_cols {
        for j in 0..n_cols {
            let denom = norms[i] * norms[j];
            corr[[i, j]] = if denom > 0.0 { (corr[[i, j]] / denom).max(-1.0).min(1.0) } else { std::f64::NAN };
        }
    }
    corr
}

/// Eigenvalues in descending order and the matching eigenvectors as columns,
/// computed with cyclic Jacobi rotations. `matrix` must be symmetric.
pub fn symmetric_eigen(matrix: &Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let n = matrix.nrows();
    let mut a = matrix.to_owned();
    let mut v = Array2::<f64>::eye(n);

    for _ in 0..JACOBI_MAX_SWEEPS {
        let off_diag: f64 = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .map(|(i, j)| a[[i, j]] * a[[i, j]])
            .sum();
        if off_diag.sqrt() < JACOBI_TOLERANCE {
            break;
        }

        for p in 0..n {
            for q in p + 1..n {
                let apq = a[[p, q]];
                if apq.abs() < std::f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                rotate(&mut a, &mut v, p, q, c, s);
            }
        }
    }

    let mut order = Vec::from_iter(0..n);
    order.sort_by(|&i, &j| a[[j, j]].partial_cmp(&a[[i, i]]).unwrap_or(std::cmp::Ordering::Equal));
    let values = order.iter().map(|&i| a[[i, i]]).collect();
    let vectors = v.select(Axis(1), &order);
    (values, vectors)
}

fn rotate(a: &mut Array2<f64>, v: &mut Array2<f64>, p: usize, q: usize, c: f64, s: f64) {
    let n = a.nrows();
    for k in 0..n {
        let akp = a[[k, p]];
        let akq = a[[k, q]];
        a[[k, p]] = c * akp - s * akq;
        a[[k, q]] = s * akp + c * akq;
    }
    for k in 0..n {
        let apk = a[[p, k]];
        let aqk = a[[q, k]];
        a[[p, k]] = c * apk - s * aqk;
        a[[q, k]] = s * apk + c * aqk;
    }
    for k in 0..n {
        let vkp = v[[k, p]];
        let vkq = v[[k, q]];
        v[[k, p]] = c * vkp - s * vkq;
        v[[k, q]] = s * vkp + c * vkq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn nan_mean_skips_nan() {
        assert_eq!(nan_mean(&[1.0, std::f64::NAN, 3.0]), 2.0);
        assert!(nan_mean(&[std::f64::NAN]).is_nan());
    }

    #[test]
    fn perfectly_correlated_columns() {
        let data = array![[1.0, 2.0, 3.0], [2.0, 4.0, 1.0], [3.0, 6.0, 2.0]];
        let corr = column_correlation(&data);
        assert!((corr[[0, 1]] - 1.0).abs() < 1e-12);
        assert!((corr[[1, 0]] - 1.0).abs() < 1e-12);
        assert!((corr[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((corr[[0, 2]] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn constant_column_is_nan() {
        let data = array![[1.0, 5.0], [2.0, 5.0]];
        let corr = column_correlation(&data);
        assert!(corr[[0, 1]].is_nan());
        assert!(corr[[1, 1]].is_nan());
    }

    #[test]
    fn eigen_of_indefinite_matrix() {
        let m = array![[0.0, 1.0], [1.0, 0.0]];
        let (values, vectors) = symmetric_eigen(&m);
        assert!((values[0] - 1.0).abs() < 1e-10);
        assert!((values[1] + 1.0).abs() < 1e-10);
        let v0 = vectors.column(0);
        assert!((v0[0].abs() - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-10);
        assert!((v0[0] - v0[1]).abs() < 1e-10);
    }

    #[test]
    fn eigen_reconstructs_matrix() {
        let m = array![[4.0, 1.0, -2.0], [1.0, 2.0, 0.0], [-2.0, 0.0, 3.0]];
        let (values, vectors) = symmetric_eigen(&m);
        assert!(values[0] >= values[1] && values[1] >= values[2]);
        for k in 0..3 {
            let v = vectors.column(k);
            let mv = m.dot(&v);
            for i in 0..3 {
                assert!((mv[i] - values[k] * v[i]).abs() < 1e-9);
            }
        }
    }
}
