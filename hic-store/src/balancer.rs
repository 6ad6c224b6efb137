use std::ops;
use std::iter::FromIterator;

use log::{debug, warn};
use ndarray::{azip, Array1, ArrayView1, Zip};
use ndarray_stats::SummaryStatisticsExt;
use num_traits::identities;

use super::utils;

/// Iterative correction of a single symmetric contact matrix given as its
/// upper triangle pixels `(bins1[k], bins2[k], counts[k])`.
#[derive(Clone, Debug)]
pub struct Balancer {
    ignore_diags: u32,
    min_nnz: u32,
    n_iters: usize,
    mad_max: f64,
    var_bound: f64,
}

impl Default for Balancer {
    fn default() -> Self {
        Balancer::new()
    }
}

impl Balancer {
    pub fn new() -> Balancer {
        Balancer {
            ignore_diags: 3,
            min_nnz: 5,
            n_iters: 400,
            mad_max: 5.0,
            var_bound: 1e-5,
        }
    }

    /// Diagonals closer than `n` bins are left out of the correction.
    pub fn with_ignore_diags(mut self, n: u32) -> Balancer {
        self.ignore_diags = n;
        self
    }

    /// Bins with fewer non-zero pixels are filtered.
    pub fn with_min_nnz(mut self, n: u32) -> Balancer {
        self.min_nnz = n;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Balancer {
        self.n_iters = n;
        self
    }

    /// Per-bin biases such that `count * bias[i] * bias[j]` has constant
    /// marginals. Filtered bins get NaN. `None` when the matrix has no
    /// usable pixel.
    pub fn balance(&self, n_bins: usize, bins1: ArrayView1<u32>, bins2: ArrayView1<u32>, counts: ArrayView1<f64>)
        -> Option<Array1<f64>> {
        let counts = self.zeroing_diags(bins1, bins2, counts.to_owned());
        let bias = Array1::<f64>::ones((n_bins,));
        let bias = self.filter_few_nnzs(n_bins, bins1, bins2, counts.view(), bias);
        let bias = self.filter_bins_by_mad(n_bins, bins1, bins2, counts.view(), bias);
        self.do_iterative_corrections(n_bins, bins1, bins2, counts.view(), bias)
    }

    /// Row sums of the full symmetric matrix, diagonal counted once.
    pub fn coverage(&self, n_bins: usize, bins1: ArrayView1<u32>, bins2: ArrayView1<u32>, counts: ArrayView1<f64>)
        -> Array1<f64> {
        let mut off_diag = counts.to_owned();
        azip!((c in &mut off_diag, &b1 in bins1, &b2 in bins2) if b1 == b2 {*c = 0.0});
        utils::bincount(n_bins, bins1, counts) + utils::bincount(n_bins, bins2, off_diag.view())
    }

    fn filter_few_nnzs(&self, n_bins: usize, bins1: ArrayView1<u32>, bins2: ArrayView1<u32>,
                       counts: ArrayView1<f64>, bias: Array1<f64>) -> Array1<f64> {
        let data = self.binarize(counts);
        let res = self.marginalize(n_bins, bins1, bins2, data.view());
        let res = res.mapv(|m| m < self.min_nnz);
        self.filter_by_predicate(res.view(), bias)
    }

    fn filter_bins_by_mad(&self, n_bins: usize, bins1: ArrayView1<u32>, bins2: ArrayView1<u32>,
                          counts: ArrayView1<f64>, mut bias: Array1<f64>) -> Array1<f64> {
        let mut res = self.marginalize(n_bins, bins1, bins2, counts);

        let nnz_elems = utils::get_array_wrt_predicate(res.mapv(|x| x > 0.0).view(), res.view());
        match utils::median(&nnz_elems) {
            Some(median) => res.map_inplace(|x| *x /= median),
            None => res.fill(0.0),
        }

        let mut nnz_elems = utils::get_array_wrt_predicate(res.mapv(|x| x != 0.0).view(), res.view());
        nnz_elems.iter_mut().for_each(|x| { *x = x.ln() });
        let log_nnz_med = utils::median(&nnz_elems);
        let log_nnz_dev = utils::mad(nnz_elems);
        let cutoff = log_nnz_med.zip(log_nnz_dev).map(|(med, dev)| {
            (med - self.mad_max * dev).exp()
        });

        match cutoff {
            Some(bound) => bias = self.filter_by_predicate(res.mapv(|m| m < bound).view(), bias),
            None => warn!("MAD filtering was skipped: no non-zero marginals"),
        }
        bias
    }

    fn do_iterative_corrections(&self, n_bins: usize, bins1: ArrayView1<u32>, bins2: ArrayView1<u32>,
                                counts: ArrayView1<f64>, mut bias: Array1<f64>) -> Option<Array1<f64>> {
        for iteration in 0..self.n_iters {
            match self.calc_mean_and_var_of_matrix(n_bins, bins1, bins2, counts, bias.view()) {
                Some(((mean, var), mut data)) => {
                    data.map_inplace(|x| if *x == 0.0 {*x = 1.0;} else {*x /= mean;});
                    bias = Zip::from(&bias).and(&data).apply_collect(|&b, &d| b / d);
                    debug!("variance is {} on iteration {}", var, iteration);
                    if var < self.var_bound { break; }
                },
                None => {
                    warn!("Mean of the marginals is undefined. Abort balancing.");
                    return None;
                }
            };
        }

        match self.calc_mean_and_var_of_matrix(n_bins, bins1, bins2, counts, bias.view()) {
            Some(((scale, _), _)) => {
                bias.map_inplace(|x| if *x == 0.0 {*x = f64::NAN} else {*x /= scale.sqrt()});
            },
            None => {
                warn!("Mean of the marginals is undefined. Skip scaling.");
                return None;
            }
        }
        Some(bias)
    }

    fn calc_mean_and_var_of_matrix(&self, n_bins: usize, bins1: ArrayView1<u32>, bins2: ArrayView1<u32>,
                                   counts: ArrayView1<f64>, bias: ArrayView1<f64>) -> Option<((f64, f64), Array1<f64>)> {
        let data = self.outer_product(bias, bins1, bins2, counts);
        let res = self.marginalize(n_bins, bins1, bins2, data.view());

        let nnz_elems = Array1::from(utils::get_array_wrt_predicate(res.mapv(|x| x != 0.0).view(), res.view()));
        if nnz_elems.is_empty() { return None; }
        nnz_elems.mean().zip(nnz_elems.central_moment(2).ok()).zip(Some(res))
    }

    fn zeroing_diags(&self, bins1: ArrayView1<u32>, bins2: ArrayView1<u32>, mut counts: Array1<f64>) -> Array1<f64> {
        Zip::from(&mut counts).and(bins1).and(bins2).par_apply(|c, b1, b2| {
            let diff = if b1 > b2 {b1 - b2} else {b2 - b1};
            if diff < self.ignore_diags { *c = 0.0 };
        });
        counts
    }

    fn binarize(&self, data: ArrayView1<f64>) -> Array1<u32> {
        data.mapv(|x| if x != 0.0 {1} else {0})
    }

    fn marginalize<T>(&self, n_bins: usize, bins1: ArrayView1<u32>, bins2: ArrayView1<u32>, data: ArrayView1<T>)
        -> Array1<T> where T: Copy + ops::AddAssign + identities::Zero {
        let m1 = utils::bincount(n_bins, bins1, data);
        let m2 = utils::bincount(n_bins, bins2, data);
        m1 + m2
    }

    fn outer_product(&self, bias: ArrayView1<f64>, bins1: ArrayView1<u32>, bins2: ArrayView1<u32>, data: ArrayView1<f64>) -> Array1<f64> {
        let bin1_bias = Array1::from_iter(bins1.iter().map(|&i| { bias[i as usize] }));
        let bin2_bias = Array1::from_iter(bins2.iter().map(|&i| { bias[i as usize] }));
        &data * &(bin1_bias * bin2_bias)
    }

    fn filter_by_predicate(&self, predicate: ArrayView1<bool>, mut array: Array1<f64>) -> Array1<f64> {
        azip!((array in &mut array, predicate in predicate) if *predicate {*array = 0.0});
        array
    }
}
