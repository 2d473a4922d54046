//! Water threshold selection
//!
//! Picks the scalar backscatter cutoff separating water from land for one
//! frame (or, in global mode, for a whole run). Three strategies: a fixed
//! caller-supplied value, a distribution quantile, and a histogram-based
//! bimodal split (Otsu).

use hydrospan_core::{Error, Result};

/// Number of histogram bins for the Otsu split
const OTSU_BINS: usize = 256;
/// Minimum samples the percentile-clipped subset must keep; below this the
/// unclipped distribution is used instead
const OTSU_MIN_CLIPPED: usize = 32;

/// Strategy for choosing the water/land cutoff
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdMethod {
    /// Use the given value unchanged
    Fixed(f64),
    /// Quantile of the finite sample distribution, in (0, 1)
    Quantile(f64),
    /// Histogram-based bimodal split maximizing between-class variance
    Otsu,
}

impl ThresholdMethod {
    /// Build a method from its CLI name plus the relevant parameter.
    ///
    /// Unknown names fail with [`Error::UnsupportedMethod`].
    pub fn from_name(name: &str, fixed: f64, quantile: f64) -> Result<Self> {
        match name {
            "fixed" => Ok(ThresholdMethod::Fixed(fixed)),
            "quantile" => Ok(ThresholdMethod::Quantile(quantile)),
            "otsu" => Ok(ThresholdMethod::Otsu),
            other => Err(Error::UnsupportedMethod(other.to_string())),
        }
    }
}

/// Select a classification threshold from a sample distribution.
///
/// Non-finite samples are discarded first; a distribution with no finite
/// sample yields `Ok(None)` ("no data"), never an error, so a blank frame
/// degrades to an all-dry mask instead of aborting the run.
pub fn select_threshold(samples: &[f64], method: &ThresholdMethod) -> Result<Option<f64>> {
    let finite: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Ok(None);
    }

    match *method {
        ThresholdMethod::Fixed(value) => Ok(Some(value)),
        ThresholdMethod::Quantile(q) => {
            if !(0.0 < q && q < 1.0) {
                return Err(Error::invalid_parameter(
                    "quantile",
                    q,
                    "must be strictly between 0 and 1",
                ));
            }
            let mut sorted = finite;
            sort_unstable(&mut sorted);
            Ok(Some(quantile_sorted(&sorted, q)))
        }
        ThresholdMethod::Otsu => Ok(Some(otsu_threshold(finite))),
    }
}

/// Histogram-based bimodal threshold.
///
/// Clips the distribution to its [0.5, 99.5] percentile range to suppress
/// extreme outliers (falling back to the unclipped samples when fewer than
/// 32 survive), builds a 256-bin histogram, and returns the bin center of
/// the split that maximizes the between-class variance
/// `w0 * w1 * (mu0 - mu1)^2`. Ties resolve to the lowest split because the
/// left-to-right scan keeps the first maximum.
fn otsu_threshold(mut finite: Vec<f64>) -> f64 {
    sort_unstable(&mut finite);
    let min = finite[0];
    let max = finite[finite.len() - 1];
    if all_close(min, max) {
        return min;
    }

    let lo = quantile_sorted(&finite, 0.005);
    let hi = quantile_sorted(&finite, 0.995);
    let clipped: Vec<f64> = finite.iter().copied().filter(|&v| v >= lo && v <= hi).collect();
    let values: &[f64] = if clipped.len() < OTSU_MIN_CLIPPED {
        &finite
    } else {
        &clipped
    };

    let lo_edge = values.iter().copied().fold(f64::INFINITY, f64::min);
    let hi_edge = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if all_close(lo_edge, hi_edge) {
        return lo_edge;
    }

    let width = (hi_edge - lo_edge) / OTSU_BINS as f64;
    let mut hist = [0.0f64; OTSU_BINS];
    for &v in values {
        let mut bin = ((v - lo_edge) / width) as usize;
        if bin >= OTSU_BINS {
            // The maximum lands exactly on the upper edge
            bin = OTSU_BINS - 1;
        }
        hist[bin] += 1.0;
    }

    let centers: Vec<f64> = (0..OTSU_BINS)
        .map(|i| lo_edge + (i as f64 + 0.5) * width)
        .collect();

    // Cumulative weights and means from both ends
    let mut w0 = [0.0f64; OTSU_BINS];
    let mut m0 = [0.0f64; OTSU_BINS];
    let mut acc_w = 0.0;
    let mut acc_m = 0.0;
    for i in 0..OTSU_BINS {
        acc_w += hist[i];
        acc_m += hist[i] * centers[i];
        w0[i] = acc_w;
        m0[i] = acc_m;
    }
    let mut w1 = [0.0f64; OTSU_BINS];
    let mut m1 = [0.0f64; OTSU_BINS];
    acc_w = 0.0;
    acc_m = 0.0;
    for i in (0..OTSU_BINS).rev() {
        acc_w += hist[i];
        acc_m += hist[i] * centers[i];
        w1[i] = acc_w;
        m1[i] = acc_m;
    }

    let mut best_idx = 0;
    let mut best_var = f64::NEG_INFINITY;
    for i in 0..OTSU_BINS - 1 {
        let mu0 = m0[i] / w0[i].max(1e-12);
        let mu1 = m1[i + 1] / w1[i + 1].max(1e-12);
        let var = w0[i] * w1[i + 1] * (mu0 - mu1) * (mu0 - mu1);
        if var > best_var {
            best_var = var;
            best_idx = i;
        }
    }
    centers[best_idx]
}

/// Linear-interpolated quantile of an ascending-sorted slice, q in [0, 1]
fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = q * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = rank - lower as f64;
    sorted[lower] * (1.0 - frac) + sorted[upper] * frac
}

fn sort_unstable(values: &mut [f64]) {
    values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

fn all_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}
