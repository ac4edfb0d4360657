/// Spectrum layout for [`frequency_vector`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Sided {
    /// Bins `0..=n/2` of a real FFT.
    #[default]
    Single,
    /// All `n` bins of a complex FFT.
    Double,
}

/// Time values in seconds of `n` taps sampled at `sample_rate`.
///
/// # Example
/// ```
/// use sfc_core::grid::time_vector;
/// let t = time_vector(4, 2.0);
/// assert_eq!(t, vec![0.0, 0.5, 1.0, 1.5]);
/// ```
#[must_use]
pub fn time_vector(n: usize, sample_rate: f64) -> Vec<f64> {
    let dt = 1.0 / sample_rate;
    (0..n).map(|k| k as f64 * dt).collect()
}

/// Frequency values in Hz of an `n`-point DFT sampled at `sample_rate`.
///
/// `Sided::Single` stops at Nyquist and yields `n / 2 + 1` values.
///
/// # Example
/// ```
/// use sfc_core::grid::{frequency_vector, Sided};
/// let f = frequency_vector(8, 8.0, Sided::Single);
/// assert_eq!(f, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
/// ```
#[must_use]
pub fn frequency_vector(n: usize, sample_rate: f64, sided: Sided) -> Vec<f64> {
    let len = match sided {
        Sided::Single => n / 2 + 1,
        Sided::Double => n,
    };
    if n == 0 {
        return Vec::new();
    }
    (0..len).map(|k| k as f64 * sample_rate / n as f64).collect()
}

/// Nearest value to `target` in `values` and its index.
///
/// Ties resolve to the first index. Returns `None` for an empty slice.
#[must_use]
pub fn find_nearest(values: &[f64], target: f64) -> Option<(f64, usize)> {
    let mut best: Option<(f64, usize)> = None;
    let mut best_dist = f64::INFINITY;
    for (i, &v) in values.iter().enumerate() {
        let dist = (v - target).abs();
        if dist < best_dist {
            best_dist = dist;
            best = Some((v, i));
        }
    }
    best
}
