//! Window functions and time/frequency masks built from them.
//!
//! Window shapes follow the usual scipy conventions: a symmetric window of
//! length `n` has its endpoints at `k = 0` and `k = n - 1`; a periodic window
//! is the symmetric window of length `n + 1` without its last sample.

use std::f64::consts::PI;

use sfc_core::grid::{Sided, find_nearest, frequency_vector, time_vector};

use crate::error::DspError;

/// Window shape.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Window {
    /// Hann window (raised cosine).
    #[default]
    Hann,
    /// Hamming window.
    Hamming,
    /// Blackman window.
    Blackman,
    /// Flat-top window, for amplitude-accurate spectra.
    Flattop,
    /// Tukey window (tapered cosine) with taper ratio `alpha`.
    Tukey(f64),
    /// Rectangular window (all ones).
    Rectangular,
}

/// Window sampling convention.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Symmetry {
    /// For filter design and fades.
    #[default]
    Symmetric,
    /// For spectral analysis.
    Periodic,
}

const FLATTOP: [f64; 5] = [
    0.215_578_95,
    0.416_631_58,
    0.277_263_158,
    0.083_578_947,
    0.006_947_368,
];

impl Window {
    /// Generate `n` window coefficients.
    ///
    /// # Example
    /// ```
    /// use sfc_dsp::windows::{Symmetry, Window};
    /// let w = Window::Hann.generate(5, Symmetry::Symmetric);
    /// assert!((w[2] - 1.0).abs() < 1e-12);
    /// assert!(w[0].abs() < 1e-12 && w[4].abs() < 1e-12);
    /// ```
    #[must_use]
    pub fn generate(self, n: usize, symmetry: Symmetry) -> Vec<f64> {
        match n {
            0 => return Vec::new(),
            1 => return vec![1.0],
            _ => {}
        }
        match symmetry {
            Symmetry::Symmetric => self.symmetric(n),
            Symmetry::Periodic => {
                let mut w = self.symmetric(n + 1);
                w.truncate(n);
                w
            }
        }
    }

    fn symmetric(self, n: usize) -> Vec<f64> {
        match self {
            Self::Hann => general_cosine(n, &[0.5, 0.5]),
            Self::Hamming => general_cosine(n, &[0.54, 0.46]),
            Self::Blackman => general_cosine(n, &[0.42, 0.5, 0.08]),
            Self::Flattop => general_cosine(n, &FLATTOP),
            Self::Tukey(alpha) => tukey(n, alpha),
            Self::Rectangular => vec![1.0; n],
        }
    }
}

/// Sum of cosines `a_j (-1)^j cos(2 pi j k / (n - 1))`, symmetric, `n >= 2`.
fn general_cosine(n: usize, coeffs: &[f64]) -> Vec<f64> {
    let denom = (n - 1) as f64;
    (0..n)
        .map(|k| {
            let phase = 2.0 * PI * k as f64 / denom;
            coeffs
                .iter()
                .enumerate()
                .map(|(j, &a)| {
                    let sign = if j % 2 == 0 { 1.0 } else { -1.0 };
                    sign * a * (j as f64 * phase).cos()
                })
                .sum()
        })
        .collect()
}

/// Symmetric Tukey window, `n >= 2`.
fn tukey(n: usize, alpha: f64) -> Vec<f64> {
    if alpha <= 0.0 {
        return vec![1.0; n];
    }
    if alpha >= 1.0 {
        return general_cosine(n, &[0.5, 0.5]);
    }
    let m = (n - 1) as f64;
    let width = (alpha * m / 2.0).floor() as usize;
    (0..n)
        .map(|k| {
            let kf = k as f64;
            if k <= width {
                0.5 * (1.0 + (PI * (-1.0 + 2.0 * kf / alpha / m)).cos())
            } else if k < n - width - 1 {
                1.0
            } else {
                0.5 * (1.0 + (PI * (-2.0 / alpha + 1.0 + 2.0 * kf / alpha / m)).cos())
            }
        })
        .collect()
}

/// Sample-domain mask of length `n`.
///
/// `start = (s0, s1)` opens the mask with the rising half of a symmetric
/// window over `s0..s1`, zeros before `s0`. `stop = (e0, e1)` closes it with
/// the falling half over `e0 + 1 ..= e1`, zeros after `e1`. Indices past the
/// end of the mask are ignored.
///
/// # Example
/// ```
/// use sfc_dsp::windows::{sample_window, Window};
/// let w = sample_window(10, Some((2, 4)), None, Window::Hann);
/// assert_eq!(&w[..2], &[0.0, 0.0]);
/// assert_eq!(&w[4..], &[1.0; 6]);
/// ```
#[must_use]
pub fn sample_window(
    n: usize,
    start: Option<(usize, usize)>,
    stop: Option<(usize, usize)>,
    window: Window,
) -> Vec<f64> {
    let mut mask = vec![1.0; n];

    if let Some((s0, s1)) = start {
        let length = s1.saturating_sub(s0);
        let rising = window.generate(2 * length, Symmetry::Symmetric);
        mask[..s0.min(n)].fill(0.0);
        for (slot, &w) in mask.iter_mut().skip(s0).zip(&rising[..length]) {
            *slot = w;
        }
    }

    if let Some((e0, e1)) = stop {
        let length = e1.saturating_sub(e0);
        let falling = window.generate(2 * length, Symmetry::Symmetric);
        for (slot, &w) in mask.iter_mut().skip(e0 + 1).zip(&falling[length..]) {
            *slot = w;
        }
        if e1 + 1 < n {
            mask[e1 + 1..].fill(0.0);
        }
    }

    mask
}

fn resolve_time(t: f64, total: f64) -> Result<f64, DspError> {
    let t = if t < 0.0 { t + total } else { t };
    if !(0.0..=total).contains(&t) {
        return Err(DspError::OutOfRange {
            value: t,
            max: total,
        });
    }
    Ok(t)
}

fn nearest_index(grid: &[f64], value: f64) -> Result<usize, DspError> {
    find_nearest(grid, value)
        .map(|(_, i)| i)
        .ok_or(DspError::EmptyInput("window grid"))
}

/// Time-domain mask for an `n`-sample response at `sample_rate`.
///
/// `start = (t0, t1)` gives the interval over which the mask opens, `stop =
/// (t2, t3)` the interval over which it closes; `t3 = None` means the last
/// sample. Negative times count back from the end of the response. `None`
/// keeps the mask open from the beginning / to the end.
///
/// # Errors
/// Returns [`DspError::OutOfRange`] if a time lies outside the response and
/// [`DspError::EmptyInput`] for `n == 0`.
///
/// # Example
/// ```
/// use sfc_dsp::windows::{time_window, Window};
/// let w = time_window(100, 100.0, Some((0.1, 0.2)), Some((-0.2, None)), Window::Hann).unwrap();
/// assert_eq!(w[5], 0.0);
/// assert_eq!(w[50], 1.0);
/// assert_eq!(w[99], 0.0);
/// ```
pub fn time_window(
    n: usize,
    sample_rate: f64,
    start: Option<(f64, f64)>,
    stop: Option<(f64, Option<f64>)>,
    window: Window,
) -> Result<Vec<f64>, DspError> {
    if n == 0 {
        return Err(DspError::EmptyInput("time window"));
    }
    let times = time_vector(n, sample_rate);
    let total = n as f64 / sample_rate;
    let last = times[n - 1];

    let start_n = match start {
        Some((a, b)) => Some((
            nearest_index(&times, resolve_time(a, total)?)?,
            nearest_index(&times, resolve_time(b, total)?)?,
        )),
        None => None,
    };
    let stop_n = match stop {
        Some((a, b)) => {
            let b = match b {
                Some(b) => resolve_time(b, total)?,
                None => last,
            };
            Some((
                nearest_index(&times, resolve_time(a, total)?)?,
                nearest_index(&times, b)?,
            ))
        }
        None => None,
    };

    Ok(sample_window(n, start_n, stop_n, window))
}

/// Frequency-domain mask over the single-sided grid of an `n`-point DFT.
///
/// Works like [`time_window`] with frequencies in Hz; the mask has
/// `n / 2 + 1` entries.
///
/// # Errors
/// Returns [`DspError::EmptyInput`] for `n == 0`.
pub fn frequency_window(
    n: usize,
    sample_rate: f64,
    start: Option<(f64, f64)>,
    stop: Option<(f64, f64)>,
    window: Window,
) -> Result<Vec<f64>, DspError> {
    let freqs = frequency_vector(n, sample_rate, Sided::Single);
    if freqs.is_empty() {
        return Err(DspError::EmptyInput("frequency window"));
    }
    let to_bins = |(a, b): (f64, f64)| -> Result<(usize, usize), DspError> {
        Ok((nearest_index(&freqs, a)?, nearest_index(&freqs, b)?))
    };
    let start_n = start.map(to_bins).transpose()?;
    let stop_n = stop.map(to_bins).transpose()?;
    Ok(sample_window(freqs.len(), start_n, stop_n, window))
}

/// Window an impulse response around its absolute peak.
///
/// The periodic `window` spans `t_left` seconds before to `t_right` seconds
/// after the peak, clipped to the response; the mask is zero elsewhere.
///
/// # Example
/// ```
/// use sfc_dsp::windows::{time_window_around_peak, Window};
/// let mut ir = vec![0.0; 100];
/// ir[40] = 1.0;
/// let w = time_window_around_peak(&ir, 1000.0, 0.01, 0.02, Window::Tukey(0.5));
/// assert_eq!(w[29], 0.0);
/// assert_eq!(w[40], 1.0);
/// assert_eq!(w[60], 0.0);
/// ```
#[must_use]
pub fn time_window_around_peak(
    ir: &[f64],
    sample_rate: f64,
    t_left: f64,
    t_right: f64,
    window: Window,
) -> Vec<f64> {
    let mut mask = vec![0.0; ir.len()];
    let Some(peak) = argmax_abs(ir) else {
        return mask;
    };
    let samples_left = (sample_rate * t_left) as usize;
    let samples_right = (sample_rate * t_right) as usize;
    let begin = peak.saturating_sub(samples_left);
    let end = peak.saturating_add(samples_right).min(ir.len());

    let w = window.generate(end - begin, Symmetry::Periodic);
    mask[begin..end].copy_from_slice(&w);
    mask
}

/// Index of the largest absolute value; first one on ties.
#[must_use]
pub fn argmax_abs(x: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in x.iter().map(|v| v.abs()).enumerate() {
        if best.is_none_or(|(_, b)| v > b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

/// Multiply `x` by `mask` in place.
pub fn apply(x: &mut [f64], mask: &[f64]) {
    for (v, &m) in x.iter_mut().zip(mask) {
        *v *= m;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
    }

    #[test]
    fn periodic_hann_drops_last_point() {
        let w = Window::Hann.generate(4, Symmetry::Periodic);
        assert!(close(&w, &[0.0, 0.5, 1.0, 0.5]));
    }

    #[test]
    fn flattop_peak_is_unity() {
        let w = Window::Flattop.generate(101, Symmetry::Symmetric);
        assert!((w[50] - 1.0).abs() < 1e-6);
        assert!(w[0].abs() < 1e-3);
    }

    #[test]
    fn tukey_has_flat_top_and_zero_ends() {
        let w = Window::Tukey(0.5).generate(11, Symmetry::Symmetric);
        assert!(w[0].abs() < 1e-12);
        assert!(w[10].abs() < 1e-12);
        for &v in &w[3..8] {
            assert!((v - 1.0).abs() < 1e-12);
        }
        assert!(w[1] > 0.0 && w[1] < 1.0);
    }

    #[test]
    fn tukey_limits() {
        assert!(close(
            &Window::Tukey(0.0).generate(6, Symmetry::Symmetric),
            &[1.0; 6]
        ));
        assert!(close(
            &Window::Tukey(1.0).generate(6, Symmetry::Symmetric),
            &Window::Hann.generate(6, Symmetry::Symmetric)
        ));
    }

    #[test]
    fn degenerate_lengths() {
        assert!(Window::Hann.generate(0, Symmetry::Symmetric).is_empty());
        assert_eq!(Window::Blackman.generate(1, Symmetry::Periodic), vec![1.0]);
    }

    #[test]
    fn sample_window_fades_out_after_stop_start() {
        let w = sample_window(10, None, Some((5, 7)), Window::Hann);
        assert_eq!(&w[..6], &[1.0; 6]);
        // falling half of a 4-point symmetric hann: [0.75, 0.0]
        assert!((w[6] - 0.75).abs() < 1e-12);
        assert!(w[7].abs() < 1e-12);
        assert_eq!(&w[8..], &[0.0, 0.0]);
    }

    #[test]
    fn time_window_rejects_times_past_end() {
        let err = time_window(10, 10.0, Some((0.0, 2.0)), None, Window::Hann);
        assert!(matches!(err, Err(DspError::OutOfRange { .. })));
    }

    #[test]
    fn frequency_window_band_pass() {
        let w = frequency_window(16, 16.0, Some((1.0, 3.0)), Some((5.0, 7.0)), Window::Hann)
            .unwrap();
        assert_eq!(w.len(), 9);
        assert_eq!(w[0], 0.0);
        assert_eq!(w[4], 1.0);
        assert_eq!(w[8], 0.0);
    }

    #[test]
    fn peak_window_clips_at_edges() {
        let mut ir = vec![0.1; 20];
        ir[1] = -3.0;
        let w = time_window_around_peak(&ir, 100.0, 0.05, 0.05, Window::Rectangular);
        assert_eq!(&w[..6], &[1.0; 6]);
        assert_eq!(&w[6..], &[0.0; 14]);
    }

    #[test]
    fn peak_window_survives_huge_spans() {
        let mut ir = vec![0.0; 20];
        ir[10] = 1.0;
        let w = time_window_around_peak(&ir, 48_000.0, 1e300, f64::MAX, Window::Rectangular);
        assert_eq!(w, vec![1.0; 20]);
    }

    #[test]
    fn argmax_prefers_first() {
        assert_eq!(argmax_abs(&[1.0, -2.0, 2.0]), Some(1));
        assert_eq!(argmax_abs(&[]), None);
    }
}
