use rayon::prelude::*;
use realfft::num_complex::Complex64;

use crate::error::DspError;
use crate::fft::RealFft;

/// Regularization of the frequency-domain deconvolution.
///
/// Ideally set to the noise-to-signal ratio of the measurement.
#[derive(Clone, Debug, PartialEq)]
pub enum Regularization {
    /// Same value for every bin.
    Constant(f64),
    /// One value per single-sided bin (`n / 2 + 1` values).
    PerBin(Vec<f64>),
}

impl Default for Regularization {
    fn default() -> Self {
        Self::Constant(f64::EPSILON)
    }
}

impl Regularization {
    /// Value at `bin`.
    #[must_use]
    pub fn at(&self, bin: usize) -> f64 {
        match self {
            Self::Constant(v) => *v,
            Self::PerBin(v) => v[bin],
        }
    }

    fn check(&self, bins: usize) -> Result<(), DspError> {
        match self {
            Self::PerBin(v) if v.len() != bins => Err(DspError::LengthMismatch {
                left: v.len(),
                right: bins,
            }),
            _ => Ok(()),
        }
    }
}

/// Frequency response between reference `x` and measured `y`.
///
/// `H = Y conj(X) / (|X|^2 + reg)` on the single-sided grid.
///
/// # Errors
/// Returns [`DspError::LengthMismatch`] if `x` and `y` differ in length or a
/// per-bin regularization has the wrong length, [`DspError::EmptyInput`] for
/// empty signals.
pub fn transfer_function(
    x: &[f64],
    y: &[f64],
    reg: &Regularization,
) -> Result<Vec<Complex64>, DspError> {
    let mut fft = checked_fft(x, y)?;
    reg.check(fft.bins())?;
    let big_x = fft.forward(x);
    let big_y = fft.forward(y);
    Ok(deconvolve(&big_x, &big_y, reg))
}

/// Impulse response between reference `x` and measured `y`.
///
/// The inverse transform of [`transfer_function`], `x.len()` samples long.
///
/// # Errors
/// Same as [`transfer_function`].
///
/// # Example
/// ```
/// use sfc_dsp::transfer::{impulse_response, Regularization};
/// let x = [1.0, 0.5, -0.25, 0.125];
/// let y = [0.25, 2.0, 1.0, -0.5]; // 2 * x delayed by one sample (circularly)
/// let h = impulse_response(&x, &y, &Regularization::default()).unwrap();
/// assert!((h[1] - 2.0).abs() < 1e-9);
/// assert!(h[0].abs() < 1e-9);
/// ```
pub fn impulse_response(x: &[f64], y: &[f64], reg: &Regularization) -> Result<Vec<f64>, DspError> {
    let mut fft = checked_fft(x, y)?;
    reg.check(fft.bins())?;
    let big_x = fft.forward(x);
    let big_y = fft.forward(y);
    Ok(fft.inverse(&deconvolve(&big_x, &big_y, reg)))
}

/// Impulse responses from one reference to many measured traces, in parallel.
///
/// # Errors
/// Same as [`transfer_function`], for the first failing trace.
pub fn impulse_responses(
    x: &[f64],
    ys: &[Vec<f64>],
    reg: &Regularization,
) -> Result<Vec<Vec<f64>>, DspError> {
    ys.par_iter().map(|y| impulse_response(x, y, reg)).collect()
}

fn checked_fft(x: &[f64], y: &[f64]) -> Result<RealFft, DspError> {
    if x.len() != y.len() {
        return Err(DspError::LengthMismatch {
            left: x.len(),
            right: y.len(),
        });
    }
    if x.is_empty() {
        return Err(DspError::EmptyInput("transfer function"));
    }
    Ok(RealFft::new(x.len()))
}

fn deconvolve(big_x: &[Complex64], big_y: &[Complex64], reg: &Regularization) -> Vec<Complex64> {
    big_x
        .iter()
        .zip(big_y)
        .enumerate()
        .map(|(bin, (&xb, &yb))| yb * xb.conj() / (xb.norm_sqr() + reg.at(bin)))
        .collect()
}

/// Crude regularization: wherever `|X|^2` is more than `dynamic_range_db`
/// below the spectrum's maximum, fill it up to that floor.
///
/// Returns `max(10^((max_dB - dynamic_range_db) / 10) - |X|^2, 0)` per bin.
///
/// # Example
/// ```
/// use sfc_dsp::transfer::fill_up_below_dynamic_range;
/// let mut x = vec![0.0; 16];
/// x[0] = 1.0;
/// let reg = fill_up_below_dynamic_range(20.0, &x);
/// assert!(reg.iter().all(|&r| r == 0.0)); // flat spectrum needs no filling
/// ```
#[must_use]
pub fn fill_up_below_dynamic_range(dynamic_range_db: f64, x: &[f64]) -> Vec<f64> {
    if x.is_empty() {
        return Vec::new();
    }
    let spectrum = RealFft::new(x.len()).forward(x);
    let power: Vec<f64> = spectrum.iter().map(Complex64::norm_sqr).collect();
    let max_db = power
        .iter()
        .map(|&p| 10.0 * p.log10())
        .fold(f64::NEG_INFINITY, f64::max);
    let floor = 10f64.powf((max_db - dynamic_range_db) / 10.0);
    power.iter().map(|&p| (floor - p).max(0.0)).collect()
}

/// Noise-to-signal ratio estimate per single-sided bin.
///
/// Model: `y = h x + n`, `n ~ N(0, noise_power)`. `reference` holds the
/// reference channels, `measured[c][r]` repetition `r` of measured channel
/// `c`. Noise power is the variance of `Y` across repetitions, averaged over
/// measured channels; signal power is `|X|^2` averaged over reference
/// channels.
///
/// # Errors
/// Returns [`DspError::EmptyInput`] without reference or measured data and
/// [`DspError::LengthMismatch`] if traces differ in length.
pub fn noise_to_signal_ratio(
    reference: &[Vec<f64>],
    measured: &[Vec<Vec<f64>>],
) -> Result<Vec<f64>, DspError> {
    let n = reference
        .first()
        .map(Vec::len)
        .ok_or(DspError::EmptyInput("reference"))?;
    if n == 0 {
        return Err(DspError::EmptyInput("reference"));
    }
    if measured.is_empty() || measured.iter().any(Vec::is_empty) {
        return Err(DspError::EmptyInput("measured repetitions"));
    }
    for trace in reference.iter().chain(measured.iter().flatten()) {
        if trace.len() != n {
            return Err(DspError::LengthMismatch {
                left: n,
                right: trace.len(),
            });
        }
    }

    let mut fft = RealFft::new(n);
    let bins = fft.bins();

    let mut signal_power = vec![0.0; bins];
    for x in reference {
        for (p, c) in signal_power.iter_mut().zip(fft.forward(x)) {
            *p += c.norm_sqr();
        }
    }
    signal_power
        .iter_mut()
        .for_each(|p| *p /= reference.len() as f64);

    let mut noise_power = vec![0.0; bins];
    for reps in measured {
        let spectra: Vec<Vec<Complex64>> = reps.iter().map(|y| fft.forward(y)).collect();
        let count = spectra.len() as f64;
        for (bin, p) in noise_power.iter_mut().enumerate() {
            let mean = spectra.iter().map(|s| s[bin]).sum::<Complex64>() / count;
            let var = spectra
                .iter()
                .map(|s| (s[bin] - mean).norm_sqr())
                .sum::<f64>()
                / count;
            *p += var;
        }
    }
    noise_power
        .iter_mut()
        .for_each(|p| *p /= measured.len() as f64);

    Ok(noise_power
        .iter()
        .zip(&signal_power)
        .map(|(noise, signal)| noise / signal)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic broadband test signal.
    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                ((state >> 11) as f64 / (1u64 << 53) as f64) * 2.0 - 1.0
            })
            .collect()
    }

    fn circular_delay(x: &[f64], d: usize, gain: f64) -> Vec<f64> {
        let n = x.len();
        (0..n).map(|k| gain * x[(k + n - d) % n]).collect()
    }

    #[test]
    fn recovers_delayed_gain() {
        let x = noise(256, 7);
        let y = circular_delay(&x, 17, 0.8);
        let h = impulse_response(&x, &y, &Regularization::default()).unwrap();
        assert!((h[17] - 0.8).abs() < 1e-6);
        for (k, &v) in h.iter().enumerate() {
            if k != 17 {
                assert!(v.abs() < 1e-6, "h[{k}] = {v}");
            }
        }
    }

    #[test]
    fn frequency_response_has_unit_magnitude_for_identity() {
        let x = noise(64, 3);
        let big_h = transfer_function(&x, &x, &Regularization::Constant(0.0)).unwrap();
        assert_eq!(big_h.len(), 33);
        for bin in big_h {
            assert!((bin.re - 1.0).abs() < 1e-9);
            assert!(bin.im.abs() < 1e-9);
        }
    }

    #[test]
    fn length_mismatches_are_errors() {
        let err = transfer_function(&[1.0; 4], &[1.0; 5], &Regularization::default());
        assert_eq!(err, Err(DspError::LengthMismatch { left: 4, right: 5 }));
        let err = impulse_response(&[1.0; 4], &[1.0; 4], &Regularization::PerBin(vec![0.0; 2]));
        assert_eq!(err, Err(DspError::LengthMismatch { left: 2, right: 3 }));
    }

    #[test]
    fn large_regularization_shrinks_response() {
        let x = noise(128, 11);
        let h_small = impulse_response(&x, &x, &Regularization::Constant(1e-9)).unwrap();
        let h_large = impulse_response(&x, &x, &Regularization::Constant(1e6)).unwrap();
        assert!(h_large[0].abs() < h_small[0].abs());
    }

    #[test]
    fn fill_up_reaches_floor() {
        let x = noise(64, 5);
        let reg = fill_up_below_dynamic_range(10.0, &x);
        let spectrum = RealFft::new(64).forward(&x);
        let max = spectrum.iter().map(Complex64::norm_sqr).fold(0.0, f64::max);
        let floor = max / 10.0;
        for (r, c) in reg.iter().zip(&spectrum) {
            let p = c.norm_sqr();
            if p < floor {
                assert!((r + p - floor).abs() < 1e-9 * floor);
            } else {
                assert_eq!(*r, 0.0);
            }
        }
    }

    #[test]
    fn noiseless_repetitions_have_zero_nsr() {
        let x = noise(32, 1);
        let y = circular_delay(&x, 3, 0.5);
        let nsr = noise_to_signal_ratio(&[x], &[vec![y.clone(), y]]).unwrap();
        assert_eq!(nsr.len(), 17);
        assert!(nsr.iter().all(|&v| v.abs() < 1e-20));
    }

    #[test]
    fn noisy_repetitions_have_positive_nsr() {
        let x = noise(32, 1);
        let y1: Vec<f64> = x.iter().zip(noise(32, 2)).map(|(a, b)| a + 0.1 * b).collect();
        let y2: Vec<f64> = x.iter().zip(noise(32, 9)).map(|(a, b)| a + 0.1 * b).collect();
        let nsr = noise_to_signal_ratio(&[x], &[vec![y1, y2]]).unwrap();
        let mean = nsr.iter().sum::<f64>() / nsr.len() as f64;
        assert!(mean > 0.0);
        assert!(mean < 1.0);
    }

    #[test]
    fn responses_in_parallel_match_serial() {
        let x = noise(64, 4);
        let ys = vec![circular_delay(&x, 1, 1.0), circular_delay(&x, 5, -0.5)];
        let hs = impulse_responses(&x, &ys, &Regularization::default()).unwrap();
        assert!((hs[0][1] - 1.0).abs() < 1e-6);
        assert!((hs[1][5] + 0.5).abs() < 1e-6);
    }
}
