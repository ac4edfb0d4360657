use realfft::num_complex::Complex64;

use crate::fft::rfft;

/// Reference sound pressure, 20 µPa.
pub const P_REF: f64 = 20e-6;

/// Single-sided amplitude spectrum of a real signal.
///
/// A sinusoid of amplitude `a` falling exactly on a bin shows up with
/// magnitude `a`. The DC bin and, for even lengths, the Nyquist bin appear
/// once in the two-sided spectrum and are not doubled.
///
/// # Example
/// ```
/// use sfc_dsp::spectrum::amplitude_spectrum;
/// let x: Vec<f64> = (0..8).map(|k| 2.0 * (std::f64::consts::PI * k as f64 / 2.0).cos()).collect();
/// let a = amplitude_spectrum(&x);
/// assert_eq!(a.len(), 5);
/// assert!((a[2].norm() - 2.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn amplitude_spectrum(x: &[f64]) -> Vec<Complex64> {
    let n = x.len();
    if n == 0 {
        return Vec::new();
    }
    let scale = 1.0 / n as f64;
    let mut spectrum = rfft(x, n);
    spectrum.iter_mut().for_each(|c| *c *= scale);

    let last = spectrum.len();
    let doubled = if n % 2 == 0 {
        1..last.saturating_sub(1)
    } else {
        1..last
    };
    for c in &mut spectrum[doubled] {
        *c *= 2.0;
    }
    spectrum
}

/// Sound pressure level in dB of a pressure amplitude (peak, Pa).
///
/// # Example
/// ```
/// use sfc_dsp::spectrum::spl_db;
/// let amplitude = 1.0 * 2f64.sqrt();
/// assert!((spl_db(amplitude) - 93.979).abs() < 1e-3);
/// ```
#[must_use]
pub fn spl_db(amplitude: f64) -> f64 {
    20.0 * (amplitude.abs() / std::f64::consts::SQRT_2 / P_REF).log10()
}

/// Peak amplitude in Pa of a sound pressure level in dB.
#[must_use]
pub fn spl_to_amplitude(level_db: f64) -> f64 {
    10f64.powf(level_db / 20.0) * P_REF * std::f64::consts::SQRT_2
}

/// Magnitude in dB, `20 log10 |x|`.
#[must_use]
pub fn db(x: Complex64) -> f64 {
    20.0 * x.norm().log10()
}
