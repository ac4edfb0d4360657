use crate::error::DspError;
use crate::spectrum::{amplitude_spectrum, spl_db, spl_to_amplitude};
use crate::windows::{Symmetry, Window};

/// Outcome of a microphone calibration against a reference tone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationReport {
    /// Multiply raw samples by this to get pascals.
    pub gain: f64,
    /// Level of the strongest bin before calibration, dB re. one unit.
    pub uncalibrated_level: f64,
    /// Calibrator level, dB SPL.
    pub target_level: f64,
    /// Bin index of the calibration tone.
    pub peak_bin: usize,
}

/// Calibration gain from a recording of a calibrator at `target_level` dB SPL.
///
/// The recording is flat-top windowed (normalized by the window mean) so the
/// tone amplitude is read accurately from the strongest bin of its amplitude
/// spectrum. Convenience wrapper over [`calibrate`].
///
/// # Errors
/// Returns [`DspError::EmptyInput`] for an empty or silent recording.
///
/// # Example
/// ```
/// use sfc_dsp::calibration::calibration_gain;
/// let sr = 8000.0;
/// let x: Vec<f64> = (0..8000)
///     .map(|k| 0.1 * (2.0 * std::f64::consts::PI * 1000.0 * k as f64 / sr).sin())
///     .collect();
/// let gain = calibration_gain(&x, 94.0).unwrap();
/// assert!((0.1 * gain - 1.4176).abs() < 1e-3);
/// ```
pub fn calibration_gain(samples: &[f64], target_level: f64) -> Result<f64, DspError> {
    calibrate(samples, target_level).map(|r| r.gain)
}

/// Calibrate against a reference tone, see [`calibration_gain`].
///
/// # Errors
/// Returns [`DspError::EmptyInput`] for an empty or silent recording.
pub fn calibrate(samples: &[f64], target_level: f64) -> Result<CalibrationReport, DspError> {
    if samples.is_empty() {
        return Err(DspError::EmptyInput("calibration recording"));
    }
    let window = Window::Flattop.generate(samples.len(), Symmetry::Symmetric);
    let mean = window.iter().sum::<f64>() / window.len() as f64;
    let windowed: Vec<f64> = samples
        .iter()
        .zip(&window)
        .map(|(x, w)| x * w / mean)
        .collect();

    let spectrum = amplitude_spectrum(&windowed);
    let (peak_bin, measured) = spectrum
        .iter()
        .map(|c| c.norm())
        .enumerate()
        .fold((0, 0.0), |best, (i, v)| if v > best.1 { (i, v) } else { best });
    if measured <= 0.0 {
        return Err(DspError::EmptyInput("silent calibration recording"));
    }

    let gain = spl_to_amplitude(target_level) / measured;
    log::info!(
        "Calibration : pic au bin {peak_bin}, {:.2} dB non calibré, gain {gain:.6}",
        spl_db(measured)
    );
    Ok(CalibrationReport {
        gain,
        uncalibrated_level: spl_db(measured),
        target_level,
        peak_bin,
    })
}
