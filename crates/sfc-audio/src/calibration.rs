use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sfc_core::signal::MultiChannel;
use sfc_dsp::calibration::{CalibrationReport, calibrate};

use crate::decode::decode_file;
use crate::device::CpalInterface;
use crate::error::AudioError;
use crate::wav::write_wav;

/// File name of the calibration recording of 1-based input `channel`.
#[must_use]
pub fn calibration_file_name(channel: usize) -> String {
    format!("channel {channel}.wav")
}

/// Record a calibrator on input `channel` for `duration` seconds and save it
/// as `channel {channel}.wav` in `dir`.
///
/// # Errors
/// Returns an error if recording or writing fails.
pub fn record_calibration_signal(
    interface: &mut CpalInterface,
    dir: &Path,
    channel: usize,
    duration: f64,
    sample_rate: u32,
) -> Result<(MultiChannel, PathBuf)> {
    let n_frames = (duration * f64::from(sample_rate)).round() as usize;
    log::info!("Enregistrement de calibration : canal {channel}, {duration} s");
    let recording = interface.record(n_frames, &[channel])?;
    let path = save_calibration_signal(dir, channel, &recording, sample_rate)?;
    Ok((recording, path))
}

/// Write a calibration recording to `dir`.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn save_calibration_signal(
    dir: &Path,
    channel: usize,
    recording: &MultiChannel,
    sample_rate: u32,
) -> Result<PathBuf> {
    let path = dir.join(calibration_file_name(channel));
    write_wav(&path, recording, sample_rate)?;
    Ok(path)
}

/// Calibration from the first channel of a recorded calibrator tone.
///
/// # Errors
/// Returns an error if the file cannot be decoded or holds no usable tone.
pub fn calibration_gain_from_recording(
    path: impl AsRef<Path>,
    target_level: f64,
) -> Result<CalibrationReport> {
    let path = path.as_ref();
    let (signal, _) = decode_file(path)?;
    if signal.n_channels() == 0 {
        return Err(AudioError::DecodeError(format!("{} est vide", path.display())).into());
    }
    calibrate(signal.channel(0), target_level)
        .with_context(|| format!("Calibration impossible : {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;

    #[test]
    fn saved_recording_yields_gain() {
        let dir = tempfile::tempdir().unwrap();
        let sr = 8000;
        let tone: Vec<f64> = (0..8000)
            .map(|k| 0.25 * (2.0 * PI * 1000.0 * f64::from(k) / f64::from(sr)).sin())
            .collect();
        let path = save_calibration_signal(dir.path(), 3, &MultiChannel::mono(tone), sr).unwrap();
        assert!(path.ends_with("channel 3.wav"));

        let report = calibration_gain_from_recording(&path, 94.0).unwrap();
        // 94 dB SPL peak amplitude is 1.4176 Pa
        assert!((0.25 * report.gain - 1.4176).abs() < 1e-3);
        assert_eq!(report.peak_bin, 1000);
    }
}
