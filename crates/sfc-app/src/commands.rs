use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use sfc_audio::bk::load_bk_wav_recording;
use sfc_audio::calibration::{calibration_gain_from_recording, record_calibration_signal};
use sfc_audio::decode::decode_file;
use sfc_audio::device::{CpalInterface, DeviceOptions};
use sfc_audio::measure::{MeasurementPlan, measure};
use sfc_audio::wav::write_wav;
use sfc_core::config::{MeasurementConfig, SweepSettings};
use sfc_core::signal::MultiChannel;
use sfc_dsp::calibration::{CalibrationReport, calibrate};
use sfc_dsp::control::{
    filters_from_weights, normalized_error_db, plant_from_impulse_responses, pressure_matching,
    reproduced_pressure, target_from_impulse_responses,
};
use sfc_dsp::geometry::bk_planar_array_mic_positions;
use sfc_dsp::ola::OlaFilter;
use sfc_dsp::sweep::{ExponentialSweep, multichannel_signal};
use sfc_dsp::transfer::Regularization;

use crate::process::{
    check_truncation, deconvolve_recording, flatten_responses, repeated_reference,
    unflatten_responses,
};

fn sweep_from(settings: &SweepSettings, sample_rate: u32) -> Result<Vec<f64>> {
    Ok(ExponentialSweep::new(settings.duration, f64::from(sample_rate))
        .fade(settings.fade)
        .frequencies(settings.f_start, settings.f_end)
        .pre_silence(settings.pre_silence)
        .post_silence(settings.post_silence)
        .generate()?)
}

/// `sfc sweep`
///
/// # Errors
/// Returns an error if the sweep settings are invalid or the file cannot be
/// written.
pub fn run_sweep(
    config: &MeasurementConfig,
    out: &Path,
    channels: usize,
    reps: Option<usize>,
    reference: bool,
) -> Result<()> {
    let sr = config.audio.sample_rate;
    let sweep = sweep_from(&config.sweep, sr)?;
    let reps = reps.unwrap_or(config.sweep.repetitions).max(1);
    let signal = multichannel_signal(&sweep, channels.max(1), reps, reference);
    write_wav(out, &signal, sr)
}

#[derive(Serialize)]
struct CalibrationSummary {
    channel: usize,
    gain: f64,
    uncalibrated_level_db: f64,
    target_level_db: f64,
    tone_bin: usize,
}

impl CalibrationSummary {
    fn new(channel: usize, report: &CalibrationReport) -> Self {
        Self {
            channel,
            gain: report.gain,
            uncalibrated_level_db: report.uncalibrated_level,
            target_level_db: report.target_level,
            tone_bin: report.peak_bin,
        }
    }
}

/// `sfc calibrate`
///
/// # Errors
/// Returns an error if recording, decoding or calibration fails.
pub fn run_calibrate(
    config: &MeasurementConfig,
    file: Option<&Path>,
    dir: &Path,
    channel: Option<usize>,
    level: Option<f64>,
) -> Result<()> {
    let channel = channel.unwrap_or(config.calibration.channel);
    let level = level.unwrap_or(config.calibration.target_level);

    let report = if let Some(file) = file {
        calibration_gain_from_recording(file, level)?
    } else {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Impossible de créer {}", dir.display()))?;
        let mut interface = CpalInterface::open(DeviceOptions::from(&config.audio))?;
        let (recording, path) = record_calibration_signal(
            &mut interface,
            dir,
            channel,
            config.calibration.duration,
            config.audio.sample_rate,
        )?;
        log::info!("Calibration enregistrée : {}", path.display());
        calibrate(recording.channel(0), level)?
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&CalibrationSummary::new(channel, &report))?
    );
    Ok(())
}

/// `sfc measure`
///
/// # Errors
/// Returns an error if the interface fails or the files cannot be written.
pub fn run_measure(
    config: &MeasurementConfig,
    out_dir: &Path,
    outputs: &[usize],
    inputs: &[usize],
) -> Result<()> {
    let outputs = if outputs.is_empty() {
        config.audio.output_channels.as_slice()
    } else {
        outputs
    };
    let inputs = if inputs.is_empty() {
        config.audio.input_channels.as_slice()
    } else {
        inputs
    };
    let sr = config.audio.sample_rate;
    let sweep = sweep_from(&config.sweep, sr)?;
    let plan = MeasurementPlan::each_output(sweep.clone(), outputs);

    let mut interface = CpalInterface::open(DeviceOptions::from(&config.audio))?;
    let recording = measure(&mut interface, &plan, inputs, config.sweep.repetitions)?;

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Impossible de créer {}", out_dir.display()))?;
    write_wav(
        out_dir.join("recording.wav"),
        &recording.to_multichannel(),
        sr,
    )?;

    let reference = repeated_reference(&sweep, &recording);
    let irs = deconvolve_recording(&reference, &recording, f64::from(sr), &config.processing)?;
    write_wav(out_dir.join("irs.wav"), &flatten_responses(irs)?, sr)
}

/// `sfc bk`
///
/// # Errors
/// Returns an error if the recording cannot be loaded or processed.
pub fn run_bk(
    config: &MeasurementConfig,
    file: &Path,
    systems: usize,
    reps: usize,
    out: &Path,
    has_reference: bool,
) -> Result<()> {
    let bk = load_bk_wav_recording(file, systems, reps, has_reference)?;
    let Some(reference) = bk.reference else {
        bail!("Déconvolution impossible sans canal de référence");
    };
    let irs = deconvolve_recording(
        &reference,
        &bk.mics,
        f64::from(bk.sample_rate),
        &config.processing,
    )?;
    write_wav(out, &flatten_responses(irs)?, bk.sample_rate)
}

#[derive(Debug, Serialize)]
struct DesignReport {
    sources: usize,
    microphones: usize,
    taps: usize,
    regularization: f64,
    mean_error_db: f64,
    max_error_db: f64,
}

/// `sfc design`
///
/// # Errors
/// Returns an error if the responses are inconsistent or the solver fails.
#[allow(clippy::too_many_arguments)]
pub fn run_design(
    config: &MeasurementConfig,
    plant: &Path,
    sources: usize,
    target: &Path,
    out: &Path,
    reg: Option<f64>,
    taps: Option<usize>,
    report: Option<&Path>,
) -> Result<()> {
    let (plant_signal, sr) = decode_file(plant)?;
    let (target_signal, target_sr) = decode_file(target)?;
    if sr != target_sr {
        bail!("Fréquences d'échantillonnage différentes : {sr} Hz / {target_sr} Hz");
    }
    let plant_irs = unflatten_responses(plant_signal, sources)?;
    if plant_irs.len() != target_signal.n_channels() {
        bail!(
            "{} micros dans le plant, {} dans la cible",
            plant_irs.len(),
            target_signal.n_channels()
        );
    }

    let taps = taps.unwrap_or(config.processing.filter_taps).max(2);
    // filters_from_weights needs an even DFT length
    let taps = taps + taps % 2;
    let reg = reg.unwrap_or(config.processing.regularization).max(0.0);

    check_truncation(
        plant_irs
            .iter()
            .flatten()
            .chain(target_signal.channels())
            .map(Vec::as_slice),
        taps,
    )?;

    let h = plant_from_impulse_responses(&plant_irs, taps)?;
    let p = target_from_impulse_responses(target_signal.channels(), taps)?;
    let weights = pressure_matching(&h, &p, &Regularization::Constant(reg))?;
    let filters = filters_from_weights(&weights)?;

    let errors = normalized_error_db(&reproduced_pressure(&h, &weights)?, &p);
    let finite: Vec<f64> = errors.iter().copied().filter(|e| e.is_finite()).collect();
    if finite.is_empty() {
        bail!("Aucune fréquence évaluable : plant ou cible silencieux sur {taps} coefficients");
    }
    let summary = DesignReport {
        sources,
        microphones: plant_irs.len(),
        taps,
        regularization: reg,
        mean_error_db: finite.iter().sum::<f64>() / finite.len() as f64,
        max_error_db: finite.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    };
    log::info!("Conception : {summary:?}");

    write_wav(out, &MultiChannel::new(filters)?, sr)?;
    let json = serde_json::to_string_pretty(&summary)?;
    match report {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Impossible d'écrire {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

/// `sfc filter`
///
/// # Errors
/// Returns an error if the files cannot be read or written.
pub fn run_filter(filters: &Path, input: &Path, out: &Path) -> Result<()> {
    let (bank, sr) = decode_file(filters)?;
    let (signal, input_sr) = decode_file(input)?;
    if sr != input_sr {
        log::warn!("Filtres à {sr} Hz, signal à {input_sr} Hz");
    }
    if signal.n_channels() == 0 {
        bail!("Signal vide : {}", input.display());
    }

    // one output per filter, all fed by the same input
    let matrix: Vec<Vec<Vec<f64>>> = bank.into_channels().into_iter().map(|b| vec![b]).collect();
    let mut ola = OlaFilter::new(&matrix)?;
    let mut x = signal.channel(0).to_vec();
    x.resize(x.len() + ola.taps() - 1, 0.0);
    let y = ola.process(&[x])?;

    write_wav(out, &MultiChannel::new(y)?, input_sr)
}

/// `sfc array`
///
/// # Errors
/// Returns an error if the output file cannot be written.
pub fn run_array(out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(&bk_planar_array_mic_positions())?;
    match out {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Impossible d'écrire {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MeasurementConfig {
        let mut config = MeasurementConfig::default();
        config.audio.sample_rate = 8000;
        config.sweep.duration = 0.25;
        config.sweep.post_silence = 0.05;
        config
    }

    #[test]
    fn sweep_file_has_one_slot_per_channel() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("sweep.wav");
        run_sweep(&config(), &out, 2, Some(2), true).unwrap();
        let (signal, sr) = decode_file(&out).unwrap();
        assert_eq!(sr, 8000);
        assert_eq!(signal.n_channels(), 3);
        assert_eq!(signal.n_frames(), 2 * 2 * (2000 + 400));
    }

    #[test]
    fn bk_recording_to_impulse_responses() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let sweep = sweep_from(&config.sweep, 8000).unwrap();
        let n = sweep.len();

        // two systems back to back; mic hears system s after 200 + 3s samples
        let mut reference = Vec::new();
        let mut mic = Vec::new();
        for sys in 0..2 {
            let delay = 200 + 3 * sys;
            reference.extend_from_slice(&sweep);
            mic.extend((0..n).map(|k| if k >= delay { 0.5 * sweep[k - delay] } else { 0.0 }));
        }
        let file = dir.path().join("bk.wav");
        write_wav(&file, &MultiChannel::new(vec![reference, mic]).unwrap(), 8000).unwrap();

        let out = dir.path().join("irs.wav");
        run_bk(&config, &file, 2, 1, &out, true).unwrap();
        let (irs, _) = decode_file(&out).unwrap();
        assert_eq!(irs.n_channels(), 2);
        for (sys, delay) in [(0, 200), (1, 203)] {
            let h = irs.channel(sys);
            let peak = sfc_dsp::windows::argmax_abs(h).unwrap();
            assert_eq!(peak, delay);
            assert!((h[peak] - 0.5).abs() < 0.05);
        }
    }

    #[test]
    fn design_then_filter_reproduces_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.processing.filter_taps = 64;

        // 1 mic, 1 source: plant = 0.5 delay(2), target = delay(6)
        let mut h = vec![0.0; 64];
        h[2] = 0.5;
        let mut t = vec![0.0; 64];
        t[6] = 1.0;
        let plant = dir.path().join("plant.wav");
        let target = dir.path().join("target.wav");
        write_wav(&plant, &MultiChannel::mono(h), 8000).unwrap();
        write_wav(&target, &MultiChannel::mono(t), 8000).unwrap();

        let filters = dir.path().join("filters.wav");
        let report = dir.path().join("report.json");
        let reg = Some(1e-9);
        run_design(&config, &plant, 1, &target, &filters, reg, None, Some(&report)).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(json["taps"], 64);
        assert!(json["mean_error_db"].as_f64().unwrap() < -60.0);

        let input = dir.path().join("impulse.wav");
        let mut impulse = vec![0.0; 16];
        impulse[0] = 1.0;
        write_wav(&input, &MultiChannel::mono(impulse), 8000).unwrap();
        let out = dir.path().join("out.wav");
        run_filter(&filters, &input, &out).unwrap();

        let (y, _) = decode_file(&out).unwrap();
        assert_eq!(y.n_channels(), 1);
        assert_eq!(y.n_frames(), 16 + 63);
        // filter = 2 delay(4)
        assert!((y.channel(0)[4] - 2.0).abs() < 1e-3);
        assert!(y.channel(0)[5].abs() < 1e-3);
    }

    #[test]
    fn bk_without_reference_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bk.wav");
        write_wav(&file, &MultiChannel::mono(vec![0.5; 8]), 8000).unwrap();
        let out = dir.path().join("irs.wav");
        assert!(run_bk(&config(), &file, 1, 1, &out, false).is_err());
    }

    #[test]
    fn array_positions_are_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("array.json");
        run_array(Some(&out)).unwrap();
        let positions: Vec<[f64; 2]> =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(positions.len(), 60);
        assert!((positions[6][0] - 0.075).abs() < 1e-12);
        assert_eq!(positions[6][1], 0.375);
    }

    #[test]
    fn design_rejects_responses_past_the_filter_length() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.processing.filter_taps = 1024;

        // peaks beyond the filter length, as after a long device latency
        let mut h = vec![0.0; 4096];
        h[1500] = 0.5;
        let mut t = vec![0.0; 4096];
        t[1600] = 1.0;
        let plant = dir.path().join("plant.wav");
        let target = dir.path().join("target.wav");
        write_wav(&plant, &MultiChannel::mono(h), 8000).unwrap();
        write_wav(&target, &MultiChannel::mono(t), 8000).unwrap();

        let filters = dir.path().join("filters.wav");
        let reg = Some(1e-3);
        assert!(run_design(&config, &plant, 1, &target, &filters, reg, None, None).is_err());
        assert!(!filters.exists());

        // long enough filters take the whole response
        assert!(run_design(&config, &plant, 1, &target, &filters, reg, Some(4096), None).is_ok());
        assert!(filters.exists());
    }

    #[test]
    fn design_rejects_silent_responses() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.processing.filter_taps = 64;
        let plant = dir.path().join("plant.wav");
        let target = dir.path().join("target.wav");
        write_wav(&plant, &MultiChannel::mono(vec![0.0; 64]), 8000).unwrap();
        write_wav(&target, &MultiChannel::mono(vec![0.0; 64]), 8000).unwrap();
        let filters = dir.path().join("filters.wav");
        assert!(run_design(&config, &plant, 1, &target, &filters, None, None, None).is_err());
    }
}
