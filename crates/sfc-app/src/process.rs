//! Turning recordings into impulse responses and filter banks into files.

use anyhow::{Result, bail};
use rayon::prelude::*;
use sfc_core::config::ProcessingSettings;
use sfc_core::signal::{MultiChannel, Recording};
use sfc_dsp::transfer::{
    Regularization, fill_up_below_dynamic_range, impulse_response, noise_to_signal_ratio,
};
use sfc_dsp::windows::{Window, apply, time_window_around_peak};

/// Deconvolution regularization for reference `x`.
#[must_use]
pub fn regularization_for(x: &[f64], settings: &ProcessingSettings) -> Regularization {
    match settings.dynamic_range_db {
        Some(dr) => Regularization::PerBin(fill_up_below_dynamic_range(dr, x)),
        None => Regularization::Constant(settings.regularization),
    }
}

/// Impulse responses `[mic][system]` of a measurement.
///
/// Every repetition is deconvolved with its own reference trace, windowed
/// around its peak, then the repetitions are averaged. `reference` has one
/// input and the same systems, repetitions and length as `mics`.
///
/// # Errors
/// Returns an error if the two recordings disagree in shape or deconvolution
/// fails.
pub fn deconvolve_recording(
    reference: &Recording,
    mics: &Recording,
    sample_rate: f64,
    settings: &ProcessingSettings,
) -> Result<Vec<Vec<Vec<f64>>>> {
    if reference.n_inputs() != 1
        || reference.n_systems() != mics.n_systems()
        || reference.n_reps() != mics.n_reps()
        || reference.n_samples() != mics.n_samples()
    {
        bail!(
            "Référence ({} × {} × {} × {}) incompatible avec les micros ({} × {} × {} × {})",
            reference.n_samples(),
            reference.n_inputs(),
            reference.n_systems(),
            reference.n_reps(),
            mics.n_samples(),
            mics.n_inputs(),
            mics.n_systems(),
            mics.n_reps()
        );
    }
    let n_systems = mics.n_systems();
    let n_reps = mics.n_reps();
    let window = Window::Tukey(settings.tukey_alpha);

    // Flattened over (mic, system) so rayon spreads the work evenly.
    let pairs: Vec<(usize, usize)> = (0..mics.n_inputs())
        .flat_map(|m| (0..n_systems).map(move |s| (m, s)))
        .collect();
    let irs: Vec<Vec<f64>> = pairs
        .par_iter()
        .map(|&(mic, sys)| -> Result<Vec<f64>> {
            let mut mean = vec![0.0; mics.n_samples()];
            for rep in 0..n_reps {
                let x = reference.trace(0, sys, rep);
                let reg = regularization_for(x, settings);
                let mut h = impulse_response(x, mics.trace(mic, sys, rep), &reg)?;
                let mask = time_window_around_peak(
                    &h,
                    sample_rate,
                    settings.window_left,
                    settings.window_right,
                    window,
                );
                apply(&mut h, &mask);
                for (m, v) in mean.iter_mut().zip(&h) {
                    *m += v / n_reps as f64;
                }
            }
            Ok(mean)
        })
        .collect::<Result<_>>()?;

    if n_reps > 1 {
        log_noise_to_signal(reference, mics);
    }

    let mut grouped = vec![Vec::with_capacity(n_systems); mics.n_inputs()];
    for ((mic, _), ir) in pairs.into_iter().zip(irs) {
        grouped[mic].push(ir);
    }
    Ok(grouped)
}

fn log_noise_to_signal(reference: &Recording, mics: &Recording) {
    for sys in 0..mics.n_systems() {
        let x = reference.repetitions(0, sys);
        let y: Vec<Vec<Vec<f64>>> = (0..mics.n_inputs())
            .map(|mic| mics.repetitions(mic, sys))
            .collect();
        match noise_to_signal_ratio(&x, &y) {
            Ok(nsr) => {
                let mean = nsr.iter().filter(|v| v.is_finite()).sum::<f64>() / nsr.len() as f64;
                log::info!("Système {sys} : NSR moyen {:.1} dB", 10.0 * mean.log10());
            }
            Err(e) => log::warn!("Système {sys} : NSR indisponible ({e})"),
        }
    }
}

/// Reference recording that repeats `excitation` for every system and
/// repetition of `like`.
#[must_use]
pub fn repeated_reference(excitation: &[f64], like: &Recording) -> Recording {
    let mut reference = Recording::zeros(excitation.len(), 1, like.n_systems(), like.n_reps());
    for sys in 0..like.n_systems() {
        for rep in 0..like.n_reps() {
            reference.trace_mut(0, sys, rep).copy_from_slice(excitation);
        }
    }
    reference
}

/// Responses `[mic][system]` as channels `mic * n_systems + system`.
///
/// # Errors
/// Returns an error if the responses are ragged.
pub fn flatten_responses(irs: Vec<Vec<Vec<f64>>>) -> Result<MultiChannel> {
    Ok(MultiChannel::new(irs.into_iter().flatten().collect())?)
}

/// Inverse of [`flatten_responses`] for `n_systems` systems.
///
/// # Errors
/// Returns an error unless the channel count is a non-zero multiple of
/// `n_systems`.
pub fn unflatten_responses(signal: MultiChannel, n_systems: usize) -> Result<Vec<Vec<Vec<f64>>>> {
    let n_channels = signal.n_channels();
    if n_systems == 0 || n_channels == 0 || n_channels % n_systems != 0 {
        bail!("{n_channels} canaux ne se répartissent pas en {n_systems} sources");
    }
    let mut channels = signal.into_channels().into_iter();
    Ok((0..n_channels / n_systems)
        .map(|_| channels.by_ref().take(n_systems).collect())
        .collect())
}

/// Share of the energy of `ir` past its first `taps` samples; 0 for silence.
#[must_use]
pub fn energy_beyond(ir: &[f64], taps: usize) -> f64 {
    let total: f64 = ir.iter().map(|v| v * v).sum();
    if total == 0.0 {
        return 0.0;
    }
    ir.iter().skip(taps).map(|v| v * v).sum::<f64>() / total
}

/// Check that truncating `irs` to `taps` samples keeps them usable.
///
/// Logs a warning for any response losing more than 1 % of its energy.
///
/// # Errors
/// Returns an error if a response loses more than half of its energy.
pub fn check_truncation<'a>(irs: impl IntoIterator<Item = &'a [f64]>, taps: usize) -> Result<()> {
    for (index, ir) in irs.into_iter().enumerate() {
        let lost = energy_beyond(ir, taps);
        if lost > 0.5 {
            bail!(
                "Réponse {index} : {:.0} % de l'énergie au-delà de {taps} coefficients. \
                 Augmentez --taps (longueur {}).",
                100.0 * lost,
                ir.len()
            );
        }
        if lost > 0.01 {
            log::warn!(
                "Réponse {index} : {:.1} % de l'énergie tronquée à {taps} coefficients",
                100.0 * lost
            );
        }
    }
    Ok(())
}
