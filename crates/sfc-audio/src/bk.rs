//! Recordings exported by a Brüel & Kjær front end.
//!
//! The device records every system back to back into one multichannel file:
//! `n_systems` consecutive blocks, each made of `n_reps` consecutive
//! repetitions. With a reference, the first file channel holds the
//! excitation loop-back.

use std::path::Path;

use anyhow::{Context, Result};
use sfc_core::signal::{MultiChannel, Recording};

use crate::decode::decode_file;
use crate::error::AudioError;

/// A B&K recording split into systems and repetitions.
#[derive(Clone, Debug, PartialEq)]
pub struct BkRecording {
    /// Loop-back channel, one input wide.
    pub reference: Option<Recording>,
    /// Microphone channels.
    pub mics: Recording,
    /// Sample rate of the file.
    pub sample_rate: u32,
}

/// Load and split a B&K WAV recording.
///
/// # Errors
/// Returns an error if the file cannot be decoded or is too short to hold one
/// sample per system and repetition.
pub fn load_bk_wav_recording(
    path: impl AsRef<Path>,
    n_systems: usize,
    n_reps: usize,
    has_reference: bool,
) -> Result<BkRecording> {
    let path = path.as_ref();
    let (signal, sample_rate) =
        decode_file(path).with_context(|| format!("Lecture B&K : {}", path.display()))?;
    let (reference, mics) = split_recording(&signal, n_systems, n_reps, has_reference)?;
    log::info!(
        "B&K : {} systèmes × {} répétitions × {} échantillons, {} micros",
        mics.n_systems(),
        mics.n_reps(),
        mics.n_samples(),
        mics.n_inputs()
    );
    Ok(BkRecording {
        reference,
        mics,
        sample_rate,
    })
}

/// Split a back-to-back recording into `(reference, mics)`.
///
/// The recording is truncated to a multiple of `n_systems * n_reps` frames.
///
/// # Errors
/// Returns [`AudioError::InvalidPlan`] for zero systems or repetitions, a
/// recording shorter than `n_systems * n_reps` frames, or no microphone
/// channel left.
pub fn split_recording(
    signal: &MultiChannel,
    n_systems: usize,
    n_reps: usize,
    has_reference: bool,
) -> Result<(Option<Recording>, Recording), AudioError> {
    let blocks = n_systems * n_reps;
    if blocks == 0 {
        return Err(AudioError::InvalidPlan(
            "au moins un système et une répétition".into(),
        ));
    }
    let n_samples = signal.n_frames() / blocks;
    if n_samples == 0 {
        return Err(AudioError::InvalidPlan(format!(
            "{} échantillons pour {blocks} blocs",
            signal.n_frames()
        )));
    }
    let first_mic = usize::from(has_reference);
    if signal.n_channels() <= first_mic {
        return Err(AudioError::InvalidPlan("aucun canal micro".into()));
    }

    let split = |channels: &[Vec<f64>]| {
        let mut rec = Recording::zeros(n_samples, channels.len(), n_systems, n_reps);
        for (input, ch) in channels.iter().enumerate() {
            for sys in 0..n_systems {
                for rep in 0..n_reps {
                    let begin = (sys * n_reps + rep) * n_samples;
                    rec.trace_mut(input, sys, rep)
                        .copy_from_slice(&ch[begin..begin + n_samples]);
                }
            }
        }
        rec
    };

    let channels = signal.channels();
    let reference = has_reference.then(|| split(&channels[..1]));
    Ok((reference, split(&channels[first_mic..])))
}
