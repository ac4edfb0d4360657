use std::f64::consts::PI;

use sfc_core::signal::MultiChannel;

use crate::error::DspError;
use crate::windows::{Symmetry, Window};

/// Exponential sine sweep generator (Farina, AES 108th conv., 2000).
///
/// The sweep is built in the time domain and optionally faded with the
/// halves of a Hann window and padded with silence.
///
/// # Example
/// ```
/// use sfc_dsp::sweep::ExponentialSweep;
/// let sweep = ExponentialSweep::new(0.5, 48000.0)
///     .fade(0.01)
///     .post_silence(0.1)
///     .generate()
///     .unwrap();
/// assert_eq!(sweep.len(), 24000 + 4800);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ExponentialSweep {
    duration: f64,
    sample_rate: f64,
    fade: f64,
    f_start: Option<f64>,
    f_end: Option<f64>,
    pre_silence: f64,
    post_silence: f64,
}

impl ExponentialSweep {
    /// Sweep of `duration` seconds at `sample_rate` Hz, no fade, no silence,
    /// from one bin above DC to Nyquist.
    #[must_use]
    pub fn new(duration: f64, sample_rate: f64) -> Self {
        Self {
            duration,
            sample_rate,
            fade: 0.0,
            f_start: None,
            f_end: None,
            pre_silence: 0.0,
            post_silence: 0.0,
        }
    }

    /// Fade in and out time in seconds.
    #[must_use]
    pub fn fade(mut self, seconds: f64) -> Self {
        self.fade = seconds;
        self
    }

    /// Start and end frequency in Hz. `None` keeps the default.
    #[must_use]
    pub fn frequencies(mut self, f_start: Option<f64>, f_end: Option<f64>) -> Self {
        self.f_start = f_start;
        self.f_end = f_end;
        self
    }

    /// Zeros prepended, in seconds.
    #[must_use]
    pub fn pre_silence(mut self, seconds: f64) -> Self {
        self.pre_silence = seconds;
        self
    }

    /// Zeros appended, in seconds.
    #[must_use]
    pub fn post_silence(mut self, seconds: f64) -> Self {
        self.post_silence = seconds;
        self
    }

    /// Number of samples of the sweep itself, without silence.
    #[must_use]
    pub fn n_taps(&self) -> usize {
        (self.duration * self.sample_rate).round().max(0.0) as usize
    }

    /// Render the sweep.
    ///
    /// # Errors
    /// Returns [`DspError::InvalidFrequencyRange`] unless
    /// `0 < f_start < f_end <= sample_rate / 2`, [`DspError::EmptyInput`] if
    /// the sweep has no samples and [`DspError::FadeTooLong`] if the fades
    /// would overlap.
    pub fn generate(&self) -> Result<Vec<f64>, DspError> {
        let n_tap = self.n_taps();
        if n_tap == 0 {
            return Err(DspError::EmptyInput("sweep"));
        }

        let nyquist = self.sample_rate / 2.0;
        let f_start = self.f_start.unwrap_or(self.sample_rate / n_tap as f64);
        let f_end = self.f_end.unwrap_or(nyquist);
        if !(0.0 < f_start && f_start < f_end && f_end <= nyquist) {
            return Err(DspError::InvalidFrequencyRange {
                f_start,
                f_end,
                nyquist,
            });
        }

        let omega_start = 2.0 * PI * f_start;
        let omega_end = 2.0 * PI * f_end;
        let log_ratio = (omega_end / omega_start).ln();
        let t_total = self.duration;
        let rate = omega_start * t_total / log_ratio;

        let mut sweep: Vec<f64> = (0..n_tap)
            .map(|k| {
                let t = k as f64 * t_total / n_tap as f64;
                (rate * ((t / t_total * log_ratio).exp() - 1.0)).sin()
            })
            .collect();

        if self.fade > 0.0 {
            let n_fade = (self.fade * self.sample_rate).round() as usize;
            if 2 * n_fade > n_tap {
                return Err(DspError::FadeTooLong {
                    fade: n_fade,
                    len: n_tap,
                });
            }
            if n_fade > 0 {
                let hann = Window::Hann.generate(2 * n_fade, Symmetry::Symmetric);
                for (s, w) in sweep[..n_fade].iter_mut().zip(&hann[..n_fade]) {
                    *s *= w;
                }
                for (s, w) in sweep[n_tap - n_fade..].iter_mut().zip(&hann[n_fade..]) {
                    *s *= w;
                }
            }
        }

        let n_pre = (self.pre_silence.max(0.0) * self.sample_rate).round() as usize;
        let n_post = (self.post_silence.max(0.0) * self.sample_rate).round() as usize;
        let mut out = Vec::with_capacity(n_pre + n_tap + n_post);
        out.resize(n_pre, 0.0);
        out.extend_from_slice(&sweep);
        out.resize(n_pre + n_tap + n_post, 0.0);

        log::debug!(
            "Sweep {f_start:.1} Hz → {f_end:.1} Hz, {n_tap} échantillons (+{n_pre}/{n_post} de silence)"
        );
        Ok(out)
    }
}

/// Serial multichannel excitation from a single channel excitation.
///
/// Channel `c` plays `x` repeated `n_reps` times during time slot `c`, all
/// other channels are silent meanwhile. With `add_reference`, an extra last
/// channel holds the sum of all channels, for use as reference signal.
///
/// # Example
/// ```
/// use sfc_dsp::sweep::multichannel_signal;
/// let sig = multichannel_signal(&[1.0, 2.0], 2, 1, true);
/// assert_eq!(sig.n_channels(), 3);
/// assert_eq!(sig.channel(0), &[1.0, 2.0, 0.0, 0.0]);
/// assert_eq!(sig.channel(1), &[0.0, 0.0, 1.0, 2.0]);
/// assert_eq!(sig.channel(2), &[1.0, 2.0, 1.0, 2.0]);
/// ```
#[must_use]
pub fn multichannel_signal(
    x: &[f64],
    n_ch: usize,
    n_reps: usize,
    add_reference: bool,
) -> MultiChannel {
    let slot = x.len() * n_reps;
    let total = slot * n_ch;
    let mut channels = vec![vec![0.0; total]; n_ch];

    for (ch, samples) in channels.iter_mut().enumerate() {
        for rep in 0..n_reps {
            let begin = ch * slot + rep * x.len();
            samples[begin..begin + x.len()].copy_from_slice(x);
        }
    }

    if add_reference {
        let mut reference = vec![0.0; total];
        for samples in &channels {
            for (r, &s) in reference.iter_mut().zip(samples) {
                *r += s;
            }
        }
        channels.push(reference);
    }

    MultiChannel::new(channels).unwrap_or_default()
}
