use crate::error::CoreError;

/// A block of equal-length channels, stored channel by channel.
///
/// # Example
/// ```
/// use sfc_core::signal::MultiChannel;
/// let sig = MultiChannel::zeros(128, 2);
/// assert_eq!(sig.n_frames(), 128);
/// assert_eq!(sig.n_channels(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultiChannel {
    channels: Vec<Vec<f64>>,
}

impl MultiChannel {
    /// Build from separate channels.
    ///
    /// # Errors
    /// Returns [`CoreError::RaggedChannels`] if the channels differ in length.
    pub fn new(channels: Vec<Vec<f64>>) -> Result<Self, CoreError> {
        if let Some(first) = channels.first() {
            let expected = first.len();
            for (channel, ch) in channels.iter().enumerate() {
                if ch.len() != expected {
                    return Err(CoreError::RaggedChannels {
                        channel,
                        expected,
                        found: ch.len(),
                    });
                }
            }
        }
        Ok(Self { channels })
    }

    /// Silent signal with `n_frames` frames and `n_channels` channels.
    #[must_use]
    pub fn zeros(n_frames: usize, n_channels: usize) -> Self {
        Self {
            channels: vec![vec![0.0; n_frames]; n_channels],
        }
    }

    /// Single channel signal.
    #[must_use]
    pub fn mono(samples: Vec<f64>) -> Self {
        Self {
            channels: vec![samples],
        }
    }

    /// De-interleave frames of `n_channels` samples.
    ///
    /// A trailing incomplete frame is dropped.
    ///
    /// # Example
    /// ```
    /// use sfc_core::signal::MultiChannel;
    /// let sig = MultiChannel::from_interleaved(&[1.0, 2.0, 3.0, 4.0], 2);
    /// assert_eq!(sig.channel(0), &[1.0, 3.0]);
    /// assert_eq!(sig.channel(1), &[2.0, 4.0]);
    /// ```
    #[must_use]
    pub fn from_interleaved(data: &[f32], n_channels: usize) -> Self {
        if n_channels == 0 {
            return Self::default();
        }
        let n_frames = data.len() / n_channels;
        let mut channels = vec![Vec::with_capacity(n_frames); n_channels];
        for frame in data.chunks_exact(n_channels) {
            for (ch, &s) in channels.iter_mut().zip(frame) {
                ch.push(f64::from(s));
            }
        }
        Self { channels }
    }

    /// Interleave into `f32` frames, as expected by audio devices and WAV writers.
    #[must_use]
    pub fn to_interleaved(&self) -> Vec<f32> {
        let n_ch = self.n_channels();
        let mut out = Vec::with_capacity(self.n_frames() * n_ch);
        for k in 0..self.n_frames() {
            for ch in &self.channels {
                out.push(ch[k] as f32);
            }
        }
        out
    }

    /// Number of frames (samples per channel).
    #[must_use]
    pub fn n_frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Number of channels.
    #[must_use]
    pub fn n_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples of channel `index`.
    ///
    /// # Panics
    /// Panics if `index >= n_channels()`.
    #[must_use]
    pub fn channel(&self, index: usize) -> &[f64] {
        &self.channels[index]
    }

    /// Mutable samples of channel `index`.
    ///
    /// # Panics
    /// Panics if `index >= n_channels()`.
    pub fn channel_mut(&mut self, index: usize) -> &mut [f64] {
        &mut self.channels[index]
    }

    /// All channels.
    #[must_use]
    pub fn channels(&self) -> &[Vec<f64>] {
        &self.channels
    }

    /// Consume into the underlying channels.
    #[must_use]
    pub fn into_channels(self) -> Vec<Vec<f64>> {
        self.channels
    }
}

/// Measurement block of shape `(n_samples, n_inputs, n_systems, n_reps)`.
///
/// A "system" is one excitation/output-set pair; each system is recorded
/// `n_reps` times at every input. Time traces are contiguous.
///
/// # Example
/// ```
/// use sfc_core::signal::Recording;
/// let mut rec = Recording::zeros(4, 2, 3, 2);
/// rec.trace_mut(1, 2, 1)[0] = 1.0;
/// assert_eq!(rec.trace(1, 2, 1)[0], 1.0);
/// assert_eq!(rec.trace(0, 0, 0)[0], 0.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Recording {
    n_samples: usize,
    n_inputs: usize,
    n_systems: usize,
    n_reps: usize,
    data: Vec<f64>,
}

impl Recording {
    /// Silent recording of the given shape.
    #[must_use]
    pub fn zeros(n_samples: usize, n_inputs: usize, n_systems: usize, n_reps: usize) -> Self {
        Self {
            n_samples,
            n_inputs,
            n_systems,
            n_reps,
            data: vec![0.0; n_samples * n_inputs * n_systems * n_reps],
        }
    }

    fn offset(&self, input: usize, system: usize, rep: usize) -> usize {
        assert!(
            input < self.n_inputs && system < self.n_systems && rep < self.n_reps,
            "trace index out of range"
        );
        ((input * self.n_systems + system) * self.n_reps + rep) * self.n_samples
    }

    /// Time trace recorded at `input` for `system`, repetition `rep`.
    ///
    /// # Panics
    /// Panics if an index is out of range.
    #[must_use]
    pub fn trace(&self, input: usize, system: usize, rep: usize) -> &[f64] {
        let start = self.offset(input, system, rep);
        &self.data[start..start + self.n_samples]
    }

    /// Mutable time trace.
    ///
    /// # Panics
    /// Panics if an index is out of range.
    pub fn trace_mut(&mut self, input: usize, system: usize, rep: usize) -> &mut [f64] {
        let start = self.offset(input, system, rep);
        let n = self.n_samples;
        &mut self.data[start..start + n]
    }

    /// Average of all repetitions of one trace.
    #[must_use]
    pub fn mean_over_reps(&self, input: usize, system: usize) -> Vec<f64> {
        let mut mean = vec![0.0; self.n_samples];
        if self.n_reps == 0 {
            return mean;
        }
        for rep in 0..self.n_reps {
            for (m, &s) in mean.iter_mut().zip(self.trace(input, system, rep)) {
                *m += s;
            }
        }
        let scale = 1.0 / self.n_reps as f64;
        mean.iter_mut().for_each(|m| *m *= scale);
        mean
    }

    /// Every repetition of one trace, in order.
    #[must_use]
    pub fn repetitions(&self, input: usize, system: usize) -> Vec<Vec<f64>> {
        (0..self.n_reps)
            .map(|rep| self.trace(input, system, rep).to_vec())
            .collect()
    }

    /// Every trace as one channel, ordered by input, then system, then
    /// repetition.
    #[must_use]
    pub fn to_multichannel(&self) -> MultiChannel {
        let mut channels = Vec::with_capacity(self.n_inputs * self.n_systems * self.n_reps);
        for input in 0..self.n_inputs {
            for system in 0..self.n_systems {
                channels.extend(self.repetitions(input, system));
            }
        }
        MultiChannel { channels }
    }

    /// Inverse of [`Recording::to_multichannel`].
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidDimensions`] unless `signal` has exactly
    /// `n_inputs * n_systems * n_reps` channels.
    pub fn from_multichannel(
        signal: &MultiChannel,
        n_inputs: usize,
        n_systems: usize,
        n_reps: usize,
    ) -> Result<Self, CoreError> {
        let expected = n_inputs * n_systems * n_reps;
        if signal.n_channels() != expected {
            return Err(CoreError::InvalidDimensions(format!(
                "{} canaux pour {n_inputs} × {n_systems} × {n_reps} traces",
                signal.n_channels()
            )));
        }
        let n_samples = signal.n_frames();
        let data = signal.channels().concat();
        Ok(Self {
            n_samples,
            n_inputs,
            n_systems,
            n_reps,
            data,
        })
    }

    /// Samples per trace.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Number of recorded inputs (microphones).
    #[must_use]
    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    /// Number of excitation systems.
    #[must_use]
    pub fn n_systems(&self) -> usize {
        self.n_systems
    }

    /// Number of repetitions.
    #[must_use]
    pub fn n_reps(&self) -> usize {
        self.n_reps
    }
}
