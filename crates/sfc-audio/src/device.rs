use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::RingBuffer;
use sfc_core::config::AudioSettings;
use sfc_core::signal::MultiChannel;
use sfc_core::traits::AudioInterface;

use crate::error::AudioError;
use crate::status::StreamStatus;

/// How to open the audio interface.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceOptions {
    /// Sample rate in Hz, used for both directions.
    pub sample_rate: u32,
    /// Input device name. `None` = host default.
    pub input_device: Option<String>,
    /// Output device name. `None` = host default.
    pub output_device: Option<String>,
    /// Grace period on top of the signal length before giving up.
    pub timeout_margin: Duration,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            input_device: None,
            output_device: None,
            timeout_margin: Duration::from_secs(2),
        }
    }
}

impl From<&AudioSettings> for DeviceOptions {
    fn from(settings: &AudioSettings) -> Self {
        Self {
            sample_rate: settings.sample_rate,
            input_device: settings.input_device.clone(),
            output_device: settings.output_device.clone(),
            ..Self::default()
        }
    }
}

/// Audio interface backed by cpal.
///
/// Playback and capture run on two streams started back to back; the capture
/// therefore contains the round-trip latency of the interface, which shows up
/// as a delay in the measured impulse responses.
///
/// # Example
/// ```no_run
/// use sfc_audio::device::{CpalInterface, DeviceOptions};
/// use sfc_core::traits::AudioInterface;
/// use sfc_core::signal::MultiChannel;
///
/// let mut interface = CpalInterface::open(DeviceOptions::default()).unwrap();
/// let sweep = MultiChannel::mono(vec![0.0; 48000]);
/// let recorded = interface.playrec(&sweep, &[1], &[1, 2]).unwrap();
/// assert_eq!(recorded.n_channels(), 2);
/// ```
pub struct CpalInterface {
    input: cpal::Device,
    output: cpal::Device,
    options: DeviceOptions,
    status: Arc<StreamStatus>,
}

impl CpalInterface {
    /// Open the configured input and output devices.
    ///
    /// # Errors
    /// Returns an error if a device is missing.
    pub fn open(options: DeviceOptions) -> Result<Self> {
        let host = cpal::default_host();
        let input = match options.input_device.as_deref() {
            Some(name) => find_device(host.input_devices()?, name)?,
            None => host.default_input_device().ok_or(AudioError::NoInputDevice)?,
        };
        let output = match options.output_device.as_deref() {
            Some(name) => find_device(host.output_devices()?, name)?,
            None => host
                .default_output_device()
                .ok_or(AudioError::NoOutputDevice)?,
        };
        log::info!(
            "Interface audio : entrée « {} », sortie « {} » @ {}Hz",
            input.name().unwrap_or_default(),
            output.name().unwrap_or_default(),
            options.sample_rate
        );
        Ok(Self {
            input,
            output,
            options,
            status: Arc::new(StreamStatus::default()),
        })
    }

    /// Record `n_frames` frames at 1-based `inputs` without playing anything.
    ///
    /// # Errors
    /// Returns an error on invalid channels, stream failure or timeout.
    pub fn record(&mut self, n_frames: usize, inputs: &[usize]) -> Result<MultiChannel> {
        self.transfer(None, n_frames, inputs)
    }

    /// Stream health of the last transfer.
    #[must_use]
    pub fn status(&self) -> &StreamStatus {
        &self.status
    }

    fn transfer(
        &self,
        playback: Option<(&MultiChannel, &[usize])>,
        n_frames: usize,
        inputs: &[usize],
    ) -> Result<MultiChannel> {
        let sample_rate = cpal::SampleRate(self.options.sample_rate);
        let (err_tx, err_rx) = flume::unbounded::<String>();

        let in_config = stream_config(&self.input, true, sample_rate)?;
        let in_map = channel_indices(inputs, usize::from(in_config.channels))?;
        let n_in = in_map.len();
        let in_width = usize::from(in_config.channels);

        let capacity = n_in * n_frames.min(self.options.sample_rate as usize).max(1);
        let (mut producer, mut consumer) = RingBuffer::<f32>::new(capacity);
        let status = Arc::clone(&self.status);
        let tx = err_tx.clone();
        let mut remaining = n_frames;
        let input_stream = self
            .input
            .build_input_stream(
                &in_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for frame in data.chunks_exact(in_width) {
                        if remaining == 0 {
                            return;
                        }
                        if producer.slots() < in_map.len() {
                            status.raise_input_overflow();
                            continue;
                        }
                        for &ch in &in_map {
                            let _ = producer.push(frame[ch]);
                        }
                        remaining -= 1;
                    }
                },
                move |err| {
                    let _ = tx.send(err.to_string());
                },
                None,
            )
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        let played = Arc::new(AtomicUsize::new(0));
        let output_stream = match playback {
            Some((signal, outputs)) => {
                let out_config = stream_config(&self.output, false, sample_rate)?;
                let out_width = usize::from(out_config.channels);
                let out_map = channel_indices(outputs, out_width)?;
                if out_map.len() != signal.n_channels() {
                    return Err(AudioError::InvalidPlan(format!(
                        "{} canaux d'excitation pour {} sorties",
                        signal.n_channels(),
                        out_map.len()
                    ))
                    .into());
                }
                let buffer = interleave_to_device(signal, &out_map, out_width);
                let played = Arc::clone(&played);
                let tx = err_tx.clone();
                let mut pos = 0;
                let stream = self
                    .output
                    .build_output_stream(
                        &out_config,
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            let n = data.len().min(buffer.len() - pos);
                            data[..n].copy_from_slice(&buffer[pos..pos + n]);
                            data[n..].fill(0.0);
                            pos += n;
                            played.store(pos / out_width, Ordering::Relaxed);
                        },
                        move |err| {
                            let _ = tx.send(err.to_string());
                        },
                        None,
                    )
                    .map_err(|e| AudioError::StreamError(e.to_string()))?;
                Some(stream)
            }
            None => None,
        };

        input_stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;
        if let Some(stream) = &output_stream {
            stream
                .play()
                .map_err(|e| AudioError::StreamError(e.to_string()))?;
        }

        let expected = n_frames * n_in;
        let seconds = n_frames as f64 / f64::from(self.options.sample_rate);
        let deadline =
            Instant::now() + Duration::from_secs_f64(seconds) + self.options.timeout_margin;
        let mut samples = Vec::with_capacity(expected);
        while samples.len() < expected {
            while let Ok(s) = consumer.pop() {
                samples.push(s);
            }
            if let Ok(msg) = err_rx.recv_timeout(Duration::from_millis(5)) {
                self.status.count_stream_error();
                self.status.check_and_log();
                return Err(AudioError::StreamError(msg).into());
            }
            if samples.len() < expected && Instant::now() > deadline {
                return Err(AudioError::Timeout {
                    received: samples.len() / n_in.max(1),
                    expected: n_frames,
                }
                .into());
            }
        }

        if playback.is_some() && played.load(Ordering::Relaxed) < n_frames {
            self.status.raise_output_underflow();
        }
        drop(output_stream);
        drop(input_stream);
        self.status.check_and_log();

        Ok(MultiChannel::from_interleaved(&samples, n_in))
    }
}

impl AudioInterface for CpalInterface {
    fn playrec(
        &mut self,
        excitation: &MultiChannel,
        outputs: &[usize],
        inputs: &[usize],
    ) -> Result<MultiChannel> {
        self.transfer(Some((excitation, outputs)), excitation.n_frames(), inputs)
    }

    fn sample_rate(&self) -> u32 {
        self.options.sample_rate
    }
}

fn find_device(devices: impl Iterator<Item = cpal::Device>, name: &str) -> Result<cpal::Device> {
    for device in devices {
        if device.name().is_ok_and(|n| n == name) {
            return Ok(device);
        }
    }
    Err(AudioError::DeviceNotFound(name.to_owned()).into())
}

fn stream_config(
    device: &cpal::Device,
    input: bool,
    sample_rate: cpal::SampleRate,
) -> Result<cpal::StreamConfig> {
    let channels = if input {
        device
            .default_input_config()
            .context("Configuration d'entrée indisponible")?
            .channels()
    } else {
        device
            .default_output_config()
            .context("Configuration de sortie indisponible")?
            .channels()
    };
    Ok(cpal::StreamConfig {
        channels,
        sample_rate,
        buffer_size: cpal::BufferSize::Default,
    })
}

/// 0-based device channel indices for 1-based `channels`.
fn channel_indices(channels: &[usize], available: usize) -> Result<Vec<usize>, AudioError> {
    channels
        .iter()
        .map(|&channel| {
            if channel == 0 || channel > available {
                Err(AudioError::InvalidChannel { channel, available })
            } else {
                Ok(channel - 1)
            }
        })
        .collect()
}

/// Device frames of `width` samples with signal channel `i` at `map[i]`.
fn interleave_to_device(signal: &MultiChannel, map: &[usize], width: usize) -> Vec<f32> {
    let mut buffer = vec![0.0f32; signal.n_frames() * width];
    for (samples, &dev_ch) in signal.channels().iter().zip(map) {
        for (frame, &s) in buffer.chunks_exact_mut(width).zip(samples) {
            frame[dev_ch] = s as f32;
        }
    }
    buffer
}
