use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Complete configuration of a measurement session.
///
/// Serializable as TOML. Every field has a sane default.
///
/// # Example
/// ```
/// use sfc_core::config::MeasurementConfig;
/// let config = MeasurementConfig::default();
/// assert_eq!(config.audio.sample_rate, 48000);
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct MeasurementConfig {
    /// Audio interface settings.
    pub audio: AudioSettings,
    /// Excitation sweep settings.
    pub sweep: SweepSettings,
    /// Microphone calibration settings.
    pub calibration: CalibrationSettings,
    /// Post-processing of measured responses.
    pub processing: ProcessingSettings,
}

/// Audio interface settings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AudioSettings {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Input device name. `None` = host default.
    pub input_device: Option<String>,
    /// Output device name. `None` = host default.
    pub output_device: Option<String>,
    /// 1-based input channels (microphones).
    pub input_channels: Vec<usize>,
    /// 1-based output channels (loudspeakers).
    pub output_channels: Vec<usize>,
}

/// Exponential sweep settings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SweepSettings {
    /// Sweep length in seconds.
    pub duration: f64,
    /// Fade in/out time in seconds.
    pub fade: f64,
    /// Start frequency in Hz. `None` = one bin above DC.
    pub f_start: Option<f64>,
    /// End frequency in Hz. `None` = Nyquist.
    pub f_end: Option<f64>,
    /// Silence before the sweep in seconds.
    pub pre_silence: f64,
    /// Silence after the sweep in seconds (room decay).
    pub post_silence: f64,
    /// Repetitions per output.
    pub repetitions: usize,
}

/// Microphone calibration settings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CalibrationSettings {
    /// Calibrator level in dB SPL.
    pub target_level: f64,
    /// Recording length in seconds.
    pub duration: f64,
    /// 1-based input channel of the calibrated microphone.
    pub channel: usize,
}

/// Impulse response post-processing settings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ProcessingSettings {
    /// If set, regularize deconvolution by filling up the reference spectrum
    /// below `max - dynamic_range_db`.
    pub dynamic_range_db: Option<f64>,
    /// Constant deconvolution / pressure matching regularization.
    pub regularization: f64,
    /// Window start before the impulse response peak, seconds.
    pub window_left: f64,
    /// Window end after the impulse response peak, seconds.
    pub window_right: f64,
    /// Tukey taper ratio of the peak window.
    pub tukey_alpha: f64,
    /// Length of the designed control filters.
    pub filter_taps: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            input_device: None,
            output_device: None,
            input_channels: vec![1],
            output_channels: vec![1],
        }
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            duration: 1.0,
            fade: 0.01,
            f_start: None,
            f_end: None,
            pre_silence: 0.0,
            post_silence: 0.5,
            repetitions: 1,
        }
    }
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            target_level: 94.0,
            duration: 5.0,
            channel: 1,
        }
    }
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            dynamic_range_db: None,
            regularization: 1e-3,
            window_left: 0.02,
            window_right: 0.2,
            tukey_alpha: 0.1,
            filter_taps: 1024,
        }
    }
}

impl MeasurementConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after TOML deserialization to prevent out-of-range values.
    pub fn clamp_all(&mut self) {
        self.audio.sample_rate = self.audio.sample_rate.clamp(8000, 384_000);
        self.audio.input_channels.retain(|&c| c > 0);
        self.audio.output_channels.retain(|&c| c > 0);

        self.sweep.duration = self.sweep.duration.clamp(0.01, 120.0);
        self.sweep.fade = self.sweep.fade.clamp(0.0, self.sweep.duration / 2.0);
        self.sweep.pre_silence = self.sweep.pre_silence.max(0.0);
        self.sweep.post_silence = self.sweep.post_silence.max(0.0);
        self.sweep.repetitions = self.sweep.repetitions.max(1);

        self.calibration.target_level = self.calibration.target_level.clamp(0.0, 160.0);
        self.calibration.duration = self.calibration.duration.clamp(0.1, 60.0);
        self.calibration.channel = self.calibration.channel.max(1);

        if let Some(dr) = self.processing.dynamic_range_db.as_mut() {
            *dr = dr.clamp(0.0, 200.0);
        }
        self.processing.regularization = self.processing.regularization.max(0.0);
        self.processing.window_left = self.processing.window_left.clamp(0.0, 60.0);
        self.processing.window_right = self.processing.window_right.clamp(0.0, 60.0);
        self.processing.tukey_alpha = self.processing.tukey_alpha.clamp(0.0, 1.0);
        self.processing.filter_taps = self.processing.filter_taps.clamp(2, 1 << 20);
    }
}

impl MeasurementConfig {
    /// Check constraints that clamping cannot restore.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] if no input or output channel is left or
    /// the sweep frequency range is empty.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.audio.input_channels.is_empty() || self.audio.output_channels.is_empty() {
            return Err(CoreError::Config(
                "au moins un canal d'entrée et un canal de sortie".into(),
            ));
        }
        if let (Some(lo), Some(hi)) = (self.sweep.f_start, self.sweep.f_end)
            && lo >= hi
        {
            return Err(CoreError::Config(format!(
                "f_start ({lo} Hz) doit être inférieure à f_end ({hi} Hz)"
            )));
        }
        Ok(())
    }
}

/// Intermediate TOML structure, every section optional for partial override.
#[derive(Deserialize)]
struct ConfigFile {
    audio: Option<AudioSection>,
    sweep: Option<SweepSection>,
    calibration: Option<CalibrationSection>,
    processing: Option<ProcessingSection>,
}

#[derive(Deserialize)]
struct AudioSection {
    sample_rate: Option<u32>,
    input_device: Option<String>,
    output_device: Option<String>,
    input_channels: Option<Vec<usize>>,
    output_channels: Option<Vec<usize>>,
}

#[derive(Deserialize)]
struct SweepSection {
    duration: Option<f64>,
    fade: Option<f64>,
    f_start: Option<f64>,
    f_end: Option<f64>,
    pre_silence: Option<f64>,
    post_silence: Option<f64>,
    repetitions: Option<usize>,
}

#[derive(Deserialize)]
struct CalibrationSection {
    target_level: Option<f64>,
    duration: Option<f64>,
    channel: Option<usize>,
}

#[derive(Deserialize)]
struct ProcessingSection {
    dynamic_range_db: Option<f64>,
    regularization: Option<f64>,
    window_left: Option<f64>,
    window_right: Option<f64>,
    tukey_alpha: Option<f64>,
    filter_taps: Option<usize>,
}

macro_rules! override_fields {
    ($target:expr, $section:expr, [$($field:ident),* $(,)?]) => {
        $(
            if let Some(v) = $section.$field {
                $target.$field = v;
            }
        )*
    };
}

/// Parse TOML text and merge it over the defaults.
///
/// # Errors
/// Returns an error if the text is not valid TOML for this schema.
///
/// # Example
/// ```
/// use sfc_core::config::parse_config;
/// let config = parse_config("[sweep]\nduration = 2.5\n").unwrap();
/// assert!((config.sweep.duration - 2.5).abs() < 1e-12);
/// assert_eq!(config.audio.sample_rate, 48000);
/// ```
pub fn parse_config(content: &str) -> Result<MeasurementConfig> {
    let file: ConfigFile = toml::from_str(content).context("Erreur de parsing TOML")?;
    let mut config = MeasurementConfig::default();

    if let Some(a) = file.audio {
        override_fields!(config.audio, a, [sample_rate, input_channels, output_channels]);
        if a.input_device.is_some() {
            config.audio.input_device = a.input_device;
        }
        if a.output_device.is_some() {
            config.audio.output_device = a.output_device;
        }
    }
    if let Some(s) = file.sweep {
        override_fields!(
            config.sweep,
            s,
            [duration, fade, pre_silence, post_silence, repetitions]
        );
        if s.f_start.is_some() {
            config.sweep.f_start = s.f_start;
        }
        if s.f_end.is_some() {
            config.sweep.f_end = s.f_end;
        }
    }
    if let Some(c) = file.calibration {
        override_fields!(config.calibration, c, [target_level, duration, channel]);
    }
    if let Some(p) = file.processing {
        override_fields!(
            config.processing,
            p,
            [regularization, window_left, window_right, tukey_alpha, filter_taps]
        );
        if p.dynamic_range_db.is_some() {
            config.processing.dynamic_range_db = p.dynamic_range_db;
        }
    }

    config.clamp_all();
    config.validate()?;
    Ok(config)
}

/// Load a TOML file and merge it over the defaults.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
/// ```no_run
/// use sfc_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<MeasurementConfig> {
    if !path.exists() {
        return Err(CoreError::FileNotFound {
            path: path.display().to_string(),
        }
        .into());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    let config = parse_config(&content)
        .with_context(|| format!("Configuration invalide dans {}", path.display()))?;
    log::debug!("Configuration chargée depuis {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, MeasurementConfig::default());
    }

    #[test]
    fn partial_sections_override_only_present_fields() {
        let text = r#"
[audio]
sample_rate = 44100
output_channels = [1, 2, 3]

[processing]
dynamic_range_db = 60.0
"#;
        let config = parse_config(text).unwrap();
        assert_eq!(config.audio.sample_rate, 44100);
        assert_eq!(config.audio.output_channels, vec![1, 2, 3]);
        assert_eq!(config.audio.input_channels, vec![1]);
        assert_eq!(config.processing.dynamic_range_db, Some(60.0));
        assert!((config.processing.window_right - 0.2).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let text = r#"
[sweep]
duration = 1.0
fade = 3.0
repetitions = 0

[processing]
tukey_alpha = 4.0
window_left = -1.0
window_right = 1e300
"#;
        let config = parse_config(text).unwrap();
        assert!((config.sweep.fade - 0.5).abs() < 1e-12);
        assert_eq!(config.sweep.repetitions, 1);
        assert!((config.processing.tukey_alpha - 1.0).abs() < 1e-12);
        assert_eq!(config.processing.window_left, 0.0);
        assert!((config.processing.window_right - 60.0).abs() < 1e-12);
    }

    #[test]
    fn zero_channels_are_dropped() {
        let config = parse_config("[audio]\ninput_channels = [0, 2]\n").unwrap();
        assert_eq!(config.audio.input_channels, vec![2]);
    }

    #[test]
    fn empty_frequency_range_is_rejected() {
        let err = parse_config("[sweep]\nf_start = 500.0\nf_end = 100.0\n");
        assert!(err.is_err());
        assert!(parse_config("[audio]\noutput_channels = [0]\n").is_err());
    }

    #[test]
    fn load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sfc.toml");
        std::fs::write(&path, "[calibration]\ntarget_level = 114.0\n").unwrap();
        let config = load_config(&path).unwrap();
        assert!((config.calibration.target_level - 114.0).abs() < 1e-12);
        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }
}
