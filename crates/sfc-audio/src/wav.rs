use std::path::Path;

use anyhow::{Context, Result};
use sfc_core::signal::MultiChannel;

/// Write `signal` as a 32-bit float WAV file.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
///
/// # Example
/// ```no_run
/// use sfc_audio::wav::write_wav;
/// use sfc_core::signal::MultiChannel;
/// write_wav("sweep.wav", &MultiChannel::mono(vec![0.0; 48000]), 48000).unwrap();
/// ```
pub fn write_wav(path: impl AsRef<Path>, signal: &MultiChannel, sample_rate: u32) -> Result<()> {
    let path = path.as_ref();
    let spec = hound::WavSpec {
        channels: u16::try_from(signal.n_channels())
            .context("Too many channels for a WAV file")?,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Cannot create WAV file: {}", path.display()))?;
    for sample in signal.to_interleaved() {
        writer.write_sample(sample)?;
    }
    writer
        .finalize()
        .with_context(|| format!("Cannot finalize WAV file: {}", path.display()))?;

    log::info!(
        "Wrote {} frames × {} channels to {}",
        signal.n_frames(),
        signal.n_channels(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_file;

    #[test]
    fn written_file_decodes_to_same_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let signal = MultiChannel::new(vec![
            vec![0.5, -0.25, 0.125, 0.0],
            vec![1.0, 0.75, -1.0, 0.5],
        ])
        .unwrap();
        write_wav(&path, &signal, 44100).unwrap();

        let (decoded, sr) = decode_file(&path).unwrap();
        assert_eq!(sr, 44100);
        assert_eq!(decoded, signal);
    }
}
