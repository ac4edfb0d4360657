use crate::signal::MultiChannel;

/// Simultaneous playback and recording through an audio interface.
///
/// Implemented by the cpal backend in `sfc-audio` and by loopback fakes in
/// tests. Channel numbers are 1-based, as printed on the interface.
///
/// # Example
/// ```
/// use sfc_core::traits::AudioInterface;
/// use sfc_core::signal::MultiChannel;
///
/// struct Silence;
/// impl AudioInterface for Silence {
///     fn playrec(&mut self, excitation: &MultiChannel, _out: &[usize], inputs: &[usize])
///         -> anyhow::Result<MultiChannel> {
///         Ok(MultiChannel::zeros(excitation.n_frames(), inputs.len()))
///     }
///     fn sample_rate(&self) -> u32 { 48000 }
/// }
/// ```
pub trait AudioInterface {
    /// Play `excitation` (one column per entry of `outputs`) and record the
    /// same number of frames at `inputs`.
    ///
    /// The returned signal has one channel per entry of `inputs`.
    ///
    /// # Errors
    /// Returns an error if the device cannot be opened or the stream fails.
    fn playrec(
        &mut self,
        excitation: &MultiChannel,
        outputs: &[usize],
        inputs: &[usize],
    ) -> anyhow::Result<MultiChannel>;

    /// Sample rate of the interface in Hz.
    fn sample_rate(&self) -> u32;
}
