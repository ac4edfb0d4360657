use realfft::num_complex::Complex64;

use crate::error::DspError;
use crate::fft::RealFft;

/// Overlap-add FIR filter bank.
///
/// Filters `n_in` input channels through an `n_out × n_in` matrix of FIR
/// filters, `y[o] = Σ_i b[o][i] * x[i]`. The FFT size is the next power of two
/// above twice the filter length. The run-out of each block is kept and added
/// to the next one, so a signal filtered block by block equals the same
/// signal filtered in one go.
///
/// # Example
/// ```
/// use sfc_dsp::ola::OlaFilter;
/// // 1 input → 2 outputs: a unit impulse and a one-sample delay.
/// let mut bank = OlaFilter::new(&[vec![vec![1.0, 0.0]], vec![vec![0.0, 1.0]]]).unwrap();
/// let y = bank.process(&[vec![1.0, 2.0, 3.0]]).unwrap();
/// assert!((y[0][2] - 3.0).abs() < 1e-12);
/// assert!((y[1][2] - 2.0).abs() < 1e-12);
/// ```
pub struct OlaFilter {
    n_out: usize,
    n_in: usize,
    taps: usize,
    segment: usize,
    fft: RealFft,
    /// `[out][in][bin]`
    spectra: Vec<Vec<Vec<Complex64>>>,
    /// Run-out carried to the next block, `taps - 1` samples per output.
    tail: Vec<Vec<f64>>,
}

/// Bit length of `v`, as in `int.bit_length`.
fn bit_length(v: usize) -> u32 {
    usize::BITS - v.leading_zeros()
}

impl OlaFilter {
    /// Build a filter bank from `filters[out][in]`, all of equal length.
    ///
    /// # Errors
    /// Returns [`DspError::EmptyInput`] for an empty matrix or empty filters
    /// and [`DspError::ShapeMismatch`] for ragged rows or filter lengths.
    pub fn new(filters: &[Vec<Vec<f64>>]) -> Result<Self, DspError> {
        let n_out = filters.len();
        let n_in = filters.first().map_or(0, Vec::len);
        if n_out == 0 || n_in == 0 {
            return Err(DspError::EmptyInput("filter matrix"));
        }
        let taps = filters[0][0].len();
        if taps == 0 {
            return Err(DspError::EmptyInput("filter taps"));
        }
        for (o, row) in filters.iter().enumerate() {
            if row.len() != n_in {
                return Err(DspError::ShapeMismatch(format!(
                    "row {o} has {} inputs, expected {n_in}",
                    row.len()
                )));
            }
            if let Some(i) = row.iter().position(|b| b.len() != taps) {
                return Err(DspError::ShapeMismatch(format!(
                    "filter [{o}][{i}] has {} taps, expected {taps}",
                    row[i].len()
                )));
            }
        }

        let fft_size = 2usize << bit_length(taps - 1);
        let segment = fft_size - taps + 1;
        let mut fft = RealFft::new(fft_size);
        let spectra = filters
            .iter()
            .map(|row| row.iter().map(|b| fft.forward(b)).collect())
            .collect();

        log::debug!("OLA {n_out}×{n_in}, {taps} taps, FFT {fft_size}, segments of {segment}");

        Ok(Self {
            n_out,
            n_in,
            taps,
            segment,
            fft,
            spectra,
            tail: vec![vec![0.0; taps - 1]; n_out],
        })
    }

    /// Start from a previous run-out instead of silence (`taps - 1` samples
    /// per output).
    ///
    /// # Errors
    /// Returns [`DspError::ShapeMismatch`] if `state` has the wrong shape.
    pub fn with_initial_state(mut self, state: Vec<Vec<f64>>) -> Result<Self, DspError> {
        if state.len() != self.n_out || state.iter().any(|s| s.len() != self.taps - 1) {
            return Err(DspError::ShapeMismatch(format!(
                "initial state must be {} × {}",
                self.n_out,
                self.taps - 1
            )));
        }
        self.tail = state;
        Ok(self)
    }

    /// Run-out after the last processed block.
    #[must_use]
    pub fn final_state(&self) -> &[Vec<f64>] {
        &self.tail
    }

    /// Filter length.
    #[must_use]
    pub fn taps(&self) -> usize {
        self.taps
    }

    /// FFT size used per segment.
    #[must_use]
    pub fn fft_size(&self) -> usize {
        self.fft.len()
    }

    /// Reset the run-out to silence.
    pub fn reset(&mut self) {
        self.tail.iter_mut().for_each(|t| t.fill(0.0));
    }

    /// Filter one block of `n_in` equal-length channels.
    ///
    /// Returns `n_out` channels of the same length.
    ///
    /// # Errors
    /// Returns [`DspError::ShapeMismatch`] if the channel count or lengths
    /// do not match.
    pub fn process(&mut self, x: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, DspError> {
        if x.len() != self.n_in {
            return Err(DspError::ShapeMismatch(format!(
                "{} input channels, expected {}",
                x.len(),
                self.n_in
            )));
        }
        let len = x[0].len();
        if x.iter().any(|c| c.len() != len) {
            return Err(DspError::ShapeMismatch("input channels differ in length".into()));
        }

        let fft_size = self.fft.len();
        let bins = self.fft.bins();
        let mut acc = vec![vec![0.0; len + fft_size]; self.n_out];

        for offset in (0..len).step_by(self.segment) {
            let end = (offset + self.segment).min(len);
            let inputs: Vec<Vec<Complex64>> = x
                .iter()
                .map(|c| self.fft.forward(&c[offset..end]))
                .collect();

            for (o, out) in acc.iter_mut().enumerate() {
                let mut mixed = vec![Complex64::new(0.0, 0.0); bins];
                for (b, xs) in self.spectra[o].iter().zip(&inputs) {
                    for ((m, &bk), &xk) in mixed.iter_mut().zip(b).zip(xs) {
                        *m += bk * xk;
                    }
                }
                let segment_out = self.fft.inverse(&mixed);
                for (a, y) in out[offset..offset + fft_size].iter_mut().zip(segment_out) {
                    *a += y;
                }
            }
        }

        let run_out = self.taps - 1;
        let mut outputs = Vec::with_capacity(self.n_out);
        for (out, tail) in acc.iter_mut().zip(self.tail.iter_mut()) {
            for (a, t) in out.iter_mut().zip(tail.iter()) {
                *a += t;
            }
            tail.copy_from_slice(&out[len..len + run_out]);
            out.truncate(len);
            outputs.push(std::mem::take(out));
        }
        Ok(outputs)
    }
}

/// Filter a single channel with FIR `b` from silence.
///
/// The output has the length of `x`.
///
/// # Errors
/// Returns [`DspError::EmptyInput`] if `b` is empty.
///
/// # Example
/// ```
/// use sfc_dsp::ola::olafilt;
/// let y = olafilt(&[0.5, 0.5], &[1.0, 1.0, 1.0]).unwrap();
/// assert!((y[0] - 0.5).abs() < 1e-12);
/// assert!((y[2] - 1.0).abs() < 1e-12);
/// ```
pub fn olafilt(b: &[f64], x: &[f64]) -> Result<Vec<f64>, DspError> {
    let (y, _) = olafilt_with_state(b, x, None)?;
    Ok(y)
}

/// Filter a single channel with FIR `b` from state `zi`.
///
/// Returns the output and the final state (`b.len() - 1` samples) to pass as
/// `zi` for the next block.
///
/// # Errors
/// Returns [`DspError::EmptyInput`] if `b` is empty and
/// [`DspError::ShapeMismatch`] if `zi` has the wrong length.
pub fn olafilt_with_state(
    b: &[f64],
    x: &[f64],
    zi: Option<&[f64]>,
) -> Result<(Vec<f64>, Vec<f64>), DspError> {
    let mut filter = OlaFilter::new(&[vec![b.to_vec()]])?;
    if let Some(zi) = zi {
        filter = filter.with_initial_state(vec![zi.to_vec()])?;
    }
    let mut y = filter.process(&[x.to_vec()])?;
    let zf = filter.final_state()[0].clone();
    Ok((y.swap_remove(0), zf))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convolve(b: &[f64], x: &[f64]) -> Vec<f64> {
        let mut y = vec![0.0; x.len() + b.len() - 1];
        for (i, &xi) in x.iter().enumerate() {
            for (j, &bj) in b.iter().enumerate() {
                y[i + j] += xi * bj;
            }
        }
        y
    }

    fn ramp(n: usize, scale: f64) -> Vec<f64> {
        (0..n).map(|k| ((k as f64 + 1.0) * scale).sin()).collect()
    }

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (k, (x, y)) in a.iter().zip(b).enumerate() {
            assert!((x - y).abs() < 1e-9, "sample {k}: {x} vs {y}");
        }
    }

    #[test]
    fn fft_size_is_power_of_two_above_twice_taps() {
        assert_eq!(OlaFilter::new(&[vec![vec![1.0]]]).unwrap().fft_size(), 2);
        assert_eq!(OlaFilter::new(&[vec![vec![1.0; 5]]]).unwrap().fft_size(), 16);
        assert_eq!(OlaFilter::new(&[vec![vec![1.0; 8]]]).unwrap().fft_size(), 16);
        assert_eq!(OlaFilter::new(&[vec![vec![1.0; 9]]]).unwrap().fft_size(), 32);
    }

    #[test]
    fn matches_direct_convolution() {
        let b = ramp(5, 0.9);
        let x = ramp(41, 0.37);
        let y = olafilt(&b, &x).unwrap();
        assert_close(&y, &convolve(&b, &x)[..x.len()]);
    }

    #[test]
    fn block_processing_equals_one_shot() {
        let b = ramp(6, 1.3);
        let x = ramp(30, 0.21);
        let full = olafilt(&b, &x).unwrap();

        let mut zi = vec![0.0; 5];
        let mut pieces = Vec::new();
        for chunk in [&x[..7], &x[7..9], &x[9..30]] {
            let (y, zf) = olafilt_with_state(&b, chunk, Some(&zi)).unwrap();
            pieces.extend(y);
            zi = zf;
        }
        assert_close(&pieces, &full);

        // the final state is the convolution run-out
        let conv = convolve(&b, &x);
        assert_close(&zi, &conv[30..]);
    }

    #[test]
    fn mimo_sums_over_inputs() {
        let b00 = ramp(4, 0.5);
        let b01 = ramp(4, 1.1);
        let b10 = ramp(4, -0.7);
        let b11 = ramp(4, 2.0);
        let x0 = ramp(25, 0.3);
        let x1 = ramp(25, -0.45);

        let mut bank = OlaFilter::new(&[
            vec![b00.clone(), b01.clone()],
            vec![b10.clone(), b11.clone()],
        ])
        .unwrap();
        let y = bank.process(&[x0.clone(), x1.clone()]).unwrap();

        let expect0: Vec<f64> = convolve(&b00, &x0)
            .iter()
            .zip(convolve(&b01, &x1))
            .map(|(a, b)| a + b)
            .take(25)
            .collect();
        let expect1: Vec<f64> = convolve(&b10, &x0)
            .iter()
            .zip(convolve(&b11, &x1))
            .map(|(a, b)| a + b)
            .take(25)
            .collect();
        assert_close(&y[0], &expect0);
        assert_close(&y[1], &expect1);
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(OlaFilter::new(&[]).is_err());
        assert!(OlaFilter::new(&[vec![vec![1.0, 2.0]], vec![vec![1.0]]]).is_err());
        let mut bank = OlaFilter::new(&[vec![vec![1.0], vec![1.0]]]).unwrap();
        assert!(bank.process(&[vec![1.0]]).is_err());
        assert!(bank.process(&[vec![1.0], vec![1.0, 2.0]]).is_err());
        assert!(olafilt_with_state(&[1.0, 2.0], &[1.0], Some(&[0.0, 0.0])).is_err());
    }

    #[test]
    fn empty_input_passes_state_through() {
        let (y, zf) = olafilt_with_state(&[1.0, 1.0, 1.0], &[], Some(&[0.5, 0.25])).unwrap();
        assert!(y.is_empty());
        assert_close(&zf, &[0.5, 0.25]);
    }
}
