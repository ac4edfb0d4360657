use std::sync::Arc;

use realfft::num_complex::Complex64;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

/// Real FFT of a fixed size, forward and inverse.
///
/// Pre-allocates both plans and their scratch buffers so repeated
/// transforms of the same size do not re-plan.
///
/// # Example
/// ```
/// use sfc_dsp::fft::RealFft;
/// let mut fft = RealFft::new(8);
/// let spectrum = fft.forward(&[1.0, 0.0, 0.0, 0.0]);
/// assert_eq!(spectrum.len(), 5);
/// let back = fft.inverse(&spectrum);
/// assert!((back[0] - 1.0).abs() < 1e-12);
/// ```
pub struct RealFft {
    n: usize,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
    scratch_forward: Vec<Complex64>,
    scratch_inverse: Vec<Complex64>,
}

impl RealFft {
    /// Plan transforms of length `n`.
    ///
    /// # Panics
    /// Panics if `n` is 0.
    #[must_use]
    pub fn new(n: usize) -> Self {
        assert!(n > 0, "FFT size must be > 0");

        let mut planner = RealFftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(n);
        let inverse = planner.plan_fft_inverse(n);
        let scratch_forward = forward.make_scratch_vec();
        let scratch_inverse = inverse.make_scratch_vec();

        Self {
            n,
            forward,
            inverse,
            scratch_forward,
            scratch_inverse,
        }
    }

    /// Transform length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.n
    }

    /// Always false: a plan has at least one point.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of single-sided bins, `n / 2 + 1`.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.n / 2 + 1
    }

    /// Forward transform of `x`, zero-padded or truncated to `n` samples.
    pub fn forward(&mut self, x: &[f64]) -> Vec<Complex64> {
        let mut input = self.forward.make_input_vec();
        let m = x.len().min(self.n);
        input[..m].copy_from_slice(&x[..m]);

        let mut output = self.forward.make_output_vec();
        if self
            .forward
            .process_with_scratch(&mut input, &mut output, &mut self.scratch_forward)
            .is_err()
        {
            log::error!("FFT forward failed for size {}", self.n);
            return vec![Complex64::new(0.0, 0.0); self.bins()];
        }
        output
    }

    /// Inverse transform back to `n` real samples, scaled by `1 / n`.
    ///
    /// `spectrum` is zero-padded or truncated to `n / 2 + 1` bins. The
    /// imaginary parts of the DC bin and, for even `n`, the Nyquist bin are
    /// discarded.
    pub fn inverse(&mut self, spectrum: &[Complex64]) -> Vec<f64> {
        let mut input = self.inverse.make_input_vec();
        let m = spectrum.len().min(input.len());
        input[..m].copy_from_slice(&spectrum[..m]);
        input[0].im = 0.0;
        if self.n % 2 == 0 {
            let last = input.len() - 1;
            input[last].im = 0.0;
        }

        let mut output = self.inverse.make_output_vec();
        if self
            .inverse
            .process_with_scratch(&mut input, &mut output, &mut self.scratch_inverse)
            .is_err()
        {
            log::error!("FFT inverse failed for size {}", self.n);
            return vec![0.0; self.n];
        }
        let scale = 1.0 / self.n as f64;
        output.iter_mut().for_each(|v| *v *= scale);
        output
    }
}

/// One-shot forward real FFT of `x` with `n` points.
///
/// # Panics
/// Panics if `n` is 0.
#[must_use]
pub fn rfft(x: &[f64], n: usize) -> Vec<Complex64> {
    RealFft::new(n).forward(x)
}

/// One-shot inverse real FFT producing `n` samples.
///
/// # Panics
/// Panics if `n` is 0.
#[must_use]
pub fn irfft(spectrum: &[Complex64], n: usize) -> Vec<f64> {
    RealFft::new(n).inverse(spectrum)
}
