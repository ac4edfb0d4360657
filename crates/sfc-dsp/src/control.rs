//! Control filter design by pressure matching.
//!
//! The plant is given per frequency as a matrix `H` of shape `(n_mics,
//! n_sources)`, the desired sound field as a vector `p` of length `n_mics`.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use realfft::num_complex::Complex64;

use crate::error::DspError;
use crate::fft::RealFft;
use crate::transfer::Regularization;

/// Loudspeaker weights via pressure matching with l2 regularization.
///
/// Solves independently for each frequency
///
/// ```text
/// min_w ||H w - p||² + reg ||w||²
/// ```
///
/// as the least squares problem `[H; sqrt(reg) I] w = [p; 0]`.
///
/// # Errors
/// Returns [`DspError::ShapeMismatch`] if plant, target and regularization
/// disagree in frequency count or microphone count, and
/// [`DspError::Solver`] if the decomposition fails.
///
/// # Example
/// ```
/// use nalgebra::{DMatrix, DVector};
/// use sfc_dsp::Complex64;
/// use sfc_dsp::control::pressure_matching;
/// use sfc_dsp::transfer::Regularization;
///
/// let one = Complex64::new(1.0, 0.0);
/// let h = vec![DMatrix::from_element(1, 1, Complex64::new(2.0, 0.0))];
/// let p = vec![DVector::from_element(1, one)];
/// let w = pressure_matching(&h, &p, &Regularization::default()).unwrap();
/// assert!((w[0][0].re - 0.5).abs() < 1e-9);
/// ```
pub fn pressure_matching(
    plant: &[DMatrix<Complex64>],
    target: &[DVector<Complex64>],
    reg: &Regularization,
) -> Result<Vec<DVector<Complex64>>, DspError> {
    if plant.len() != target.len() {
        return Err(DspError::ShapeMismatch(format!(
            "{} plant frequencies, {} target frequencies",
            plant.len(),
            target.len()
        )));
    }
    if let Regularization::PerBin(v) = reg
        && v.len() != plant.len()
    {
        return Err(DspError::ShapeMismatch(format!(
            "{} regularization values for {} frequencies",
            v.len(),
            plant.len()
        )));
    }

    plant
        .par_iter()
        .zip(target.par_iter())
        .enumerate()
        .map(|(bin, (h, p))| solve_regularized(h, p, reg.at(bin)))
        .collect()
}

fn solve_regularized(
    h: &DMatrix<Complex64>,
    p: &DVector<Complex64>,
    reg: f64,
) -> Result<DVector<Complex64>, DspError> {
    let (nm, ns) = h.shape();
    if p.len() != nm {
        return Err(DspError::ShapeMismatch(format!(
            "target has {} microphones, plant has {nm}",
            p.len()
        )));
    }

    let mut a = DMatrix::<Complex64>::zeros(nm + ns, ns);
    a.view_mut((0, 0), (nm, ns)).copy_from(h);
    let diag = Complex64::new(reg.max(0.0).sqrt(), 0.0);
    for j in 0..ns {
        a[(nm + j, j)] = diag;
    }
    let mut b = DVector::<Complex64>::zeros(nm + ns);
    b.rows_mut(0, nm).copy_from(p);

    let svd = a.svd(true, true);
    let tol = svd.singular_values.max() * f64::EPSILON * (nm + ns) as f64;
    svd.solve(&b, tol).map_err(|e| DspError::Solver(e.to_string()))
}

/// Sound field reproduced by `weights`, `H w` per frequency.
///
/// # Errors
/// Returns [`DspError::ShapeMismatch`] on frequency or source count mismatch.
pub fn reproduced_pressure(
    plant: &[DMatrix<Complex64>],
    weights: &[DVector<Complex64>],
) -> Result<Vec<DVector<Complex64>>, DspError> {
    if plant.len() != weights.len() {
        return Err(DspError::ShapeMismatch(format!(
            "{} plant frequencies, {} weight frequencies",
            plant.len(),
            weights.len()
        )));
    }
    plant
        .iter()
        .zip(weights)
        .map(|(h, w)| {
            if h.ncols() == w.len() {
                Ok(h * w)
            } else {
                Err(DspError::ShapeMismatch(format!(
                    "{} weights for {} sources",
                    w.len(),
                    h.ncols()
                )))
            }
        })
        .collect()
}

/// Normalized reproduction error per frequency in dB,
/// `10 log10(||p̂ - p||² / ||p||²)`.
///
/// Bins where the target is silent yield `f64::NEG_INFINITY` for a perfect
/// match and `f64::INFINITY` otherwise.
#[must_use]
pub fn normalized_error_db(
    reproduced: &[DVector<Complex64>],
    target: &[DVector<Complex64>],
) -> Vec<f64> {
    reproduced
        .iter()
        .zip(target)
        .map(|(r, p)| {
            let err = (r - p).norm_squared();
            if err == 0.0 {
                return f64::NEG_INFINITY;
            }
            10.0 * (err / p.norm_squared()).log10()
        })
        .collect()
}

/// Plant matrices from time-domain impulse responses `irs[mic][source]`.
///
/// Every response is zero-padded or truncated to `n` samples before the
/// transform; the result holds `n / 2 + 1` matrices.
///
/// # Errors
/// Returns [`DspError::EmptyInput`] without responses and
/// [`DspError::ShapeMismatch`] for ragged microphone rows.
pub fn plant_from_impulse_responses(
    irs: &[Vec<Vec<f64>>],
    n: usize,
) -> Result<Vec<DMatrix<Complex64>>, DspError> {
    let nm = irs.len();
    let ns = irs.first().map_or(0, Vec::len);
    if nm == 0 || ns == 0 || n == 0 {
        return Err(DspError::EmptyInput("plant impulse responses"));
    }
    if irs.iter().any(|row| row.len() != ns) {
        return Err(DspError::ShapeMismatch(
            "every microphone needs one response per source".into(),
        ));
    }

    let mut fft = RealFft::new(n);
    let spectra: Vec<Vec<Vec<Complex64>>> = irs
        .iter()
        .map(|row| row.iter().map(|h| fft.forward(h)).collect())
        .collect();

    Ok((0..fft.bins())
        .map(|bin| DMatrix::from_fn(nm, ns, |m, s| spectra[m][s][bin]))
        .collect())
}

/// Target vectors from time-domain responses `irs[mic]`, as for
/// [`plant_from_impulse_responses`].
///
/// # Errors
/// Returns [`DspError::EmptyInput`] without responses.
pub fn target_from_impulse_responses(
    irs: &[Vec<f64>],
    n: usize,
) -> Result<Vec<DVector<Complex64>>, DspError> {
    if irs.is_empty() || n == 0 {
        return Err(DspError::EmptyInput("target impulse responses"));
    }
    let mut fft = RealFft::new(n);
    let spectra: Vec<Vec<Complex64>> = irs.iter().map(|h| fft.forward(h)).collect();
    Ok((0..fft.bins())
        .map(|bin| DVector::from_fn(irs.len(), |m, _| spectra[m][bin]))
        .collect())
}

/// FIR control filters, one per source, from weights on the single-sided
/// grid of an `n`-point DFT with even `n = 2 (bins - 1)`.
///
/// # Errors
/// Returns [`DspError::EmptyInput`] for fewer than two bins or no sources.
pub fn filters_from_weights(weights: &[DVector<Complex64>]) -> Result<Vec<Vec<f64>>, DspError> {
    let bins = weights.len();
    let ns = weights.first().map_or(0, DVector::len);
    if bins < 2 || ns == 0 {
        return Err(DspError::EmptyInput("weights"));
    }
    let n = 2 * (bins - 1);
    let mut fft = RealFft::new(n);
    Ok((0..ns)
        .map(|s| {
            let spectrum: Vec<Complex64> = weights.iter().map(|w| w[s]).collect();
            fft.inverse(&spectrum)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn square_plant_is_inverted() {
        let entries = [c(1.0, 0.0), c(0.5, 0.2), c(0.2, -0.1), c(1.0, 0.3)];
        let h = DMatrix::from_row_slice(2, 2, &entries);
        let p = DVector::from_vec(vec![c(1.0, 0.0), c(0.0, 1.0)]);
        let w = pressure_matching(&[h.clone()], &[p.clone()], &Regularization::default()).unwrap();
        let r = &h * &w[0];
        assert!((r - p).norm() < 1e-9);
    }

    #[test]
    fn regularization_reduces_effort() {
        let rows = [
            [c(1.0, 0.0), c(0.9, 0.0)],
            [c(0.8, 0.1), c(0.85, 0.1)],
            [c(0.2, 0.0), c(0.25, 0.0)],
        ];
        let h = DMatrix::from_fn(3, 2, |i, j| rows[i][j]);
        let p = DVector::from_vec(vec![c(1.0, 0.0), c(-1.0, 0.0), c(0.5, 0.0)]);
        let plant = vec![h.clone(), h];
        let target = vec![p.clone(), p];
        let reg = Regularization::PerBin(vec![1e-9, 1.0]);
        let w = pressure_matching(&plant, &target, &reg).unwrap();
        assert!(w[1].norm() < w[0].norm());
    }

    #[test]
    fn overdetermined_solution_is_least_squares() {
        // one source, two microphones: w = (h^H p) / (h^H h)
        let h = DMatrix::from_column_slice(2, 1, &[c(1.0, 0.0), c(2.0, 0.0)]);
        let p = DVector::from_vec(vec![c(1.0, 0.0), c(1.0, 0.0)]);
        let w = pressure_matching(&[h], &[p], &Regularization::Constant(0.0)).unwrap();
        assert!((w[0][0].re - 0.6).abs() < 1e-9);
        assert!(w[0][0].im.abs() < 1e-9);
    }

    #[test]
    fn shape_errors() {
        let h = DMatrix::from_element(2, 1, c(1.0, 0.0));
        let p = DVector::from_element(3, c(1.0, 0.0));
        assert!(pressure_matching(&[h.clone()], &[p.clone()], &Regularization::default()).is_err());
        assert!(pressure_matching(&[h.clone()], &[], &Regularization::default()).is_err());
        let w = vec![DVector::from_element(2, c(1.0, 0.0))];
        assert!(reproduced_pressure(&[h], &w).is_err());
    }

    #[test]
    fn error_db_of_half_amplitude_is_minus_six() {
        let p = vec![DVector::from_element(2, c(1.0, 0.0))];
        let r = vec![DVector::from_element(2, c(0.5, 0.0))];
        let e = normalized_error_db(&r, &p);
        assert!((e[0] + 6.0206).abs() < 1e-3);
    }

    #[test]
    fn silent_bins_give_infinite_errors() {
        let silent = vec![DVector::from_element(2, c(0.0, 0.0))];
        let loud = vec![DVector::from_element(2, c(0.1, 0.0))];
        assert_eq!(normalized_error_db(&silent, &silent), vec![f64::NEG_INFINITY]);
        assert_eq!(normalized_error_db(&loud, &loud), vec![f64::NEG_INFINITY]);
        assert_eq!(normalized_error_db(&loud, &silent), vec![f64::INFINITY]);
    }

    #[test]
    fn design_roundtrip_through_time_domain() {
        // single source, single mic, plant = 0.5 * delay(1); target = delay(3)
        let n = 16;
        let mut h = vec![0.0; n];
        h[1] = 0.5;
        let mut t = vec![0.0; n];
        t[3] = 1.0;
        let plant = plant_from_impulse_responses(&[vec![h.clone()]], n).unwrap();
        let target = target_from_impulse_responses(&[t], n).unwrap();
        assert_eq!(plant.len(), 9);

        let w = pressure_matching(&plant, &target, &Regularization::default()).unwrap();
        let filters = filters_from_weights(&w).unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].len(), n);
        // expected filter: 2 * delay(2)
        for (k, &v) in filters[0].iter().enumerate() {
            let expect = if k == 2 { 2.0 } else { 0.0 };
            assert!((v - expect).abs() < 1e-9, "tap {k}: {v}");
        }

        let r = reproduced_pressure(&plant, &w).unwrap();
        assert!(normalized_error_db(&r, &target).iter().all(|&e| e < -100.0));
    }
}
