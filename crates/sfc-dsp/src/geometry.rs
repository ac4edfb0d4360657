/// Cartesian coordinates `[x, y]` in metres of the 60 microphones of the
/// B&K planar array, a 10 × 6 grid spanning 0.675 m × 0.375 m.
///
/// Ordered column by column: index `i * 6 + j` is the `i`-th x position and
/// the `j`-th y position, y running from 0.375 m down to 0.
///
/// # Example
/// ```
/// use sfc_dsp::geometry::bk_planar_array_mic_positions;
/// let r = bk_planar_array_mic_positions();
/// assert_eq!(r.len(), 60);
/// assert_eq!(r[0], [0.0, 0.375]);
/// assert_eq!(r[59], [0.675, 0.0]);
/// ```
#[must_use]
pub fn bk_planar_array_mic_positions() -> Vec<[f64; 2]> {
    let xs = linspace(0.0, 0.675, 10);
    let ys = linspace(0.375, 0.0, 6);
    xs.iter()
        .flat_map(|&x| ys.iter().map(move |&y| [x, y]))
        .collect()
}

/// `n` evenly spaced values from `start` to `stop` inclusive.
#[must_use]
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|k| if k == n - 1 { stop } else { start + k as f64 * step })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_spacing() {
        let r = bk_planar_array_mic_positions();
        assert!((r[6][0] - 0.075).abs() < 1e-12);
        assert!((r[1][1] - 0.3).abs() < 1e-12);
        assert!((r[1][0]).abs() < 1e-12);
    }

    #[test]
    fn linspace_endpoints() {
        assert_eq!(linspace(1.0, 2.0, 3), vec![1.0, 1.5, 2.0]);
        assert_eq!(linspace(1.0, 2.0, 1), vec![1.0]);
        assert!(linspace(1.0, 2.0, 0).is_empty());
    }
}
