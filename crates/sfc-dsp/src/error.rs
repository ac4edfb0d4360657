use thiserror::Error;

/// Errors originating from the signal processing module.
#[derive(Error, Debug, PartialEq)]
pub enum DspError {
    /// Sweep frequencies outside `0 < f_start < f_end <= sr / 2`.
    #[error("Plage de fréquences invalide : {f_start} Hz → {f_end} Hz (Nyquist {nyquist} Hz)")]
    InvalidFrequencyRange {
        /// Start frequency.
        f_start: f64,
        /// End frequency.
        f_end: f64,
        /// Half the sample rate.
        nyquist: f64,
    },

    /// Fade longer than half the signal.
    #[error("Fondu trop long : {fade} échantillons pour un signal de {len}")]
    FadeTooLong {
        /// Fade length in samples.
        fade: usize,
        /// Signal length in samples.
        len: usize,
    },

    /// Two signals that must match in length do not.
    #[error("Longueurs incompatibles : {left} vs {right}")]
    LengthMismatch {
        /// First length.
        left: usize,
        /// Second length.
        right: usize,
    },

    /// Empty input where data is required.
    #[error("Entrée vide : {0}")]
    EmptyInput(&'static str),

    /// A time or frequency outside the signal.
    #[error("Valeur hors limites : {value} (attendu dans [0, {max}])")]
    OutOfRange {
        /// Offending value.
        value: f64,
        /// Upper bound.
        max: f64,
    },

    /// Matrix or channel layout mismatch.
    #[error("Formes incompatibles : {0}")]
    ShapeMismatch(String),

    /// Least squares solver failure.
    #[error("Échec du solveur : {0}")]
    Solver(String),
}
