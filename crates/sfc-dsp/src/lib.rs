// Signal processing for sound field control experiments.

pub mod calibration;
pub mod control;
pub mod error;
pub mod fft;
pub mod geometry;
pub mod ola;
pub mod spectrum;
pub mod sweep;
pub mod transfer;
pub mod windows;

pub use error::DspError;
pub use realfft::num_complex::Complex64;
