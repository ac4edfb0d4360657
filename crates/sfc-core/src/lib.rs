/// Shared types, grids and configuration for the sfc workspace.
///
/// This crate holds the data containers passed between the DSP, audio I/O
/// and application crates, plus the measurement configuration.

pub mod config;
pub mod error;
pub mod grid;
pub mod signal;
pub mod traits;

pub use config::MeasurementConfig;
pub use error::CoreError;
pub use grid::{Sided, find_nearest, frequency_vector, time_vector};
pub use signal::{MultiChannel, Recording};
pub use traits::AudioInterface;
