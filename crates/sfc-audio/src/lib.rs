// Audio I/O for sound field control measurements: files, devices, sessions.

pub mod bk;
pub mod calibration;
pub mod decode;
pub mod device;
pub mod error;
pub mod measure;
pub mod status;
pub mod wav;

pub use error::AudioError;
