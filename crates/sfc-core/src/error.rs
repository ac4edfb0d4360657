use thiserror::Error;

/// Errors originating from the core module.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// Referenced file does not exist.
    #[error("Fichier introuvable : {path}")]
    FileNotFound {
        /// Path that was not found.
        path: String,
    },

    /// Channels of a multichannel signal differ in length.
    #[error("Canaux de longueurs différentes : canal {channel} a {found} échantillons, attendu {expected}")]
    RaggedChannels {
        /// Offending channel index.
        channel: usize,
        /// Expected number of frames.
        expected: usize,
        /// Actual number of frames.
        found: usize,
    },

    /// Invalid buffer dimensions.
    #[error("Dimensions invalides : {0}")]
    InvalidDimensions(String),
}
