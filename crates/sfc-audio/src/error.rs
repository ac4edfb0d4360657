use thiserror::Error;

/// Errors originating from the audio module.
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio input device found.
    #[error("Aucun périphérique audio d'entrée trouvé")]
    NoInputDevice,

    /// No audio output device found.
    #[error("Aucun périphérique audio de sortie trouvé")]
    NoOutputDevice,

    /// Named device not present on the host.
    #[error("Périphérique introuvable : {0}")]
    DeviceNotFound(String),

    /// Channel number outside what the device offers (1-based).
    #[error("Canal {channel} invalide : le périphérique en a {available}")]
    InvalidChannel {
        /// Requested channel.
        channel: usize,
        /// Channels offered by the device.
        available: usize,
    },

    /// Audio stream error.
    #[error("Erreur de stream audio : {0}")]
    StreamError(String),

    /// Audio decode error.
    #[error("Erreur de décodage : {0}")]
    DecodeError(String),

    /// Recording did not complete in time.
    #[error("Enregistrement incomplet : {received} / {expected} échantillons")]
    Timeout {
        /// Samples received.
        received: usize,
        /// Samples expected.
        expected: usize,
    },

    /// Measurement plan inconsistent with its signals.
    #[error("Plan de mesure invalide : {0}")]
    InvalidPlan(String),
}
