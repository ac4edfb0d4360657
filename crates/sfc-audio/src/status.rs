use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Stream health flags raised from audio callbacks.
///
/// Callbacks only store into atomics; [`StreamStatus::check_and_log`] reports
/// and clears them from the controlling thread after a transfer.
#[derive(Debug, Default)]
pub struct StreamStatus {
    input_overflow: AtomicBool,
    output_underflow: AtomicBool,
    stream_errors: AtomicUsize,
}

impl StreamStatus {
    /// Input samples were dropped because the ring buffer was full.
    pub fn raise_input_overflow(&self) {
        self.input_overflow.store(true, Ordering::Relaxed);
    }

    /// Output fell behind: the capture completed before the excitation
    /// was fully played.
    pub fn raise_output_underflow(&self) {
        self.output_underflow.store(true, Ordering::Relaxed);
    }

    /// The backend reported a stream error.
    pub fn count_stream_error(&self) {
        self.stream_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether any flag is raised.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.input_overflow.load(Ordering::Relaxed)
            && !self.output_underflow.load(Ordering::Relaxed)
            && self.stream_errors.load(Ordering::Relaxed) == 0
    }

    /// Log a warning per raised flag, then clear all flags.
    ///
    /// Returns `true` if nothing was raised.
    pub fn check_and_log(&self) -> bool {
        let mut clean = true;
        if self.input_overflow.swap(false, Ordering::Relaxed) {
            log::warn!("Input overflow");
            clean = false;
        }
        if self.output_underflow.swap(false, Ordering::Relaxed) {
            log::warn!("Output underflow");
            clean = false;
        }
        let errors = self.stream_errors.swap(0, Ordering::Relaxed);
        if errors > 0 {
            log::warn!("{errors} stream error(s)");
            clean = false;
        }
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_cleared_after_check() {
        let status = StreamStatus::default();
        assert!(status.check_and_log());
        status.raise_input_overflow();
        status.count_stream_error();
        status.raise_output_underflow();
        assert!(!status.is_clean());
        assert!(!status.check_and_log());
        assert!(status.is_clean());
        assert!(status.check_and_log());
    }
}
