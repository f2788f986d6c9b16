//! Transcription session: progress reporting and cooperative cancellation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Frames analyzed between progress reports and cancellation checks
pub const DEFAULT_BATCH_FRAMES: usize = 64;

/// Progress sink: receives a non-decreasing fraction in [0, 1]; returning
/// false requests cancellation (the contract for slow or failing sinks)
pub type ProgressFn = Box<dyn FnMut(f64) -> bool + Send>;

/// Shared cooperative cancellation flag, checked at batch boundaries
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Owns the side-channels of exactly one transcription call
pub struct TranscriptionSession {
    cancel: CancelToken,
    progress: Option<ProgressFn>,
    batch_frames: usize,
}

impl Default for TranscriptionSession {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptionSession {
    pub fn new() -> Self {
        Self {
            cancel: CancelToken::new(),
            progress: None,
            batch_frames: DEFAULT_BATCH_FRAMES,
        }
    }

    /// Attach a progress sink
    pub fn with_progress(mut self, sink: ProgressFn) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Override the analysis batch size (also the progress granularity)
    pub fn with_batch_frames(mut self, batch_frames: usize) -> Self {
        self.batch_frames = batch_frames.max(1);
        self
    }

    /// Token for requesting cancellation from another thread
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn batch_frames(&self) -> usize {
        self.batch_frames
    }

    /// Invoke the progress sink; a false return flips the cancel flag
    pub(crate) fn report(&mut self, fraction: f64) {
        if let Some(sink) = &mut self.progress {
            if !sink(fraction.clamp(0.0, 1.0)) {
                log::debug!("progress sink requested cancellation");
                self.cancel.request();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cancel_token_is_shared() {
        let session = TranscriptionSession::new();
        let token = session.cancel_token();
        assert!(!session.is_cancelled());
        token.request();
        assert!(session.is_cancelled());
    }

    #[test]
    fn test_failing_sink_requests_cancellation() {
        let mut session = TranscriptionSession::new().with_progress(Box::new(|_| false));
        session.report(0.1);
        assert!(session.is_cancelled());
    }

    #[test]
    fn test_sink_receives_clamped_fractions() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_sink = Arc::clone(&calls);
        let mut session = TranscriptionSession::new().with_progress(Box::new(move |fraction| {
            assert!((0.0..=1.0).contains(&fraction));
            calls_in_sink.fetch_add(1, Ordering::Relaxed);
            true
        }));
        session.report(0.5);
        session.report(1.2);
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert!(!session.is_cancelled());
    }

    #[test]
    fn test_batch_frames_floor_is_one() {
        let session = TranscriptionSession::new().with_batch_frames(0);
        assert_eq!(session.batch_frames(), 1);
    }
}
