//! Progress-callback trait for per-image captioning events.
//!
//! Inject an [`Arc<dyn CaptionProgressCallback>`] via
//! [`crate::config::CaptionConfigBuilder::progress_callback`] to receive
//! events as a directory run works through its images.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: the CLI
//! forwards events to an indicatif bar, a service could forward them to a
//! WebSocket or a database row, and the library knows nothing about either.
//! The run is strictly sequential, but the trait is still `Send + Sync` so a
//! callback can be shared with whatever is displaying it.

use std::sync::Arc;

/// Called by [`crate::ops::caption_directory`] as it works through a run.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events arrive strictly in order — the run is
/// sequential by design.
pub trait CaptionProgressCallback: Send + Sync {
    /// Called once before any request is sent.
    ///
    /// `total_images` is the size of the missing set after ledger
    /// reconciliation, not the directory size.
    fn on_run_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called just before the request for an image is sent.
    fn on_image_start(&self, index: usize, total: usize, file_name: &str) {
        let _ = (index, total, file_name);
    }

    /// Called when an image was captioned and ledgered.
    ///
    /// `caption` may be empty: the endpoint can return zero predictions and
    /// the empty caption is still recorded.
    fn on_image_complete(&self, index: usize, total: usize, file_name: &str, caption: &str) {
        let _ = (index, total, file_name, caption);
    }

    /// Called when an image failed after its retry budget.
    fn on_image_error(&self, index: usize, total: usize, file_name: &str, error: &str) {
        let _ = (index, total, file_name, error);
    }

    /// Called once after every image has been attempted (or the run aborted
    /// on an authentication failure).
    fn on_run_complete(&self, total_images: usize, success_count: usize) {
        let _ = (total_images, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CaptionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CaptionConfig`].
pub type ProgressCallback = Arc<dyn CaptionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        final_success: AtomicUsize,
    }

    impl CaptionProgressCallback for TrackingCallback {
        fn on_image_start(&self, _index: usize, _total: usize, _file_name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_complete(&self, _i: usize, _t: usize, _f: &str, _caption: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_error(&self, _i: usize, _t: usize, _f: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_run_complete(&self, _total: usize, success_count: usize) {
            self.final_success.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(3);
        cb.on_image_start(0, 3, "image_pg0_idx0.png");
        cb.on_image_complete(0, 3, "image_pg0_idx0.png", "a red square");
        cb.on_image_error(1, 3, "image_pg0_idx1.png", "transport error");
        cb.on_run_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            final_success: AtomicUsize::new(0),
        };

        tracker.on_run_start(2);
        tracker.on_image_start(0, 2, "a.png");
        tracker.on_image_complete(0, 2, "a.png", "caption");
        tracker.on_image_start(1, 2, "b.png");
        tracker.on_image_error(1, 2, "b.png", "HTTP 500");
        tracker.on_run_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.final_success.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn CaptionProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_run_start(5);
        cb.on_image_start(0, 5, "x.png");
    }
}
