//! Progress-callback trait for per-document pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as each document moves through the four stages.
//!
//! When several documents run concurrently (see
//! [`crate::convert::ResumePipeline::run_batch`]) the methods are called from
//! different tasks at the same time, so implementations must protect shared
//! mutable state with `Mutex`/atomics.

use std::fmt;
use std::sync::Arc;

/// One step of the per-document pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extraction,
    Inference,
    Serialization,
    Rendering,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extraction => "extraction",
            Stage::Inference => "inference",
            Stage::Serialization => "serialization",
            Stage::Rendering => "rendering",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called by the pipeline as it processes each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before extraction starts.
    fn on_run_start(&self, filename: &str) {
        let _ = filename;
    }

    /// Called when a stage begins.
    fn on_stage_start(&self, filename: &str, stage: Stage) {
        let _ = (filename, stage);
    }

    /// Called when a stage finishes successfully.
    fn on_stage_complete(&self, filename: &str, stage: Stage, elapsed_ms: u64) {
        let _ = (filename, stage, elapsed_ms);
    }

    /// Called once after rendering succeeds.
    ///
    /// * `base_name` — sanitised name the outputs will be stored under
    fn on_run_complete(&self, filename: &str, base_name: &str) {
        let _ = (filename, base_name);
    }

    /// Called once when any stage fails.
    fn on_run_error(&self, filename: &str, error: &str) {
        let _ = (filename, error);
    }
}

/// A no-op implementation, the default when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        stages: Mutex<Vec<Stage>>,
        errors: AtomicUsize,
    }

    impl PipelineProgressCallback for TrackingCallback {
        fn on_run_start(&self, _filename: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_stage_complete(&self, _filename: &str, stage: Stage, _elapsed_ms: u64) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_run_error(&self, _filename: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start("cv.pdf");
        cb.on_stage_start("cv.pdf", Stage::Extraction);
        cb.on_stage_complete("cv.pdf", Stage::Extraction, 12);
        cb.on_run_complete("cv.pdf", "Jane_Doe");
        cb.on_run_error("cv.pdf", "boom");
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_run_start("a.docx");
        tracker.on_stage_complete("a.docx", Stage::Extraction, 1);
        tracker.on_stage_complete("a.docx", Stage::Inference, 2);
        tracker.on_run_error("a.docx", "render failed");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 1);
        assert_eq!(
            *tracker.stages.lock().unwrap(),
            vec![Stage::Extraction, Stage::Inference]
        );
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::Rendering.to_string(), "rendering");
        let cb: Arc<dyn PipelineProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_stage_start("x.pdf", Stage::Serialization);
    }
}
