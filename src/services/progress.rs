//! Progress reporting service
//!
//! Keeps progress reporting out of the composition logic so frontends can show
//! stage updates however they like (spinner, log lines, nothing).

use instant::Instant;
use std::sync::Arc;

/// Stages of a composition run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionStage {
    /// Loading and decoding the template raster
    TemplateLoading,
    /// Loading and decoding the captured photo
    CaptureLoading,
    /// Computing the cover-fit crop
    Projection,
    /// Drawing the layers onto the output canvas
    Drawing,
    /// Encoding the flattened result
    Encoding,
    /// Composition finished
    Completed,
}

impl CompositionStage {
    /// Get a human-readable description of the stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            CompositionStage::TemplateLoading => "Loading template",
            CompositionStage::CaptureLoading => "Loading captured photo",
            CompositionStage::Projection => "Fitting photo into placement",
            CompositionStage::Drawing => "Drawing layers",
            CompositionStage::Encoding => "Encoding result",
            CompositionStage::Completed => "Composition completed",
        }
    }

    /// Get the typical progress percentage for this stage
    #[must_use]
    pub fn progress_percentage(&self) -> u8 {
        match self {
            CompositionStage::TemplateLoading => 10,
            CompositionStage::CaptureLoading => 30,
            CompositionStage::Projection => 50,
            CompositionStage::Drawing => 60,
            CompositionStage::Encoding => 85,
            CompositionStage::Completed => 100,
        }
    }
}

/// Progress update containing stage and timing information
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current stage
    pub stage: CompositionStage,
    /// Progress percentage (0-100)
    pub progress: u8,
    /// Human-readable stage description
    pub description: String,
    /// Elapsed time since the run started (milliseconds)
    pub elapsed_ms: u64,
}

impl ProgressUpdate {
    /// Create a new progress update
    #[must_use]
    pub fn new(stage: CompositionStage, start_time: Instant) -> Self {
        Self {
            progress: stage.progress_percentage(),
            description: stage.description().to_string(),
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            stage,
        }
    }
}

/// Trait for reporting progress during composition
pub trait ProgressReporter: Send + Sync {
    /// Report a progress update
    fn report_progress(&self, update: ProgressUpdate);

    /// Report an error during a stage
    fn report_error(&self, stage: CompositionStage, error: &str);
}

/// No-op progress reporter that discards all progress updates
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_progress(&self, _update: ProgressUpdate) {}

    fn report_error(&self, _stage: CompositionStage, _error: &str) {}
}

/// Reporter that forwards updates to the `log` facade
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn report_progress(&self, update: ProgressUpdate) {
        if self.verbose {
            log::info!(
                "[{}%] {} ({}ms elapsed)",
                update.progress,
                update.description,
                update.elapsed_ms
            );
        } else {
            log::info!("[{}%] {}", update.progress, update.description);
        }
    }

    fn report_error(&self, stage: CompositionStage, error: &str) {
        log::error!("Error during {}: {}", stage.description(), error);
    }
}

/// Tracks the current stage of one run and forwards updates to a reporter
pub struct ProgressTracker {
    reporter: Arc<dyn ProgressReporter>,
    start_time: Instant,
    current_stage: Option<CompositionStage>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            reporter,
            start_time: Instant::now(),
            current_stage: None,
        }
    }

    /// Create a progress tracker with no-op reporter
    #[must_use]
    pub fn no_op() -> Self {
        Self::new(Arc::new(NoOpProgressReporter))
    }

    /// Report progress for a specific stage
    pub fn report_stage(&mut self, stage: CompositionStage) {
        self.current_stage = Some(stage);
        self.reporter
            .report_progress(ProgressUpdate::new(stage, self.start_time));
    }

    /// Report an error against the current stage
    pub fn report_error(&self, error: &str) {
        let stage = self
            .current_stage
            .unwrap_or(CompositionStage::TemplateLoading);
        self.reporter.report_error(stage, error);
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn current_stage(&self) -> Option<CompositionStage> {
        self.current_stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingReporter {
        updates: Mutex<Vec<CompositionStage>>,
        errors: Mutex<Vec<(CompositionStage, String)>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn report_progress(&self, update: ProgressUpdate) {
            self.updates.lock().unwrap().push(update.stage);
        }

        fn report_error(&self, stage: CompositionStage, error: &str) {
            self.errors.lock().unwrap().push((stage, error.to_string()));
        }
    }

    #[test]
    fn test_stage_percentages_increase() {
        let stages = [
            CompositionStage::TemplateLoading,
            CompositionStage::CaptureLoading,
            CompositionStage::Projection,
            CompositionStage::Drawing,
            CompositionStage::Encoding,
            CompositionStage::Completed,
        ];
        for pair in stages.windows(2) {
            assert!(pair[0].progress_percentage() < pair[1].progress_percentage());
        }
    }

    #[test]
    fn test_tracker_records_stages_and_errors() {
        let reporter = Arc::new(RecordingReporter::default());
        let mut tracker = ProgressTracker::new(reporter.clone());
        tracker.report_stage(CompositionStage::TemplateLoading);
        tracker.report_stage(CompositionStage::CaptureLoading);
        tracker.report_error("bad bytes");

        assert_eq!(
            *reporter.updates.lock().unwrap(),
            vec![
                CompositionStage::TemplateLoading,
                CompositionStage::CaptureLoading
            ]
        );
        assert_eq!(
            reporter.errors.lock().unwrap()[0],
            (CompositionStage::CaptureLoading, "bad bytes".to_string())
        );
        assert_eq!(
            tracker.current_stage(),
            Some(CompositionStage::CaptureLoading)
        );
    }
}
