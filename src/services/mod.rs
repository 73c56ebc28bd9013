//! Service layer: I/O, encoding, export and progress concerns kept apart from
//! the pixel algorithms.

pub mod export;
pub mod format;
pub mod loader;
pub mod progress;

pub use export::ExportService;
pub use format::OutputFormatHandler;
pub use loader::{BlobRegistry, BlobUrl, CapturedBlob, RasterLoader, RasterSource};
pub use progress::{
    CompositionStage, ConsoleProgressReporter, NoOpProgressReporter, ProgressReporter,
    ProgressTracker, ProgressUpdate,
};
