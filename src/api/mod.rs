pub mod analysis;
pub mod recorder;

pub use analysis::{ScanApiError, ThumbnailPayload, TreadAnalyzer};
pub use recorder::TreadRecorder;
