use std::path::PathBuf;

/// Stream properties reported by a reader when a source is opened.
///
/// The writer for a run is opened with the same metadata so the output
/// keeps the source's resolution and frame rate.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Exact frame rate as `(numerator, denominator)`, e.g. `(30000, 1001)`,
    /// when the container reports one. Writers prefer it over `fps`.
    pub frame_rate: Option<(i32, i32)>,
    /// Container-reported frame count; 0 when the container doesn't say.
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Fraction of the stream covered after `frames_processed` frames,
    /// clamped to `0.0..=1.0`. Unknown totals report 0.0.
    pub fn progress_fraction(&self, frames_processed: usize) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        (frames_processed as f64 / self.total_frames as f64).clamp(0.0, 1.0)
    }
}
