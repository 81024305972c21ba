use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoError;

/// Abstracts video encoding so a job can write output without depending on
/// a specific codec library.
pub trait VideoWriter: Send {
    /// Creates the output file at `path` using the resolution and frame rate
    /// in `metadata`.
    fn open(&mut self, path: &Path, metadata: &VideoMetadata) -> Result<(), VideoError>;

    fn write(&mut self, frame: &Frame) -> Result<(), VideoError>;

    /// Flushes buffered packets and finalises the container. Calling it on
    /// a writer that was never opened, or twice, is a no-op.
    fn close(&mut self) -> Result<(), VideoError>;
}
