use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Error type at the decode/encode boundary. `Send + Sync` so a job's
/// failure can cross from its worker thread to the caller.
pub type VideoError = Box<dyn std::error::Error + Send + Sync>;

/// Reads frames from a video source.
///
/// Implementations handle codec and container details while the job works
/// with the abstract `Frame` and `VideoMetadata` types.
pub trait VideoReader: Send {
    /// Opens a video file and returns its metadata.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, VideoError>;

    /// Returns an iterator over frames in decode order.
    ///
    /// Frames are decoded lazily, so a caller that stops iterating early
    /// never pays for the rest of the stream.
    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, VideoError>> + '_>;

    /// Releases any resources held by the reader.
    fn close(&mut self);
}
