use crate::detection::domain::detection_error::DetectionError;
use crate::detection::domain::embedding::Embedding;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Domain interface for face recognition models.
pub trait FaceEmbedder: Send + Sync {
    /// Descriptor of the face inside `region` (clamped to the frame).
    /// Fails with [`DetectionError::EmptyRegion`] when no part of the box is
    /// visible.
    fn embed(&self, frame: &Frame, region: &Region) -> Result<Embedding, DetectionError>;
}
