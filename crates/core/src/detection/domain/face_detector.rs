use crate::detection::domain::detection_error::DetectionError;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Domain interface for face detection.
///
/// Detectors are stateless from the caller's point of view and may be
/// shared between concurrent jobs and the enrolment flow.
pub trait FaceDetector: Send + Sync {
    /// Face boxes in frame coordinates, ordered left to right (ties broken
    /// top to bottom). Boxes may extend past the frame edges.
    fn detect_faces(&self, frame: &Frame) -> Result<Vec<Region>, DetectionError>;
}

/// Sorts boxes into the left-to-right order detectors promise.
pub fn sort_left_to_right(regions: &mut [Region]) {
    regions.sort_by_key(|r| (r.x, r.y, r.width, r.height));
}
