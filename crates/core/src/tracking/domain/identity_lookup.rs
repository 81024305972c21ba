use crate::shared::face_id::FaceId;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Recognition as seen by the tracker.
pub trait IdentityLookup {
    /// The registered person whose face is inside `region` and whose
    /// embedding distance is below `threshold`, if any. Recognition failures
    /// are reported as `None`.
    fn identify(&self, frame: &Frame, region: &Region, threshold: f32) -> Option<FaceId>;

    /// Whether `face_id` is still registered.
    fn is_registered(&self, face_id: FaceId) -> bool;
}
