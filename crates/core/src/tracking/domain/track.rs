use crate::filtering::domain::filter_action::FilterAction;
use crate::shared::face_id::FaceId;
use crate::shared::region::Region;

/// Lifecycle of a track: `New → Tracked → (Tracked | Lost) → Pruned`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackState {
    /// Created from an unmatched detection this frame.
    New,
    /// Matched a detection this frame.
    Tracked,
    /// Not seen this frame, still within the prune threshold.
    Lost,
    /// Unseen for too long; removed from the tracker.
    Pruned,
}

/// A face followed across frames.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub track_id: u64,
    pub bounding_box: Region,
    pub state: TrackState,
    pub frames_since_seen: usize,
    pub confirmed_identity: Option<FaceId>,
    pub resolved_action: FilterAction,
    /// Person matched on the most recent consecutive frames, with the
    /// streak length.
    pub(crate) candidate: Option<(FaceId, usize)>,
}

impl Track {
    pub(crate) fn new(track_id: u64, bounding_box: Region) -> Self {
        Self {
            track_id,
            bounding_box,
            state: TrackState::New,
            frames_since_seen: 0,
            confirmed_identity: None,
            resolved_action: FilterAction::Unresolved,
            candidate: None,
        }
    }

    /// New or Tracked: the face is in the current frame.
    pub fn is_visible(&self) -> bool {
        matches!(self.state, TrackState::New | TrackState::Tracked)
    }
}
