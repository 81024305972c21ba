/// Greedy IoU tracker with identity confirmation.
///
/// Each frame, existing tracks are offered detections in ascending
/// `track_id` order; a track takes the unclaimed detection with the highest
/// IoU above the threshold. Unclaimed detections start new tracks. Tracks
/// unseen for `max_missed` consecutive frames are pruned.
///
/// In identity-aware mode, a track is embedded every frame until the same
/// person matches on `confirm_frames` consecutive frames. At most one
/// visible track holds a given identity at a time.
use crate::filtering::domain::filter_action::FilterAction;
use crate::filtering::domain::filter_config::FilterMode;
use crate::shared::face_id::FaceId;
use crate::shared::frame::Frame;
use crate::shared::region::Region;
use crate::tracking::domain::identity_lookup::IdentityLookup;
use crate::tracking::domain::track::{Track, TrackState};
use crate::tracking::domain::tracker_config::TrackerConfig;

/// A face visible in the current frame and what to draw over it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackedFace {
    pub track_id: u64,
    pub region: Region,
    pub action: FilterAction,
}

pub struct FaceTracker {
    config: TrackerConfig,
    tracks: Vec<Track>,
    next_id: u64,
}

impl FaceTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Live tracks (New, Tracked or Lost), ordered by `track_id`.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Drops all tracks. Track ids keep increasing across resets.
    pub fn reset(&mut self) {
        self.tracks.clear();
    }

    /// Advances the tracker by one frame.
    ///
    /// `detections` are this frame's face boxes; their order breaks IoU
    /// ties. `identity` is consulted only in [`FilterMode::IdentityAware`].
    pub fn update(
        &mut self,
        frame: &Frame,
        detections: &[Region],
        mode: FilterMode,
        identity: Option<&dyn IdentityLookup>,
    ) -> Vec<TrackedFace> {
        let claimed = self.associate(detections);
        self.age_unmatched();
        self.create_new_tracks(detections, &claimed);

        if let (FilterMode::IdentityAware, Some(lookup)) = (mode, identity) {
            self.resolve_identities(frame, lookup);
        }
        self.resolve_actions(mode);

        self.tracks
            .iter()
            .filter(|t| t.is_visible())
            .map(|t| TrackedFace {
                track_id: t.track_id,
                region: t.bounding_box,
                action: t.resolved_action,
            })
            .collect()
    }

    /// Greedy matching. Returns which detections were claimed.
    fn associate(&mut self, detections: &[Region]) -> Vec<bool> {
        let mut claimed = vec![false; detections.len()];

        for track in &mut self.tracks {
            let mut best: Option<(usize, f64)> = None;
            for (i, det) in detections.iter().enumerate() {
                if claimed[i] {
                    continue;
                }
                let iou = track.bounding_box.iou(det);
                if iou <= self.config.iou_threshold {
                    continue;
                }
                if best.map_or(true, |(_, best_iou)| iou > best_iou) {
                    best = Some((i, iou));
                }
            }

            match best {
                Some((i, _)) => {
                    claimed[i] = true;
                    track.bounding_box = detections[i];
                    track.state = TrackState::Tracked;
                    track.frames_since_seen = 0;
                }
                None => {
                    track.frames_since_seen += 1;
                    // A missed frame breaks the recognition streak.
                    track.candidate = None;
                }
            }
        }

        claimed
    }

    fn age_unmatched(&mut self) {
        let max_missed = self.config.max_missed;
        for track in &mut self.tracks {
            if track.frames_since_seen == 0 {
                continue;
            }
            track.state = if track.frames_since_seen >= max_missed {
                TrackState::Pruned
            } else {
                TrackState::Lost
            };
        }
        self.tracks.retain(|t| {
            if t.state == TrackState::Pruned {
                log::debug!("Pruned track {}", t.track_id);
            }
            t.state != TrackState::Pruned
        });
    }

    fn create_new_tracks(&mut self, detections: &[Region], claimed: &[bool]) {
        for (det, _) in detections.iter().zip(claimed).filter(|&(_, &c)| !c) {
            self.tracks.push(Track::new(self.next_id, *det));
            self.next_id += 1;
        }
    }

    fn resolve_identities(&mut self, frame: &Frame, lookup: &dyn IdentityLookup) {
        for i in 0..self.tracks.len() {
            if !self.tracks[i].is_visible() {
                continue;
            }

            if let Some(face_id) = self.tracks[i].confirmed_identity {
                if lookup.is_registered(face_id) {
                    continue;
                }
                log::warn!(
                    "Track {}: person {face_id} is no longer registered",
                    self.tracks[i].track_id
                );
                self.tracks[i].confirmed_identity = None;
                self.tracks[i].candidate = None;
            }

            let track = &mut self.tracks[i];
            let matched = lookup.identify(frame, &track.bounding_box, self.config.match_threshold);
            track.candidate = match (matched, track.candidate) {
                (Some(id), Some((prev, streak))) if id == prev => Some((id, streak + 1)),
                (Some(id), _) => Some((id, 1)),
                (None, _) => None,
            };

            let candidate = track.candidate;
            if let Some((face_id, streak)) = candidate {
                if streak >= self.config.confirm_frames {
                    self.try_confirm(i, face_id);
                }
            }
        }
    }

    /// Confirms `face_id` on track `index` unless another visible track
    /// already holds it. A Lost holder gives the identity up.
    fn try_confirm(&mut self, index: usize, face_id: FaceId) {
        let holder = self
            .tracks
            .iter()
            .position(|t| t.confirmed_identity == Some(face_id));

        if let Some(h) = holder {
            if self.tracks[h].is_visible() {
                log::debug!(
                    "Track {}: person {face_id} already held by track {}",
                    self.tracks[index].track_id,
                    self.tracks[h].track_id
                );
                return;
            }
            log::debug!(
                "Person {face_id} moves from lost track {} to track {}",
                self.tracks[h].track_id,
                self.tracks[index].track_id
            );
            self.tracks[h].confirmed_identity = None;
        }

        let track = &mut self.tracks[index];
        track.confirmed_identity = Some(face_id);
        log::info!("Track {} confirmed as person {face_id}", track.track_id);
    }

    fn resolve_actions(&mut self, mode: FilterMode) {
        for track in self.tracks.iter_mut().filter(|t| t.is_visible()) {
            track.resolved_action = match mode {
                FilterMode::BlurAll => FilterAction::Blur,
                FilterMode::PixelateAll => FilterAction::Pixelate,
                FilterMode::IdentityAware => track
                    .confirmed_identity
                    .map_or(FilterAction::Blur, FilterAction::Sticker),
            };
        }
    }
}

impl Default for FaceTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
