use thiserror::Error;

use crate::shared::constants::{DEFAULT_CONFIRM_FRAMES, DEFAULT_MATCH_THRESHOLD, TRACKER_MAX_MISSED};
use crate::shared::region::DEFAULT_IOU_THRESHOLD;

#[derive(Error, Debug, PartialEq)]
pub enum TrackerConfigError {
    #[error("IoU threshold must be in [0, 1), got {0}")]
    IouThreshold(f64),
    #[error("prune threshold must be at least 1 frame")]
    MaxMissed,
    #[error("match threshold must be positive, got {0}")]
    MatchThreshold(f32),
    #[error("confirmation frame count must be at least 1")]
    ConfirmFrames,
}

/// Tuning for track association and identity confirmation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerConfig {
    /// A detection continues a track only when their IoU is above this.
    pub iou_threshold: f64,
    /// Consecutive unseen frames after which a track is pruned.
    pub max_missed: usize,
    /// Embedding distance below which a face matches a registered person.
    pub match_threshold: f32,
    /// Consecutive frames a track must match the same person before the
    /// identity is confirmed.
    pub confirm_frames: usize,
}

impl TrackerConfig {
    pub fn new(
        iou_threshold: f64,
        max_missed: usize,
        match_threshold: f32,
        confirm_frames: usize,
    ) -> Result<Self, TrackerConfigError> {
        let config = Self {
            iou_threshold,
            max_missed,
            match_threshold,
            confirm_frames,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TrackerConfigError> {
        if !(0.0..1.0).contains(&self.iou_threshold) {
            return Err(TrackerConfigError::IouThreshold(self.iou_threshold));
        }
        if self.max_missed == 0 {
            return Err(TrackerConfigError::MaxMissed);
        }
        if !(self.match_threshold > 0.0) {
            return Err(TrackerConfigError::MatchThreshold(self.match_threshold));
        }
        if self.confirm_frames == 0 {
            return Err(TrackerConfigError::ConfirmFrames);
        }
        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_missed: TRACKER_MAX_MISSED,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            confirm_frames: DEFAULT_CONFIRM_FRAMES,
        }
    }
}
