use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::filtering::domain::sticker_asset::StickerAsset;
use crate::shared::constants::DEFAULT_BLUR_STRENGTH;
use crate::shared::face_id::FaceId;

#[derive(Error, Debug, PartialEq)]
pub enum FilterConfigError {
    #[error("blur strength must be in (0, 1], got {0}")]
    BlurStrength(f64),
}

/// Which action faces receive during a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FilterMode {
    #[default]
    BlurAll,
    PixelateAll,
    /// Recognised people get their sticker; everyone else is blurred.
    IdentityAware,
}

/// Immutable per-run filter selection.
///
/// Sticker assets are shared behind `Arc` so several concurrent jobs can
/// reuse the same decoded images.
#[derive(Clone, Debug)]
pub struct FilterConfig {
    mode: FilterMode,
    blur_strength: f64,
    stickers: HashMap<FaceId, Arc<StickerAsset>>,
}

impl FilterConfig {
    pub fn new(mode: FilterMode) -> Self {
        Self {
            mode,
            blur_strength: DEFAULT_BLUR_STRENGTH,
            stickers: HashMap::new(),
        }
    }

    /// Blur kernel size as a fraction of the smaller box side.
    pub fn with_blur_strength(mut self, strength: f64) -> Result<Self, FilterConfigError> {
        if !(strength > 0.0 && strength <= 1.0) {
            return Err(FilterConfigError::BlurStrength(strength));
        }
        self.blur_strength = strength;
        Ok(self)
    }

    pub fn with_sticker(mut self, face_id: FaceId, asset: Arc<StickerAsset>) -> Self {
        self.stickers.insert(face_id, asset);
        self
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn blur_strength(&self) -> f64 {
        self.blur_strength
    }

    pub fn sticker(&self, face_id: FaceId) -> Option<&Arc<StickerAsset>> {
        self.stickers.get(&face_id)
    }

    pub fn stickers(&self) -> &HashMap<FaceId, Arc<StickerAsset>> {
        &self.stickers
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::new(FilterMode::default())
    }
}
