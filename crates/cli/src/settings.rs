use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use facecloak_core::detection::infrastructure::onnx_yolo_detector::DEFAULT_CONFIDENCE;
use facecloak_core::shared::constants::{
    DEFAULT_BLUR_STRENGTH, DEFAULT_CONFIRM_FRAMES, DEFAULT_MATCH_THRESHOLD, TRACKER_MAX_MISSED,
};
use facecloak_core::shared::region::DEFAULT_IOU_THRESHOLD;

/// Defaults for CLI flags, stored as JSON in the platform config directory.
///
/// Missing fields take their default so older files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub confidence: f64,
    pub blur_strength: f64,
    pub iou_threshold: f64,
    pub max_missed: usize,
    pub match_threshold: f32,
    pub confirm_frames: usize,
    /// Where to fetch models missing from the cache.
    pub detector_url: Option<String>,
    pub embedder_url: Option<String>,
    /// Extra directory searched for model files.
    pub model_dir: Option<PathBuf>,
    pub registry_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE,
            blur_strength: DEFAULT_BLUR_STRENGTH,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_missed: TRACKER_MAX_MISSED,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            confirm_frames: DEFAULT_CONFIRM_FRAMES,
            detector_url: None,
            embedder_url: None,
            model_dir: None,
            registry_path: None,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("FaceCloak").join("settings.json"))
    }

    /// Settings from the default location, or defaults if there are none.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// An unreadable or malformed file is logged and replaced by defaults.
    pub fn load_from(path: &Path) -> Self {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                log::warn!("Cannot read {}: {e}", path.display());
                return Self::default();
            }
        };
        serde_json::from_str(&json).unwrap_or_else(|e| {
            log::warn!("Ignoring malformed settings in {}: {e}", path.display());
            Self::default()
        })
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, json)
    }
}
