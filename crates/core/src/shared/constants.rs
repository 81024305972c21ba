pub const DETECTOR_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";

/// Frames a track may go unseen before it is pruned (~1 second at 30 fps).
pub const TRACKER_MAX_MISSED: usize = 30;

/// Consecutive matching frames needed before a track's identity is trusted.
pub const DEFAULT_CONFIRM_FRAMES: usize = 3;

/// Euclidean distance between L2-normalised embeddings below which two faces
/// are considered the same person.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 1.0;

/// Blur kernel size as a fraction of the smaller box side.
pub const DEFAULT_BLUR_STRENGTH: f64 = 0.5;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];

/// File name stem used when a finished output is promoted to a user folder.
pub const PROMOTED_FILE_PREFIX: &str = "output_video";
