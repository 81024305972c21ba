use std::path::PathBuf;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of the detection and embedding models.
///
/// A job absorbs these per frame: a failed detection counts as a frame with
/// no faces, a failed embedding leaves the track's identity unresolved.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("failed to load model {path}: {source}")]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    #[error("inference failed: {0}")]
    Inference(#[source] BoxError),
    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),
    #[error("face box lies outside the frame")]
    EmptyRegion,
}

impl DetectionError {
    pub fn inference(err: impl Into<BoxError>) -> Self {
        DetectionError::Inference(err.into())
    }
}
