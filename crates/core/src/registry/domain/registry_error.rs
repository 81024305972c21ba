use std::path::PathBuf;

use thiserror::Error;

use crate::shared::face_id::FaceId;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("no person with face id {0}")]
    NotFound(FaceId),
    #[error("person {face_id} has no encoding for {reference}")]
    EncodingNotFound { face_id: FaceId, reference: String },
    #[error("failed to load image {reference}: {source}")]
    ImageLoad {
        reference: String,
        #[source]
        source: image::ImageError,
    },
    #[error("registry storage error at {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
