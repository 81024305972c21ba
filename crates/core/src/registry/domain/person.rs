use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::detection::domain::embedding::Embedding;
use crate::shared::face_id::FaceId;

/// A registered person and the face encodings enrolled for them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub face_id: FaceId,
    pub face_name: String,
    /// Image reference (file path or caller-chosen key) → embedding.
    #[serde(default)]
    pub encoding_list: BTreeMap<String, Embedding>,
}

impl Person {
    pub fn new(face_id: FaceId, face_name: impl Into<String>) -> Self {
        Self {
            face_id,
            face_name: face_name.into(),
            encoding_list: BTreeMap::new(),
        }
    }

    /// Smallest distance from `embedding` to any of this person's encodings,
    /// or `None` when nothing is enrolled yet.
    pub fn min_distance(&self, embedding: &Embedding) -> Option<f32> {
        self.encoding_list
            .values()
            .map(|e| e.distance(embedding))
            .min_by(f32::total_cmp)
    }
}
