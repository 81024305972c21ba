use std::sync::Arc;

use crate::detection::domain::face_embedder::FaceEmbedder;
use crate::registry::face_registry::FaceRegistry;
use crate::shared::face_id::FaceId;
use crate::shared::frame::Frame;
use crate::shared::region::Region;
use crate::tracking::domain::identity_lookup::IdentityLookup;

/// Recognises tracked faces by embedding them and matching against the
/// registry.
///
/// The registry is read live, so people added or deleted while a job runs
/// take effect on the next lookup.
pub struct FaceRecognizer {
    embedder: Arc<dyn FaceEmbedder>,
    registry: Arc<FaceRegistry>,
}

impl FaceRecognizer {
    pub fn new(embedder: Arc<dyn FaceEmbedder>, registry: Arc<FaceRegistry>) -> Self {
        Self { embedder, registry }
    }
}

impl IdentityLookup for FaceRecognizer {
    fn identify(&self, frame: &Frame, region: &Region, threshold: f32) -> Option<FaceId> {
        match self.embedder.embed(frame, region) {
            Ok(embedding) => self.registry.find_best_match(&embedding, threshold),
            Err(e) => {
                log::warn!("Frame {}: face embedding failed: {e}", frame.index());
                None
            }
        }
    }

    fn is_registered(&self, face_id: FaceId) -> bool {
        self.registry.contains(face_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::embedding::Embedding;
    use crate::test_support::{solid_frame, StubEmbedder};

    fn recognizer(registry: &Arc<FaceRegistry>) -> FaceRecognizer {
        FaceRecognizer::new(Arc::new(StubEmbedder), Arc::clone(registry))
    }

    #[test]
    fn test_identifies_registered_face() {
        let registry = Arc::new(FaceRegistry::new());
        let red = registry.add_person("Red").face_id;
        registry
            .add_embedding(red, "red.png", Embedding::new(vec![1.0, 0.0, 0.0]))
            .unwrap();

        let frame = solid_frame(0, 32, 32, [255, 0, 0]);
        let found = recognizer(&registry).identify(&frame, &Region::new(4, 4, 10, 10), 0.2);
        assert_eq!(found, Some(red));
    }

    #[test]
    fn test_unknown_face_is_none() {
        let registry = Arc::new(FaceRegistry::new());
        let red = registry.add_person("Red").face_id;
        registry
            .add_embedding(red, "red.png", Embedding::new(vec![1.0, 0.0, 0.0]))
            .unwrap();

        let frame = solid_frame(0, 32, 32, [0, 0, 255]);
        assert_eq!(
            recognizer(&registry).identify(&frame, &Region::new(4, 4, 10, 10), 0.2),
            None
        );
    }

    #[test]
    fn test_threshold_comes_from_caller() {
        let registry = Arc::new(FaceRegistry::new());
        let red = registry.add_person("Red").face_id;
        registry
            .add_embedding(red, "red.png", Embedding::new(vec![0.9, 0.1, 0.1]))
            .unwrap();

        let frame = solid_frame(0, 32, 32, [255, 0, 0]);
        let region = Region::new(4, 4, 10, 10);
        let recognizer = recognizer(&registry);
        assert_eq!(recognizer.identify(&frame, &region, 10.0), Some(red));
        assert_eq!(recognizer.identify(&frame, &region, 1e-6), None);
    }

    #[test]
    fn test_embedding_failure_is_none() {
        let registry = Arc::new(FaceRegistry::new());
        let frame = solid_frame(0, 32, 32, [255, 0, 0]);
        // Box entirely outside the frame.
        assert_eq!(
            recognizer(&registry).identify(&frame, &Region::new(100, 100, 10, 10), 0.2),
            None
        );
    }

    #[test]
    fn test_sees_registry_changes() {
        let registry = Arc::new(FaceRegistry::new());
        let id = registry.add_person("Ada").face_id;
        let recognizer = recognizer(&registry);
        assert!(recognizer.is_registered(id));
        registry.delete_person(id).unwrap();
        assert!(!recognizer.is_registered(id));
    }
}
