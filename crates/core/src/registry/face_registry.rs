use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::detection::domain::embedding::Embedding;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_embedder::FaceEmbedder;
use crate::registry::domain::image_source::ImageSource;
use crate::registry::domain::person::Person;
use crate::registry::domain::registry_error::RegistryError;
use crate::registry::domain::registry_store::RegistrySnapshot;
use crate::shared::face_id::FaceId;
use crate::shared::frame::Frame;
use crate::video::infrastructure::image_loader;

#[derive(Debug, Default)]
struct RegistryState {
    people: BTreeMap<FaceId, Person>,
    next_id: u64,
}

/// Outcome of [`FaceRegistry::enroll_images`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnrollmentReport {
    pub accepted: Vec<String>,
    /// Images without exactly one detectable face.
    pub rejected: Vec<String>,
    pub canceled: bool,
}

/// Process-wide store of registered people.
///
/// Reads run concurrently; writes are serialised by an `RwLock`. Model
/// inference for enrolment happens outside the lock so running jobs are
/// never blocked by it.
#[derive(Debug, Default)]
pub struct FaceRegistry {
    state: RwLock<RegistryState>,
}

impl FaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a registry from its persisted form. The id counter is bumped
    /// past every stored id in case the snapshot was edited by hand.
    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Self {
        let max_id = snapshot.people.iter().map(|p| p.face_id.0).max();
        let next_id = snapshot
            .next_face_id
            .max(max_id.map_or(0, |id| id.saturating_add(1)));
        let people = snapshot
            .people
            .into_iter()
            .map(|p| (p.face_id, p))
            .collect();
        Self {
            state: RwLock::new(RegistryState { people, next_id }),
        }
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let state = self.read();
        RegistrySnapshot {
            next_face_id: state.next_id,
            people: state.people.values().cloned().collect(),
        }
    }

    pub fn add_person(&self, name: &str) -> Person {
        let mut state = self.write();
        let face_id = FaceId(state.next_id);
        state.next_id += 1;
        let person = Person::new(face_id, name);
        state.people.insert(face_id, person.clone());
        log::info!("Registered person {face_id} ({name})");
        person
    }

    pub fn delete_person(&self, face_id: FaceId) -> Result<Person, RegistryError> {
        let removed = self
            .write()
            .people
            .remove(&face_id)
            .ok_or(RegistryError::NotFound(face_id))?;
        log::info!("Deleted person {face_id}");
        Ok(removed)
    }

    pub fn rename_person(&self, face_id: FaceId, new_name: &str) -> Result<(), RegistryError> {
        let mut state = self.write();
        let person = state
            .people
            .get_mut(&face_id)
            .ok_or(RegistryError::NotFound(face_id))?;
        person.face_name = new_name.to_string();
        Ok(())
    }

    /// Embeds the single face in `image` and stores it for `face_id`.
    ///
    /// Returns `Ok(false)` when the image holds no face, more than one face,
    /// or the models fail on it. Re-adding a reference replaces its encoding.
    pub fn add_encoding(
        &self,
        face_id: FaceId,
        image: ImageSource<'_>,
        detector: &dyn FaceDetector,
        embedder: &dyn FaceEmbedder,
    ) -> Result<bool, RegistryError> {
        if !self.contains(face_id) {
            return Err(RegistryError::NotFound(face_id));
        }

        let reference = image.reference();
        let frame = decode(&image, &reference)?;
        let Some(embedding) = single_face_embedding(&frame, &reference, detector, embedder) else {
            return Ok(false);
        };

        self.add_embedding(face_id, &reference, embedding)?;
        Ok(true)
    }

    /// Stores a precomputed embedding under `reference`.
    pub fn add_embedding(
        &self,
        face_id: FaceId,
        reference: &str,
        embedding: Embedding,
    ) -> Result<(), RegistryError> {
        let mut state = self.write();
        let person = state
            .people
            .get_mut(&face_id)
            .ok_or(RegistryError::NotFound(face_id))?;
        person
            .encoding_list
            .insert(reference.to_string(), embedding);
        Ok(())
    }

    pub fn remove_encoding(&self, face_id: FaceId, reference: &str) -> Result<(), RegistryError> {
        let mut state = self.write();
        let person = state
            .people
            .get_mut(&face_id)
            .ok_or(RegistryError::NotFound(face_id))?;
        person
            .encoding_list
            .remove(reference)
            .map(|_| ())
            .ok_or_else(|| RegistryError::EncodingNotFound {
                face_id,
                reference: reference.to_string(),
            })
    }

    /// The person whose closest encoding is nearer than `threshold` and
    /// strictly nearer than every other person's closest encoding.
    ///
    /// Ties and people without encodings yield no match.
    pub fn find_best_match(&self, embedding: &Embedding, threshold: f32) -> Option<FaceId> {
        let state = self.read();
        let mut best: Option<(FaceId, f32)> = None;
        let mut tied = false;

        for person in state.people.values() {
            let Some(d) = person.min_distance(embedding) else {
                continue;
            };
            match best {
                Some((_, best_d)) if d == best_d => tied = true,
                Some((_, best_d)) if d > best_d => {}
                _ => {
                    best = Some((person.face_id, d));
                    tied = false;
                }
            }
        }

        match best {
            Some((face_id, d)) if !tied && d < threshold => Some(face_id),
            _ => None,
        }
    }

    /// Adds encodings from several images in order, checking `is_canceled`
    /// before each one.
    pub fn enroll_images(
        &self,
        face_id: FaceId,
        images: &[ImageSource<'_>],
        detector: &dyn FaceDetector,
        embedder: &dyn FaceEmbedder,
        is_canceled: &dyn Fn() -> bool,
    ) -> Result<EnrollmentReport, RegistryError> {
        let mut report = EnrollmentReport::default();
        for image in images {
            if is_canceled() {
                log::info!("Enrolment for {face_id} canceled");
                report.canceled = true;
                break;
            }
            let reference = image.reference();
            if self.add_encoding(face_id, *image, detector, embedder)? {
                report.accepted.push(reference);
            } else {
                report.rejected.push(reference);
            }
        }
        Ok(report)
    }

    pub fn get(&self, face_id: FaceId) -> Option<Person> {
        self.read().people.get(&face_id).cloned()
    }

    pub fn contains(&self, face_id: FaceId) -> bool {
        self.read().people.contains_key(&face_id)
    }

    /// Every registered person, ordered by face id.
    pub fn people(&self) -> Vec<Person> {
        self.read().people.values().cloned().collect()
    }

    pub fn find_by_name(&self, name: &str) -> Vec<Person> {
        self.read()
            .people
            .values()
            .filter(|p| p.face_name == name)
            .cloned()
            .collect()
    }

    pub fn encoding_references(&self, face_id: FaceId) -> Result<Vec<String>, RegistryError> {
        self.read()
            .people
            .get(&face_id)
            .map(|p| p.encoding_list.keys().cloned().collect())
            .ok_or(RegistryError::NotFound(face_id))
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn decode(image: &ImageSource<'_>, reference: &str) -> Result<Frame, RegistryError> {
    let decoded = match image {
        ImageSource::Path(path) => image_loader::load_frame(path),
        ImageSource::Bytes { data, .. } => image_loader::decode_frame(data),
    };
    decoded.map_err(|source| RegistryError::ImageLoad {
        reference: reference.to_string(),
        source,
    })
}

fn single_face_embedding(
    frame: &Frame,
    reference: &str,
    detector: &dyn FaceDetector,
    embedder: &dyn FaceEmbedder,
) -> Option<Embedding> {
    let faces = match detector.detect_faces(frame) {
        Ok(faces) => faces,
        Err(e) => {
            log::warn!("Face detection failed on {reference}: {e}");
            return None;
        }
    };
    if faces.len() != 1 {
        log::info!(
            "Skipping {reference}: expected one face, found {}",
            faces.len()
        );
        return None;
    }
    match embedder.embed(frame, &faces[0]) {
        Ok(embedding) => Some(embedding),
        Err(e) => {
            log::warn!("Face embedding failed on {reference}: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{encode_png, StubDetector, StubEmbedder};
    use std::cell::Cell;

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    fn registry_with(people: &[(&str, &[&[f32]])]) -> (FaceRegistry, Vec<FaceId>) {
        let registry = FaceRegistry::new();
        let ids = people
            .iter()
            .map(|(name, encodings)| {
                let id = registry.add_person(name).face_id;
                for (i, e) in encodings.iter().enumerate() {
                    registry.add_embedding(id, &format!("{name}-{i}"), emb(e)).unwrap();
                }
                id
            })
            .collect();
        (registry, ids)
    }

    // ── People ───────────────────────────────────────────────────────

    #[test]
    fn test_add_person_assigns_increasing_ids() {
        let registry = FaceRegistry::new();
        let a = registry.add_person("Ada");
        let b = registry.add_person("Ada");
        assert!(b.face_id > a.face_id);
        assert!(a.encoding_list.is_empty());
        assert_eq!(registry.find_by_name("Ada").len(), 2);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let registry = FaceRegistry::new();
        let a = registry.add_person("Ada").face_id;
        registry.delete_person(a).unwrap();
        let b = registry.add_person("Bob").face_id;
        assert_ne!(a, b);
    }

    #[test]
    fn test_delete_twice_fails() {
        let registry = FaceRegistry::new();
        let id = registry.add_person("Ada").face_id;
        assert!(registry.delete_person(id).is_ok());
        assert!(matches!(
            registry.delete_person(id),
            Err(RegistryError::NotFound(missing)) if missing == id
        ));
    }

    #[test]
    fn test_rename() {
        let registry = FaceRegistry::new();
        let id = registry.add_person("Ada").face_id;
        registry.rename_person(id, "Ada L.").unwrap();
        assert_eq!(registry.get(id).unwrap().face_name, "Ada L.");
        assert!(matches!(
            registry.rename_person(FaceId(999), "x"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn test_people_ordered_by_id() {
        let registry = FaceRegistry::new();
        let names = ["c", "a", "b"];
        for n in names {
            registry.add_person(n);
        }
        let listed: Vec<_> = registry.people().into_iter().map(|p| p.face_name).collect();
        assert_eq!(listed, names);
    }

    // ── Encodings ────────────────────────────────────────────────────

    #[test]
    fn test_add_encoding_single_face() {
        let registry = FaceRegistry::new();
        let id = registry.add_person("Ada").face_id;
        let png = encode_png(8, 8, [10, 20, 30]);

        let added = registry
            .add_encoding(
                id,
                ImageSource::Bytes {
                    key: "ada.png",
                    data: &png,
                },
                &StubDetector::faces(1),
                &StubEmbedder,
            )
            .unwrap();

        assert!(added);
        assert_eq!(registry.encoding_references(id).unwrap(), vec!["ada.png"]);
    }

    #[test]
    fn test_add_encoding_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ada.png");
        std::fs::write(&path, encode_png(8, 8, [10, 20, 30])).unwrap();
        let registry = FaceRegistry::new();
        let id = registry.add_person("Ada").face_id;

        let added = registry
            .add_encoding(
                id,
                ImageSource::Path(&path),
                &StubDetector::faces(1),
                &StubEmbedder,
            )
            .unwrap();
        assert!(added);
        assert_eq!(
            registry.encoding_references(id).unwrap(),
            vec![path.to_string_lossy().into_owned()]
        );
    }

    #[test]
    fn test_add_encoding_soft_fails_on_zero_or_many_faces() {
        let registry = FaceRegistry::new();
        let id = registry.add_person("Ada").face_id;
        let png = encode_png(8, 8, [10, 20, 30]);
        let image = ImageSource::Bytes {
            key: "group.png",
            data: &png,
        };

        for detector in [StubDetector::faces(0), StubDetector::faces(2), StubDetector::failing()] {
            assert!(!registry
                .add_encoding(id, image, &detector, &StubEmbedder)
                .unwrap());
        }
        assert!(registry.encoding_references(id).unwrap().is_empty());
    }

    #[test]
    fn test_add_encoding_unknown_person() {
        let registry = FaceRegistry::new();
        let png = encode_png(8, 8, [0, 0, 0]);
        let result = registry.add_encoding(
            FaceId(5),
            ImageSource::Bytes {
                key: "x",
                data: &png,
            },
            &StubDetector::faces(1),
            &StubEmbedder,
        );
        assert!(matches!(result, Err(RegistryError::NotFound(FaceId(5)))));
    }

    #[test]
    fn test_add_encoding_undecodable_image() {
        let registry = FaceRegistry::new();
        let id = registry.add_person("Ada").face_id;
        let result = registry.add_encoding(
            id,
            ImageSource::Bytes {
                key: "junk",
                data: b"junk",
            },
            &StubDetector::faces(1),
            &StubEmbedder,
        );
        assert!(matches!(result, Err(RegistryError::ImageLoad { .. })));
    }

    #[test]
    fn test_remove_encoding() {
        let (registry, ids) = registry_with(&[("Ada", &[&[0.0], &[1.0]])]);
        registry.remove_encoding(ids[0], "Ada-0").unwrap();
        assert_eq!(registry.encoding_references(ids[0]).unwrap(), vec!["Ada-1"]);
        assert!(matches!(
            registry.remove_encoding(ids[0], "Ada-0"),
            Err(RegistryError::EncodingNotFound { .. })
        ));
    }

    // ── Matching ─────────────────────────────────────────────────────

    #[test]
    fn test_find_best_match_picks_nearest_person() {
        let (registry, ids) = registry_with(&[
            ("Ada", &[&[0.0, 0.0], &[0.9, 0.0]]),
            ("Bob", &[&[1.0, 0.0]]),
        ]);
        assert_eq!(registry.find_best_match(&emb(&[0.93, 0.0]), 0.5), Some(ids[0]));
        assert_eq!(registry.find_best_match(&emb(&[0.1, 0.0]), 0.5), Some(ids[0]));
    }

    #[test]
    fn test_find_best_match_respects_threshold() {
        let (registry, _) = registry_with(&[("Ada", &[&[0.0, 0.0]])]);
        assert_eq!(registry.find_best_match(&emb(&[0.5, 0.0]), 0.5), None);
        assert!(registry.find_best_match(&emb(&[0.49, 0.0]), 0.5).is_some());
    }

    #[test]
    fn test_find_best_match_tie_is_no_match() {
        let (registry, _) = registry_with(&[("Ada", &[&[0.0, 0.0]]), ("Bob", &[&[1.0, 0.0]])]);
        assert_eq!(registry.find_best_match(&emb(&[0.5, 0.0]), 1.0), None);
    }

    #[test]
    fn test_find_best_match_skips_people_without_encodings() {
        let (registry, ids) = registry_with(&[("Empty", &[]), ("Bob", &[&[1.0]])]);
        assert_eq!(registry.find_best_match(&emb(&[1.0]), 0.5), Some(ids[1]));
        assert_eq!(FaceRegistry::new().find_best_match(&emb(&[1.0]), 0.5), None);
    }

    #[test]
    fn test_find_best_match_while_person_is_deleted() {
        let (registry, ids) = registry_with(&[
            ("Ada", &[&[1.0, 0.0, 0.0]]),
            ("Bob", &[&[0.0, 1.0, 0.0]]),
        ]);
        let (ada, bob) = (ids[0], ids[1]);
        let query = emb(&[1.0, 0.0, 0.0]);
        let (shared, query_ref) = (&registry, &query);

        std::thread::scope(|s| {
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(move || {
                        let mut seen_gone = false;
                        for _ in 0..2_000 {
                            match shared.find_best_match(query_ref, 0.5) {
                                Some(id) => {
                                    assert_eq!(id, ada);
                                    // Once gone, Ada never comes back.
                                    assert!(!seen_gone);
                                }
                                None => seen_gone = true,
                            }
                        }
                    })
                })
                .collect();

            s.spawn(move || {
                std::thread::yield_now();
                shared.delete_person(ada).unwrap();
            });

            for reader in readers {
                reader.join().unwrap();
            }
        });

        assert_eq!(registry.find_best_match(&query, 0.5), None);
        assert!(registry.contains(bob));
    }

    #[test]
    fn test_find_best_match_is_deterministic() {
        let (registry, _) = registry_with(&[
            ("Ada", &[&[0.0, 0.1]]),
            ("Bob", &[&[0.1, 0.0]]),
            ("Cy", &[&[0.3, 0.3]]),
        ]);
        let query = emb(&[0.05, 0.04]);
        let first = registry.find_best_match(&query, 1.0);
        for _ in 0..20 {
            assert_eq!(registry.find_best_match(&query, 1.0), first);
        }
    }

    // ── Enrolment and snapshots ──────────────────────────────────────

    #[test]
    fn test_enroll_images_reports_and_cancels() {
        let registry = FaceRegistry::new();
        let id = registry.add_person("Ada").face_id;
        let pngs: Vec<Vec<u8>> = (0..3).map(|i| encode_png(4, 4, [i * 50, 0, 0])).collect();
        let keys = ["a", "b", "c"];
        let images: Vec<_> = keys
            .iter()
            .zip(&pngs)
            .map(|(key, data)| ImageSource::Bytes { key, data })
            .collect();

        let calls = Cell::new(0);
        let report = registry
            .enroll_images(id, &images, &StubDetector::faces(1), &StubEmbedder, &|| {
                calls.set(calls.get() + 1);
                calls.get() > 2
            })
            .unwrap();

        assert_eq!(report.accepted, vec!["a", "b"]);
        assert!(report.rejected.is_empty());
        assert!(report.canceled);
    }

    #[test]
    fn test_enroll_images_collects_rejections() {
        let registry = FaceRegistry::new();
        let id = registry.add_person("Ada").face_id;
        let png = encode_png(4, 4, [1, 2, 3]);
        let images = [ImageSource::Bytes {
            key: "crowd",
            data: &png,
        }];
        let report = registry
            .enroll_images(id, &images, &StubDetector::faces(3), &StubEmbedder, &|| false)
            .unwrap();
        assert_eq!(report.rejected, vec!["crowd"]);
        assert!(!report.canceled);
    }

    #[test]
    fn test_snapshot_roundtrip_keeps_id_counter() {
        let (registry, ids) = registry_with(&[("Ada", &[&[0.5]]), ("Bob", &[])]);
        registry.delete_person(ids[1]).unwrap();

        let restored = FaceRegistry::from_snapshot(registry.snapshot());
        assert_eq!(restored.people(), registry.people());
        let next = restored.add_person("Cy").face_id;
        assert!(next > ids[1]);
    }

    #[test]
    fn test_from_snapshot_repairs_stale_counter() {
        let snapshot = RegistrySnapshot {
            next_face_id: 0,
            people: vec![Person::new(FaceId(7), "Ada")],
        };
        let registry = FaceRegistry::from_snapshot(snapshot);
        assert_eq!(registry.add_person("Bob").face_id, FaceId(8));
    }
}
