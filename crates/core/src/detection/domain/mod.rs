pub mod detection_error;
pub mod embedding;
pub mod face_detector;
pub mod face_embedder;
