pub mod domain;
pub mod face_tracker;
