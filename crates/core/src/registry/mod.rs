pub mod domain;
pub mod face_registry;
pub mod infrastructure;
