pub mod image_source;
pub mod person;
pub mod registry_error;
pub mod registry_store;
