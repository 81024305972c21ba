use serde::{Deserialize, Serialize};

use crate::registry::domain::person::Person;
use crate::registry::domain::registry_error::RegistryError;

/// Persisted form of the registry.
///
/// `next_face_id` is stored alongside the people so ids of deleted people
/// are never handed out again after a reload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub next_face_id: u64,
    pub people: Vec<Person>,
}

/// Durable storage for [`RegistrySnapshot`]s.
pub trait RegistryStore: Send + Sync {
    /// Loads the stored registry; an absent store yields an empty snapshot.
    fn load(&self) -> Result<RegistrySnapshot, RegistryError>;

    fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), RegistryError>;
}
