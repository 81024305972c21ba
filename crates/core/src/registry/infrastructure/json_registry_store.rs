use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::registry::domain::registry_error::RegistryError;
use crate::registry::domain::registry_store::{RegistrySnapshot, RegistryStore};

/// Stores the registry as pretty-printed JSON.
///
/// Saves go to a temp file in the same directory which is then renamed over
/// the target, so a crash mid-save leaves the previous registry intact.
pub struct JsonRegistryStore {
    path: PathBuf,
}

impl JsonRegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/FaceCloak/registry.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("FaceCloak").join("registry.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence_err(
        &self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> RegistryError {
        RegistryError::Persistence {
            path: self.path.clone(),
            source: source.into(),
        }
    }
}

impl RegistryStore for JsonRegistryStore {
    fn load(&self) -> Result<RegistrySnapshot, RegistryError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No registry at {}, starting empty", self.path.display());
                return Ok(RegistrySnapshot::default());
            }
            Err(e) => return Err(self.persistence_err(e)),
        };
        serde_json::from_str(&json).map_err(|e| self.persistence_err(e))
    }

    fn save(&self, snapshot: &RegistrySnapshot) -> Result<(), RegistryError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| self.persistence_err(e))?;

        let json = serde_json::to_string_pretty(snapshot).map_err(|e| self.persistence_err(e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.persistence_err(e))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.flush())
            .map_err(|e| self.persistence_err(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.persistence_err(e.error))?;

        log::debug!(
            "Saved {} people to {}",
            snapshot.people.len(),
            self.path.display()
        );
        Ok(())
    }
}
