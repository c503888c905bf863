//! Services registry — the static half of spec.md §9's "source of truth
//! split". Loaded from a YAML document (`SERVICES_CONFIG_PATH`) and held in
//! memory; reloadable on demand, never hot-reloaded mid-request.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::ServiceDefinition;

/// Top-level shape of `services.yaml`.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, Default)]
pub struct ServicesDocument {
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
}

/// The services registry: the parsed document plus the path it was loaded
/// from, so `reload()` doesn't need the path threaded through every caller.
#[derive(Debug, Clone)]
pub struct ServicesConfig {
    path: PathBuf,
    services: Vec<ServiceDefinition>,
}

impl ServicesConfig {
    /// Load from the given path. A missing file is an error — unlike the
    /// runtime env vars, there is no sensible default services list.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let raw = std::fs::read_to_string(&path)?;
        let doc: ServicesDocument = serde_yaml::from_str(&raw)?;
        Ok(Self {
            path,
            services: doc.services,
        })
    }

    /// Re-read the document from disk, replacing the in-memory list.
    pub fn reload(&mut self) -> Result<()> {
        let raw = std::fs::read_to_string(&self.path)?;
        let doc: ServicesDocument = serde_yaml::from_str(&raw)?;
        self.services = doc.services;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn services(&self) -> &[ServiceDefinition] {
        &self.services
    }

    pub fn find(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.name == name)
    }
}

impl TryFrom<&Path> for ServicesConfig {
    type Error = Error;

    fn try_from(path: &Path) -> Result<Self> {
        Self::load(path)
    }
}
