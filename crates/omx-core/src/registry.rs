//! Job type registry: maps a workflow name to the launch identity the
//! engine needs. Read-only at orchestration time.

use std::path::Path;

use indexmap::IndexMap;

use crate::error::{OmxError, OmxResult};
use crate::model::RegistryEntry;

pub trait WorkflowRegistry: Send + Sync {
    /// Look up one job type. Absence is a valid outcome, not an error.
    fn entry(&self, job_type: &str) -> Option<RegistryEntry>;

    /// All registered job types, in registration order.
    fn job_types(&self) -> Vec<String>;
}

/// In-memory registry, mainly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    entries: IndexMap<String, RegistryEntry>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, job_type: impl Into<String>, entry: RegistryEntry) {
        self.entries.insert(job_type.into(), entry);
    }
}

impl WorkflowRegistry for MemoryRegistry {
    fn entry(&self, job_type: &str) -> Option<RegistryEntry> {
        self.entries.get(job_type).cloned()
    }

    fn job_types(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Registry backed by a YAML or JSON file mapping job type to entry.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    entries: IndexMap<String, RegistryEntry>,
}

impl FileRegistry {
    pub fn load(path: &Path) -> OmxResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| OmxError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let entries = if is_json {
            serde_json::from_str(&raw).map_err(|source| OmxError::JsonParse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_yaml::from_str(&raw).map_err(|source| OmxError::YamlParse {
                path: path.to_path_buf(),
                source,
            })?
        };

        Ok(Self { entries })
    }
}

impl WorkflowRegistry for FileRegistry {
    fn entry(&self, job_type: &str) -> Option<RegistryEntry> {
        self.entries.get(job_type).cloned()
    }

    fn job_types(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}
