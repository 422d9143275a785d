//! Resource loading for `@resource` and `@include`

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("resource '{0}' not found")]
    NotFound(String),

    #[error("resource '{0}' resolves outside the resource root")]
    OutsideRoot(String),

    #[error("failed to read resource '{id}': {source}")]
    Io {
        id: String,
        #[source]
        source: io::Error,
    },
}

/// Loads named text resources
pub trait ResourceLoader: Send + Sync {
    fn load(&self, id: &str) -> Result<String, LoadError>;
}

/// Loads resources from files below a root directory
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, id: &str) -> Result<PathBuf, LoadError> {
        let relative = Path::new(id);
        let escapes = relative.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if escapes {
            return Err(LoadError::OutsideRoot(id.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl ResourceLoader for FsLoader {
    fn load(&self, id: &str) -> Result<String, LoadError> {
        let path = self.resolve(id)?;
        tracing::debug!(resource = id, path = %path.display(), "reading resource file");
        std::fs::read_to_string(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LoadError::NotFound(id.to_string()),
            _ => LoadError::Io {
                id: id.to_string(),
                source,
            },
        })
    }
}

/// In-memory resources keyed by identifier
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    entries: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(id, content);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, content: impl Into<String>) {
        self.entries.insert(id.into(), content.into());
    }
}

impl ResourceLoader for MemoryLoader {
    fn load(&self, id: &str) -> Result<String, LoadError> {
        self.entries
            .get(id)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(id.to_string()))
    }
}
