//! Artifact lookup
//!
//! Raw region sources are looked up by name, first among blobs registered
//! in memory during the build (such as the reset vector produced by the
//! pre-stitch hook), then in each search directory in order.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::trace;

use crate::error::{Error, Result};

/// Resolves artifact names to bytes
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    blobs: HashMap<String, Vec<u8>>,
    dirs: Vec<PathBuf>,
}

impl ArtifactStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store searching the given directories in order
    pub fn with_dirs<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            blobs: HashMap::new(),
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a search directory
    pub fn add_dir(&mut self, dir: impl Into<PathBuf>) {
        self.dirs.push(dir.into());
    }

    /// Register an in-memory artifact, shadowing any file of the same name
    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.blobs.insert(name.into(), data);
    }

    /// Find the file backing `name`, if it is not an in-memory blob
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        self.dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Check whether `name` can be resolved
    pub fn contains(&self, name: &str) -> bool {
        self.blobs.contains_key(name) || self.locate(name).is_some()
    }

    /// Load the bytes of `name`
    ///
    /// Returns `Ok(None)` when the artifact does not exist anywhere.
    pub fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        if let Some(data) = self.blobs.get(name) {
            trace!("Artifact {} resolved from memory ({} bytes)", name, data.len());
            return Ok(Some(data.clone()));
        }

        for dir in &self.dirs {
            let path = dir.join(name);
            match fs::read(&path) {
                Ok(data) => {
                    trace!("Artifact {} resolved from {} ({} bytes)", name, path.display(), data.len());
                    return Ok(Some(data));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::io(path, e)),
            }
        }

        Ok(None)
    }
}

/// Read a file that must exist
pub(crate) fn read_required(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::io(path, e))
}
