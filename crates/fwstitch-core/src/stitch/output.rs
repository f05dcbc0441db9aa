//! Stitched container output
//!
//! Outputs stay in memory until the whole tree has stitched. Writing then
//! goes through a temporary file in the destination directory followed by a
//! rename, so a failed build never leaves a truncated image behind or
//! replaces a previously good one.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::info;

use crate::error::{Error, Result};

/// Containers stitched from one tree, in declaration order
#[derive(Debug, Clone)]
pub struct StitchOutput {
    containers: Vec<(String, Rc<[u8]>)>,
}

impl StitchOutput {
    pub(crate) fn new(containers: Vec<(String, Rc<[u8]>)>) -> Self {
        Self { containers }
    }

    /// Output of the named container
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.containers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| &data[..])
    }

    /// Name of the final (last declared) container
    pub fn final_name(&self) -> Option<&str> {
        self.containers.last().map(|(name, _)| name.as_str())
    }

    /// Bytes of the final (last declared) container
    pub fn final_image(&self) -> Option<&[u8]> {
        self.containers.last().map(|(_, data)| &data[..])
    }

    /// All containers in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.containers
            .iter()
            .map(|(name, data)| (name.as_str(), &data[..]))
    }

    /// Write the outputs to `dir`
    ///
    /// The final image is always written, and written last. Intermediate
    /// containers are written before it when `intermediates` is set.
    /// Returns the written paths in write order.
    pub fn write(&self, dir: &Path, intermediates: bool) -> Result<Vec<PathBuf>> {
        let Some((final_name, final_data)) = self.containers.last() else {
            return Ok(Vec::new());
        };

        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

        let mut written = Vec::new();
        if intermediates {
            for (name, data) in &self.containers[..self.containers.len() - 1] {
                written.push(write_atomic(&dir.join(name), data)?);
            }
        }
        written.push(write_atomic(&dir.join(final_name), final_data)?);

        info!(
            "Wrote {} ({} bytes) to {}",
            final_name,
            final_data.len(),
            dir.display()
        );
        Ok(written)
    }
}

/// Replace `path` with `data` without exposing a partially written file
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<PathBuf> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    tmp.write_all(data).map_err(|e| Error::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| Error::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(path.to_path_buf())
}
