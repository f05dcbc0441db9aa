//! Stitching engine
//!
//! The [`Stitcher`] walks a [`LayoutTree`] depth-first. For every region of
//! a container it resolves the source bytes (recursively stitching a
//! referenced container first), applies the region codec, fits the result
//! to the allocation and concatenates the regions in declaration order.
//!
//! Containers are stitched once per build and memoized, so a container
//! shared by several parents costs a single evaluation. Any region error
//! aborts the container and every container depending on it.

mod artifact;
mod output;

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use log::{debug, info, warn};

use crate::codec::{Codec, Compressor};
use crate::error::{Error, Result};
use crate::region::{Container, InsertPosition, LayoutTree, PaddingPolicy, RegionSpec, Source};

pub use artifact::ArtifactStore;
pub(crate) use artifact::read_required;
pub use output::{write_atomic, StitchOutput};

/// Callback for progress reporting while stitching a tree
pub trait StitchProgress {
    /// Called once before any container is stitched
    fn started(&mut self, containers: usize);

    /// Called after each container, in declaration order
    fn container_done(&mut self, name: &str, len: usize);

    /// Called once after the last container
    fn finished(&mut self);
}

/// A no-op progress reporter
pub struct NoProgress;

impl StitchProgress for NoProgress {
    fn started(&mut self, _containers: usize) {}
    fn container_done(&mut self, _name: &str, _len: usize) {}
    fn finished(&mut self) {}
}

/// Fit resolved region bytes to the region allocation
///
/// `Pad` and a present `Ignore` region fill up to the allocation with
/// `pad_byte`, before the content for [`InsertPosition::Head`] and after it
/// for [`InsertPosition::Tail`]. `NoOp` requires an exact fit.
pub fn place_region(
    container: &str,
    region: &RegionSpec,
    content: &[u8],
    pad_byte: u8,
) -> Result<Vec<u8>> {
    let allocated = region.size as usize;
    let violation = || Error::SizeViolation {
        container: container.to_string(),
        region: region.name.clone(),
        actual: content.len(),
        allocated: region.size,
        policy: region.policy,
    };

    match region.policy {
        PaddingPolicy::NoOp => {
            if content.len() != allocated {
                return Err(violation());
            }
            Ok(content.to_vec())
        }
        PaddingPolicy::Pad | PaddingPolicy::Ignore => {
            if content.len() > allocated {
                return Err(violation());
            }
            let padding = allocated - content.len();
            let mut out = Vec::with_capacity(allocated);
            match region.position {
                InsertPosition::Head => {
                    out.resize(padding, pad_byte);
                    out.extend_from_slice(content);
                }
                InsertPosition::Tail => {
                    out.extend_from_slice(content);
                    out.resize(allocated, pad_byte);
                }
            }
            Ok(out)
        }
    }
}

/// Stitches the containers of one layout tree
pub struct Stitcher<'a> {
    tree: &'a LayoutTree,
    artifacts: &'a ArtifactStore,
    compressor: &'a dyn Compressor,
    pad_byte: u8,
    built: HashMap<String, Rc<[u8]>>,
    compressed: HashMap<(String, Codec), Rc<[u8]>>,
    active: Vec<String>,
}

impl<'a> Stitcher<'a> {
    /// Create a stitcher for `tree`
    pub fn new(
        tree: &'a LayoutTree,
        artifacts: &'a ArtifactStore,
        compressor: &'a dyn Compressor,
        pad_byte: u8,
    ) -> Self {
        Self {
            tree,
            artifacts,
            compressor,
            pad_byte,
            built: HashMap::new(),
            compressed: HashMap::new(),
            active: Vec::new(),
        }
    }

    /// Check the tree before producing any bytes
    ///
    /// Validates the tree structure and checks that every artifact needed by
    /// a `Pad` or `NoOp` region exists.
    pub fn preflight(&self) -> Result<()> {
        self.tree.validate()?;
        self.tree
            .containers()
            .iter()
            .try_for_each(|container| self.check_artifacts(container))
    }

    /// Like [`preflight`](Self::preflight), but only checks the artifacts
    /// of `name` and the containers it depends on
    pub fn preflight_for(&self, name: &str) -> Result<()> {
        self.tree.validate()?;

        let mut seen = HashSet::new();
        let mut pending = vec![name];
        while let Some(current) = pending.pop() {
            if !seen.insert(current) {
                continue;
            }
            let container = self
                .tree
                .find_container(current)
                .ok_or_else(|| Error::config(format!("unknown container '{}'", current)))?;
            self.check_artifacts(container)?;
            pending.extend(self.tree.dependencies(current));
        }
        Ok(())
    }

    fn check_artifacts(&self, container: &Container) -> Result<()> {
        for region in &container.regions {
            if let Source::Artifact(artifact) = &region.source {
                if region.policy != PaddingPolicy::Ignore && !self.artifacts.contains(artifact) {
                    return Err(Error::MissingArtifact {
                        container: container.name.clone(),
                        region: region.name.clone(),
                        artifact: artifact.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Stitch one container, building its dependencies first
    pub fn stitch(&mut self, name: &str) -> Result<Rc<[u8]>> {
        if let Some(data) = self.built.get(name) {
            return Ok(Rc::clone(data));
        }

        if let Some(start) = self.active.iter().position(|n| n == name) {
            let mut path = self.active[start..].to_vec();
            path.push(name.to_string());
            return Err(Error::Cycle { path });
        }

        let tree = self.tree;
        let container = tree
            .find_container(name)
            .ok_or_else(|| Error::config(format!("unknown container '{}'", name)))?;

        self.active.push(name.to_string());
        let result = self.stitch_container(container);
        self.active.pop();

        let data: Rc<[u8]> = Rc::from(result?);
        info!("Stitched {} ({:#x} bytes)", name, data.len());
        self.built.insert(name.to_string(), Rc::clone(&data));
        Ok(data)
    }

    /// Stitch every container in declaration order
    pub fn stitch_all(&mut self, progress: &mut dyn StitchProgress) -> Result<StitchOutput> {
        let tree = self.tree;
        progress.started(tree.len());

        let mut containers = Vec::with_capacity(tree.len());
        for container in tree.containers() {
            let data = self.stitch(&container.name)?;
            progress.container_done(&container.name, data.len());
            containers.push((container.name.clone(), data));
        }

        progress.finished();
        Ok(StitchOutput::new(containers))
    }

    /// Previously stitched output of a container
    pub fn built(&self, name: &str) -> Option<&[u8]> {
        self.built.get(name).map(|data| &data[..])
    }

    fn stitch_container(&mut self, container: &Container) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(container.allocated_size() as usize);

        for region in &container.regions {
            if region.size == 0 {
                return Err(Error::region(
                    &container.name,
                    &region.name,
                    "allocated size is zero",
                ));
            }

            let Some(content) = self.resolve(container, region)? else {
                warn!(
                    "Skipping {}/{}: {} not found",
                    container.name, region.name, region.source
                );
                continue;
            };

            let placed = place_region(&container.name, region, &content, self.pad_byte)?;
            debug!(
                "{}/{}: {:#x} content bytes at offset {:#x} ({}, {}, {})",
                container.name,
                region.name,
                content.len(),
                out.len(),
                region.codec,
                region.policy,
                region.position
            );
            out.extend_from_slice(&placed);
        }

        Ok(out)
    }

    /// Resolve and compress the bytes of one region
    ///
    /// Returns `None` for an absent `Ignore` region.
    fn resolve(&mut self, container: &Container, region: &RegionSpec) -> Result<Option<Rc<[u8]>>> {
        match &region.source {
            Source::Container(child) => {
                let raw = self.stitch(child)?;
                if region.codec == Codec::None {
                    return Ok(Some(raw));
                }
                Ok(Some(Rc::from(self.compressor.compress(region.codec, &raw)?)))
            }
            Source::Artifact(artifact) => {
                let key = (artifact.clone(), region.codec);
                if let Some(data) = self.compressed.get(&key) {
                    return Ok(Some(Rc::clone(data)));
                }

                let Some(raw) = self.artifacts.load(artifact)? else {
                    if region.policy == PaddingPolicy::Ignore {
                        return Ok(None);
                    }
                    return Err(Error::MissingArtifact {
                        container: container.name.clone(),
                        region: region.name.clone(),
                        artifact: artifact.clone(),
                    });
                };

                let data: Rc<[u8]> = if region.codec == Codec::None {
                    Rc::from(raw)
                } else {
                    Rc::from(self.compressor.compress(region.codec, &raw)?)
                };
                self.compressed.insert(key, Rc::clone(&data));
                Ok(Some(data))
            }
        }
    }
}
