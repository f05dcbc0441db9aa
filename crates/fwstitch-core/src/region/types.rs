//! Layout types
//!
//! Core types describing regions, containers and whole layout trees.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::codec::Codec;
use crate::error::{Error, Result};

/// How a region's resolved bytes are fitted to its allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaddingPolicy {
    /// Fill-extend to the allocation, error if larger
    Pad,
    /// Require the bytes to be exactly the allocation
    NoOp,
    /// Skip the region when its artifact is absent, otherwise behave as `Pad`
    Ignore,
}

impl fmt::Display for PaddingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pad => write!(f, "pad"),
            Self::NoOp => write!(f, "noop"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

impl FromStr for PaddingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pad" => Ok(Self::Pad),
            "noop" | "nop" => Ok(Self::NoOp),
            "ignore" => Ok(Self::Ignore),
            other => Err(Error::config(format!("unknown padding policy '{}'", other))),
        }
    }
}

/// Where padding goes relative to the content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertPosition {
    /// Padding before the content (content is top-aligned)
    Head,
    /// Padding after the content
    Tail,
}

impl fmt::Display for InsertPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Head => write!(f, "head"),
            Self::Tail => write!(f, "tail"),
        }
    }
}

impl FromStr for InsertPosition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "head" => Ok(Self::Head),
            "tail" => Ok(Self::Tail),
            other => Err(Error::config(format!("unknown insert position '{}'", other))),
        }
    }
}

/// Where a region's bytes come from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// A raw binary produced outside the stitcher
    Artifact(String),
    /// The output of another container in the same tree
    Container(String),
}

impl Source {
    /// Name of the artifact or container
    pub fn name(&self) -> &str {
        match self {
            Self::Artifact(name) | Self::Container(name) => name,
        }
    }

}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Artifact(name) => write!(f, "{}", name),
            Self::Container(name) => write!(f, "[{}]", name),
        }
    }
}

/// One named region within a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSpec {
    /// Name of the region, unique within its container
    pub name: String,
    /// Source of the region bytes
    pub source: Source,
    /// Compression applied before sizing
    pub codec: Codec,
    /// Fixed byte budget in the parent container
    pub size: u32,
    /// How undersized/oversized input is handled
    pub policy: PaddingPolicy,
    /// Where padding is inserted
    pub position: InsertPosition,
}

impl RegionSpec {
    /// Create a `Pad`/`Tail` region backed by an artifact of the same name
    pub fn artifact(name: impl Into<String>, size: u32) -> Self {
        let name = name.into();
        Self {
            source: Source::Artifact(name.clone()),
            name,
            codec: Codec::None,
            size,
            policy: PaddingPolicy::Pad,
            position: InsertPosition::Tail,
        }
    }

    /// Create a `Pad`/`Tail` region backed by another container of the same name
    pub fn container(name: impl Into<String>, size: u32) -> Self {
        let name = name.into();
        Self {
            source: Source::Container(name.clone()),
            name,
            codec: Codec::None,
            size,
            policy: PaddingPolicy::Pad,
            position: InsertPosition::Tail,
        }
    }

    /// Set the codec
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the padding policy
    pub fn with_policy(mut self, policy: PaddingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the insert position
    pub fn with_position(mut self, position: InsertPosition) -> Self {
        self.position = position;
        self
    }

    /// Set the source artifact while keeping the region name
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }
}

/// A stitched output made of an ordered list of regions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Container name, also its output file name
    pub name: String,
    /// Regions in declaration order
    pub regions: Vec<RegionSpec>,
}

impl Container {
    /// Create a container
    pub fn new(name: impl Into<String>, regions: Vec<RegionSpec>) -> Self {
        Self {
            name: name.into(),
            regions,
        }
    }

    /// Find a region by name
    pub fn find_region(&self, name: &str) -> Option<&RegionSpec> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Sum of all region allocations
    pub fn allocated_size(&self) -> u64 {
        self.regions.iter().map(|r| r.size as u64).sum()
    }

    /// Compute the static placement of every region
    ///
    /// Offsets assume every region is present; an absent `Ignore` region
    /// shifts everything after it down by its allocation.
    pub fn placements(&self) -> Vec<Placement<'_>> {
        let mut offset = 0u64;
        self.regions
            .iter()
            .map(|region| {
                let placement = Placement { offset, region };
                offset += region.size as u64;
                placement
            })
            .collect()
    }
}

/// A region together with its offset in the parent container
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    /// Byte offset within the container
    pub offset: u64,
    /// The region placed there
    pub region: &'a RegionSpec,
}

/// Ordered sequence of containers forming a DAG
#[derive(Debug, Clone)]
pub struct LayoutTree {
    /// Optional name for this layout
    pub name: Option<String>,
    /// Minimum flash block granularity; every allocation is a multiple of it
    pub block_size: u32,
    /// Pad byte, if the layout declares one
    pub pad_byte: Option<u8>,
    containers: Vec<Container>,
    index: HashMap<String, usize>,
}

impl LayoutTree {
    /// Create an empty layout tree
    pub fn new(block_size: u32) -> Self {
        Self {
            name: None,
            block_size,
            pad_byte: None,
            containers: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Append a container
    ///
    /// Container names must be unique across the tree.
    pub fn add_container(&mut self, container: Container) -> Result<()> {
        if self.index.contains_key(&container.name) {
            return Err(Error::config(format!(
                "duplicate container name '{}'",
                container.name
            )));
        }
        self.index
            .insert(container.name.clone(), self.containers.len());
        self.containers.push(container);
        Ok(())
    }

    /// All containers in declaration order
    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    /// Find a container by name
    pub fn find_container(&self, name: &str) -> Option<&Container> {
        self.index.get(name).map(|&i| &self.containers[i])
    }

    /// The last declared container, which is the final image
    pub fn final_container(&self) -> Option<&Container> {
        self.containers.last()
    }

    /// Get the number of containers
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Validate the structure of the tree
    ///
    /// Checks region sizes against the block granularity, region name
    /// uniqueness, container references, container sizes against the
    /// regions that embed them, and the absence of cycles.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::config("flash block size must be non-zero"));
        }
        if self.containers.is_empty() {
            return Err(Error::config("layout has no containers"));
        }

        for container in &self.containers {
            if !is_file_name(&container.name) {
                return Err(Error::config(format!(
                    "container name '{}' must be a plain file name",
                    container.name
                )));
            }
            if container.regions.is_empty() {
                return Err(Error::config(format!(
                    "container '{}' has no regions",
                    container.name
                )));
            }

            let mut seen = HashSet::new();
            for region in &container.regions {
                if !seen.insert(region.name.as_str()) {
                    return Err(Error::region(
                        &container.name,
                        &region.name,
                        "duplicate region name",
                    ));
                }
                if region.size == 0 {
                    return Err(Error::region(
                        &container.name,
                        &region.name,
                        "allocated size is zero",
                    ));
                }
                if region.size % self.block_size != 0 {
                    return Err(Error::region(
                        &container.name,
                        &region.name,
                        format!(
                            "allocated size {:#x} is not a multiple of the {:#x} block size",
                            region.size, self.block_size
                        ),
                    ));
                }

                if let Source::Container(child) = &region.source {
                    let child = self.find_container(child).ok_or_else(|| {
                        Error::region(
                            &container.name,
                            &region.name,
                            format!("unknown container '{}'", child),
                        )
                    })?;
                    let needed = child.allocated_size();
                    if needed > region.size as u64 {
                        return Err(Error::region(
                            &container.name,
                            &region.name,
                            format!(
                                "container '{}' needs {:#x} bytes but is allocated {:#x}",
                                child.name, needed, region.size
                            ),
                        ));
                    }
                }
            }
        }

        self.check_cycles()
    }

    /// Containers that `name` references directly, in declaration order
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.find_container(name)
            .map(|c| {
                c.regions
                    .iter()
                    .filter_map(|r| match &r.source {
                        Source::Container(child) => Some(child.as_str()),
                        Source::Artifact(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn check_cycles(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Active,
            Done,
        }

        fn visit<'a>(
            tree: &'a LayoutTree,
            name: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
            stack: &mut Vec<&'a str>,
        ) -> Result<()> {
            match marks.get(name).copied().unwrap_or(Mark::Unvisited) {
                Mark::Done => return Ok(()),
                Mark::Active => {
                    let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                    let mut path: Vec<String> =
                        stack[start..].iter().map(|n| n.to_string()).collect();
                    path.push(name.to_string());
                    return Err(Error::Cycle { path });
                }
                Mark::Unvisited => {}
            }

            marks.insert(name, Mark::Active);
            stack.push(name);
            for child in tree.dependencies(name) {
                visit(tree, child, marks, stack)?;
            }
            stack.pop();
            marks.insert(name, Mark::Done);
            Ok(())
        }

        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        for container in &self.containers {
            visit(self, &container.name, &mut marks, &mut stack)?;
        }
        Ok(())
    }
}

/// Container names become output file names, so they must not leave the
/// output directory
fn is_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
