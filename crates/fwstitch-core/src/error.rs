//! Error types for fwstitch-core
//!
//! Every failure aborts the build. Variants that concern a region carry the
//! container and region names so the message points at the offending entry.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::region::PaddingPolicy;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad region size, policy, codec, size-sum mismatch or malformed input
    Configuration,
    /// A required source artifact is absent
    MissingArtifact,
    /// Resolved bytes do not fit the region allocation
    SizeViolation,
    /// An external tool (sub-build or compressor) failed
    ExternalToolFailure,
    /// Filesystem error
    Io,
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid layout or board configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid configuration tied to a specific region
    #[error("configuration error in {container}/{region}: {message}")]
    RegionConfiguration {
        /// Container holding the region
        container: String,
        /// Offending region
        region: String,
        /// What is wrong
        message: String,
    },

    /// Container references form a cycle
    #[error("container dependency cycle: {}", path.join(" -> "))]
    Cycle {
        /// Containers on the cycle, first entry repeated at the end
        path: Vec<String>,
    },

    /// Failed to parse a configuration file
    #[error("failed to parse {what}: {message}")]
    Parse {
        /// What was being parsed (file name or format)
        what: String,
        /// Parser message
        message: String,
    },

    /// Source artifact missing for a region that requires it
    #[error("missing artifact '{artifact}' for region {container}/{region}")]
    MissingArtifact {
        /// Container holding the region
        container: String,
        /// Region that needs the artifact
        region: String,
        /// Artifact name
        artifact: String,
    },

    /// Resolved bytes violate the region allocation
    #[error(
        "size violation in {container}/{region}: {actual:#x} bytes does not fit {allocated:#x} bytes under {policy} policy"
    )]
    SizeViolation {
        /// Container holding the region
        container: String,
        /// Offending region
        region: String,
        /// Resolved length
        actual: usize,
        /// Allocated size
        allocated: u32,
        /// Padding policy in effect
        policy: PaddingPolicy,
    },

    /// External tool returned failure
    #[error("external tool '{tool}' failed: {message}")]
    ExternalToolFailure {
        /// Tool that failed
        tool: String,
        /// Exit status or spawn error
        message: String,
    },

    /// I/O error on a specific path
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_)
            | Self::RegionConfiguration { .. }
            | Self::Cycle { .. }
            | Self::Parse { .. } => ErrorKind::Configuration,
            Self::MissingArtifact { .. } => ErrorKind::MissingArtifact,
            Self::SizeViolation { .. } => ErrorKind::SizeViolation,
            Self::ExternalToolFailure { .. } => ErrorKind::ExternalToolFailure,
            Self::Io { .. } => ErrorKind::Io,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn region(
        container: impl Into<String>,
        region: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RegionConfiguration {
            container: container.into(),
            region: region.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalToolFailure {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result type alias using the core Error type
pub type Result<T> = std::result::Result<T, Error>;
