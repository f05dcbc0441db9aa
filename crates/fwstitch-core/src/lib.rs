//! fwstitch-core - Core library for firmware flash image stitching
//!
//! This crate turns a declarative tree of regions into flat binary
//! containers whose byte layout matches what a platform's boot flow expects.
//! Each region names a source artifact, an optional compression codec, a
//! fixed allocation, a padding policy and an insertion position. Containers
//! can be used as sources of other containers, so a whole flash image is
//! built bottom-up.
//!
//! # Example
//!
//! ```ignore
//! use fwstitch_core::board::BoardConfig;
//! use fwstitch_core::codec::BuiltinCompressor;
//! use fwstitch_core::image::build_image;
//! use fwstitch_core::stitch::{ArtifactStore, NoProgress};
//!
//! let board = BoardConfig::load_file("boards/armqemu.ron".as_ref())?;
//! let artifacts = ArtifactStore::with_dirs(["build/fv"]);
//! let output = build_image(&board, &artifacts, &BuiltinCompressor, &mut NoProgress)?;
//! output.write("build/image".as_ref(), true)?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod board;
pub mod codec;
pub mod error;
pub mod hook;
pub mod image;
pub mod region;
pub mod stitch;
pub mod tool;

pub use error::{Error, ErrorKind, Result};
