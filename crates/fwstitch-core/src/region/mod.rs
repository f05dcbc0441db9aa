//! Region descriptor model
//!
//! A [`LayoutTree`] is an ordered list of [`Container`]s. Each container is
//! an ordered list of [`RegionSpec`]s, and a region's source is either a raw
//! artifact or another container of the same tree. Trees can be:
//!
//! - Derived from a board configuration (see [`crate::board`])
//! - Loaded from TOML files
//! - Built manually
//!
//! Declaration order is authoritative: it fixes the byte offset of every
//! region in its container.
//!
//! ```ignore
//! let tree = LayoutTree::from_toml_file("layout.toml")?;
//! tree.validate()?;
//! for container in tree.containers() {
//!     println!("{} ({} regions)", container.name, container.regions.len());
//! }
//! ```

mod toml;
mod types;

pub use self::toml::parse_number;
pub use types::*;
