//! Board configuration and board-derived layouts
//!
//! A board file fixes every size, the pad byte, the block granularity and
//! the feature set once per build. [`board_layout`] turns it into the
//! layout tree the stitching engine consumes.

mod config;
mod features;
pub mod layout;

pub use config::{BoardConfig, RegionSizes, ResetVectorConfig, Size};
pub use features::BoardFeatures;
pub use layout::board_layout;

#[cfg(test)]
pub(crate) use config::tests as fixtures;
