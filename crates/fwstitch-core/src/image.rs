//! Whole-image builds
//!
//! [`build_image`] runs the board pipeline: [`plan_image`] derives the
//! layout tree and checks the image size arithmetic, then [`stitch_image`]
//! preflights every artifact and stitches all containers bottom-up. Nothing is written to disk here; callers persist
//! the returned [`StitchOutput`] once the whole build has succeeded.

use log::{debug, info};

use crate::board::{board_layout, BoardConfig};
use crate::codec::Compressor;
use crate::error::{Error, Result};
use crate::region::LayoutTree;
use crate::stitch::{ArtifactStore, StitchOutput, StitchProgress, Stitcher};

/// Check the final image size against the board's area sizes
///
/// For the redundant layout the areas must add up to exactly the flash
/// size, and so must the final container. For the simple layout the final
/// image regions must fit in the non-redundant area; the image is not
/// padded beyond its regions.
pub fn check_image_size(board: &BoardConfig, tree: &LayoutTree) -> Result<()> {
    let image = tree.final_container().ok_or_else(|| {
        Error::config(format!("board '{}': layout has no final image", board.name))
    })?;
    let allocated = image.allocated_size();

    if board.redundant_layout {
        let expected = board.sizes.image_size();
        if expected != board.flash_size as u64 {
            return Err(Error::config(format!(
                "board '{}': top-swap, redundant, non-redundant and non-volatile areas add up to {:#x} bytes but the flash size is {:#x}",
                board.name, expected, board.flash_size
            )));
        }
        if allocated != expected {
            return Err(Error::config(format!(
                "board '{}': image '{}' allocates {:#x} bytes but the flash size is {:#x}",
                board.name, image.name, allocated, board.flash_size
            )));
        }
    } else if allocated > board.sizes.non_redundant as u64 {
        return Err(Error::config(format!(
            "board '{}': image '{}' allocates {:#x} bytes but the non-redundant area is {:#x}",
            board.name, image.name, allocated, board.sizes.non_redundant
        )));
    }

    debug!(
        "Image {} allocates {:#x} bytes ({} layout)",
        image.name,
        allocated,
        if board.redundant_layout { "redundant" } else { "simple" }
    );
    Ok(())
}

/// Derive and check the layout tree of a board
///
/// Runs every configuration check without touching the filesystem, so
/// callers can reject a bad board before any pre-stitch work.
pub fn plan_image(board: &BoardConfig) -> Result<LayoutTree> {
    let tree = board_layout(board)?;
    check_image_size(board, &tree)?;
    tree.validate()?;
    Ok(tree)
}

/// Stitch every container of a planned board image
///
/// The reset vector must already be resolvable through `artifacts`, either
/// as a file or as a blob registered by the pre-stitch hook.
pub fn stitch_image(
    board: &BoardConfig,
    tree: &LayoutTree,
    artifacts: &ArtifactStore,
    compressor: &dyn Compressor,
    progress: &mut dyn StitchProgress,
) -> Result<StitchOutput> {
    let mut stitcher = Stitcher::new(tree, artifacts, compressor, board.pad_byte);
    stitcher.preflight()?;
    let output = stitcher.stitch_all(progress)?;

    if let Some(image) = output.final_image() {
        info!("Board {} image is {:#x} bytes", board.name, image.len());
    }
    Ok(output)
}

/// Build every container of a board image
pub fn build_image(
    board: &BoardConfig,
    artifacts: &ArtifactStore,
    compressor: &dyn Compressor,
    progress: &mut dyn StitchProgress,
) -> Result<StitchOutput> {
    let tree = plan_image(board)?;
    stitch_image(board, &tree, artifacts, compressor, progress)
}
