//! Layout command implementations

use std::path::Path;

use fwstitch_core::board::{board_layout, BoardConfig};
use fwstitch_core::image::check_image_size;
use fwstitch_core::region::LayoutTree;

/// Show the layout tree of a board
pub fn cmd_show_board(board: &BoardConfig) -> Result<(), Box<dyn std::error::Error>> {
    let tree = board_layout(board)?;
    tree.validate()?;
    print_layout(&tree);
    if let Err(e) = check_image_size(board, &tree) {
        println!("\nWarning: {}", e);
    }
    Ok(())
}

/// Show a layout tree from a TOML file
pub fn cmd_show_file(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let tree = LayoutTree::from_toml_file(file)?;
    print_layout(&tree);
    if let Err(e) = tree.validate() {
        println!("\nWarning: {}", e);
    }
    Ok(())
}

/// Export the layout tree of a board as TOML
pub fn cmd_export(board: &BoardConfig, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let tree = board_layout(board)?;

    if let Some(out) = output {
        tree.to_toml_file(out)?;
        println!("Saved layout to {:?}", out);
    } else {
        println!("{}", tree.to_toml_string());
    }
    Ok(())
}

/// Print every container with the offsets of its regions
pub fn print_layout(tree: &LayoutTree) {
    println!("Layout Information");
    println!("==================");

    if let Some(name) = &tree.name {
        println!("Name:       {}", name);
    }
    println!(
        "Block size: {:#x} ({})",
        tree.block_size,
        super::format_size(tree.block_size as u64)
    );
    match tree.pad_byte {
        Some(pad) => println!("Pad byte:   {:#04x}", pad),
        None => println!("Pad byte:   (not set)"),
    }

    for container in tree.containers() {
        let total = container.allocated_size();
        println!(
            "\n{} ({} regions, {:#x} bytes, {})",
            container.name,
            container.regions.len(),
            total,
            super::format_size(total)
        );
        println!(
            "{:<20} {:>10} {:>10} {:>10} {:>6} {:>6} {:>5}",
            "Region", "Offset", "Size", "", "Codec", "Policy", "Pos"
        );
        println!("{:-<74}", "");

        for placement in container.placements() {
            let region = placement.region;
            println!(
                "{:<20} {:#010X} {:#010X} {:>10} {:>6} {:>6} {:>5}",
                region.source.to_string(),
                placement.offset,
                region.size,
                super::format_size(region.size as u64),
                region.codec.to_string(),
                region.policy.to_string(),
                region.position.to_string()
            );
        }
    }
}
