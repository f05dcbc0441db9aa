//! List boards

use std::path::PathBuf;

use fwstitch_core::board::BoardConfig;

use super::format_size;

/// List the boards found in `dirs`
///
/// Boards that fail to load are reported and skipped.
pub fn list_boards(dirs: &[PathBuf]) -> Result<(), Box<dyn std::error::Error>> {
    println!("Available boards:");
    println!();
    println!(
        "{:<20} {:<10} {:<20} {:>10}",
        "Name", "Layout", "Image", "Flash"
    );
    println!("{}", "-".repeat(64));

    let mut found = 0;
    for dir in dirs.iter().filter(|d| d.is_dir()) {
        for path in BoardConfig::list_dir(dir)? {
            match BoardConfig::load_file(&path) {
                Ok(board) => {
                    found += 1;
                    println!(
                        "{:<20} {:<10} {:<20} {:>10}",
                        board.name,
                        if board.redundant_layout { "redundant" } else { "simple" },
                        board.image_name,
                        format_size(board.flash_size as u64)
                    );
                }
                Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
            }
        }
    }

    if found == 0 {
        log::warn!("No boards found");
    }
    println!();
    println!("Total: {} boards", found);
    Ok(())
}
