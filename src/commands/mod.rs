//! CLI command implementations
//!
//! Commands load a board or a layout file, run the core stitching engine
//! and report what was produced. Progress goes through indicatif; the core
//! only sees the `StitchProgress` trait.

pub mod build;
pub mod layout;
mod list;
mod progress;
pub mod stitch;

pub use list::list_boards;

use fwstitch_core::codec::{BuiltinCompressor, Compressor, ToolCompressor};

use crate::cli::CodecArgs;

/// Pick the compressor: external tools when both are given, built-in otherwise
fn compressor(args: &CodecArgs) -> Box<dyn Compressor> {
    match (&args.lz4_tool, &args.lzma_tool) {
        (Some(lz4), Some(lzma)) => {
            log::info!(
                "Using external compressors {} and {}",
                lz4.display(),
                lzma.display()
            );
            Box::new(ToolCompressor::new(lz4, lzma))
        }
        _ => Box::new(BuiltinCompressor),
    }
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 && bytes % (1024 * 1024) == 0 {
        format!("{} MiB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes % 1024 == 0 {
        format!("{} KiB", bytes / 1024)
    } else {
        format!("{} B", bytes)
    }
}
