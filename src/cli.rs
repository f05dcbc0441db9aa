//! CLI argument parsing

use clap::{ArgGroup, Parser, Subcommand};
use fwstitch_core::region::parse_number;
use std::path::PathBuf;

/// Parse a pad byte such as `0xFF` or `255`
fn parse_pad_byte(s: &str) -> Result<u8, String> {
    let value = parse_number(s)?;
    u8::try_from(value).map_err(|_| format!("Pad byte out of range: {}", s))
}

#[derive(Parser)]
#[command(name = "fwstitch")]
#[command(author, version, about = "Firmware flash image stitcher", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Directory with board files (.ron)
    /// Defaults to looking in ./boards/ and /usr/share/fwstitch/boards/
    #[arg(long, global = true)]
    pub board_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Reset vector source for board builds
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ResetVectorArgs {
    /// Prebuilt reset vector blob (skips the sub-build)
    #[arg(long, conflicts_with = "vtf_dir")]
    pub reset_vector: Option<PathBuf>,

    /// Reset vector source directory (contains ResetVector.S)
    #[arg(long)]
    pub vtf_dir: Option<PathBuf>,

    /// Cross toolchain prefix for the reset vector sub-build
    #[arg(long, requires = "vtf_dir")]
    pub toolchain_prefix: Option<String>,
}

/// Compressor selection
#[derive(clap::Args, Debug, Clone, Default)]
pub struct CodecArgs {
    /// External LZ4 compressor (invoked as `<tool> -e -o <out> <in>`)
    #[arg(long, requires = "lzma_tool")]
    pub lz4_tool: Option<PathBuf>,

    /// External LZMA compressor (invoked as `<tool> -e -o <out> <in>`)
    #[arg(long, requires = "lz4_tool")]
    pub lzma_tool: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the flash image of a board
    Build {
        /// Board name or path to a board file (.ron)
        #[arg(short, long)]
        board: String,

        /// Directories searched for component binaries, in order
        #[arg(short, long, required = true, num_args = 1..)]
        artifacts: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        #[command(flatten)]
        reset: ResetVectorArgs,

        #[command(flatten)]
        codec: CodecArgs,
    },

    /// Stitch a hand-written layout tree (TOML)
    Stitch {
        /// Layout file (TOML format)
        #[arg(short, long)]
        layout: PathBuf,

        /// Directories searched for component binaries, in order
        #[arg(short, long, required = true, num_args = 1..)]
        artifacts: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Pad byte (required unless the layout declares one)
        #[arg(long, value_parser = parse_pad_byte)]
        pad_byte: Option<u8>,

        /// Flash block size (overrides the layout)
        #[arg(long, value_parser = parse_number)]
        block_size: Option<u32>,

        /// Only build this container and what it depends on
        #[arg(long = "final", conflicts_with = "intermediates")]
        final_container: Option<String>,

        /// Also write every intermediate container
        #[arg(long)]
        intermediates: bool,

        #[command(flatten)]
        codec: CodecArgs,
    },

    /// Layout inspection and export
    #[command(subcommand)]
    Layout(LayoutCommands),

    /// List available boards
    ListBoards {
        /// Directory to scan (defaults to the board search path)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum LayoutCommands {
    /// Show containers with region offsets and sizes
    #[command(group(ArgGroup::new("source").required(true).args(["board", "layout"])))]
    Show {
        /// Board name or path to a board file (.ron)
        #[arg(short, long)]
        board: Option<String>,

        /// Layout file (TOML format)
        #[arg(short, long)]
        layout: Option<PathBuf>,
    },

    /// Export the layout tree of a board as TOML
    Export {
        /// Board name or path to a board file (.ron)
        #[arg(short, long)]
        board: String,

        /// Output file (prints to stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
