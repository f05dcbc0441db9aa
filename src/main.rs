//! fwstitch - firmware flash image stitcher
//!
//! Builds a platform flash image from separately compiled boot stages,
//! configuration blobs and payloads. Board files describe the layout; the
//! stitching itself lives in `fwstitch-core`.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, LayoutCommands};
use fwstitch_core::board::BoardConfig;
use std::error::Error as _;
use std::path::{Path, PathBuf};

/// Errors raised by the command line front end
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// A board name did not match any board file
    #[error("board '{name}' not found (searched: {searched})")]
    BoardNotFound { name: String, searched: String },

    /// Neither the layout nor the command line sets a pad byte
    #[error("no pad byte: pass --pad-byte or set layout.pad_byte")]
    NoPadByte,
}

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if let Err(e) = run(cli) {
        let mut source = e.source();
        while let Some(cause) = source {
            log::debug!("caused by: {}", cause);
            source = cause.source();
        }
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let board_dir = cli.board_dir.as_deref();

    match cli.command {
        Commands::Build {
            board,
            artifacts,
            out,
            reset,
            codec,
        } => {
            let board = resolve_board(&board, board_dir)?;
            commands::build::cmd_build(&board, &artifacts, &out, &reset, &codec)
        }
        Commands::Stitch {
            layout,
            artifacts,
            out,
            pad_byte,
            block_size,
            final_container,
            intermediates,
            codec,
        } => commands::stitch::cmd_stitch(&commands::stitch::StitchArgs {
            layout: &layout,
            artifacts: &artifacts,
            out: &out,
            pad_byte,
            block_size,
            final_container: final_container.as_deref(),
            intermediates,
            codec: &codec,
        }),
        Commands::Layout(subcmd) => match subcmd {
            LayoutCommands::Show { board, layout } => match (board, layout) {
                (Some(board), _) => {
                    let board = resolve_board(&board, board_dir)?;
                    commands::layout::cmd_show_board(&board)
                }
                (None, Some(layout)) => commands::layout::cmd_show_file(&layout),
                (None, None) => Err("either --board or --layout is required".into()),
            },
            LayoutCommands::Export { board, output } => {
                let board = resolve_board(&board, board_dir)?;
                commands::layout::cmd_export(&board, output.as_deref())
            }
        },
        Commands::ListBoards { dir } => {
            let dirs = match dir.as_deref().or(board_dir) {
                Some(dir) => vec![dir.to_path_buf()],
                None => default_board_dirs(),
            };
            commands::list_boards(&dirs)
        }
    }
}

/// Default board search path
fn default_board_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("boards"),
        PathBuf::from("/usr/share/fwstitch/boards"),
        PathBuf::from("/usr/local/share/fwstitch/boards"),
    ]
}

/// Load a board given either a file path or a board name
///
/// Names are looked up as `<name>.ron` in `dir`, or in the default board
/// directories when no directory is given.
fn resolve_board(board: &str, dir: Option<&Path>) -> Result<BoardConfig, Box<dyn std::error::Error>> {
    let path = Path::new(board);
    if path.is_file() {
        return Ok(BoardConfig::load_file(path)?);
    }

    let dirs = match dir {
        Some(dir) => vec![dir.to_path_buf()],
        None => default_board_dirs(),
    };
    for dir in &dirs {
        let candidate = dir.join(format!("{}.ron", board));
        if candidate.is_file() {
            log::debug!("Using board file {}", candidate.display());
            return Ok(BoardConfig::load_file(&candidate)?);
        }
    }

    Err(CliError::BoardNotFound {
        name: board.to_string(),
        searched: dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    }
    .into())
}
