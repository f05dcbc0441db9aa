//! Man page generator for fwstitch
//!
//! Writes `fwstitch.1` plus one page per subcommand (`fwstitch-build.1`,
//! `fwstitch-layout.1`, ...).
//!
//! Usage: cargo run --bin gen-manpage -- [output-dir]

use clap::CommandFactory;
use std::fs;
use std::path::{Path, PathBuf};

#[path = "../cli.rs"]
mod cli;

fn render(cmd: clap::Command, dir: &Path, name: &str) -> std::io::Result<PathBuf> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd)
        .title(name.to_uppercase())
        .render(&mut buffer)?;
    let path = dir.join(format!("{}.1", name));
    fs::write(&path, buffer)?;
    Ok(path)
}

fn main() -> std::io::Result<()> {
    // Default to ./man directory
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("man"));
    fs::create_dir_all(&output_dir)?;

    let cmd = cli::Cli::command();
    let mut pages = Vec::new();
    for sub in cmd.get_subcommands() {
        let name = format!("fwstitch-{}", sub.get_name());
        pages.push(render(sub.clone(), &output_dir, &name)?);
    }
    pages.insert(0, render(cmd, &output_dir, "fwstitch")?);

    for page in &pages {
        println!("Generated {}", page.display());
    }
    println!("\nTo view the main page:");
    println!("  man -l {}", pages[0].display());

    Ok(())
}
