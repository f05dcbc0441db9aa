//! Pre-stitch hook: reset vector
//!
//! The reset vector is assembled for the board's base address right before
//! stitching, then registered as the `RESET.bin` artifact. A prebuilt blob
//! can be supplied instead of running the toolchain.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::board::layout::RESET_VECTOR_ARTIFACT;
use crate::board::BoardConfig;
use crate::error::{Error, Result};
use crate::stitch::{read_required, ArtifactStore};
use crate::tool::ToolRunner;

/// Assembly source of the reset vector, relative to the source directory
pub const RESET_VECTOR_SOURCE: &str = "ResetVector.S";

/// Reset vector sub-build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetVectorBuild {
    /// Directory holding `ResetVector.S`
    pub source_dir: PathBuf,
    /// Cross toolchain prefix, e.g. `aarch64-linux-gnu-`
    pub toolchain_prefix: String,
    /// Architecture name used in the output file name
    pub arch: String,
    /// Base address passed as `BFV_ADDR`
    pub base: u32,
}

impl ResetVectorBuild {
    /// Sub-build for a board
    pub fn for_board(
        board: &BoardConfig,
        source_dir: impl Into<PathBuf>,
        toolchain_prefix: impl Into<String>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            toolchain_prefix: toolchain_prefix.into(),
            arch: board.reset_vector.arch.clone(),
            base: board.reset_vector.base,
        }
    }

    fn object_path(&self) -> PathBuf {
        self.source_dir.join("Bin").join("ResetVector.o")
    }

    /// Path of the raw reset vector produced by [`run`](Self::run)
    pub fn output_path(&self) -> PathBuf {
        self.source_dir
            .join("Bin")
            .join(format!("ResetVector.{}.raw", self.arch))
    }

    /// Commands run by the sub-build, in order
    pub fn commands(&self) -> Vec<(String, Vec<String>)> {
        let object = Path::new("Bin").join("ResetVector.o").display().to_string();
        let raw = Path::new("Bin")
            .join(format!("ResetVector.{}.raw", self.arch))
            .display()
            .to_string();

        vec![
            (
                format!("{}gcc", self.toolchain_prefix),
                vec![
                    "-c".to_string(),
                    RESET_VECTOR_SOURCE.to_string(),
                    "-D".to_string(),
                    format!("BFV_ADDR={:#x}", self.base),
                    "-o".to_string(),
                    object.clone(),
                ],
            ),
            (
                format!("{}objcopy", self.toolchain_prefix),
                vec![
                    "-O".to_string(),
                    "binary".to_string(),
                    object,
                    raw,
                ],
            ),
        ]
    }

    /// Run the sub-build and return the reset vector blob
    ///
    /// The blob must be non-empty and no larger than `reset_size`; it does
    /// not have to fill the reset region exactly, since the `RESET.bin`
    /// region pads it at the head. The intermediate object file is removed
    /// afterwards.
    pub fn run(&self, runner: &dyn ToolRunner, reset_size: u32) -> Result<Vec<u8>> {
        let bin_dir = self.source_dir.join("Bin");
        fs::create_dir_all(&bin_dir).map_err(|e| Error::io(&bin_dir, e))?;

        // A stale blob from an earlier build must not be picked up
        let output = self.output_path();
        match fs::remove_file(&output) {
            Ok(()) => debug!("Removed stale {}", output.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(&output, e)),
        }

        for (program, args) in self.commands() {
            runner.run(&program, &args, &self.source_dir)?;
        }

        if !output.is_file() {
            return Err(Error::tool(
                format!("{}objcopy", self.toolchain_prefix),
                format!("produced no output at {}", output.display()),
            ));
        }
        let blob = read_required(&output)?;

        let object = self.object_path();
        if let Err(e) = fs::remove_file(&object) {
            debug!("Could not remove {}: {}", object.display(), e);
        }

        check_blob(&blob, reset_size, &output)?;
        info!(
            "Built reset vector for {} at {:#x} ({} bytes)",
            self.arch,
            self.base,
            blob.len()
        );
        Ok(blob)
    }
}

/// Load a prebuilt reset vector blob
pub fn load_prebuilt(path: &Path, reset_size: u32) -> Result<Vec<u8>> {
    let blob = read_required(path)?;
    check_blob(&blob, reset_size, path)?;
    info!("Using prebuilt reset vector {} ({} bytes)", path.display(), blob.len());
    Ok(blob)
}

/// Make the reset vector resolvable as `RESET.bin`
pub fn register(artifacts: &mut ArtifactStore, blob: Vec<u8>) {
    artifacts.insert(RESET_VECTOR_ARTIFACT, blob);
}

fn check_blob(blob: &[u8], reset_size: u32, origin: &Path) -> Result<()> {
    if blob.is_empty() {
        return Err(Error::tool(
            origin.display().to_string(),
            "reset vector is empty",
        ));
    }
    if blob.len() as u64 > reset_size as u64 {
        return Err(Error::config(format!(
            "reset vector {} is {:#x} bytes but the reset region is {:#x}",
            origin.display(),
            blob.len(),
            reset_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::cell::RefCell;

    /// Records every command and emulates objcopy by writing `blob`
    struct FakeToolchain {
        blob: Vec<u8>,
        calls: RefCell<Vec<(String, Vec<String>)>>,
        fail: Option<&'static str>,
    }

    impl FakeToolchain {
        fn new(blob: Vec<u8>) -> Self {
            Self {
                blob,
                calls: RefCell::new(Vec::new()),
                fail: None,
            }
        }
    }

    impl ToolRunner for FakeToolchain {
        fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<()> {
            self.calls
                .borrow_mut()
                .push((program.to_string(), args.to_vec()));
            if self.fail.is_some_and(|f| program.ends_with(f)) {
                return Err(Error::tool(program, "exited with exit status: 1"));
            }
            let out = cwd.join(args.last().unwrap());
            if program.ends_with("gcc") {
                fs::write(out, b"ELF").unwrap();
            } else if !self.blob.is_empty() {
                fs::write(out, &self.blob).unwrap();
            }
            Ok(())
        }
    }

    fn build(dir: &Path) -> ResetVectorBuild {
        ResetVectorBuild {
            source_dir: dir.to_path_buf(),
            toolchain_prefix: "aarch64-linux-gnu-".to_string(),
            arch: "arm".to_string(),
            base: 0x1000,
        }
    }

    #[test]
    fn test_runs_assembler_then_objcopy() {
        let dir = tempfile::tempdir().unwrap();
        let hook = build(dir.path());
        let tools = FakeToolchain::new(vec![0xEA; 0x40]);

        let blob = hook.run(&tools, 0x1000).unwrap();
        assert_eq!(blob, vec![0xEA; 0x40]);

        let calls = tools.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "aarch64-linux-gnu-gcc");
        assert!(calls[0].1.contains(&"BFV_ADDR=0x1000".to_string()));
        assert_eq!(calls[0].1[1], "ResetVector.S");
        assert_eq!(calls[1].0, "aarch64-linux-gnu-objcopy");
        assert_eq!(calls[1].1[..2], ["-O".to_string(), "binary".to_string()]);

        // The object file is cleaned up, the raw output is kept
        assert!(!dir.path().join("Bin/ResetVector.o").exists());
        assert!(dir.path().join("Bin/ResetVector.arm.raw").exists());
    }

    #[test]
    fn test_oversized_reset_vector() {
        let dir = tempfile::tempdir().unwrap();
        let tools = FakeToolchain::new(vec![0xEA; 0x1001]);
        let err = build(dir.path()).run(&tools, 0x1000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_no_output_is_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A stale blob from a previous run must not be reused
        fs::create_dir_all(dir.path().join("Bin")).unwrap();
        fs::write(dir.path().join("Bin/ResetVector.arm.raw"), [1u8]).unwrap();

        let tools = FakeToolchain::new(Vec::new());
        let err = build(dir.path()).run(&tools, 0x1000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalToolFailure);
    }

    #[test]
    fn test_failing_assembler_stops_build() {
        let dir = tempfile::tempdir().unwrap();
        let mut tools = FakeToolchain::new(vec![0xEA; 0x40]);
        tools.fail = Some("gcc");
        let err = build(dir.path()).run(&tools, 0x1000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalToolFailure);
        assert_eq!(tools.calls.borrow().len(), 1);
    }

    #[test]
    fn test_prebuilt_and_register() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reset.raw");
        fs::write(&path, [0xEAu8; 16]).unwrap();

        let blob = load_prebuilt(&path, 0x1000).unwrap();
        let mut store = ArtifactStore::new();
        register(&mut store, blob);
        assert_eq!(store.load(RESET_VECTOR_ARTIFACT).unwrap(), Some(vec![0xEA; 16]));

        fs::write(&path, []).unwrap();
        assert_eq!(
            load_prebuilt(&path, 0x1000).unwrap_err().kind(),
            ErrorKind::ExternalToolFailure
        );
        assert_eq!(
            load_prebuilt(&dir.path().join("missing.raw"), 0x1000)
                .unwrap_err()
                .kind(),
            ErrorKind::Io
        );
    }
}
