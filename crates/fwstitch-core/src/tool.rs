//! External tool invocation
//!
//! Compressor executables and the reset-vector toolchain are run through the
//! [`ToolRunner`] trait so tests can substitute a fake that produces files
//! without a real toolchain.

use std::path::Path;
use std::process::Command;

use log::debug;

use crate::error::{Error, Result};

/// Runs one external command to completion
pub trait ToolRunner {
    /// Run `program` with `args` in `cwd`
    ///
    /// A non-zero exit status or a failure to spawn must be reported as
    /// [`Error::ExternalToolFailure`].
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<()>;
}

/// Runs commands with [`std::process::Command`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<()> {
        debug!("Running {} {} (in {})", program, args.join(" "), cwd.display());

        let status = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .status()
            .map_err(|e| Error::tool(program, format!("failed to start: {}", e)))?;

        if !status.success() {
            return Err(Error::tool(program, format!("exited with {}", status)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_missing_program_is_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = SystemRunner
            .run("fwstitch-no-such-tool", &[], dir.path())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalToolFailure);
        assert!(err.to_string().contains("fwstitch-no-such-tool"));
    }
}
