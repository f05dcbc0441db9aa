//! Compression through external executables
//!
//! Firmware build environments often ship their own compressor binaries.
//! Each is invoked as `<tool> -e -o <output> <input>` in a scratch
//! directory and its output is wrapped in the usual compressed header.

use std::fs;
use std::path::PathBuf;

use log::trace;

use super::{header, Codec, Compressor};
use crate::error::{Error, Result};
use crate::tool::{SystemRunner, ToolRunner};

/// Compressor that shells out to one executable per codec
pub struct ToolCompressor<R: ToolRunner = SystemRunner> {
    lz4: PathBuf,
    lzma: PathBuf,
    runner: R,
}

impl ToolCompressor<SystemRunner> {
    /// Create a compressor running the given executables
    pub fn new(lz4: impl Into<PathBuf>, lzma: impl Into<PathBuf>) -> Self {
        Self::with_runner(lz4, lzma, SystemRunner)
    }
}

impl<R: ToolRunner> ToolCompressor<R> {
    /// Create a compressor with a custom runner
    pub fn with_runner(lz4: impl Into<PathBuf>, lzma: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            lz4: lz4.into(),
            lzma: lzma.into(),
            runner,
        }
    }

    fn tool_for(&self, codec: Codec) -> Option<&PathBuf> {
        match codec {
            Codec::None => None,
            Codec::Lz4 => Some(&self.lz4),
            Codec::Lzma => Some(&self.lzma),
        }
    }
}

impl<R: ToolRunner> Compressor for ToolCompressor<R> {
    fn compress(&self, codec: Codec, raw: &[u8]) -> Result<Vec<u8>> {
        let Some(tool) = self.tool_for(codec) else {
            return Ok(raw.to_vec());
        };
        let tool_name = tool.display().to_string();

        let scratch = tempfile::Builder::new()
            .prefix("fwstitch-codec")
            .tempdir()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let input = scratch.path().join("input.bin");
        let output = scratch.path().join("output.bin");
        fs::write(&input, raw).map_err(|e| Error::io(&input, e))?;

        let args = vec![
            "-e".to_string(),
            "-o".to_string(),
            output.display().to_string(),
            input.display().to_string(),
        ];
        self.runner.run(&tool_name, &args, scratch.path())?;

        let payload = fs::read(&output).map_err(|_| {
            Error::tool(&tool_name, format!("produced no output at {}", output.display()))
        })?;
        trace!("{} compressed {} -> {} bytes", tool_name, raw.len(), payload.len());
        header::wrap(codec, raw.len(), payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CompressedHeader;
    use crate::error::ErrorKind;
    use std::cell::RefCell;
    use std::path::Path;

    /// Fake tool that "compresses" by keeping every other byte
    struct HalvingTool {
        calls: RefCell<Vec<String>>,
        fail: bool,
    }

    impl ToolRunner for HalvingTool {
        fn run(&self, program: &str, args: &[String], _cwd: &Path) -> Result<()> {
            self.calls.borrow_mut().push(program.to_string());
            if self.fail {
                return Err(Error::tool(program, "exited with exit status: 1"));
            }
            assert_eq!(&args[..2], &["-e", "-o"]);
            let data = fs::read(&args[3]).unwrap();
            let halved: Vec<u8> = data.iter().step_by(2).copied().collect();
            fs::write(&args[2], halved).unwrap();
            Ok(())
        }
    }

    fn tool(fail: bool) -> ToolCompressor<HalvingTool> {
        ToolCompressor::with_runner(
            "Lz4Compress",
            "LzmaCompress",
            HalvingTool {
                calls: RefCell::new(Vec::new()),
                fail,
            },
        )
    }

    #[test]
    fn test_runs_tool_per_codec() {
        let compressor = tool(false);
        let raw = vec![1u8, 2, 3, 4, 5, 6];

        let out = compressor.compress(Codec::Lzma, &raw).unwrap();
        let (hdr, payload) = CompressedHeader::parse(&out).unwrap();
        assert_eq!(&hdr.signature, b"LZMA");
        assert_eq!(payload, &[1, 3, 5]);

        compressor.compress(Codec::Lz4, &raw).unwrap();
        assert_eq!(compressor.compress(Codec::None, &raw).unwrap(), raw);
        assert_eq!(
            *compressor.runner.calls.borrow(),
            vec!["LzmaCompress", "Lz4Compress"]
        );
    }

    #[test]
    fn test_tool_failure_propagates() {
        let err = tool(true).compress(Codec::Lz4, &[0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalToolFailure);
    }
}
