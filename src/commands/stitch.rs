//! Stitch a hand-written layout tree

use std::path::{Path, PathBuf};

use fwstitch_core::region::LayoutTree;
use fwstitch_core::stitch::{write_atomic, ArtifactStore, Stitcher};

use super::progress::IndicatifProgress;
use crate::cli::CodecArgs;
use crate::CliError;

/// Arguments of the `stitch` command
pub struct StitchArgs<'a> {
    pub layout: &'a Path,
    pub artifacts: &'a [PathBuf],
    pub out: &'a Path,
    pub pad_byte: Option<u8>,
    pub block_size: Option<u32>,
    pub final_container: Option<&'a str>,
    pub intermediates: bool,
    pub codec: &'a CodecArgs,
}

/// Stitch the containers of a TOML layout into `out`
pub fn cmd_stitch(args: &StitchArgs<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let mut tree = LayoutTree::from_toml_file(args.layout)?;
    if let Some(block_size) = args.block_size {
        tree.block_size = block_size;
    }
    let pad_byte = args.pad_byte.or(tree.pad_byte).ok_or(CliError::NoPadByte)?;

    let artifacts = ArtifactStore::with_dirs(args.artifacts.iter().cloned());
    let compressor = super::compressor(args.codec);
    let mut stitcher = Stitcher::new(&tree, &artifacts, compressor.as_ref(), pad_byte);

    if let Some(name) = args.final_container {
        stitcher.preflight_for(name)?;
        let data = stitcher.stitch(name)?;
        std::fs::create_dir_all(args.out)?;
        let path = write_atomic(&args.out.join(name), &data)?;
        println!("Wrote {} ({} bytes)", path.display(), data.len());
        return Ok(());
    }

    stitcher.preflight()?;
    let mut progress = IndicatifProgress::new();
    let output = stitcher.stitch_all(&mut progress)?;
    for path in output.write(args.out, args.intermediates)? {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const LAYOUT: &str = r#"
[layout]
name = "test"
block_size = 16

[[container]]
name = "INNER.bin"

[[container.region]]
name = "A.bin"
size = 16

[[container]]
name = "IMAGE.bin"

[[container.region]]
name = "INNER.bin"
container = "INNER.bin"
size = 32
position = "head"
"#;

    fn run(dir: &Path, pad_byte: Option<u8>, final_container: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
        let layout = dir.join("layout.toml");
        fs::write(&layout, LAYOUT).unwrap();
        fs::write(dir.join("A.bin"), [0xAAu8; 4]).unwrap();
        let artifacts = vec![dir.to_path_buf()];
        let out = dir.join("out");
        cmd_stitch(&StitchArgs {
            layout: &layout,
            artifacts: &artifacts,
            out: &out,
            pad_byte,
            block_size: None,
            final_container,
            intermediates: false,
            codec: &CodecArgs::default(),
        })
    }

    #[test]
    fn test_stitch_layout_file() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), Some(0x00), None).unwrap();

        let image = fs::read(dir.path().join("out/IMAGE.bin")).unwrap();
        let mut expected = vec![0u8; 16];
        expected.extend_from_slice(&[0xAA; 4]);
        expected.extend_from_slice(&[0u8; 12]);
        assert_eq!(image, expected);
        assert!(!dir.path().join("out/INNER.bin").exists());
    }

    #[test]
    fn test_stitch_single_container() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), Some(0xFF), Some("INNER.bin")).unwrap();
        let inner = fs::read(dir.path().join("out/INNER.bin")).unwrap();
        assert_eq!(inner.len(), 16);
        assert!(!dir.path().join("out/IMAGE.bin").exists());
    }

    #[test]
    fn test_single_container_ignores_sibling_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let layout = dir.path().join("layout.toml");
        let with_payload = format!(
            "{}\n[[container.region]]\nname = \"PAYLOAD.bin\"\nsize = 16\n",
            LAYOUT
        );
        fs::write(&layout, with_payload).unwrap();
        fs::write(dir.path().join("A.bin"), [0xAAu8; 4]).unwrap();
        let artifacts = vec![dir.path().to_path_buf()];
        let out = dir.path().join("out");
        let mut args = StitchArgs {
            layout: &layout,
            artifacts: &artifacts,
            out: &out,
            pad_byte: Some(0xFF),
            block_size: None,
            final_container: Some("INNER.bin"),
            intermediates: false,
            codec: &CodecArgs::default(),
        };

        cmd_stitch(&args).unwrap();
        assert_eq!(fs::read(out.join("INNER.bin")).unwrap().len(), 16);

        args.final_container = None;
        let err = cmd_stitch(&args).unwrap_err();
        assert!(err.to_string().contains("PAYLOAD.bin"));
        assert!(!out.join("IMAGE.bin").exists());
    }

    #[test]
    fn test_pad_byte_required() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(dir.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("no pad byte"));
    }
}
