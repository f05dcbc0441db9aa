//! Board image build

use std::path::{Path, PathBuf};

use fwstitch_core::board::BoardConfig;
use fwstitch_core::hook::{self, ResetVectorBuild};
use fwstitch_core::image::{plan_image, stitch_image};
use fwstitch_core::stitch::ArtifactStore;
use fwstitch_core::tool::SystemRunner;

use super::progress::IndicatifProgress;
use crate::cli::{CodecArgs, ResetVectorArgs};

/// Build a board image into `out`
///
/// Every container is written, intermediate containers first and the
/// final image last, and only once the whole build has succeeded.
pub fn cmd_build(
    board: &BoardConfig,
    artifact_dirs: &[PathBuf],
    out: &Path,
    reset: &ResetVectorArgs,
    codec: &CodecArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    println!(
        "Building {} ({} layout, {} flash)",
        board.name,
        if board.redundant_layout { "redundant" } else { "simple" },
        super::format_size(board.flash_size as u64)
    );

    // Configuration errors abort before the reset vector sub-build runs
    let tree = plan_image(board)?;

    let mut artifacts = ArtifactStore::with_dirs(artifact_dirs.iter().cloned());
    prepare_reset_vector(board, reset, &mut artifacts)?;

    let compressor = super::compressor(codec);
    let mut progress = IndicatifProgress::new();
    let output = stitch_image(board, &tree, &artifacts, compressor.as_ref(), &mut progress)?;

    let written = output.write(out, true)?;
    for path in &written {
        println!("  {}", path.display());
    }
    if let Some(image) = output.final_image() {
        println!(
            "Image {} is {} bytes ({})",
            board.image_name,
            image.len(),
            super::format_size(image.len() as u64)
        );
    }
    Ok(())
}

/// Make `RESET.bin` available, either prebuilt or from the sub-build
///
/// Without either option the reset vector must already be among the
/// artifacts.
fn prepare_reset_vector(
    board: &BoardConfig,
    reset: &ResetVectorArgs,
    artifacts: &mut ArtifactStore,
) -> Result<(), Box<dyn std::error::Error>> {
    let reset_size = board.sizes.reset;

    let blob = if let Some(path) = &reset.reset_vector {
        hook::load_prebuilt(path, reset_size)?
    } else if let Some(dir) = &reset.vtf_dir {
        let build = ResetVectorBuild::for_board(
            board,
            dir,
            reset.toolchain_prefix.as_deref().unwrap_or_default(),
        );
        build.run(&SystemRunner, reset_size)?
    } else {
        log::debug!("No reset vector source given, expecting RESET.bin among the artifacts");
        return Ok(());
    };

    hook::register(artifacts, blob);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const BOARD: &str = include_str!("../../boards/armqemu.ron");

    fn write_artifacts(dir: &Path, board: &BoardConfig) {
        let s = &board.sizes;
        fs::write(dir.join("STAGE1A.fd"), vec![0x1A; 0x2000]).unwrap();
        fs::write(dir.join("STAGE1B.fd"), vec![0x1B; 0x2000]).unwrap();
        fs::write(dir.join("STAGE2.fd"), vec![0x02; 0x2000]).unwrap();
        fs::write(dir.join("CFGDATA.bin"), vec![0xCF; 0x100]).unwrap();
        fs::write(dir.join("PAYLOAD.bin"), vec![0x0D; 0x4000]).unwrap();
        fs::write(dir.join("VARIABLE.bin"), vec![0xFF; s.variable as usize]).unwrap();
        fs::write(dir.join("SBLRSVD.bin"), vec![0xFF; s.sblrsvd as usize]).unwrap();
    }

    #[test]
    fn test_build_with_prebuilt_reset_vector() {
        let board = BoardConfig::load_ron(BOARD).unwrap();
        let fv = tempfile::tempdir().unwrap();
        write_artifacts(fv.path(), &board);
        let reset = fv.path().join("reset.raw");
        fs::write(&reset, [0xEAu8; 0x20]).unwrap();
        let out = fv.path().join("out");

        let args = ResetVectorArgs {
            reset_vector: Some(reset),
            ..Default::default()
        };
        cmd_build(&board, &[fv.path().to_path_buf()], &out, &args, &CodecArgs::default()).unwrap();

        let image = fs::read(out.join(&board.image_name)).unwrap();
        assert_eq!(&image[..0x20], &[0xEA; 0x20][..]);
        assert!(out.join("STAGE1.bin").exists());
    }

    #[test]
    fn test_bad_board_stops_before_reset_vector_build() {
        let ron = include_str!("../../boards/armqemu-redundant.ron");
        let bad = ron.replace("flash_size: B(0x4E0000)", "flash_size: MiB(1)");
        assert_ne!(bad, ron);
        let board = BoardConfig::load_ron(&bad).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let vtf = dir.path().join("Vtf0");
        fs::create_dir_all(&vtf).unwrap();

        let args = ResetVectorArgs {
            vtf_dir: Some(vtf.clone()),
            toolchain_prefix: Some("fwstitch-test-no-such-".to_string()),
            ..Default::default()
        };
        let err = cmd_build(
            &board,
            &[dir.path().to_path_buf()],
            &dir.path().join("out"),
            &args,
            &CodecArgs::default(),
        )
        .unwrap_err();
        let err = err.downcast::<fwstitch_core::Error>().unwrap();
        assert_eq!(err.kind(), fwstitch_core::ErrorKind::Configuration);
        assert!(!vtf.join("Bin").exists());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_failed_build_keeps_previous_image() {
        let board = BoardConfig::load_ron(BOARD).unwrap();
        let fv = tempfile::tempdir().unwrap();
        write_artifacts(fv.path(), &board);
        let out = fv.path().join("out");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join(&board.image_name), b"good image").unwrap();

        // No reset vector anywhere
        let err = cmd_build(
            &board,
            &[fv.path().to_path_buf()],
            &out,
            &ResetVectorArgs::default(),
            &CodecArgs::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("RESET.bin"));
        assert_eq!(fs::read(out.join(&board.image_name)).unwrap(), b"good image");
        assert!(!out.join("STAGE1.bin").exists());
    }
}
