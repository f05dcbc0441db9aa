//! Board configuration loading
//!
//! Boards are described in RON files and converted once into an immutable
//! [`BoardConfig`]:
//!
//! ```ron
//! (
//!     name: "armqemu",
//!     image_name: "FwImage.bin",
//!     pad_byte: 0xFF,
//!     flash_block_size: KiB(4),
//!     flash_size: MiB(1),
//!     redundant_layout: false,
//!     features: (stage1b_xip: true),
//!     sizes: (
//!         reset: KiB(4),
//!         stage1a: KiB(32),
//!         // ...
//!     ),
//!     reset_vector: (arch: "arm", base: 0x1000),
//! )
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use super::features::FeaturesDef;
use super::BoardFeatures;
use crate::error::{Error, Result};

// ============================================================================
// RON deserialization types (intermediate format)
// ============================================================================

/// Size specification with human-readable units (for RON parsing)
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub enum Size {
    /// Size in bytes
    B(u32),
    /// Size in kibibytes (1024 bytes)
    KiB(u32),
    /// Size in mebibytes (1024 * 1024 bytes)
    MiB(u32),
}

impl Size {
    /// Convert to bytes
    pub fn to_bytes(self) -> Result<u32> {
        let bytes = match self {
            Size::B(n) => Some(n),
            Size::KiB(n) => n.checked_mul(1024),
            Size::MiB(n) => n.checked_mul(1024 * 1024),
        };
        bytes.ok_or_else(|| Error::config(format!("size {:?} does not fit in 32 bits", self)))
    }
}

/// Region sizes (RON format)
#[derive(Debug, Clone, serde::Deserialize)]
struct SizesDef {
    reset: Size,
    stage1a: Size,
    stage1b: Size,
    stage2: Size,
    payload: Size,
    cfgdata: Size,
    keyhash: Size,
    variable: Size,
    sblrsvd: Size,
    #[serde(default)]
    fwupdate: Option<Size>,
    #[serde(default)]
    epayload: Option<Size>,
    top_swap: Size,
    redundant: Size,
    non_redundant: Size,
    non_volatile: Size,
}

/// Reset vector sub-build parameters (RON format)
#[derive(Debug, Clone, serde::Deserialize)]
struct ResetVectorDef {
    arch: String,
    base: u32,
}

/// Board definition in RON format
#[derive(Debug, Clone, serde::Deserialize)]
struct BoardDef {
    name: String,
    image_name: String,
    pad_byte: u8,
    flash_block_size: Size,
    flash_size: Size,
    redundant_layout: bool,
    #[serde(default)]
    features: FeaturesDef,
    sizes: SizesDef,
    reset_vector: ResetVectorDef,
}

// ============================================================================
// Board configuration
// ============================================================================

/// Byte sizes of every board region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSizes {
    /// Reset vector
    pub reset: u32,
    /// Stage 1A
    pub stage1a: u32,
    /// Stage 1B
    pub stage1b: u32,
    /// Stage 2
    pub stage2: u32,
    /// OS payload
    pub payload: u32,
    /// Configuration data blob
    pub cfgdata: u32,
    /// Key-hash store
    pub keyhash: u32,
    /// Variable store
    pub variable: u32,
    /// Reserved area
    pub sblrsvd: u32,
    /// Firmware-update payload, when the board has one
    pub fwupdate: Option<u32>,
    /// Extra payload, when the board has one
    pub epayload: Option<u32>,
    /// One top-swap block
    pub top_swap: u32,
    /// One redundant copy
    pub redundant: u32,
    /// Non-redundant area
    pub non_redundant: u32,
    /// Non-volatile area
    pub non_volatile: u32,
}

impl RegionSizes {
    /// Size of the stage 1 container (reset vector + stage 1A + stage 1B)
    pub fn stage1(&self) -> u64 {
        self.reset as u64 + self.stage1a as u64 + self.stage1b as u64
    }

    /// Flash image size implied by the top-level areas
    ///
    /// Both top-swap blocks and both redundant copies are placed.
    pub fn image_size(&self) -> u64 {
        (self.top_swap as u64 + self.redundant as u64) * 2
            + self.non_redundant as u64
            + self.non_volatile as u64
    }
}

/// Reset vector sub-build parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetVectorConfig {
    /// Target architecture passed to the sub-build
    pub arch: String,
    /// Base address baked into the reset vector
    pub base: u32,
}

/// Immutable per-build board configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    /// Board name
    pub name: String,
    /// File name of the final image
    pub image_name: String,
    /// Byte used to fill padding
    pub pad_byte: u8,
    /// Minimum flash block granularity
    pub flash_block_size: u32,
    /// Total flash image size
    pub flash_size: u32,
    /// Build the A/B redundant layout instead of the simple one
    pub redundant_layout: bool,
    /// Optional layout features
    pub features: BoardFeatures,
    /// Region sizes
    pub sizes: RegionSizes,
    /// Reset vector parameters
    pub reset_vector: ResetVectorConfig,
}

impl BoardConfig {
    /// Load a board from a RON file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::load_ron(&content).map_err(|e| match e {
            Error::Parse { message, .. } => Error::Parse {
                what: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Load a board from a RON string
    pub fn load_ron(content: &str) -> Result<Self> {
        let def: BoardDef = ron::from_str(content).map_err(|e| Error::Parse {
            what: "board RON".to_string(),
            message: e.to_string(),
        })?;
        let board = Self::try_from(def)?;
        board.validate()?;
        Ok(board)
    }

    /// List the RON board files in a directory, sorted by name
    pub fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut boards = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| Error::io(dir, e))? {
            let path = entry.map_err(|e| Error::io(dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "ron") {
                boards.push(path);
            }
        }
        boards.sort();
        Ok(boards)
    }

    /// Check a feature flag
    pub fn has(&self, feature: BoardFeatures) -> bool {
        self.features.contains(feature)
    }

    /// Check values the layout itself cannot catch
    pub fn validate(&self) -> Result<()> {
        if self.flash_block_size == 0 {
            return Err(Error::config(format!(
                "board '{}': flash block size must be non-zero",
                self.name
            )));
        }
        if self.image_name.is_empty() {
            return Err(Error::config(format!(
                "board '{}': image name is empty",
                self.name
            )));
        }

        let optional = [
            (BoardFeatures::ENABLE_FWU, "fwupdate", self.sizes.fwupdate),
            (BoardFeatures::HAVE_EPAYLOAD, "epayload", self.sizes.epayload),
        ];
        for (feature, field, size) in optional {
            if self.has(feature) && size.unwrap_or(0) == 0 {
                return Err(Error::config(format!(
                    "board '{}': feature {:?} needs a non-zero '{}' size",
                    self.name, feature, field
                )));
            }
        }

        if self.redundant_layout {
            let areas = [
                ("top_swap", self.sizes.top_swap),
                ("redundant", self.sizes.redundant),
                ("non_redundant", self.sizes.non_redundant),
                ("non_volatile", self.sizes.non_volatile),
            ];
            for (field, size) in areas {
                if size == 0 {
                    return Err(Error::config(format!(
                        "board '{}': redundant layout needs a non-zero '{}' size",
                        self.name, field
                    )));
                }
            }
        }

        Ok(())
    }
}

impl TryFrom<BoardDef> for BoardConfig {
    type Error = Error;

    fn try_from(def: BoardDef) -> Result<Self> {
        let s = def.sizes;
        let optional = |size: Option<Size>| size.map(Size::to_bytes).transpose();

        Ok(Self {
            name: def.name,
            image_name: def.image_name,
            pad_byte: def.pad_byte,
            flash_block_size: def.flash_block_size.to_bytes()?,
            flash_size: def.flash_size.to_bytes()?,
            redundant_layout: def.redundant_layout,
            features: def.features.into(),
            sizes: RegionSizes {
                reset: s.reset.to_bytes()?,
                stage1a: s.stage1a.to_bytes()?,
                stage1b: s.stage1b.to_bytes()?,
                stage2: s.stage2.to_bytes()?,
                payload: s.payload.to_bytes()?,
                cfgdata: s.cfgdata.to_bytes()?,
                keyhash: s.keyhash.to_bytes()?,
                variable: s.variable.to_bytes()?,
                sblrsvd: s.sblrsvd.to_bytes()?,
                fwupdate: optional(s.fwupdate)?,
                epayload: optional(s.epayload)?,
                top_swap: s.top_swap.to_bytes()?,
                redundant: s.redundant.to_bytes()?,
                non_redundant: s.non_redundant.to_bytes()?,
                non_volatile: s.non_volatile.to_bytes()?,
            },
            reset_vector: ResetVectorConfig {
                arch: def.reset_vector.arch,
                base: def.reset_vector.base,
            },
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;

    pub(crate) const SIMPLE: &str = r#"
(
    name: "armqemu",
    image_name: "FwImage.bin",
    pad_byte: 0xFF,
    flash_block_size: KiB(4),
    flash_size: MiB(1),
    redundant_layout: false,
    sizes: (
        reset: KiB(4),
        stage1a: KiB(32),
        stage1b: KiB(40),
        stage2: KiB(40),
        payload: KiB(128),
        cfgdata: KiB(4),
        keyhash: KiB(4),
        variable: KiB(8),
        sblrsvd: KiB(4),
        top_swap: B(0),
        redundant: B(0),
        non_redundant: MiB(1),
        non_volatile: B(0),
    ),
    reset_vector: (arch: "arm", base: 0x1000),
)
"#;

    pub(crate) const REDUNDANT: &str = r#"
(
    name: "armqemu-ab",
    image_name: "FwImage.bin",
    pad_byte: 0xFF,
    flash_block_size: KiB(4),
    flash_size: B(0x4E0000),
    redundant_layout: true,
    features: (enable_fwu: true),
    sizes: (
        reset: KiB(4),
        stage1a: KiB(32),
        stage1b: KiB(40),
        stage2: KiB(40),
        payload: KiB(128),
        cfgdata: KiB(4),
        keyhash: KiB(4),
        variable: KiB(8),
        sblrsvd: KiB(4),
        fwupdate: Some(KiB(96)),
        top_swap: KiB(512),
        redundant: KiB(512),
        non_redundant: B(0x2DF000),
        non_volatile: KiB(4),
    ),
    reset_vector: (arch: "arm", base: 0x1000),
)
"#;

    #[test]
    fn test_load_simple() {
        let board = BoardConfig::load_ron(SIMPLE).unwrap();
        assert_eq!(board.name, "armqemu");
        assert_eq!(board.pad_byte, 0xFF);
        assert_eq!(board.flash_block_size, 0x1000);
        assert_eq!(board.flash_size, 0x100000);
        assert!(!board.redundant_layout);
        assert!(board.features.is_empty());
        assert_eq!(board.sizes.stage1(), 0x13000);
        assert_eq!(board.sizes.fwupdate, None);
        assert_eq!(board.sizes.image_size(), 0x100000);
        assert_eq!(board.reset_vector.base, 0x1000);
    }

    #[test]
    fn test_load_redundant() {
        let board = BoardConfig::load_ron(REDUNDANT).unwrap();
        assert!(board.redundant_layout);
        assert!(board.has(BoardFeatures::ENABLE_FWU));
        assert!(!board.has(BoardFeatures::STAGE1B_XIP));
        assert_eq!(board.sizes.fwupdate, Some(0x18000));
        assert_eq!(board.sizes.image_size(), board.flash_size as u64);
    }

    #[test]
    fn test_feature_without_size_rejected() {
        let bad = REDUNDANT.replace("fwupdate: Some(KiB(96)),", "");
        let err = BoardConfig::load_ron(&bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("fwupdate"));
    }

    #[test]
    fn test_redundant_needs_areas() {
        let bad = REDUNDANT.replace("non_volatile: KiB(4)", "non_volatile: B(0)");
        assert!(BoardConfig::load_ron(&bad)
            .unwrap_err()
            .to_string()
            .contains("non_volatile"));
    }

    #[test]
    fn test_pad_byte_is_required() {
        let bad = SIMPLE.replace("pad_byte: 0xFF,", "");
        let err = BoardConfig::load_ron(&bad).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_size_overflow() {
        assert!(Size::MiB(4096).to_bytes().is_err());
        assert_eq!(Size::KiB(4).to_bytes().unwrap(), 4096);
    }

    #[test]
    fn test_load_file_and_list_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.ron"), REDUNDANT).unwrap();
        fs::write(dir.path().join("a.ron"), SIMPLE).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a board").unwrap();

        let boards = BoardConfig::list_dir(dir.path()).unwrap();
        assert_eq!(boards, vec![dir.path().join("a.ron"), dir.path().join("b.ron")]);
        let board = BoardConfig::load_file(&boards[1]).unwrap();
        assert_eq!(board.name, "armqemu-ab");
    }
}
