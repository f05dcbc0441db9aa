//! Board feature flags

use bitflags::bitflags;

bitflags! {
    /// Feature flags toggling optional parts of a board layout
    ///
    /// Flags only ever add or remove whole entries of the layout tree;
    /// they never resize an entry that is already there.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BoardFeatures: u32 {
        /// Stage1B executes in place and is stored uncompressed
        const STAGE1B_XIP        = 1 << 0;
        /// Firmware-update payload present in each redundant copy
        const ENABLE_FWU         = 1 << 1;
        /// Extra payload region present in the non-redundant area
        const HAVE_EPAYLOAD      = 1 << 2;
        /// Key-hash store present in the simple image
        const HAVE_VERIFIED_BOOT = 1 << 3;
    }
}

/// Feature flags for boards (RON format)
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
#[serde(default)]
pub(super) struct FeaturesDef {
    stage1b_xip: bool,
    enable_fwu: bool,
    have_epayload: bool,
    have_verified_boot: bool,
}

impl From<FeaturesDef> for BoardFeatures {
    fn from(def: FeaturesDef) -> Self {
        let mut f = BoardFeatures::empty();
        if def.stage1b_xip {
            f |= BoardFeatures::STAGE1B_XIP;
        }
        if def.enable_fwu {
            f |= BoardFeatures::ENABLE_FWU;
        }
        if def.have_epayload {
            f |= BoardFeatures::HAVE_EPAYLOAD;
        }
        if def.have_verified_boot {
            f |= BoardFeatures::HAVE_VERIFIED_BOOT;
        }
        f
    }
}
