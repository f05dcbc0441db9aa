//! Board layout trees
//!
//! Two variants exist. The simple variant packs a single stage 1 container
//! and the remaining stages into one image. The redundant variant places two
//! identical copies of the boot-critical stages (A and B) so an update can
//! rewrite one copy while the other stays bootable, alongside a
//! non-redundant area and a non-volatile area.
//!
//! The reset vector is the first region of `STAGE1.bin` in the simple
//! variant and of both top-swap blocks in the redundant variant.

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::region::{Container, InsertPosition, LayoutTree, PaddingPolicy, RegionSpec};

use super::{BoardConfig, BoardFeatures};

/// Artifact name of the reset vector blob
pub const RESET_VECTOR_ARTIFACT: &str = "RESET.bin";

/// Container holding reset vector, stage 1A and stage 1B (simple variant)
pub const STAGE1_CONTAINER: &str = "STAGE1.bin";
/// Non-volatile area (redundant variant)
pub const NON_VOLATILE_CONTAINER: &str = "NON_VOLATILE.bin";
/// Non-redundant area (redundant variant)
pub const NON_REDUNDANT_CONTAINER: &str = "NON_REDUNDANT.bin";

/// One of the two redundant copies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    /// Primary copy
    A,
    /// Backup copy
    B,
}

impl Partition {
    /// Both copies, in placement order
    pub const ALL: [Partition; 2] = [Partition::A, Partition::B];

    fn suffix(self) -> &'static str {
        match self {
            Partition::A => "A",
            Partition::B => "B",
        }
    }

    /// Redundant container name for this copy
    pub fn redundant_container(self) -> String {
        format!("REDUNDANT_{}.bin", self.suffix())
    }

    /// Top-swap container name for this copy
    pub fn top_swap_container(self) -> String {
        format!("TOP_SWAP_{}.bin", self.suffix())
    }

    /// Stage 1A artifact for this copy
    pub fn stage1a_artifact(self) -> String {
        format!("STAGE1A_{}.fd", self.suffix())
    }

    /// Stage 1B artifact for this copy
    pub fn stage1b_artifact(self) -> String {
        format!("STAGE1B_{}.fd", self.suffix())
    }
}

/// Build the layout tree for a board
pub fn board_layout(board: &BoardConfig) -> Result<LayoutTree> {
    let mut tree = LayoutTree::new(board.flash_block_size);
    tree.name = Some(board.name.clone());
    tree.pad_byte = Some(board.pad_byte);

    if board.redundant_layout {
        redundant_layout(board, &mut tree)?;
    } else {
        simple_layout(board, &mut tree)?;
    }
    Ok(tree)
}

fn stage1b_codec(board: &BoardConfig) -> Codec {
    if board.has(BoardFeatures::STAGE1B_XIP) {
        Codec::None
    } else {
        Codec::Lz4
    }
}

fn simple_layout(board: &BoardConfig, tree: &mut LayoutTree) -> Result<()> {
    let s = &board.sizes;

    tree.add_container(Container::new(
        STAGE1_CONTAINER,
        vec![
            RegionSpec::artifact(RESET_VECTOR_ARTIFACT, s.reset),
            RegionSpec::artifact("STAGE1A.fd", s.stage1a),
            RegionSpec::artifact("STAGE1B.fd", s.stage1b).with_codec(stage1b_codec(board)),
        ],
    ))?;

    let stage1_size = u32::try_from(s.stage1())
        .map_err(|_| Error::config(format!("board '{}': stage 1 exceeds 4 GiB", board.name)))?;

    let mut regions = vec![
        RegionSpec::container(STAGE1_CONTAINER, stage1_size).with_policy(PaddingPolicy::NoOp),
        RegionSpec::artifact("STAGE2.fd", s.stage2).with_codec(Codec::Lz4),
        RegionSpec::artifact("CFGDATA.bin", s.cfgdata),
        RegionSpec::artifact("PAYLOAD.bin", s.payload).with_codec(Codec::Lzma),
    ];
    if board.has(BoardFeatures::HAVE_VERIFIED_BOOT) {
        regions.push(RegionSpec::artifact("KEYHASH.bin", s.keyhash));
    }
    regions.push(RegionSpec::artifact("VARIABLE.bin", s.variable).with_policy(PaddingPolicy::NoOp));
    regions.push(RegionSpec::artifact("SBLRSVD.bin", s.sblrsvd).with_policy(PaddingPolicy::NoOp));

    tree.add_container(Container::new(board.image_name.clone(), regions))
}

fn head(region: RegionSpec) -> RegionSpec {
    region.with_position(InsertPosition::Head)
}

fn redundant_layout(board: &BoardConfig, tree: &mut LayoutTree) -> Result<()> {
    let s = &board.sizes;

    tree.add_container(Container::new(
        NON_VOLATILE_CONTAINER,
        vec![head(
            RegionSpec::artifact("SBLRSVD.bin", s.sblrsvd).with_policy(PaddingPolicy::NoOp),
        )],
    ))?;

    let mut non_redundant = vec![
        head(RegionSpec::artifact("VARIABLE.bin", s.variable).with_policy(PaddingPolicy::NoOp)),
        head(RegionSpec::artifact("PAYLOAD.bin", s.payload).with_codec(Codec::Lzma)),
    ];
    if let (true, Some(size)) = (board.has(BoardFeatures::HAVE_EPAYLOAD), s.epayload) {
        non_redundant.push(head(RegionSpec::artifact("EPAYLOAD.bin", size)));
    }
    tree.add_container(Container::new(NON_REDUNDANT_CONTAINER, non_redundant))?;

    for copy in Partition::ALL {
        tree.add_container(redundant_copy(board, copy))?;
    }

    for copy in Partition::ALL {
        tree.add_container(Container::new(
            copy.top_swap_container(),
            vec![
                head(RegionSpec::artifact(RESET_VECTOR_ARTIFACT, s.reset)),
                head(
                    RegionSpec::artifact(copy.stage1a_artifact(), s.stage1a)
                        .with_policy(PaddingPolicy::NoOp),
                ),
            ],
        ))?;
    }

    let mut image = Vec::with_capacity(6);
    for copy in Partition::ALL {
        image.push(head(RegionSpec::container(copy.top_swap_container(), s.top_swap)));
    }
    for copy in Partition::ALL {
        image.push(head(RegionSpec::container(copy.redundant_container(), s.redundant)));
    }
    image.push(head(RegionSpec::container(NON_REDUNDANT_CONTAINER, s.non_redundant)));
    image.push(head(RegionSpec::container(NON_VOLATILE_CONTAINER, s.non_volatile)));

    tree.add_container(Container::new(board.image_name.clone(), image))
}

/// One redundant copy
///
/// Both copies share every artifact except stage 1B, so identical inputs
/// give byte-identical copies.
fn redundant_copy(board: &BoardConfig, copy: Partition) -> Container {
    let s = &board.sizes;

    let mut regions = vec![
        head(RegionSpec::artifact(copy.stage1b_artifact(), s.stage1b).with_codec(stage1b_codec(board))),
        head(RegionSpec::artifact("STAGE2.fd", s.stage2).with_codec(Codec::Lz4)),
    ];
    if let (true, Some(size)) = (board.has(BoardFeatures::ENABLE_FWU), s.fwupdate) {
        regions.push(head(RegionSpec::artifact("FWUPDATE.bin", size).with_codec(Codec::Lzma)));
    }
    regions.push(head(RegionSpec::artifact("CFGDATA.bin", s.cfgdata)));
    regions.push(head(RegionSpec::artifact("KEYHASH.bin", s.keyhash)));

    Container::new(copy.redundant_container(), regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::fixtures::{REDUNDANT, SIMPLE};
    use crate::region::Source;

    fn region_names(tree: &LayoutTree, container: &str) -> Vec<String> {
        tree.find_container(container)
            .unwrap()
            .regions
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    #[test]
    fn test_simple_layout() {
        let board = BoardConfig::load_ron(SIMPLE).unwrap();
        let tree = board_layout(&board).unwrap();
        tree.validate().unwrap();

        let names: Vec<_> = tree.containers().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["STAGE1.bin", "FwImage.bin"]);
        assert_eq!(tree.pad_byte, Some(0xFF));
        assert_eq!(tree.block_size, 0x1000);

        let stage1 = tree.find_container(STAGE1_CONTAINER).unwrap();
        assert_eq!(stage1.regions[0].name, RESET_VECTOR_ARTIFACT);
        assert!(stage1
            .regions
            .iter()
            .all(|r| r.position == InsertPosition::Tail && r.policy == PaddingPolicy::Pad));
        assert_eq!(stage1.regions[2].codec, Codec::Lz4);

        assert_eq!(
            region_names(&tree, "FwImage.bin"),
            vec!["STAGE1.bin", "STAGE2.fd", "CFGDATA.bin", "PAYLOAD.bin", "VARIABLE.bin", "SBLRSVD.bin"]
        );
        let image = tree.final_container().unwrap();
        assert_eq!(image.regions[0].source, Source::Container("STAGE1.bin".into()));
        assert_eq!(image.regions[0].size, 0x13000);
        assert_eq!(image.regions[0].policy, PaddingPolicy::NoOp);
        assert_eq!(image.find_region("PAYLOAD.bin").unwrap().codec, Codec::Lzma);
    }

    #[test]
    fn test_simple_features() {
        let mut board = BoardConfig::load_ron(SIMPLE).unwrap();
        board.features = BoardFeatures::STAGE1B_XIP | BoardFeatures::HAVE_VERIFIED_BOOT;
        let tree = board_layout(&board).unwrap();

        let stage1 = tree.find_container(STAGE1_CONTAINER).unwrap();
        assert_eq!(stage1.find_region("STAGE1B.fd").unwrap().codec, Codec::None);
        assert!(tree.final_container().unwrap().find_region("KEYHASH.bin").is_some());
    }

    #[test]
    fn test_redundant_layout() {
        let board = BoardConfig::load_ron(REDUNDANT).unwrap();
        let tree = board_layout(&board).unwrap();
        tree.validate().unwrap();

        assert_eq!(
            region_names(&tree, "FwImage.bin"),
            vec![
                "TOP_SWAP_A.bin",
                "TOP_SWAP_B.bin",
                "REDUNDANT_A.bin",
                "REDUNDANT_B.bin",
                "NON_REDUNDANT.bin",
                "NON_VOLATILE.bin",
            ]
        );
        assert_eq!(tree.final_container().unwrap().allocated_size(), 0x4E0000);

        for container in tree.containers() {
            assert!(container
                .regions
                .iter()
                .all(|r| r.position == InsertPosition::Head));
        }

        for copy in Partition::ALL {
            let top_swap = tree.find_container(&copy.top_swap_container()).unwrap();
            assert_eq!(top_swap.regions[0].name, RESET_VECTOR_ARTIFACT);
            assert_eq!(top_swap.regions[1].policy, PaddingPolicy::NoOp);
        }

        // ENABLE_FWU is set in the test board, HAVE_EPAYLOAD is not
        assert!(tree
            .find_container("REDUNDANT_A.bin")
            .unwrap()
            .find_region("FWUPDATE.bin")
            .is_some());
        assert!(tree
            .find_container(NON_REDUNDANT_CONTAINER)
            .unwrap()
            .find_region("EPAYLOAD.bin")
            .is_none());
    }

    #[test]
    fn test_redundant_copies_match() {
        let board = BoardConfig::load_ron(REDUNDANT).unwrap();
        let tree = board_layout(&board).unwrap();
        let a = tree.find_container("REDUNDANT_A.bin").unwrap();
        let b = tree.find_container("REDUNDANT_B.bin").unwrap();

        assert_eq!(a.regions.len(), b.regions.len());
        for (ra, rb) in a.regions.iter().zip(&b.regions) {
            assert_eq!(ra.size, rb.size);
            assert_eq!(ra.codec, rb.codec);
            assert_eq!(ra.policy, rb.policy);
            assert_eq!(ra.position, rb.position);
        }
        assert_eq!(a.regions[0].name, "STAGE1B_A.fd");
        assert_eq!(b.regions[0].name, "STAGE1B_B.fd");
    }

    #[test]
    fn test_features_add_whole_entries() {
        let mut board = BoardConfig::load_ron(REDUNDANT).unwrap();
        board.features = BoardFeatures::empty();
        let without = board_layout(&board).unwrap();

        board.features = BoardFeatures::ENABLE_FWU;
        let with = board_layout(&board).unwrap();

        let count = |tree: &LayoutTree| tree.find_container("REDUNDANT_B.bin").unwrap().regions.len();
        assert_eq!(count(&with), count(&without) + 1);
        // Toggling a feature never resizes the other regions
        let cfg = |tree: &LayoutTree| {
            tree.find_container("REDUNDANT_B.bin")
                .unwrap()
                .find_region("CFGDATA.bin")
                .unwrap()
                .size
        };
        assert_eq!(cfg(&with), cfg(&without));
    }

    #[test]
    fn test_shipped_boards() {
        for ron in [
            include_str!("../../../../boards/armqemu.ron"),
            include_str!("../../../../boards/armqemu-redundant.ron"),
        ] {
            let board = BoardConfig::load_ron(ron).unwrap();
            let tree = board_layout(&board).unwrap();
            tree.validate().unwrap();
            crate::image::check_image_size(&board, &tree).unwrap();
        }
    }
}
