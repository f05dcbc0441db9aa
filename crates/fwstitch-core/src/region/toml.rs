//! TOML layout file parsing
//!
//! Parses layout trees written by hand in TOML format:
//!
//! ```toml
//! [layout]
//! name = "Simple image"
//! block_size = "4 KiB"
//! pad_byte = 0xFF
//!
//! [[container]]
//! name = "STAGE1.bin"
//!
//! [[container.region]]
//! name = "RESET.bin"
//! size = 0x1000
//!
//! [[container.region]]
//! name = "STAGE1B.fd"
//! size = "40 KiB"
//! codec = "lz4"
//!
//! [[container]]
//! name = "IMAGE.bin"
//!
//! [[container.region]]
//! name = "STAGE1.bin"
//! container = "STAGE1.bin"
//! size = "44 KiB"
//! policy = "noop"
//! ```
//!
//! A region's source defaults to an artifact named like the region; `file`
//! names a different artifact and `container` references another container.

use std::fs;
use std::path::Path;

use super::{Container, InsertPosition, LayoutTree, PaddingPolicy, RegionSpec, Source};
use crate::codec::Codec;
use crate::error::{Error, Result};

/// TOML layout file structure
#[derive(Debug, serde::Deserialize)]
struct TomlLayoutFile {
    layout: TomlLayoutMeta,
    container: Vec<TomlContainer>,
}

/// Layout metadata
#[derive(Debug, serde::Deserialize)]
struct TomlLayoutMeta {
    name: Option<String>,
    #[serde(deserialize_with = "deserialize_size_u32")]
    block_size: u32,
    #[serde(default, deserialize_with = "deserialize_opt_hex_u8")]
    pad_byte: Option<u8>,
}

/// Container definition in TOML
#[derive(Debug, serde::Deserialize)]
struct TomlContainer {
    name: String,
    region: Vec<TomlRegion>,
}

/// Region definition in TOML
#[derive(Debug, serde::Deserialize)]
struct TomlRegion {
    name: String,
    file: Option<String>,
    container: Option<String>,
    #[serde(deserialize_with = "deserialize_size_u32")]
    size: u32,
    #[serde(default)]
    codec: Option<String>,
    #[serde(default)]
    policy: Option<String>,
    #[serde(default)]
    position: Option<String>,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum HexOrInt {
    Int(u32),
    Str(String),
}

/// Deserialize a size that can be an integer, hex string or "4 KiB" style string
fn deserialize_size_u32<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => Ok(n),
        HexOrInt::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

/// Deserialize an optional byte that can be hex (0x...) or decimal
fn deserialize_opt_hex_u8<'de, D>(deserializer: D) -> std::result::Result<Option<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    let value = match HexOrInt::deserialize(deserializer)? {
        HexOrInt::Int(n) => n,
        HexOrInt::Str(s) => parse_number(&s).map_err(serde::de::Error::custom)?,
    };
    u8::try_from(value)
        .map(Some)
        .map_err(|_| serde::de::Error::custom(format!("pad byte {:#x} out of range", value)))
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> std::result::Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

/// Parse a size string like "16 MiB", "0x1000" or "4096"
pub fn parse_size(s: &str) -> std::result::Result<u32, String> {
    let s = s.trim();

    if let Ok(n) = parse_number(s) {
        return Ok(n);
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("mb") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix("kb") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix('b') {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u32 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

impl TomlRegion {
    fn into_spec(self, container: &str) -> Result<RegionSpec> {
        let source = match (self.file, self.container) {
            (Some(_), Some(_)) => {
                return Err(Error::region(
                    container,
                    &self.name,
                    "region cannot name both a file and a container",
                ))
            }
            (Some(file), None) => Source::Artifact(file),
            (None, Some(child)) => Source::Container(child),
            (None, None) => Source::Artifact(self.name.clone()),
        };

        let with_context = |e: Error| Error::region(container, &self.name, e.to_string());
        let codec = match &self.codec {
            Some(s) => s.parse::<Codec>().map_err(with_context)?,
            None => Codec::None,
        };
        let policy = match &self.policy {
            Some(s) => s.parse::<PaddingPolicy>().map_err(with_context)?,
            None => PaddingPolicy::Pad,
        };
        let position = match &self.position {
            Some(s) => s.parse::<InsertPosition>().map_err(with_context)?,
            None => InsertPosition::Tail,
        };

        Ok(RegionSpec {
            name: self.name,
            source,
            codec,
            size: self.size,
            policy,
            position,
        })
    }
}

impl LayoutTree {
    /// Load a layout tree from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Parse a layout tree from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: TomlLayoutFile = toml::from_str(content).map_err(|e| Error::Parse {
            what: "TOML layout".to_string(),
            message: e.to_string(),
        })?;

        let mut tree = LayoutTree::new(file.layout.block_size);
        tree.name = file.layout.name;
        tree.pad_byte = file.layout.pad_byte;

        for toml_container in file.container {
            let regions = toml_container
                .region
                .into_iter()
                .map(|r| r.into_spec(&toml_container.name))
                .collect::<Result<Vec<_>>>()?;
            tree.add_container(Container::new(toml_container.name, regions))?;
        }

        Ok(tree)
    }

    /// Save the layout tree to a TOML file
    pub fn to_toml_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_toml_string()).map_err(|e| Error::io(path, e))
    }

    /// Convert the layout tree to a TOML string
    pub fn to_toml_string(&self) -> String {
        let mut output = String::new();

        output.push_str("[layout]\n");
        if let Some(name) = &self.name {
            output.push_str(&format!("name = \"{}\"\n", name));
        }
        output.push_str(&format!("block_size = 0x{:X}\n", self.block_size));
        if let Some(pad) = self.pad_byte {
            output.push_str(&format!("pad_byte = 0x{:02X}\n", pad));
        }

        for container in self.containers() {
            output.push_str("\n[[container]]\n");
            output.push_str(&format!("name = \"{}\"\n", container.name));

            for region in &container.regions {
                output.push_str("\n[[container.region]]\n");
                output.push_str(&format!("name = \"{}\"\n", region.name));
                match &region.source {
                    Source::Container(child) => {
                        output.push_str(&format!("container = \"{}\"\n", child));
                    }
                    Source::Artifact(file) if *file != region.name => {
                        output.push_str(&format!("file = \"{}\"\n", file));
                    }
                    Source::Artifact(_) => {}
                }
                output.push_str(&format!("size = 0x{:08X}\n", region.size));
                if region.codec != Codec::None {
                    output.push_str(&format!("codec = \"{}\"\n", region.codec));
                }
                output.push_str(&format!("policy = \"{}\"\n", region.policy));
                output.push_str(&format!("position = \"{}\"\n", region.position));
            }
        }

        output
    }
}
