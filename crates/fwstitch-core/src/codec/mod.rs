//! Compression codecs
//!
//! Regions may be compressed before they are sized and padded. Two codecs
//! are supported: LZ4 block compression, which decompresses fast enough for
//! early boot stages, and LZMA for large payloads where ratio matters more
//! than speed. [`Codec::None`] leaves the bytes untouched.
//!
//! The stitcher only sees the [`Compressor`] trait, so placement logic can be
//! exercised with a mock and the real work can be done in-process
//! ([`BuiltinCompressor`]) or by external executables ([`ToolCompressor`]).

mod header;
mod tool;

use std::fmt;
use std::str::FromStr;

use log::trace;

use crate::error::{Error, Result};

pub use header::{CompressedHeader, COMPRESSED_HEADER_SIZE, HEADER_VERSION};
pub use tool::ToolCompressor;

/// Compression applied to a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Codec {
    /// No compression
    #[default]
    None,
    /// Fast LZ4 block codec
    Lz4,
    /// High-ratio LZMA codec
    Lzma,
}

impl Codec {
    /// Header signature for compressed output, `None` for the identity codec
    pub fn signature(self) -> Option<&'static [u8; 4]> {
        match self {
            Self::None => None,
            Self::Lz4 => Some(b"LZ4 "),
            Self::Lzma => Some(b"LZMA"),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Lz4 => write!(f, "lz4"),
            Self::Lzma => write!(f, "lzma"),
        }
    }
}

impl FromStr for Codec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "lz4" | "fastblock" => Ok(Self::Lz4),
            "lzma" | "highratio" => Ok(Self::Lzma),
            other => Err(Error::config(format!("unknown codec '{}'", other))),
        }
    }
}

/// Compresses raw region bytes
pub trait Compressor {
    /// Compress `raw` with `codec`
    ///
    /// Implementations must return `raw` unchanged for [`Codec::None`].
    fn compress(&self, codec: Codec, raw: &[u8]) -> Result<Vec<u8>>;
}

impl<C: Compressor + ?Sized> Compressor for &C {
    fn compress(&self, codec: Codec, raw: &[u8]) -> Result<Vec<u8>> {
        (**self).compress(codec, raw)
    }
}

/// In-process compressor backed by `lz4_flex` and `lzma-rs`
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCompressor;

impl Compressor for BuiltinCompressor {
    fn compress(&self, codec: Codec, raw: &[u8]) -> Result<Vec<u8>> {
        let payload = match codec {
            Codec::None => return Ok(raw.to_vec()),
            Codec::Lz4 => lz4_flex::block::compress(raw),
            Codec::Lzma => {
                // The boot-side decoder sizes its output from the stream header
                let options = lzma_rs::compress::Options {
                    unpacked_size: lzma_rs::compress::UnpackedSize::WriteToHeader(Some(
                        raw.len() as u64,
                    )),
                };
                let mut out = Vec::new();
                lzma_rs::lzma_compress_with_options(&mut &raw[..], &mut out, &options)
                    .map_err(|e| Error::tool("lzma", e.to_string()))?;
                out
            }
        };
        trace!("{} compressed {} -> {} bytes", codec, raw.len(), payload.len());
        header::wrap(codec, raw.len(), payload)
    }
}
