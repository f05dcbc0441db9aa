//! Compressed region header
//!
//! Boot stages locate and size a compressed region through a 16-byte
//! little-endian header placed in front of the compressed payload.

use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::Codec;
use crate::error::{Error, Result};

/// Size of [`CompressedHeader`] in bytes
pub const COMPRESSED_HEADER_SIZE: usize = 16;

/// Header layout version
pub const HEADER_VERSION: u16 = 1;

/// Header prepended to every compressed region
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct CompressedHeader {
    /// Codec signature (`LZ4 ` or `LZMA`)
    pub signature: [u8; 4],
    /// Length of the compressed payload following the header
    pub compressed_size: U32,
    /// Length of the original data
    pub size: U32,
    /// Header version
    pub version: U16,
    /// Security version number
    pub svn: u8,
    /// Reserved attribute bits
    pub attribute: u8,
}

impl CompressedHeader {
    /// Split a compressed region into its header and payload
    ///
    /// Returns `None` if the data is too short, the signature is unknown or
    /// the recorded payload length exceeds the data.
    pub fn parse(data: &[u8]) -> Option<(Self, &[u8])> {
        let (header, rest) = Self::read_from_prefix(data).ok()?;
        if &header.signature != b"LZ4 " && &header.signature != b"LZMA" {
            return None;
        }
        let len = header.compressed_size.get() as usize;
        rest.get(..len).map(|payload| (header, payload))
    }
}

/// Prefix `payload` with a header for `codec`
pub(super) fn wrap(codec: Codec, original_len: usize, payload: Vec<u8>) -> Result<Vec<u8>> {
    let signature = codec
        .signature()
        .ok_or_else(|| Error::config("identity codec has no compressed header"))?;
    let too_large = || Error::config(format!("{} input exceeds 4 GiB", codec));

    let header = CompressedHeader {
        signature: *signature,
        compressed_size: U32::new(u32::try_from(payload.len()).map_err(|_| too_large())?),
        size: U32::new(u32::try_from(original_len).map_err(|_| too_large())?),
        version: U16::new(HEADER_VERSION),
        svn: 0,
        attribute: 0,
    };

    let mut out = Vec::with_capacity(COMPRESSED_HEADER_SIZE + payload.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}
