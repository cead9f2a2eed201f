// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Compression algorithm to use
///
/// The algorithm is recorded per block, so it can change
/// in a future format version without breaking old files.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub enum CompressionType {
    /// No compression
    ///
    /// Not recommended.
    None,

    /// LZ4 compression (length-prefixed)
    Lz4,
}

impl CompressionType {
    /// Compresses a byte slice.
    #[must_use]
    pub fn compress(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            Self::None => bytes.to_vec(),
            Self::Lz4 => lz4_flex::compress_prepend_size(bytes),
        }
    }

    /// Decompresses a byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Decompress`] if the payload is mangled.
    pub fn decompress(self, bytes: &[u8]) -> crate::Result<Vec<u8>> {
        match self {
            Self::None => Ok(bytes.to_vec()),
            Self::Lz4 => lz4_flex::decompress_size_prepended(bytes)
                .map_err(|_| crate::Error::Decompress(self)),
        }
    }
}

impl Encode for CompressionType {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        match self {
            Self::None => writer.write_u8(0)?,
            Self::Lz4 => writer.write_u8(1)?,
        }

        Ok(())
    }
}

impl Decode for CompressionType {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let tag = reader.read_u8()?;

        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::Lz4),
            tag => Err(DecodeError::InvalidTag(("CompressionType", tag))),
        }
    }
}

impl std::fmt::Display for CompressionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::None => "no compression",
                Self::Lz4 => "lz4",
            }
        )
    }
}
