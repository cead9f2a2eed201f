// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::FormatVersion;
use crate::{
    codec::Encoding,
    coding::{Decode, DecodeError, Encode},
    file::MAGIC_BYTES,
    hour::HourStamp,
    CompressionType,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// On-disk size of the file header
pub const HEADER_SIZE: usize = 64;

/// Header of an hourly file
///
/// Written once at file creation, before the first block.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FileHeader {
    /// Disk format version
    pub version: FormatVersion,

    /// The UTC hour this file covers
    pub hour: HourStamp,

    /// Uncompressed block size threshold the writer was configured with
    pub block_size: u32,

    /// Event record encoding, file-wide
    pub encoding: Encoding,

    /// Compression used for blocks of this file
    pub compression: CompressionType,
}

impl FileHeader {
    /// Returns the on-disk size
    #[must_use]
    pub const fn serialized_len() -> usize {
        HEADER_SIZE
    }

    /// Writes the fixed-size header, zero-padded to [`HEADER_SIZE`].
    pub fn write_into<W: Write>(&self, writer: &mut W) -> crate::Result<()> {
        let mut v = Vec::with_capacity(HEADER_SIZE);

        v.write_all(&MAGIC_BYTES)?;
        v.write_u32::<LittleEndian>(u32::from(self.version))?;
        v.write_i64::<LittleEndian>(self.hour.unix_secs())?;
        v.write_i64::<LittleEndian>(i64::from(self.block_size))?;
        self.encoding.encode_into(&mut v)?;
        self.compression.encode_into(&mut v)?;

        // Pad with remaining bytes
        v.resize(HEADER_SIZE, 0);

        writer.write_all(&v)?;

        Ok(())
    }
}

impl Decode for FileHeader {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        // Check header
        let mut magic = [0u8; MAGIC_BYTES.len()];
        reader.read_exact(&mut magic)?;

        if magic != MAGIC_BYTES {
            return Err(DecodeError::InvalidHeader("FileHeader"));
        }

        let version = reader.read_u32::<LittleEndian>()?;
        let version =
            FormatVersion::try_from(version).map_err(|()| DecodeError::UnsupportedVersion(version))?;

        let hour = HourStamp::from_unix_secs(reader.read_i64::<LittleEndian>()?);

        let block_size = reader.read_i64::<LittleEndian>()?;
        let block_size =
            u32::try_from(block_size).map_err(|_| DecodeError::InvalidHeader("FileHeader"))?;

        let encoding = Encoding::decode_from(reader)?;
        let compression = CompressionType::decode_from(reader)?;

        // Consume padding
        let mut padding = [0u8; HEADER_SIZE - 26];
        reader.read_exact(&mut padding)?;

        Ok(Self {
            version,
            hour,
            block_size,
            encoding,
            compression,
        })
    }
}
