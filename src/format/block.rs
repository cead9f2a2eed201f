// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::{Decode, DecodeError, Encode, EncodeError},
    Checksum, CompressionType,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// On-disk size of a block header
pub const BLOCK_HEADER_SIZE: usize = 44;

/// Header of a disk-based block
///
/// A block is its header followed by the compressed record payload:
///
/// \[ header \]
/// \[  data  \]
///
/// The integrity of a block can be checked using the checksum value
/// that is saved in its header.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BlockHeader {
    /// Compressed size of the payload
    pub compressed_length: u32,

    /// Uncompressed size of the payload
    pub uncompressed_length: u32,

    /// Number of event records inside the payload
    pub event_count: u32,

    /// Lowest event timestamp in the block (ns)
    pub ts_min: i64,

    /// Highest event timestamp in the block (ns)
    pub ts_max: i64,

    /// Checksum over the compressed payload
    pub checksum: Checksum,
}

impl BlockHeader {
    /// Returns the on-disk size
    #[must_use]
    pub const fn serialized_len() -> usize {
        BLOCK_HEADER_SIZE
    }
}

impl Encode for BlockHeader {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u32::<LittleEndian>(self.compressed_length)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_length)?;
        writer.write_u32::<LittleEndian>(self.event_count)?;
        writer.write_i64::<LittleEndian>(self.ts_min)?;
        writer.write_i64::<LittleEndian>(self.ts_max)?;
        writer.write_u128::<LittleEndian>(*self.checksum)?;

        Ok(())
    }
}

impl Decode for BlockHeader {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let compressed_length = reader.read_u32::<LittleEndian>()?;
        let uncompressed_length = reader.read_u32::<LittleEndian>()?;
        let event_count = reader.read_u32::<LittleEndian>()?;
        let ts_min = reader.read_i64::<LittleEndian>()?;
        let ts_max = reader.read_i64::<LittleEndian>()?;
        let checksum = reader.read_u128::<LittleEndian>()?;

        Ok(Self {
            compressed_length,
            uncompressed_length,
            event_count,
            ts_min,
            ts_max,
            checksum: Checksum::from_raw(checksum),
        })
    }
}

/// Appends one length-prefixed event record to a record buffer.
pub fn append_record(buf: &mut Vec<u8>, record: &[u8]) -> Result<(), EncodeError> {
    // NOTE: Truncation is OK, events are bounded by the producer
    // far below 4 GB
    #[allow(clippy::cast_possible_truncation)]
    buf.write_u32::<LittleEndian>(record.len() as u32)?;
    buf.write_all(record)?;

    Ok(())
}

/// Compresses a record buffer into a block image.
///
/// Should only be called with a non-empty buffer; empty blocks
/// are never written.
pub fn pack(
    records: &[u8],
    event_count: u32,
    ts_min: i64,
    ts_max: i64,
    compression: CompressionType,
) -> (BlockHeader, Vec<u8>) {
    debug_assert!(!records.is_empty(), "cannot pack empty block");

    let payload = compression.compress(records);
    let checksum = Checksum::from_bytes(&payload);

    let header = BlockHeader {
        // NOTE: Truncation is OK because the block size threshold is max 1 MiB
        #[allow(clippy::cast_possible_truncation)]
        compressed_length: payload.len() as u32,

        #[allow(clippy::cast_possible_truncation)]
        uncompressed_length: records.len() as u32,

        event_count,
        ts_min,
        ts_max,
        checksum,
    };

    (header, payload)
}

/// Verifies and decompresses a block payload back into its record buffer.
pub fn unpack(
    header: &BlockHeader,
    payload: &[u8],
    compression: CompressionType,
) -> crate::Result<Vec<u8>> {
    let got = Checksum::from_bytes(payload);

    if got != header.checksum {
        return Err(crate::Error::ChecksumMismatch {
            got,
            expected: header.checksum,
        });
    }

    let records = compression.decompress(payload)?;

    if records.len() != header.uncompressed_length as usize {
        return Err(crate::Error::Decompress(compression));
    }

    Ok(records)
}

/// Splits a record buffer into its individual event records.
pub fn split_records(buf: &[u8], event_count: u32) -> Result<Vec<&[u8]>, DecodeError> {
    let mut records = Vec::with_capacity(event_count as usize);
    let mut pos = 0usize;

    for _ in 0..event_count {
        let len_bytes = buf
            .get(pos..pos + 4)
            .ok_or(DecodeError::InvalidHeader("Record"))?;

        // NOTE: get() above guarantees 4 bytes
        #[allow(clippy::expect_used)]
        let len = u32::from_le_bytes(len_bytes.try_into().expect("is 4 bytes")) as usize;
        pos += 4;

        let record = buf
            .get(pos..pos + len)
            .ok_or(DecodeError::InvalidHeader("Record"))?;
        pos += len;

        records.push(record);
    }

    if pos != buf.len() {
        return Err(DecodeError::InvalidHeader("Record"));
    }

    Ok(records)
}
