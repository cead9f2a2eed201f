// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{read_string_list, write_string_list, BloomFilter};
use crate::{
    coding::{Decode, DecodeError, Encode, EncodeError},
    format::BlockHeader,
    Checksum, CompressionType,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};
use varint_rs::{VarintReader, VarintWriter};

/// Metadata of one sealed block, stored in the index section
#[derive(Debug, PartialEq)]
pub struct BlockMetadata {
    /// Block ID (sequence number within the file, starting at 0)
    pub id: u32,

    /// Number of events in the block
    pub event_count: u32,

    /// Uncompressed payload size
    pub uncompressed_length: u32,

    /// Compressed payload size
    pub compressed_length: u32,

    /// File offset of the block header
    pub file_offset: u64,

    /// Lowest event timestamp (ns)
    pub ts_min: i64,

    /// Highest event timestamp (ns)
    pub ts_max: i64,

    /// Checksum over the compressed payload
    pub checksum: Checksum,

    /// Compression used for the payload
    pub compression: CompressionType,

    /// Distinct resource kinds observed in the block, sorted
    pub kinds: Vec<String>,

    /// Distinct namespaces observed in the block, sorted
    pub namespaces: Vec<String>,

    /// Distinct API groups observed in the block, sorted
    pub groups: Vec<String>,

    /// Bloom filter over all tokens
    ///
    /// `None` if the filter could not be decoded; the block is
    /// then always treated as a candidate.
    pub bloom: Option<BloomFilter>,
}

impl BlockMetadata {
    /// Builds the metadata of a freshly sealed block.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        id: u32,
        header: &BlockHeader,
        file_offset: u64,
        compression: CompressionType,
        mut kinds: Vec<String>,
        mut namespaces: Vec<String>,
        mut groups: Vec<String>,
        bloom_fp_rate: f32,
    ) -> Self {
        kinds.sort_unstable();
        kinds.dedup();
        namespaces.sort_unstable();
        namespaces.dedup();
        groups.sort_unstable();
        groups.dedup();

        let token_count = kinds.len() + namespaces.len() + groups.len();

        let mut bloom = BloomFilter::with_fp_rate(token_count.max(1), bloom_fp_rate);
        for token in kinds.iter().chain(namespaces.iter()).chain(groups.iter()) {
            bloom.set_with_hash(BloomFilter::get_hash(token));
        }

        Self {
            id,
            event_count: header.event_count,
            uncompressed_length: header.uncompressed_length,
            compressed_length: header.compressed_length,
            file_offset,
            ts_min: header.ts_min,
            ts_max: header.ts_max,
            checksum: header.checksum,
            compression,
            kinds,
            namespaces,
            groups,
            bloom: Some(bloom),
        }
    }

    /// Reconstructs the on-disk block header from this metadata.
    #[must_use]
    pub fn block_header(&self) -> BlockHeader {
        BlockHeader {
            compressed_length: self.compressed_length,
            uncompressed_length: self.uncompressed_length,
            event_count: self.event_count,
            ts_min: self.ts_min,
            ts_max: self.ts_max,
            checksum: self.checksum,
        }
    }

    /// Returns `true` if the block's timestamp span intersects the range.
    #[must_use]
    pub fn overlaps(&self, start_ns: i64, end_ns: i64) -> bool {
        self.ts_min <= end_ns && self.ts_max >= start_ns
    }

    /// Checks one filter dimension against the bloom filter.
    ///
    /// Returns `false` only if the filter definitely contains none of
    /// the tokens; an absent bloom always answers `true`.
    #[must_use]
    pub fn bloom_may_contain_any(&self, tokens: &[String]) -> bool {
        if tokens.is_empty() {
            return true;
        }

        let Some(bloom) = &self.bloom else {
            return true;
        };

        tokens.iter().any(|token| bloom.contains(token))
    }
}

impl Encode for BlockMetadata {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u32_varint(self.id)?;
        writer.write_u32_varint(self.event_count)?;
        writer.write_u32_varint(self.uncompressed_length)?;
        writer.write_u32_varint(self.compressed_length)?;
        writer.write_u64_varint(self.file_offset)?;

        writer.write_i64::<LittleEndian>(self.ts_min)?;
        writer.write_i64::<LittleEndian>(self.ts_max)?;
        writer.write_u128::<LittleEndian>(*self.checksum)?;

        self.compression.encode_into(writer)?;

        write_string_list(writer, &self.kinds)?;
        write_string_list(writer, &self.namespaces)?;
        write_string_list(writer, &self.groups)?;

        match &self.bloom {
            Some(bloom) => {
                #[allow(clippy::cast_possible_truncation)]
                writer.write_u32_varint(bloom.serialized_len() as u32)?;
                bloom.encode_into(writer)?;
            }
            None => writer.write_u32_varint(0)?,
        }

        Ok(())
    }
}

impl Decode for BlockMetadata {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let id = reader.read_u32_varint()?;
        let event_count = reader.read_u32_varint()?;
        let uncompressed_length = reader.read_u32_varint()?;
        let compressed_length = reader.read_u32_varint()?;
        let file_offset = reader.read_u64_varint()?;

        let ts_min = reader.read_i64::<LittleEndian>()?;
        let ts_max = reader.read_i64::<LittleEndian>()?;
        let checksum = Checksum::from_raw(reader.read_u128::<LittleEndian>()?);

        let compression = CompressionType::decode_from(reader)?;

        let kinds = read_string_list(reader)?;
        let namespaces = read_string_list(reader)?;
        let groups = read_string_list(reader)?;

        let bloom_len = reader.read_u32_varint()? as usize;
        let bloom = if bloom_len == 0 {
            None
        } else {
            let mut bytes = vec![0; bloom_len];
            reader.read_exact(&mut bytes)?;

            // An unreadable bloom filter must not fail the block;
            // it only loses its skip capability
            match BloomFilter::decode_from(&mut Cursor::new(bytes)) {
                Ok(bloom) => Some(bloom),
                Err(e) => {
                    log::warn!("Discarding unreadable bloom filter of block {id}: {e:?}");
                    None
                }
            }
        };

        Ok(Self {
            id,
            event_count,
            uncompressed_length,
            compressed_length,
            file_offset,
            ts_min,
            ts_max,
            checksum,
            compression,
            kinds,
            namespaces,
            groups,
            bloom,
        })
    }
}
