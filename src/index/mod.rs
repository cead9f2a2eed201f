// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

pub mod block_meta;
pub mod bloom;
pub mod inverted;
pub mod sparse;

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use std::io::{Read, Write};
use varint_rs::{VarintReader, VarintWriter};

pub use {
    block_meta::BlockMetadata,
    bloom::BloomFilter,
    inverted::InvertedIndex,
    sparse::{SparseEntry, SparseIndex},
};

pub(crate) fn write_string<W: Write>(writer: &mut W, s: &str) -> Result<(), EncodeError> {
    // NOTE: Truncation is OK, tokens are short K8s identifiers
    #[allow(clippy::cast_possible_truncation)]
    writer.write_u32_varint(s.len() as u32)?;
    writer.write_all(s.as_bytes())?;

    Ok(())
}

pub(crate) fn read_string<R: Read>(reader: &mut R) -> Result<String, DecodeError> {
    let len = reader.read_u32_varint()? as usize;

    let mut buf = vec![0; len];
    reader.read_exact(&mut buf)?;

    String::from_utf8(buf).map_err(|_| DecodeError::InvalidHeader("String"))
}

pub(crate) fn write_string_list<W: Write>(writer: &mut W, list: &[String]) -> Result<(), EncodeError> {
    #[allow(clippy::cast_possible_truncation)]
    writer.write_u32_varint(list.len() as u32)?;

    for s in list {
        write_string(writer, s)?;
    }

    Ok(())
}

pub(crate) fn read_string_list<R: Read>(reader: &mut R) -> Result<Vec<String>, DecodeError> {
    let len = reader.read_u32_varint()? as usize;

    let mut list = Vec::with_capacity(len);
    for _ in 0..len {
        list.push(read_string(reader)?);
    }

    Ok(list)
}

/// The decoded index section of one hourly file
///
/// Serialized between the last block and the footer; parsed again
/// on every [`crate::Reader::open`], so its lifetime equals a query
/// request.
#[derive(Debug)]
pub struct IndexSection {
    /// Per-block metadata, ordered by block ID
    pub blocks: Vec<BlockMetadata>,

    /// Token to block-ID maps
    pub inverted: InvertedIndex,

    /// First-timestamp index over blocks
    pub sparse: SparseIndex,
}

impl Encode for IndexSection {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        #[allow(clippy::cast_possible_truncation)]
        writer.write_u32_varint(self.blocks.len() as u32)?;

        for block in &self.blocks {
            block.encode_into(writer)?;
        }

        self.inverted.encode_into(writer)?;
        self.sparse.encode_into(writer)?;

        Ok(())
    }
}

impl Decode for IndexSection {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let block_count = reader.read_u32_varint()? as usize;

        let mut blocks = Vec::with_capacity(block_count);
        for _ in 0..block_count {
            blocks.push(BlockMetadata::decode_from(reader)?);
        }

        let inverted = InvertedIndex::decode_from(reader)?;
        let sparse = SparseIndex::decode_from(reader)?;

        // Index invariants: one sparse entry per block, inverted sets
        // only reference known blocks
        if sparse.len() != blocks.len() {
            return Err(DecodeError::InvalidHeader("IndexSection"));
        }

        #[allow(clippy::cast_possible_truncation)]
        let block_count = blocks.len() as u32;

        if !inverted.block_ids_below(block_count) {
            return Err(DecodeError::InvalidHeader("IndexSection"));
        }

        Ok(Self {
            blocks,
            inverted,
            sparse,
        })
    }
}
