// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    binary_search::partition_point,
    coding::{Decode, DecodeError, Encode, EncodeError},
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use varint_rs::{VarintReader, VarintWriter};

/// One sparse index entry per sealed block
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SparseEntry {
    /// Lowest timestamp of the block (ns)
    pub timestamp: i64,

    /// Block ID
    pub block_id: u32,

    /// File offset of the block header
    pub file_offset: u64,
}

/// Sparse timestamp index of one hourly file
///
/// Entries are sorted non-decreasingly by timestamp, which is the
/// seal order only if events arrived in order; [`SparseIndex::finalize`]
/// restores sortedness before serialization either way.
#[derive(Debug, Default, PartialEq)]
pub struct SparseIndex {
    entries: Vec<SparseEntry>,
}

impl SparseIndex {
    /// Records a sealed block.
    pub fn insert(&mut self, entry: SparseEntry) {
        self.entries.push(entry);
    }

    /// Sorts the entries by timestamp; must run once before encoding.
    pub fn finalize(&mut self) {
        self.entries.sort_unstable_by_key(|e| (e.timestamp, e.block_id));
    }

    /// Number of entries (equals the file's block count).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the index has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Selects the entries of all blocks that may contain events
    /// inside `[start_ns, end_ns]`.
    ///
    /// Because adjacent blocks may overlap when events arrive out of
    /// order, the selection backs up one entry past the lower bound.
    #[must_use]
    pub fn range(&self, start_ns: i64, end_ns: i64) -> &[SparseEntry] {
        let hi = partition_point(&self.entries, |e| e.timestamp <= end_ns);
        if hi == 0 {
            return &[];
        }

        let lo = partition_point(&self.entries, |e| e.timestamp < start_ns).saturating_sub(1);

        self.entries.get(lo..hi).unwrap_or(&[])
    }

    /// All entries, ordered by timestamp.
    #[must_use]
    pub fn entries(&self) -> &[SparseEntry] {
        &self.entries
    }
}

impl Encode for SparseIndex {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        debug_assert!(
            self.entries.is_sorted_by_key(|e| e.timestamp),
            "sparse index must be finalized before encoding"
        );

        #[allow(clippy::cast_possible_truncation)]
        writer.write_u32_varint(self.entries.len() as u32)?;

        for entry in &self.entries {
            writer.write_i64::<LittleEndian>(entry.timestamp)?;
            writer.write_u32_varint(entry.block_id)?;
            writer.write_u64_varint(entry.file_offset)?;
        }

        Ok(())
    }
}

impl Decode for SparseIndex {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let len = reader.read_u32_varint()? as usize;

        let mut entries = Vec::with_capacity(len);
        for _ in 0..len {
            entries.push(SparseEntry {
                timestamp: reader.read_i64::<LittleEndian>()?,
                block_id: reader.read_u32_varint()?,
                file_offset: reader.read_u64_varint()?,
            });
        }

        if !entries.is_sorted_by_key(|e| e.timestamp) {
            return Err(DecodeError::InvalidHeader("SparseIndex"));
        }

        Ok(Self { entries })
    }
}
