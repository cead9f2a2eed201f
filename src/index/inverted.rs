// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{read_string, write_string};
use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use rustc_hash::FxHashMap;
use std::io::{Read, Write};
use varint_rs::{VarintReader, VarintWriter};

/// Token to block-ID index of one hourly file
///
/// One exact map per filter dimension. Block-ID lists are sorted
/// ascending; registration happens in seal order, so they come out
/// sorted for free.
#[derive(Debug, Default, PartialEq)]
pub struct InvertedIndex {
    kinds: FxHashMap<String, Vec<u32>>,
    namespaces: FxHashMap<String, Vec<u32>>,
    groups: FxHashMap<String, Vec<u32>>,
}

fn register_tokens(map: &mut FxHashMap<String, Vec<u32>>, block_id: u32, tokens: &[String]) {
    for token in tokens {
        let ids = map.entry(token.clone()).or_default();

        if ids.last() != Some(&block_id) {
            ids.push(block_id);
        }
    }
}

fn encode_map<W: Write>(
    writer: &mut W,
    map: &FxHashMap<String, Vec<u32>>,
) -> Result<(), EncodeError> {
    #[allow(clippy::cast_possible_truncation)]
    writer.write_u32_varint(map.len() as u32)?;

    // Sort keys so the encoding is deterministic
    let mut keys: Vec<_> = map.keys().collect();
    keys.sort_unstable();

    for key in keys {
        write_string(writer, key)?;

        #[allow(clippy::expect_used)]
        let ids = map.get(key).expect("key was just listed");

        #[allow(clippy::cast_possible_truncation)]
        writer.write_u32_varint(ids.len() as u32)?;

        for id in ids {
            writer.write_u32_varint(*id)?;
        }
    }

    Ok(())
}

fn decode_map<R: Read>(reader: &mut R) -> Result<FxHashMap<String, Vec<u32>>, DecodeError> {
    let len = reader.read_u32_varint()? as usize;
    let mut map = FxHashMap::default();

    for _ in 0..len {
        let key = read_string(reader)?;

        let id_count = reader.read_u32_varint()? as usize;
        let mut ids = Vec::with_capacity(id_count);

        for _ in 0..id_count {
            ids.push(reader.read_u32_varint()?);
        }

        if !ids.is_sorted() {
            return Err(DecodeError::InvalidHeader("InvertedIndex"));
        }

        map.insert(key, ids);
    }

    Ok(map)
}

impl InvertedIndex {
    /// Registers a sealed block's token sets.
    pub fn register(
        &mut self,
        block_id: u32,
        kinds: &[String],
        namespaces: &[String],
        groups: &[String],
    ) {
        register_tokens(&mut self.kinds, block_id, kinds);
        register_tokens(&mut self.namespaces, block_id, namespaces);
        register_tokens(&mut self.groups, block_id, groups);
    }

    /// Blocks containing the given kind (empty if the token is unknown).
    #[must_use]
    pub fn blocks_with_kind(&self, kind: &str) -> &[u32] {
        self.kinds.get(kind).map_or(&[], Vec::as_slice)
    }

    /// Blocks containing the given namespace (empty if the token is unknown).
    #[must_use]
    pub fn blocks_with_namespace(&self, namespace: &str) -> &[u32] {
        self.namespaces.get(namespace).map_or(&[], Vec::as_slice)
    }

    /// Blocks containing the given API group (empty if the token is unknown).
    #[must_use]
    pub fn blocks_with_group(&self, group: &str) -> &[u32] {
        self.groups.get(group).map_or(&[], Vec::as_slice)
    }

    /// All kinds present in the file.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// All namespaces present in the file.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    /// All API groups present in the file.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Returns `true` if every referenced block ID is below `block_count`.
    #[must_use]
    pub fn block_ids_below(&self, block_count: u32) -> bool {
        [&self.kinds, &self.namespaces, &self.groups]
            .iter()
            .flat_map(|map| map.values())
            .flatten()
            .all(|&id| id < block_count)
    }
}

impl Encode for InvertedIndex {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        encode_map(writer, &self.kinds)?;
        encode_map(writer, &self.namespaces)?;
        encode_map(writer, &self.groups)?;

        Ok(())
    }
}

impl Decode for InvertedIndex {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            kinds: decode_map(reader)?,
            namespaces: decode_map(reader)?,
            groups: decode_map(reader)?,
        })
    }
}
