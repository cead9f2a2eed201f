// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod bit_array;

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use bit_array::BitArray;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Two hashes that are used for double hashing
pub type CompositeHash = (u64, u64);

/// A standard bloom filter over the filter tokens of one block
///
/// Keys are the distinct kind, namespace and group strings observed
/// in the block. The filter uses double hashing instead of `k` hash
/// functions.
///
/// Because the inverted index is exact per token, the bloom filter is
/// a redundancy guard: a `false` answer is definitive, a `true` answer
/// still has to be confirmed.
#[derive(Debug, Eq, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub struct BloomFilter {
    /// Raw bytes exposed as bit array
    inner: BitArray,

    /// Bit count
    m: usize,

    /// Number of hash functions
    k: usize,
}

impl Encode for BloomFilter {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u64::<LittleEndian>(self.m as u64)?;
        writer.write_u64::<LittleEndian>(self.k as u64)?;
        writer.write_all(self.inner.bytes())?;

        Ok(())
    }
}

impl Decode for BloomFilter {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let m = reader.read_u64::<LittleEndian>()? as usize;
        let k = reader.read_u64::<LittleEndian>()? as usize;

        if k == 0 || m == 0 || m % 8 != 0 {
            return Err(DecodeError::InvalidHeader("BloomFilter"));
        }

        let mut bytes = vec![0; m / 8];
        reader.read_exact(&mut bytes)?;

        Ok(Self {
            inner: BitArray::from_bytes(bytes.into_boxed_slice()),
            m,
            k,
        })
    }
}

impl BloomFilter {
    /// Size of the bit array in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.bytes().len()
    }

    /// Serialized size in bytes.
    #[must_use]
    pub fn serialized_len(&self) -> usize {
        2 * std::mem::size_of::<u64>() + self.len()
    }

    /// Constructs a bloom filter that can hold `n` items
    /// while maintaining a certain false positive rate `fpr`.
    #[must_use]
    pub fn with_fp_rate(n: usize, fpr: f32) -> Self {
        use std::f32::consts::LN_2;

        assert!(n > 0);

        // NOTE: Some sensible minimum
        let fpr = fpr.max(0.000_001);

        let m = Self::calculate_m(n, fpr);
        let bpk = m / n;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let k = (((bpk as f32) * LN_2) as usize).max(1);

        Self {
            inner: BitArray::with_capacity(m / 8),
            m,
            k,
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn calculate_m(n: usize, fp_rate: f32) -> usize {
        use std::f32::consts::LN_2;

        #[allow(clippy::cast_precision_loss)]
        let n = n as f32;

        let ln2_squared = LN_2.powi(2);

        let numerator = n * fp_rate.ln();
        let m = -(numerator / ln2_squared);

        // Round up to next byte
        ((m / 8.0).ceil() * 8.0) as usize
    }

    /// Returns `true` if the hash may be contained.
    ///
    /// Will never have a false negative.
    #[must_use]
    pub fn contains_hash(&self, (mut h1, mut h2): CompositeHash) -> bool {
        for i in 0..(self.k as u64) {
            let idx = h1 % (self.m as u64);

            #[allow(clippy::cast_possible_truncation)]
            if !self.inner.get(idx as usize) {
                return false;
            }

            h1 = h1.wrapping_add(h2);
            h2 = h2.wrapping_add(i);
        }

        true
    }

    /// Returns `true` if the token may be contained.
    ///
    /// Will never have a false negative.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.contains_hash(Self::get_hash(token))
    }

    /// Adds the token to the filter.
    pub fn set_with_hash(&mut self, (mut h1, mut h2): CompositeHash) {
        for i in 0..(self.k as u64) {
            let idx = h1 % (self.m as u64);

            #[allow(clippy::cast_possible_truncation)]
            self.inner.enable(idx as usize);

            h1 = h1.wrapping_add(h2);
            h2 = h2.wrapping_add(i);
        }
    }

    /// Gets the hash of a token.
    #[must_use]
    pub fn get_hash(token: &str) -> CompositeHash {
        let h0 = xxhash_rust::xxh3::xxh3_128(token.as_bytes());
        let h1 = (h0 >> 64) as u64;

        #[allow(clippy::cast_possible_truncation)]
        let h2 = h0 as u64;

        (h1, h2)
    }
}
