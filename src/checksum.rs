// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// An 128-bit checksum
///
/// Computed over the compressed payload of a block,
/// stored as 16 little-endian bytes on disk.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Checksum(u128);

impl std::ops::Deref for Checksum {
    type Target = u128;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Checksum {
    /// Wraps a checksum value.
    #[must_use]
    pub fn from_raw(value: u128) -> Self {
        Self(value)
    }

    /// Computes the checksum of a byte slice.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_128(bytes))
    }

    /// Returns the raw 128-bit integer.
    #[must_use]
    pub fn into_u128(self) -> u128 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn checksum_stable() {
        let a = Checksum::from_bytes(b"hello");
        let b = Checksum::from_bytes(b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn checksum_differs() {
        let a = Checksum::from_bytes(b"hello");
        let b = Checksum::from_bytes(b"hellp");
        assert_ne!(a, b);
    }
}
