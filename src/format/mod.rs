// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

pub mod block;
pub mod footer;
pub mod header;

pub use {
    block::{BlockHeader, BLOCK_HEADER_SIZE},
    footer::{FileFooter, FileMetadata, FOOTER_SIZE},
    header::{FileHeader, HEADER_SIZE},
};

/// Disk format version
///
/// Bumped whenever the on-disk layout changes; readers support
/// all versions they know about and reject the rest.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum FormatVersion {
    /// Version 1
    V1,
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", u32::from(*self))
    }
}

impl From<FormatVersion> for u32 {
    fn from(value: FormatVersion) -> Self {
        match value {
            FormatVersion::V1 => 1,
        }
    }
}

impl TryFrom<u32> for FormatVersion {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::V1),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn format_version_round_trip() {
        assert_eq!(Ok(FormatVersion::V1), FormatVersion::try_from(1));
        assert_eq!(1, u32::from(FormatVersion::V1));
    }

    #[test]
    fn format_version_unknown() {
        assert!(FormatVersion::try_from(0).is_err());
        assert!(FormatVersion::try_from(2).is_err());
    }
}
