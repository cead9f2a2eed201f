// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::HEADER_SIZE;
use crate::{
    coding::{Decode, DecodeError, Encode, EncodeError},
    file::MAGIC_BYTES,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, Write};

/// On-disk size of the file footer
pub const FOOTER_SIZE: usize = 128;

/// Summary statistics of a sealed file, stored in the footer
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct FileMetadata {
    /// Creation time as unix timestamp (in µs)
    pub created_at: u64,

    /// Finalization time as unix timestamp (in µs)
    pub finalized_at: u64,

    /// Number of events across all blocks
    pub total_events: u64,

    /// Sum of uncompressed block payload sizes
    pub total_uncompressed_bytes: u64,

    /// Sum of compressed block payload sizes
    pub total_compressed_bytes: u64,

    /// Number of blocks in the file
    pub block_count: u32,
}

impl FileMetadata {
    /// Compressed-to-uncompressed size ratio, in `[0, 1]`.
    ///
    /// Lower is better; 0.08 means a 92% size reduction.
    #[must_use]
    pub fn compression_ratio(&self) -> f64 {
        if self.total_uncompressed_bytes == 0 {
            return 0.0;
        }

        #[allow(clippy::cast_precision_loss)]
        let ratio = self.total_compressed_bytes as f64 / self.total_uncompressed_bytes as f64;

        ratio.clamp(0.0, 1.0)
    }
}

impl Encode for FileMetadata {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u64::<LittleEndian>(self.created_at)?;
        writer.write_u64::<LittleEndian>(self.finalized_at)?;
        writer.write_u64::<LittleEndian>(self.total_events)?;
        writer.write_u64::<LittleEndian>(self.total_uncompressed_bytes)?;
        writer.write_u64::<LittleEndian>(self.total_compressed_bytes)?;
        writer.write_u32::<LittleEndian>(self.block_count)?;

        Ok(())
    }
}

impl Decode for FileMetadata {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let created_at = reader.read_u64::<LittleEndian>()?;
        let finalized_at = reader.read_u64::<LittleEndian>()?;
        let total_events = reader.read_u64::<LittleEndian>()?;
        let total_uncompressed_bytes = reader.read_u64::<LittleEndian>()?;
        let total_compressed_bytes = reader.read_u64::<LittleEndian>()?;
        let block_count = reader.read_u32::<LittleEndian>()?;

        Ok(Self {
            created_at,
            finalized_at,
            total_events,
            total_uncompressed_bytes,
            total_compressed_bytes,
            block_count,
        })
    }
}

/// The file footer closes a sealed file
///
/// ----------------
/// |    header    |
/// |--------------|
/// |    blocks    |
/// |--------------|
/// |    index     |
/// |--------------|
/// |    footer    | <- fixed size, ends in magic bytes
/// |--------------|
///
/// A file whose last four bytes are not the magic trailer has not been
/// finalized; readers fall back to a forward block scan.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FileFooter {
    /// File offset of the index section
    pub index_offset: u64,

    /// Byte length of the index section
    pub index_length: u64,

    /// Accumulated file statistics
    pub metadata: FileMetadata,
}

impl FileFooter {
    /// Returns the on-disk size
    #[must_use]
    pub const fn serialized_len() -> usize {
        FOOTER_SIZE
    }

    /// Writes the fixed-size footer, zero-padded, ending in the magic trailer.
    pub fn write_into<W: Write>(&self, writer: &mut W) -> crate::Result<()> {
        let mut v = Vec::with_capacity(FOOTER_SIZE);

        v.write_u64::<LittleEndian>(self.index_offset)?;
        v.write_u64::<LittleEndian>(self.index_length)?;
        self.metadata.encode_into(&mut v)?;

        // Pad with remaining bytes
        v.resize(FOOTER_SIZE - MAGIC_BYTES.len(), 0);
        v.extend_from_slice(&MAGIC_BYTES);

        assert_eq!(v.len(), FOOTER_SIZE, "file footer has invalid size");

        writer.write_all(&v)?;

        Ok(())
    }

    /// Reads the footer from the end of a file.
    ///
    /// Returns `Ok(None)` if the file carries no valid footer
    /// (crashed writer, torn tail) - the caller should recover
    /// what it can by scanning blocks forward.
    pub fn read_from<R: Read + Seek>(reader: &mut R, file_len: u64) -> crate::Result<Option<Self>> {
        if file_len < (HEADER_SIZE + FOOTER_SIZE) as u64 {
            return Ok(None);
        }

        reader.seek(std::io::SeekFrom::End(-(FOOTER_SIZE as i64)))?;

        let mut buf = [0u8; FOOTER_SIZE];
        reader.read_exact(&mut buf)?;

        let Some(trailer) = buf.get(FOOTER_SIZE - MAGIC_BYTES.len()..) else {
            return Ok(None);
        };
        if trailer != MAGIC_BYTES {
            return Ok(None);
        }

        let mut cursor = std::io::Cursor::new(&buf);
        let index_offset = cursor.read_u64::<LittleEndian>().map_err(DecodeError::Io)?;
        let index_length = cursor.read_u64::<LittleEndian>().map_err(DecodeError::Io)?;
        let metadata = FileMetadata::decode_from(&mut cursor)?;

        // The offsets have to land inside the file for the footer
        // to be trustworthy
        let index_end = index_offset.saturating_add(index_length);
        if index_offset < HEADER_SIZE as u64 || index_end > file_len - FOOTER_SIZE as u64 {
            return Ok(None);
        }

        Ok(Some(Self {
            index_offset,
            index_length,
            metadata,
        }))
    }
}
