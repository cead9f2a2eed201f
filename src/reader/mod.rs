// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    binary_search::partition_point,
    codec::{AnyCodec, Codec},
    coding::{Decode, DecodeError},
    event::Event,
    format::{block, BlockHeader, FileFooter, FileHeader, FileMetadata, BLOCK_HEADER_SIZE, HEADER_SIZE},
    index::{BlockMetadata, IndexSection, InvertedIndex, SparseEntry, SparseIndex},
    query::{Filter, TimeRange, Warning, WarningCode},
    stop_signal::StopSignal,
};
use rustc_hash::FxHashSet;
use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

/// Result of querying a single hourly file
#[derive(Debug, Default)]
pub struct FileQueryResult {
    /// Matching events, ordered by timestamp ascending
    pub events: Vec<Event>,

    /// Number of blocks decompressed and scanned
    pub blocks_scanned: u64,

    /// Number of blocks ruled out by the indexes
    pub blocks_skipped: u64,

    /// Soft failures (both open-time and query-time)
    pub warnings: Vec<Warning>,
}

/// Reads a sealed (or crashed) hourly file
///
/// Opening parses the header, the footer and the index section.
/// A file without a valid footer is recovered by scanning blocks
/// forward from the header; whatever passes its checksum is served,
/// the rest is reported as warnings.
///
/// Any number of readers may work on the same file concurrently;
/// each query uses its own short-lived read-only file handle.
pub struct Reader {
    path: PathBuf,
    file_name: String,

    header: FileHeader,
    codec: AnyCodec,

    /// Per-block metadata, ordered by block ID
    blocks: Vec<BlockMetadata>,

    /// Exact token index; `None` when the index section was lost
    /// and filtering has to fall back to per-event predicates
    inverted: Option<InvertedIndex>,

    sparse: SparseIndex,

    metadata: FileMetadata,

    /// Soft failures encountered while opening
    warnings: Vec<Warning>,
}

impl Reader {
    /// Opens an hourly file for reading.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::UnsupportedVersion`] for unknown format versions
    /// - [`crate::Error::Decode`] if the file is not an hourly file at all
    /// - I/O errors
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let header = match FileHeader::decode_from(&mut reader) {
            Ok(header) => header,
            Err(DecodeError::UnsupportedVersion(version)) => {
                return Err(crate::Error::UnsupportedVersion(version));
            }
            Err(e) => return Err(e.into()),
        };

        let codec = header.encoding.codec();
        let mut warnings = Vec::new();

        let footer = FileFooter::read_from(&mut reader, file_len)?;

        let (blocks, inverted, sparse, metadata) = match footer {
            Some(footer) => {
                match Self::read_index_section(&mut reader, &footer) {
                    Ok(section) => (
                        section.blocks,
                        Some(section.inverted),
                        section.sparse,
                        footer.metadata,
                    ),
                    Err(e) => {
                        // Index section is unreadable; the block region
                        // is still exactly delimited by the footer
                        log::warn!("Unreadable index section in {path:?}: {e:?}");
                        warnings.push(Warning {
                            code: WarningCode::FileMissingIndex,
                            file: file_name.clone(),
                            block: None,
                            message: format!("index section unreadable: {e:?}"),
                        });

                        let blocks = Self::scan_blocks(
                            &mut reader,
                            &header,
                            footer.index_offset,
                            &file_name,
                            &mut warnings,
                        )?;
                        let sparse = Self::rebuild_sparse(&blocks);

                        (blocks, None, sparse, footer.metadata)
                    }
                }
            }
            None => {
                // Crashed writer: no footer, scan forward and serve
                // the fully written prefix
                log::warn!("Missing footer in {path:?}, recovering blocks");
                warnings.push(Warning {
                    code: WarningCode::FileTruncated,
                    file: file_name.clone(),
                    block: None,
                    message: "file has no footer; recovered fully written blocks".into(),
                });

                let blocks =
                    Self::scan_blocks(&mut reader, &header, file_len, &file_name, &mut warnings)?;
                let sparse = Self::rebuild_sparse(&blocks);

                let metadata = FileMetadata {
                    created_at: 0,
                    finalized_at: 0,
                    total_events: blocks.iter().map(|b| u64::from(b.event_count)).sum(),
                    total_uncompressed_bytes: blocks
                        .iter()
                        .map(|b| u64::from(b.uncompressed_length))
                        .sum(),
                    total_compressed_bytes: blocks
                        .iter()
                        .map(|b| u64::from(b.compressed_length))
                        .sum(),

                    #[allow(clippy::cast_possible_truncation)]
                    block_count: blocks.len() as u32,
                };

                (blocks, None, sparse, metadata)
            }
        };

        Ok(Self {
            path,
            file_name,
            header,
            codec,
            blocks,
            inverted,
            sparse,
            metadata,
            warnings,
        })
    }

    fn read_index_section(
        reader: &mut BufReader<File>,
        footer: &FileFooter,
    ) -> Result<IndexSection, DecodeError> {
        reader.seek(SeekFrom::Start(footer.index_offset))?;

        // NOTE: Truncation is OK, the footer offsets were bounds-checked
        #[allow(clippy::cast_possible_truncation)]
        let mut bytes = vec![0; footer.index_length as usize];
        reader.read_exact(&mut bytes)?;

        IndexSection::decode_from(&mut std::io::Cursor::new(bytes))
    }

    /// Walks the block region forward, keeping every block whose
    /// checksum holds.
    ///
    /// Used when the index section is gone; the resulting metadata
    /// carries no token sets, so every kept block stays a filter
    /// candidate.
    fn scan_blocks(
        reader: &mut BufReader<File>,
        header: &FileHeader,
        region_end: u64,
        file_name: &str,
        warnings: &mut Vec<Warning>,
    ) -> crate::Result<Vec<BlockMetadata>> {
        let mut blocks = Vec::new();
        let mut pos = HEADER_SIZE as u64;
        let mut id: u32 = 0;

        reader.seek(SeekFrom::Start(pos))?;

        while pos + (BLOCK_HEADER_SIZE as u64) <= region_end {
            let mut header_bytes = [0u8; BLOCK_HEADER_SIZE];
            if reader.read_exact(&mut header_bytes).is_err() {
                break;
            }

            let Ok(block_header) = BlockHeader::decode_from(&mut std::io::Cursor::new(header_bytes))
            else {
                break;
            };

            let payload_end = pos
                + BLOCK_HEADER_SIZE as u64
                + u64::from(block_header.compressed_length);

            // An implausible length prefix means we ran into a torn tail
            if block_header.compressed_length == 0
                || block_header.uncompressed_length == 0
                || block_header.event_count == 0
                || payload_end > region_end
            {
                break;
            }

            let mut payload = vec![0; block_header.compressed_length as usize];
            if reader.read_exact(&mut payload).is_err() {
                break;
            }

            let got = crate::Checksum::from_bytes(&payload);
            if got == block_header.checksum {
                blocks.push(BlockMetadata {
                    id,
                    event_count: block_header.event_count,
                    uncompressed_length: block_header.uncompressed_length,
                    compressed_length: block_header.compressed_length,
                    file_offset: pos,
                    ts_min: block_header.ts_min,
                    ts_max: block_header.ts_max,
                    checksum: block_header.checksum,
                    compression: header.compression,
                    kinds: Vec::new(),
                    namespaces: Vec::new(),
                    groups: Vec::new(),
                    bloom: None,
                });
            } else {
                warnings.push(Warning {
                    code: WarningCode::BlockCorrupt,
                    file: file_name.into(),
                    block: Some(id),
                    message: format!("checksum mismatch: got {got}, expected {}", block_header.checksum),
                });
            }

            pos = payload_end;
            id += 1;
        }

        log::debug!("Recovered {} block(s) from {file_name}", blocks.len());

        Ok(blocks)
    }

    fn rebuild_sparse(blocks: &[BlockMetadata]) -> SparseIndex {
        let mut sparse = SparseIndex::default();

        for block in blocks {
            sparse.insert(SparseEntry {
                timestamp: block.ts_min,
                block_id: block.id,
                file_offset: block.file_offset,
            });
        }

        sparse.finalize();
        sparse
    }

    /// The file header.
    #[must_use]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Summary statistics from the footer (or reconstructed during recovery).
    #[must_use]
    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    /// Soft failures encountered while opening.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Number of readable blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Metadata of all readable blocks, ordered by block ID.
    #[must_use]
    pub fn blocks(&self) -> &[BlockMetadata] {
        &self.blocks
    }

    /// All resource kinds present in the file.
    #[must_use]
    pub fn kinds(&self) -> Vec<&str> {
        self.inverted.as_ref().map_or_else(Vec::new, |index| {
            let mut kinds: Vec<_> = index.kinds().collect();
            kinds.sort_unstable();
            kinds
        })
    }

    /// All namespaces present in the file.
    #[must_use]
    pub fn namespaces(&self) -> Vec<&str> {
        self.inverted.as_ref().map_or_else(Vec::new, |index| {
            let mut namespaces: Vec<_> = index.namespaces().collect();
            namespaces.sort_unstable();
            namespaces
        })
    }

    /// Looks a block up by its ID.
    ///
    /// IDs are not necessarily dense: recovery drops corrupt blocks
    /// but keeps the numbering of the survivors.
    fn block_by_id(&self, id: u32) -> Option<&BlockMetadata> {
        let idx = partition_point(&self.blocks, |b| b.id < id);
        self.blocks.get(idx).filter(|b| b.id == id)
    }

    /// Selects the IDs of all blocks that may contain matching events.
    fn candidate_blocks(&self, range: &TimeRange, filter: &Filter) -> Vec<u32> {
        let mut candidates: FxHashSet<u32> = self
            .sparse
            .range(range.start, range.end)
            .iter()
            .map(|e| e.block_id)
            .collect();

        // Intersect with the union of each constrained dimension
        if let Some(inverted) = &self.inverted {
            if !filter.kind_tokens().is_empty() {
                let union: FxHashSet<u32> = filter
                    .kind_tokens()
                    .iter()
                    .flat_map(|token| inverted.blocks_with_kind(token).iter().copied())
                    .collect();

                candidates.retain(|id| union.contains(id));
            }

            if !filter.namespace_tokens().is_empty() {
                let union: FxHashSet<u32> = filter
                    .namespace_tokens()
                    .iter()
                    .flat_map(|token| inverted.blocks_with_namespace(token).iter().copied())
                    .collect();

                candidates.retain(|id| union.contains(id));
            }

            if !filter.group_tokens().is_empty() {
                let union: FxHashSet<u32> = filter
                    .group_tokens()
                    .iter()
                    .flat_map(|token| inverted.blocks_with_group(token).iter().copied())
                    .collect();

                candidates.retain(|id| union.contains(id));
            }
        }

        let mut candidates: Vec<u32> = candidates
            .into_iter()
            .filter(|&id| {
                let Some(block) = self.block_by_id(id) else {
                    return false;
                };

                // Exact per-block time pruning; the sparse index only
                // knows first timestamps
                if !block.overlaps(range.start, range.end) {
                    return false;
                }

                // Redundant bloom recheck, guards against on-disk
                // index corruption
                block.bloom_may_contain_any(filter.kind_tokens())
                    && block.bloom_may_contain_any(filter.namespace_tokens())
                    && block.bloom_may_contain_any(filter.group_tokens())
            })
            .collect();

        candidates.sort_unstable();
        candidates
    }

    /// Runs a filtered range query against this file.
    ///
    /// Corrupt blocks and undecodable records degrade the result and
    /// are reported in the warnings, never silently dropped.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidTimeRange`] for an inverted range
    /// - [`crate::Error::Cancelled`] when the stop signal fires
    /// - I/O errors for unreadable file handles
    pub fn query(
        &self,
        range: TimeRange,
        filter: &Filter,
        signal: &StopSignal,
    ) -> crate::Result<FileQueryResult> {
        range.validate()?;

        let candidates = self.candidate_blocks(&range, filter);

        let mut result = FileQueryResult {
            blocks_skipped: (self.blocks.len() - candidates.len()) as u64,
            warnings: self.warnings.clone(),
            ..Default::default()
        };

        if candidates.is_empty() {
            return Ok(result);
        }

        // Short-lived read-only handle per query
        let mut file = BufReader::new(File::open(&self.path)?);

        for id in candidates {
            if signal.is_stopped() {
                return Err(crate::Error::Cancelled);
            }

            let Some(block) = self.block_by_id(id) else {
                continue;
            };

            result.blocks_scanned += 1;

            match self.read_block_events(&mut file, block, &mut result.warnings) {
                Ok(events) => {
                    result.events.extend(
                        events
                            .into_iter()
                            .filter(|e| range.contains(e.timestamp) && filter.matches(e)),
                    );
                }
                // A failing file handle aborts this file; corruption
                // only degrades it
                Err(e @ crate::Error::Io(_)) => return Err(e),
                Err(e) => {
                    log::warn!("Skipping corrupt block {id} of {:?}: {e:?}", self.path);
                    result.warnings.push(Warning {
                        code: WarningCode::BlockCorrupt,
                        file: self.file_name.clone(),
                        block: Some(id),
                        message: format!("{e:?}"),
                    });
                }
            }
        }

        // Events within one block are in write order; a stable sort
        // keeps block order and in-block order for equal timestamps
        result.events.sort_by_key(|e| e.timestamp);

        Ok(result)
    }

    /// Reads, verifies and decodes one block.
    fn read_block_events(
        &self,
        file: &mut BufReader<File>,
        block: &BlockMetadata,
        warnings: &mut Vec<Warning>,
    ) -> crate::Result<Vec<Event>> {
        file.seek(SeekFrom::Start(block.file_offset + BLOCK_HEADER_SIZE as u64))?;

        let mut payload = vec![0; block.compressed_length as usize];
        file.read_exact(&mut payload)?;

        let records = block::unpack(&block.block_header(), &payload, block.compression)?;
        let records = block::split_records(&records, block.event_count).map_err(crate::Error::Decode)?;

        let mut events = Vec::with_capacity(records.len());

        for (n, record) in records.iter().enumerate() {
            match self.codec.decode_event(record) {
                Ok(event) => events.push(event),
                Err(e) => {
                    // One bad record does not fail the block
                    log::warn!(
                        "Skipping undecodable record {n} in block {} of {:?}: {e:?}",
                        block.id,
                        self.path
                    );
                    warnings.push(Warning {
                        code: WarningCode::DecodeFailed,
                        file: self.file_name.clone(),
                        block: Some(block.id),
                        message: format!("record {n}: {e:?}"),
                    });
                }
            }
        }

        Ok(events)
    }

    /// Checksum-walks every block of the file.
    ///
    /// Returns the number of corrupt blocks.
    ///
    /// # Errors
    ///
    /// Returns error on I/O failure.
    pub fn verify(&self) -> crate::Result<usize> {
        let mut file = BufReader::new(File::open(&self.path)?);
        let mut broken = 0;

        for block in &self.blocks {
            file.seek(SeekFrom::Start(block.file_offset + BLOCK_HEADER_SIZE as u64))?;

            let mut payload = vec![0; block.compressed_length as usize];
            file.read_exact(&mut payload)?;

            if crate::Checksum::from_bytes(&payload) != block.checksum {
                log::warn!("Block {} of {:?} is corrupt", block.id, self.path);
                broken += 1;
            }
        }

        Ok(broken)
    }
}
