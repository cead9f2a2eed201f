// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod meta;

use crate::{
    codec::{AnyCodec, Codec},
    coding::Encode,
    config::Config,
    event::Event,
    file::fsync_directory,
    format::{block, BlockHeader, FileFooter, FileHeader, FileMetadata, FormatVersion},
    hour::HourStamp,
    index::{BlockMetadata, IndexSection, InvertedIndex, SparseEntry, SparseIndex},
    time::unix_timestamp,
    CompressionType,
};
use rustc_hash::FxHashSet;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

/// Serializes and compresses events into blocks and writes them
/// to disk as an hourly file
///
/// There is at most one writer per hourly file; it owns exclusive
/// append on its file. Callers feed it serially - typically by
/// draining a bounded queue they own.
pub struct Writer {
    /// The UTC hour this writer owns
    hour: HourStamp,

    /// Hourly file path
    path: PathBuf,

    /// Data directory (fsynced on finalize)
    folder: PathBuf,

    /// Event record codec, fixed at creation
    codec: AnyCodec,

    /// Compression to use
    compression: CompressionType,

    /// Uncompressed byte threshold at which a block is sealed
    block_size: u32,

    /// False positive rate for per-block bloom filters
    bloom_fp_rate: f32,

    /// Writer of blocks
    block_writer: BufWriter<File>,

    /// Buffer of encoded event records
    buf: Vec<u8>,

    buf_event_count: u32,
    buf_ts_min: i64,
    buf_ts_max: i64,

    buf_kinds: FxHashSet<String>,
    buf_namespaces: FxHashSet<String>,
    buf_groups: FxHashSet<String>,

    /// Metadata of sealed blocks, in seal order
    blocks: Vec<BlockMetadata>,

    inverted: InvertedIndex,
    sparse: SparseIndex,

    pub(crate) meta: meta::Metadata,

    /// Set after a failed I/O operation; the file must be reopened
    /// from disk, which recovers the already-persisted prefix
    poisoned: bool,

    /// Result of a successful finalize, making `finish` idempotent
    finalized: Option<FileMetadata>,
}

impl Writer {
    /// Sets up a new `Writer` for the given hour inside the data directory.
    ///
    /// Creates the hourly file and writes its header. Fails if the
    /// file already exists - sealed files are never rewritten.
    ///
    /// # Errors
    ///
    /// Returns error on I/O failure.
    pub fn create(hour: HourStamp, config: &Config) -> crate::Result<Self> {
        let path = hour.path_in(&config.path);

        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        let mut block_writer = BufWriter::with_capacity(u16::MAX.into(), file);

        let header = FileHeader {
            version: FormatVersion::V1,
            hour,
            block_size: config.block_size,
            encoding: config.encoding,
            compression: config.compression,
        };
        header.write_into(&mut block_writer)?;

        // Push the header out of the buffer right away; a file on
        // disk always starts with a readable header
        block_writer.flush()?;

        let meta = meta::Metadata {
            file_pos: FileHeader::serialized_len() as u64,

            // NOTE: Truncation is OK until the year 586912
            #[allow(clippy::cast_possible_truncation)]
            created_at: unix_timestamp().as_micros() as u64,

            ..Default::default()
        };

        log::debug!("Created hourly file {path:?} ({})", config.encoding);

        Ok(Self {
            hour,
            path,
            folder: config.path.clone(),

            codec: config.encoding.codec(),
            compression: config.compression,
            block_size: config.block_size,
            bloom_fp_rate: config.bloom_fp_rate,

            block_writer,

            buf: Vec::with_capacity(config.block_size as usize),
            buf_event_count: 0,
            buf_ts_min: i64::MAX,
            buf_ts_max: i64::MIN,

            buf_kinds: FxHashSet::default(),
            buf_namespaces: FxHashSet::default(),
            buf_groups: FxHashSet::default(),

            blocks: Vec::new(),
            inverted: InvertedIndex::default(),
            sparse: SparseIndex::default(),

            meta,

            poisoned: false,
            finalized: None,
        })
    }

    /// The hour this writer owns.
    #[must_use]
    pub fn hour(&self) -> HourStamp {
        self.hour
    }

    /// Path of the hourly file.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Returns `true` if a previous I/O failure poisoned this writer.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Writes an event.
    ///
    /// If the buffered bytes reach the block size threshold, the
    /// block is sealed synchronously before returning, so the
    /// wall-clock of single calls may occasionally spike.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidEvent`] if the event fails validation
    /// - [`crate::Error::WrongHour`] if the event belongs to another hour
    /// - [`crate::Error::Encode`] if the event cannot be serialized
    /// - [`crate::Error::Poisoned`] after a previous I/O failure or close
    /// - I/O errors from a triggered block seal; these poison the writer
    pub fn write(&mut self, event: &Event) -> crate::Result<()> {
        if self.poisoned || self.finalized.is_some() {
            return Err(crate::Error::Poisoned);
        }

        event.validate()?;

        if !self.hour.contains(event.timestamp) {
            return Err(crate::Error::WrongHour {
                hour: self.hour,
                timestamp: event.timestamp,
            });
        }

        let record = self.codec.encode_event(event)?;
        block::append_record(&mut self.buf, &record)?;

        self.buf_event_count += 1;
        self.buf_ts_min = self.buf_ts_min.min(event.timestamp);
        self.buf_ts_max = self.buf_ts_max.max(event.timestamp);

        if !self.buf_kinds.contains(&event.resource.kind) {
            self.buf_kinds.insert(event.resource.kind.clone());
        }
        if !self.buf_namespaces.contains(&event.resource.namespace) {
            self.buf_namespaces.insert(event.resource.namespace.clone());
        }
        if !self.buf_groups.contains(&event.resource.group) {
            self.buf_groups.insert(event.resource.group.clone());
        }

        if self.buf.len() >= self.block_size as usize {
            self.seal_block()?;
        }

        Ok(())
    }

    /// Writes the buffered events as a compressed block to disk.
    ///
    /// Does nothing if the buffer is empty; empty blocks are never
    /// written.
    fn seal_block(&mut self) -> crate::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }

        match self.seal_block_inner() {
            Ok(()) => Ok(()),
            Err(e) => {
                log::error!("Failed to seal block in {:?}: {e:?}", self.path);
                self.poisoned = true;
                Err(e)
            }
        }
    }

    fn seal_block_inner(&mut self) -> crate::Result<()> {
        let (header, payload) = block::pack(
            &self.buf,
            self.buf_event_count,
            self.buf_ts_min,
            self.buf_ts_max,
            self.compression,
        );

        header.encode_into(&mut self.block_writer)?;
        self.block_writer.write_all(&payload)?;

        // Hand sealed blocks to the OS immediately; a killed writer
        // then loses at most its unsealed buffer
        self.block_writer.flush()?;

        let file_offset = self.meta.file_pos;

        // NOTE: Truncation is OK, 4 billion blocks would exceed any hourly file
        #[allow(clippy::cast_possible_truncation)]
        let id = self.blocks.len() as u32;

        let metadata = BlockMetadata::new(
            id,
            &header,
            file_offset,
            self.compression,
            self.buf_kinds.drain().collect(),
            self.buf_namespaces.drain().collect(),
            self.buf_groups.drain().collect(),
            self.bloom_fp_rate,
        );

        self.inverted
            .register(id, &metadata.kinds, &metadata.namespaces, &metadata.groups);

        self.sparse.insert(SparseEntry {
            timestamp: header.ts_min,
            block_id: id,
            file_offset,
        });

        let bytes_written = (BlockHeader::serialized_len() + payload.len()) as u64;

        self.meta.file_pos += bytes_written;
        self.meta.event_count += self.buf_event_count as usize;
        self.meta.uncompressed_size += u64::from(header.uncompressed_length);
        self.meta.compressed_size += u64::from(header.compressed_length);
        self.meta.block_count += 1;

        log::trace!(
            "Sealed block {id} of {:?}: {} events, {} -> {} bytes",
            self.path,
            header.event_count,
            header.uncompressed_length,
            header.compressed_length,
        );

        self.blocks.push(metadata);

        // IMPORTANT: Clear buffer after everything else
        self.buf.clear();
        self.buf_event_count = 0;
        self.buf_ts_min = i64::MAX;
        self.buf_ts_max = i64::MIN;

        Ok(())
    }

    /// Finishes the file, making sure all data is written durably.
    ///
    /// Seals the remaining buffer, appends the index section and the
    /// footer, then fsyncs. The file is read-only afterwards.
    ///
    /// Calling `finish` again is a no-op returning the same metadata.
    ///
    /// # Errors
    ///
    /// Returns error on I/O failure, which poisons the writer.
    pub fn finish(&mut self) -> crate::Result<FileMetadata> {
        if let Some(metadata) = self.finalized {
            return Ok(metadata);
        }
        if self.poisoned {
            return Err(crate::Error::Poisoned);
        }

        self.seal_block()?;

        match self.finish_inner() {
            Ok(metadata) => {
                self.finalized = Some(metadata);
                Ok(metadata)
            }
            Err(e) => {
                log::error!("Failed to finalize {:?}: {e:?}", self.path);
                self.poisoned = true;
                Err(e)
            }
        }
    }

    fn finish_inner(&mut self) -> crate::Result<FileMetadata> {
        let mut sparse = std::mem::take(&mut self.sparse);
        sparse.finalize();

        let section = IndexSection {
            blocks: std::mem::take(&mut self.blocks),
            inverted: std::mem::take(&mut self.inverted),
            sparse,
        };

        let index_offset = self.meta.file_pos;
        let index_bytes = section.encode_into_vec();

        self.block_writer.write_all(&index_bytes)?;

        let metadata = FileMetadata {
            created_at: self.meta.created_at,

            #[allow(clippy::cast_possible_truncation)]
            finalized_at: unix_timestamp().as_micros() as u64,

            total_events: self.meta.event_count as u64,
            total_uncompressed_bytes: self.meta.uncompressed_size,
            total_compressed_bytes: self.meta.compressed_size,

            #[allow(clippy::cast_possible_truncation)]
            block_count: self.meta.block_count as u32,
        };

        let footer = FileFooter {
            index_offset,
            index_length: index_bytes.len() as u64,
            metadata,
        };
        footer.write_into(&mut self.block_writer)?;

        // Finally, flush & fsync the file and its directory
        self.block_writer.flush()?;
        self.block_writer.get_mut().sync_all()?;
        fsync_directory(&self.folder)?;

        log::debug!(
            "Finalized {:?}: {} events in {} blocks, ratio {:.3}",
            self.path,
            metadata.total_events,
            metadata.block_count,
            metadata.compression_ratio(),
        );

        Ok(metadata)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::{codec::Encoding, event::{EventType, ResourceRef}};
    use test_log::test;

    fn hour() -> HourStamp {
        HourStamp::from_ymdh(2025, 3, 14, 9).expect("valid date")
    }

    fn event_at(offset_ms: i64, kind: &str, namespace: &str) -> Event {
        Event {
            id: format!("ev-{offset_ms}"),
            timestamp: hour().start_ns() + offset_ms * 1_000_000,
            event_type: EventType::Update,
            resource: ResourceRef {
                group: String::new(),
                version: "v1".into(),
                kind: kind.into(),
                namespace: namespace.into(),
                name: nanoid::nanoid!(),
                uid: nanoid::nanoid!(),
                involved_object_uid: String::new(),
            },
            data: b"status".repeat(64),
            data_size: 384,
            compressed_size: 0,
        }
    }

    #[test]
    fn writer_rejects_wrong_hour() -> crate::Result<()> {
        let folder = tempfile::tempdir()?;
        let config = Config::new(folder.path());

        let mut writer = Writer::create(hour(), &config)?;

        let mut event = event_at(0, "Pod", "default");
        event.timestamp = hour().next().start_ns();

        assert!(matches!(
            writer.write(&event),
            Err(crate::Error::WrongHour { .. })
        ));

        Ok(())
    }

    #[test]
    fn writer_rejects_invalid_event() -> crate::Result<()> {
        let folder = tempfile::tempdir()?;
        let config = Config::new(folder.path());

        let mut writer = Writer::create(hour(), &config)?;

        let mut event = event_at(0, "Pod", "default");
        event.resource.kind = String::new();

        assert!(matches!(
            writer.write(&event),
            Err(crate::Error::InvalidEvent(_))
        ));

        Ok(())
    }

    #[test]
    fn writer_refuses_existing_file() -> crate::Result<()> {
        let folder = tempfile::tempdir()?;
        let config = Config::new(folder.path());

        let mut writer = Writer::create(hour(), &config)?;
        writer.write(&event_at(0, "Pod", "default"))?;
        writer.finish()?;

        assert!(matches!(
            Writer::create(hour(), &config),
            Err(crate::Error::Io(_))
        ));

        Ok(())
    }

    #[test]
    fn writer_finish_idempotent() -> crate::Result<()> {
        let folder = tempfile::tempdir()?;
        let config = Config::new(folder.path());

        let mut writer = Writer::create(hour(), &config)?;

        for i in 0..10 {
            writer.write(&event_at(i, "Pod", "default"))?;
        }

        let first = writer.finish()?;
        let second = writer.finish()?;

        assert_eq!(first, second);
        assert_eq!(10, first.total_events);

        Ok(())
    }

    #[test]
    fn writer_write_after_finish_fails() -> crate::Result<()> {
        let folder = tempfile::tempdir()?;
        let config = Config::new(folder.path());

        let mut writer = Writer::create(hour(), &config)?;
        writer.write(&event_at(0, "Pod", "default"))?;
        writer.finish()?;

        assert!(matches!(
            writer.write(&event_at(1, "Pod", "default")),
            Err(crate::Error::Poisoned)
        ));

        Ok(())
    }

    #[test]
    fn writer_seals_blocks_at_threshold() -> crate::Result<()> {
        let folder = tempfile::tempdir()?;
        let config = Config::new(folder.path()).block_size(crate::config::MIN_BLOCK_SIZE);

        let mut writer = Writer::create(hour(), &config)?;

        // Each event encodes to roughly 1.5 KiB of JSON, so a
        // 32 KiB block holds only a handful of them
        for i in 0..500 {
            writer.write(&event_at(i, "Pod", "default"))?;
        }

        let metadata = writer.finish()?;

        assert_eq!(500, metadata.total_events);
        assert!(metadata.block_count >= 4, "expected multiple blocks");
        assert!(metadata.total_compressed_bytes < metadata.total_uncompressed_bytes);

        Ok(())
    }

    #[test]
    fn writer_block_invariants() -> crate::Result<()> {
        let folder = tempfile::tempdir()?;
        let config = Config::new(folder.path()).block_size(crate::config::MIN_BLOCK_SIZE);

        let mut writer = Writer::create(hour(), &config)?;

        let kinds = ["Pod", "Deployment", "Service"];
        for i in 0..300 {
            #[allow(clippy::cast_sign_loss, clippy::indexing_slicing)]
            writer.write(&event_at(i, kinds[i as usize % 3], "default"))?;
        }

        writer.seal_block()?;

        for block in &writer.blocks {
            assert!(block.ts_min <= block.ts_max);
            assert!(block.event_count >= 1);
            assert!(block.bloom.is_some());

            for kind in &block.kinds {
                assert!(block.bloom_may_contain_any(std::slice::from_ref(kind)));
            }
        }

        writer.finish()?;

        Ok(())
    }

    #[test]
    fn writer_empty_file_finalizes() -> crate::Result<()> {
        let folder = tempfile::tempdir()?;
        let config = Config::new(folder.path());

        let mut writer = Writer::create(hour(), &config)?;
        let metadata = writer.finish()?;

        assert_eq!(0, metadata.total_events);
        assert_eq!(0, metadata.block_count);
        assert!((metadata.compression_ratio() - 0.0).abs() < f64::EPSILON);

        Ok(())
    }

    #[test]
    fn writer_proto_encoding() -> crate::Result<()> {
        let folder = tempfile::tempdir()?;
        let config = Config::new(folder.path()).encoding(Encoding::Protobuf);

        let mut writer = Writer::create(hour(), &config)?;

        for i in 0..50 {
            writer.write(&event_at(i, "ConfigMap", "kube-system"))?;
        }

        let metadata = writer.finish()?;
        assert_eq!(50, metadata.total_events);

        Ok(())
    }
}
