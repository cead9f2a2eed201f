// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{merge::Merger, Filter, QueryResult, QueryStats, TimeRange, Warning, WarningCode};
use crate::{
    hour::HourStamp,
    reader::{FileQueryResult, Reader},
    stop_signal::StopSignal,
};
use std::path::{Path, PathBuf};

/// Fans a query out across all hourly files of a data directory
///
/// Files are independent, so they are processed by parallel worker
/// threads; the per-file ordered streams are then k-way merged into
/// one globally timestamp-ordered stream.
pub struct Executor {
    data_dir: PathBuf,
}

impl Executor {
    /// Creates an executor over the given data directory.
    #[must_use]
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Lists the hourly files overlapping the query range, in hour order.
    ///
    /// A missing data directory behaves like an empty one.
    fn resolve_files(&self, range: TimeRange) -> crate::Result<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files: Vec<(HourStamp, PathBuf)> = Vec::new();

        for entry in entries {
            let entry = entry?;

            let name = entry.file_name();
            let Some(hour) = HourStamp::from_file_name(&name.to_string_lossy()) else {
                continue;
            };

            if hour.start_ns() <= range.end && hour.end_ns() > range.start {
                files.push((hour, entry.path()));
            }
        }

        files.sort_unstable_by_key(|(hour, _)| *hour);

        Ok(files.into_iter().map(|(_, path)| path).collect())
    }

    /// Opens and queries one file, downgrading per-file failures
    /// to warnings.
    fn query_file(
        path: &Path,
        range: TimeRange,
        filter: &Filter,
        signal: &StopSignal,
    ) -> crate::Result<FileQueryResult> {
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let soft_failure = |code: WarningCode, message: String| {
            Ok(FileQueryResult {
                warnings: vec![Warning {
                    code,
                    file: file_name.clone(),
                    block: None,
                    message,
                }],
                ..Default::default()
            })
        };

        let reader = match Reader::open(path) {
            Ok(reader) => reader,
            Err(crate::Error::UnsupportedVersion(version)) => {
                log::warn!("Skipping {path:?} with unsupported format version {version}");
                return soft_failure(
                    WarningCode::FormatUnsupported,
                    format!("unsupported format version {version}"),
                );
            }
            Err(crate::Error::Decode(e)) => {
                log::warn!("Skipping unparsable file {path:?}: {e:?}");
                return soft_failure(WarningCode::FormatUnsupported, format!("{e:?}"));
            }
            Err(crate::Error::Io(e)) => {
                log::warn!("Skipping unreadable file {path:?}: {e}");
                return soft_failure(WarningCode::IoFailed, e.to_string());
            }
            Err(e) => return Err(e),
        };

        match reader.query(range, filter, signal) {
            Ok(result) => Ok(result),
            Err(crate::Error::Cancelled) => Err(crate::Error::Cancelled),
            Err(crate::Error::Io(e)) => {
                log::warn!("Aborting file {path:?} mid-query: {e}");
                soft_failure(WarningCode::IoFailed, e.to_string())
            }
            Err(e) => Err(e),
        }
    }

    /// Runs a filtered range query across all hourly files.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidTimeRange`] for an inverted range
    /// - [`crate::Error::Cancelled`] when the stop signal fires
    /// - I/O errors while listing the data directory
    pub fn query(
        &self,
        range: TimeRange,
        filter: &Filter,
        signal: &StopSignal,
    ) -> crate::Result<QueryResult> {
        let start_time = std::time::Instant::now();

        range.validate()?;

        let files = self.resolve_files(range)?;

        let mut stats = QueryStats {
            files_searched: files.len() as u64,
            ..Default::default()
        };

        let parallelism = std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get);

        let mut streams: Vec<Vec<crate::event::Event>> = Vec::with_capacity(files.len());

        for chunk in files.chunks(parallelism) {
            let results: Vec<crate::Result<FileQueryResult>> = std::thread::scope(|s| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|path| s.spawn(move || Self::query_file(path, range, filter, signal)))
                    .collect();

                handles
                    .into_iter()
                    .map(|handle| {
                        handle.join().unwrap_or_else(|_| {
                            Err(crate::Error::Io(std::io::Error::other(
                                "query worker thread panicked",
                            )))
                        })
                    })
                    .collect()
            });

            for result in results {
                let result = result?;

                stats.blocks_scanned += result.blocks_scanned;
                stats.blocks_skipped += result.blocks_skipped;
                stats.warnings.extend(result.warnings);

                streams.push(result.events);
            }
        }

        let events: Vec<_> = Merger::new(streams).collect();

        stats.count = events.len() as u64;

        // NOTE: Truncation is OK, nobody waits 2^64 ms for a query
        #[allow(clippy::cast_possible_truncation)]
        {
            stats.execution_time_ms = start_time.elapsed().as_millis() as u64;
        }

        log::debug!(
            "Query over {} file(s): {} event(s), {} block(s) scanned, {} skipped, {} warning(s)",
            stats.files_searched,
            stats.count,
            stats.blocks_scanned,
            stats.blocks_skipped,
            stats.warnings.len(),
        );

        Ok(QueryResult { events, stats })
    }
}
