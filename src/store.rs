// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    config::Config,
    event::Event,
    file::fsync_directory,
    hour::HourStamp,
    query::{Executor, Filter, QueryResult, TimeRange},
    stop_signal::StopSignal,
    writer::Writer,
};
use std::{collections::BTreeMap, path::Path};

/// The owning manager of a data directory
///
/// Routes each incoming event to the writer of its hour, creating
/// writers lazily and finalizing them as ingest moves on to newer
/// hours. Append is single-threaded by construction; callers feed
/// the store by draining their own bounded queue.
///
/// Queries go through [`Executor`] and may run concurrently with
/// ingest; an unfinished hour is served through the recovery path
/// until it is finalized.
pub struct EventStore {
    config: Config,

    /// Open writers by hour
    ///
    /// The current and the previous hour stay open so slightly
    /// out-of-order producers do not thrash file creation; anything
    /// older is finalized on rotation.
    active: BTreeMap<HourStamp, Writer>,
}

impl EventStore {
    /// Opens (or creates) the data directory.
    pub(crate) fn open(config: Config) -> crate::Result<Self> {
        std::fs::create_dir_all(&config.path)?;
        fsync_directory(&config.path)?;

        log::debug!("Opened event store at {:?}", config.path);

        Ok(Self {
            config,
            active: BTreeMap::new(),
        })
    }

    /// The data directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Hours that currently have an open writer.
    #[must_use]
    pub fn active_hours(&self) -> Vec<HourStamp> {
        self.active.keys().copied().collect()
    }

    /// Appends one event, dispatching it to the writer of its hour.
    ///
    /// Creating a writer for an hour whose file was already finalized
    /// fails: sealed files are never rewritten.
    ///
    /// # Errors
    ///
    /// Returns the write-side errors of [`Writer::write`], plus I/O
    /// errors from rotating out writers of older hours.
    pub fn append(&mut self, event: &Event) -> crate::Result<()> {
        event.validate()?;

        let hour = HourStamp::containing(event.timestamp);
        let mut created = false;

        let writer = match self.active.entry(hour) {
            std::collections::btree_map::Entry::Occupied(entry) => entry.into_mut(),
            std::collections::btree_map::Entry::Vacant(entry) => {
                created = true;
                entry.insert(Writer::create(hour, &self.config)?)
            }
        };

        writer.write(event)?;

        if created {
            self.rotate(hour)?;
        }

        Ok(())
    }

    /// Finalizes all writers older than the hour before `newest`.
    fn rotate(&mut self, newest: HourStamp) -> crate::Result<()> {
        let horizon = newest.prev();

        let stale: Vec<HourStamp> = self
            .active
            .keys()
            .copied()
            .filter(|hour| *hour < horizon)
            .collect();

        for hour in stale {
            if let Some(mut writer) = self.active.remove(&hour) {
                log::debug!("Rotating out writer for hour {hour}");
                writer.finish()?;
            }
        }

        Ok(())
    }

    /// Finalizes all open writers.
    ///
    /// # Errors
    ///
    /// Returns error on I/O failure; remaining writers are still
    /// attempted, the first error is reported.
    pub fn flush(&mut self) -> crate::Result<()> {
        let mut first_error = None;

        while let Some((hour, mut writer)) = self.active.pop_first() {
            if let Err(e) = writer.finish() {
                log::error!("Failed to finalize writer for hour {hour}: {e:?}");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Finalizes all open writers and closes the store.
    ///
    /// # Errors
    ///
    /// Returns error on I/O failure.
    pub fn close(mut self) -> crate::Result<()> {
        self.flush()
    }

    /// Runs a filtered range query across all hourly files.
    ///
    /// # Errors
    ///
    /// See [`Executor::query`].
    pub fn query(
        &self,
        range: TimeRange,
        filter: &Filter,
        signal: &StopSignal,
    ) -> crate::Result<QueryResult> {
        Executor::new(&self.config.path).query(range, filter, signal)
    }
}
