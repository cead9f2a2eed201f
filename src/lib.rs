// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An hour-partitioned, block-compressed event store for Kubernetes
//! resource-change history.
//!
//! ##### About
//!
//! This crate is the storage and query core of Spectre: it turns a
//! stream of validated resource-change events into immutable hourly
//! files on local disk, and answers filtered time-range queries over
//! them.
//!
//! Each UTC hour maps to one file (`YYYY-MM-DDTHH.bin`). Events are
//! buffered, compressed into checksummed blocks, and indexed three
//! ways per file: a sparse first-timestamp index, exact inverted
//! token maps (kind/namespace/group), and a per-block bloom filter.
//! A query selects candidate blocks through the indexes and only
//! decompresses what it could not rule out.
//!
//! Sealed files are never rewritten. A file whose writer crashed
//! before finalizing is recovered block by block; corruption degrades
//! the result and is disclosed through warnings instead of failing
//! the query.
//!
//! # Example usage
//!
//! ```
//! use spectre_store::{Config, Event, EventType, Filter, ResourceRef, StopSignal, TimeRange};
//! #
//! # let folder = tempfile::tempdir()?;
//!
//! // One store owns one data directory
//! let mut store = Config::new(folder.path()).open()?;
//!
//! store.append(&Event {
//!     id: "ev-1".into(),
//!     timestamp: 1_700_000_000_000_000_000,
//!     event_type: EventType::Create,
//!     resource: ResourceRef {
//!         version: "v1".into(),
//!         kind: "Pod".into(),
//!         namespace: "default".into(),
//!         ..Default::default()
//!     },
//!     data: br#"{"phase":"Running"}"#.to_vec(),
//!     data_size: 19,
//!     compressed_size: 0,
//! })?;
//!
//! // Finalize open hourly files, making them durable
//! store.flush()?;
//!
//! let range = TimeRange::new(1_699_999_999_000_000_000, 1_700_000_001_000_000_000)?;
//! let filter = Filter::new().kind("Pod").namespace("default");
//!
//! let result = store.query(range, &filter, &StopSignal::default())?;
//!
//! assert_eq!(1, result.stats.count);
//! assert_eq!("ev-1", result.events.first().map(|e| e.id.as_str()).unwrap_or_default());
//! #
//! # Ok::<(), spectre_store::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]

mod binary_search;
mod checksum;

#[doc(hidden)]
pub mod codec;

#[doc(hidden)]
pub mod coding;

mod compression;
mod config;
mod error;
mod event;

#[doc(hidden)]
pub mod file;

#[doc(hidden)]
pub mod format;

mod hour;

#[doc(hidden)]
pub mod index;

pub mod query;

mod reader;
mod stop_signal;
mod store;
mod time;
mod writer;

pub use {
    checksum::Checksum,
    codec::Encoding,
    compression::CompressionType,
    config::Config,
    error::{Error, Result},
    event::{Event, EventType, ResourceRef},
    format::FormatVersion,
    hour::HourStamp,
    query::{Executor, Filter, QueryResult, QueryStats, TimeRange, Warning, WarningCode},
    reader::{FileQueryResult, Reader},
    stop_signal::StopSignal,
    store::EventStore,
    writer::Writer,
};
