// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::{DecodeError, EncodeError},
    hour::HourStamp,
    Checksum, CompressionType,
};

/// Represents errors that can occur in the event store
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Serialization failed
    Encode(EncodeError),

    /// Deserialization failed
    Decode(DecodeError),

    /// Decompression failed
    Decompress(CompressionType),

    /// Invalid or unparsable data format version
    UnsupportedVersion(u32),

    /// Invalid checksum value (got, expected)
    ChecksumMismatch {
        /// Checksum computed over the bytes read from disk
        got: Checksum,

        /// Checksum stored when the block was sealed
        expected: Checksum,
    },

    /// Query time range is empty or inverted
    InvalidTimeRange {
        /// Start timestamp (ns)
        start: i64,

        /// End timestamp (ns)
        end: i64,
    },

    /// Event failed validation before write
    InvalidEvent(&'static str),

    /// Event timestamp does not belong to the writer's hour
    WrongHour {
        /// The hour the writer owns
        hour: HourStamp,

        /// The offending event timestamp (ns)
        timestamp: i64,
    },

    /// Writer hit an I/O failure (or was closed) and accepts no further writes
    Poisoned,

    /// Query was cancelled through its stop signal
    Cancelled,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StoreError: {self:?}")
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// Store result
pub type Result<T> = std::result::Result<T, Error>;
