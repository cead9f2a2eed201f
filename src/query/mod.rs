// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Filtered time-range queries and their execution across hourly files

mod executor;
mod merge;

pub use executor::Executor;

use crate::event::Event;
use serde::Serialize;

/// Inclusive timestamp range of a query (ns since epoch)
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimeRange {
    /// Start timestamp (inclusive)
    pub start: i64,

    /// End timestamp (inclusive)
    pub end: i64,
}

impl TimeRange {
    /// Creates a time range.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidTimeRange`] if `end <= start`.
    pub fn new(start: i64, end: i64) -> crate::Result<Self> {
        if end <= start {
            return Err(crate::Error::InvalidTimeRange { start, end });
        }

        Ok(Self { start, end })
    }

    /// Re-checks the range invariant for ranges built from raw fields.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidTimeRange`] if `end <= start`.
    pub fn validate(&self) -> crate::Result<()> {
        if self.end <= self.start {
            return Err(crate::Error::InvalidTimeRange {
                start: self.start,
                end: self.end,
            });
        }

        Ok(())
    }

    /// Returns `true` if the timestamp lies inside the range.
    #[must_use]
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// Event filter of a query
///
/// Dimensions combine conjunctively; multiple values within one
/// dimension combine disjunctively. Matching is case-sensitive
/// string equality. An empty filter matches everything.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    kinds: Vec<String>,
    namespaces: Vec<String>,
    groups: Vec<String>,
    version: Option<String>,
}

impl Filter {
    /// Creates an empty filter that matches all events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a resource kind; empty strings are ignored.
    #[must_use]
    pub fn kind<S: Into<String>>(mut self, kind: S) -> Self {
        let kind = kind.into();
        if !kind.is_empty() && !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
        self
    }

    /// Adds multiple resource kinds.
    #[must_use]
    pub fn kinds<I: IntoIterator<Item = S>, S: Into<String>>(mut self, kinds: I) -> Self {
        for kind in kinds {
            self = self.kind(kind);
        }
        self
    }

    /// Adds a namespace; empty strings are ignored.
    #[must_use]
    pub fn namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        let namespace = namespace.into();
        if !namespace.is_empty() && !self.namespaces.contains(&namespace) {
            self.namespaces.push(namespace);
        }
        self
    }

    /// Adds multiple namespaces.
    #[must_use]
    pub fn namespaces<I: IntoIterator<Item = S>, S: Into<String>>(mut self, namespaces: I) -> Self {
        for namespace in namespaces {
            self = self.namespace(namespace);
        }
        self
    }

    /// Sets the API group; empty strings are ignored.
    #[must_use]
    pub fn group<S: Into<String>>(mut self, group: S) -> Self {
        let group = group.into();
        if !group.is_empty() && !self.groups.contains(&group) {
            self.groups.push(group);
        }
        self
    }

    /// Sets the API version; empty strings are ignored.
    #[must_use]
    pub fn version<S: Into<String>>(mut self, version: S) -> Self {
        let version = version.into();
        if !version.is_empty() {
            self.version = Some(version);
        }
        self
    }

    /// Kind tokens to match (disjunctive).
    #[must_use]
    pub fn kind_tokens(&self) -> &[String] {
        &self.kinds
    }

    /// Namespace tokens to match (disjunctive).
    #[must_use]
    pub fn namespace_tokens(&self) -> &[String] {
        &self.namespaces
    }

    /// Group tokens to match (disjunctive).
    #[must_use]
    pub fn group_tokens(&self) -> &[String] {
        &self.groups
    }

    /// Version token to match, if any.
    #[must_use]
    pub fn version_token(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Returns `true` if no dimension is constrained.
    #[must_use]
    pub fn matches_all(&self) -> bool {
        self.kinds.is_empty()
            && self.namespaces.is_empty()
            && self.groups.is_empty()
            && self.version.is_none()
    }

    /// Applies the filter to a single event.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&event.resource.kind) {
            return false;
        }
        if !self.namespaces.is_empty() && !self.namespaces.contains(&event.resource.namespace) {
            return false;
        }
        if !self.groups.is_empty() && !self.groups.contains(&event.resource.group) {
            return false;
        }
        if let Some(version) = &self.version {
            if *version != event.resource.version {
                return false;
            }
        }

        true
    }
}

/// Category of a soft failure encountered by a query
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    /// File has no valid footer; only fully written blocks were recovered
    FileTruncated,

    /// A block failed its checksum and was skipped
    BlockCorrupt,

    /// Footer is present but the index section is unreadable
    FileMissingIndex,

    /// File has an unknown format version and was skipped
    FormatUnsupported,

    /// A single event record could not be decoded and was skipped
    DecodeFailed,

    /// A file could not be read and was skipped entirely
    IoFailed,
}

impl std::fmt::Display for WarningCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::FileTruncated => "FILE_TRUNCATED",
                Self::BlockCorrupt => "BLOCK_CORRUPT",
                Self::FileMissingIndex => "FILE_MISSING_INDEX",
                Self::FormatUnsupported => "FORMAT_UNSUPPORTED",
                Self::DecodeFailed => "DECODE_FAILED",
                Self::IoFailed => "IO_FAILED",
            }
        )
    }
}

/// A soft failure, scoped to one file or block
///
/// Queries never silently drop results over recoverable corruption;
/// this list is the authoritative channel for partial-result
/// disclosures.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Warning {
    /// Failure category
    pub code: WarningCode,

    /// File name the failure occurred in
    pub file: String,

    /// Block ID, if the failure is block-scoped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<u32>,

    /// Human-readable description
    pub message: String,
}

/// Execution statistics of a query
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStats {
    /// Number of events returned
    pub count: u64,

    /// Wall-clock execution time in milliseconds
    pub execution_time_ms: u64,

    /// Number of hourly files opened
    pub files_searched: u64,

    /// Number of blocks decompressed and scanned
    pub blocks_scanned: u64,

    /// Number of blocks ruled out by the indexes
    pub blocks_skipped: u64,

    /// Soft failures encountered
    pub warnings: Vec<Warning>,
}

/// Result of a query: matching events plus execution statistics
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Matching events, ordered by timestamp ascending
    pub events: Vec<Event>,

    /// Execution statistics
    pub stats: QueryStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventType, ResourceRef};
    use test_log::test;

    fn event(kind: &str, namespace: &str, group: &str, version: &str) -> Event {
        Event {
            id: "e".into(),
            timestamp: 1,
            event_type: EventType::Create,
            resource: ResourceRef {
                group: group.into(),
                version: version.into(),
                kind: kind.into(),
                namespace: namespace.into(),
                name: String::new(),
                uid: String::new(),
                involved_object_uid: String::new(),
            },
            data: vec![],
            data_size: 0,
            compressed_size: 0,
        }
    }

    #[test]
    fn time_range_validation() {
        assert!(TimeRange::new(0, 1).is_ok());
        assert!(matches!(
            TimeRange::new(5, 5),
            Err(crate::Error::InvalidTimeRange { .. })
        ));
        assert!(matches!(
            TimeRange::new(5, 1),
            Err(crate::Error::InvalidTimeRange { .. })
        ));
    }

    #[test]
    fn time_range_inclusive() -> crate::Result<()> {
        let range = TimeRange::new(10, 20)?;

        assert!(range.contains(10));
        assert!(range.contains(20));
        assert!(!range.contains(9));
        assert!(!range.contains(21));

        Ok(())
    }

    #[test]
    fn filter_empty_matches_all() {
        let filter = Filter::new();
        assert!(filter.matches_all());
        assert!(filter.matches(&event("Pod", "default", "", "v1")));
    }

    #[test]
    fn filter_conjunctive_across_dimensions() {
        let filter = Filter::new().kind("Deployment").namespace("default");

        assert!(filter.matches(&event("Deployment", "default", "apps", "v1")));
        assert!(!filter.matches(&event("Deployment", "kube-system", "apps", "v1")));
        assert!(!filter.matches(&event("Pod", "default", "", "v1")));
    }

    #[test]
    fn filter_disjunctive_within_dimension() {
        let filter = Filter::new().kinds(["Pod", "Deployment"]);

        assert!(filter.matches(&event("Pod", "default", "", "v1")));
        assert!(filter.matches(&event("Deployment", "default", "apps", "v1")));
        assert!(!filter.matches(&event("Service", "default", "", "v1")));
    }

    #[test]
    fn filter_empty_strings_ignored() {
        let filter = Filter::new().kind("").namespace("").group("").version("");
        assert!(filter.matches_all());
    }

    #[test]
    fn filter_version_predicate() {
        let filter = Filter::new().version("v1");

        assert!(filter.matches(&event("Pod", "default", "", "v1")));
        assert!(!filter.matches(&event("Pod", "default", "", "v1beta1")));
    }

    #[test]
    fn filter_case_sensitive() {
        let filter = Filter::new().kind("pod");
        assert!(!filter.matches(&event("Pod", "default", "", "v1")));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn warning_wire_codes() {
        let warning = Warning {
            code: WarningCode::BlockCorrupt,
            file: "2025-03-14T09.bin".into(),
            block: Some(4),
            message: "checksum mismatch".into(),
        };

        let json = serde_json::to_string(&warning).unwrap();
        assert!(json.contains("\"BLOCK_CORRUPT\""));
        assert!(json.contains("\"block\":4"));
    }
}
