// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use serde::{Deserialize, Serialize};

/// The kind of change an event records
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Resource was created
    Create,

    /// Resource was updated
    Update,

    /// Resource was deleted
    Delete,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Create => "CREATE",
                Self::Update => "UPDATE",
                Self::Delete => "DELETE",
            }
        )
    }
}

/// Identity of the Kubernetes resource an event concerns
///
/// `group` and `namespace` may be empty (core API group and
/// cluster-scoped resources respectively).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    /// API group, e.g. `apps` (empty for the core group)
    #[serde(default)]
    pub group: String,

    /// API version, e.g. `v1`
    pub version: String,

    /// Resource kind, e.g. `Pod`
    pub kind: String,

    /// Namespace (empty for cluster-scoped resources)
    #[serde(default)]
    pub namespace: String,

    /// Resource name
    #[serde(default)]
    pub name: String,

    /// Resource UID
    #[serde(default)]
    pub uid: String,

    /// UID of the object this resource refers to, if any
    #[serde(default, rename = "involvedObjectUID")]
    pub involved_object_uid: String,
}

/// A single resource-change record
///
/// Events are immutable once written; they reference each other
/// only through UID strings.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Opaque ID, unique within an hourly file
    pub id: String,

    /// Nanoseconds since epoch
    pub timestamp: i64,

    /// Change type
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// The resource this event concerns
    pub resource: ResourceRef,

    /// Opaque payload (resource snapshot or diff)
    #[serde(default)]
    pub data: Vec<u8>,

    /// Producer-side payload size bookkeeping
    #[serde(default)]
    pub data_size: i64,

    /// Producer-side compressed size bookkeeping
    #[serde(default)]
    pub compressed_size: i64,
}

impl Event {
    /// Checks the event against the write-side invariants.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidEvent`] naming the violated field.
    pub fn validate(&self) -> crate::Result<()> {
        if self.timestamp <= 0 {
            return Err(crate::Error::InvalidEvent("timestamp must be positive"));
        }
        if self.resource.version.is_empty() {
            return Err(crate::Error::InvalidEvent("resource.version is empty"));
        }
        if self.resource.kind.is_empty() {
            return Err(crate::Error::InvalidEvent("resource.kind is empty"));
        }
        Ok(())
    }
}
