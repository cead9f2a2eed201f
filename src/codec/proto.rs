// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::Codec;
use crate::{
    coding::{DecodeError, EncodeError},
    event::{Event, EventType, ResourceRef},
};
use prost::Message;

/// Protobuf event records
#[derive(Copy, Clone, Debug, Default)]
pub struct ProtobufCodec;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
enum ChangeType {
    Create = 0,
    Update = 1,
    Delete = 2,
}

#[derive(Clone, PartialEq, prost::Message)]
struct ResourceRecord {
    #[prost(string, tag = "1")]
    group: String,

    #[prost(string, tag = "2")]
    version: String,

    #[prost(string, tag = "3")]
    kind: String,

    #[prost(string, tag = "4")]
    namespace: String,

    #[prost(string, tag = "5")]
    name: String,

    #[prost(string, tag = "6")]
    uid: String,

    #[prost(string, tag = "7")]
    involved_object_uid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
struct EventRecord {
    #[prost(string, tag = "1")]
    id: String,

    #[prost(int64, tag = "2")]
    timestamp: i64,

    #[prost(enumeration = "ChangeType", tag = "3")]
    change_type: i32,

    #[prost(message, optional, tag = "4")]
    resource: Option<ResourceRecord>,

    #[prost(bytes = "vec", tag = "5")]
    data: Vec<u8>,

    #[prost(int64, tag = "6")]
    data_size: i64,

    #[prost(int64, tag = "7")]
    compressed_size: i64,
}

impl From<&Event> for EventRecord {
    fn from(event: &Event) -> Self {
        let change_type = match event.event_type {
            EventType::Create => ChangeType::Create,
            EventType::Update => ChangeType::Update,
            EventType::Delete => ChangeType::Delete,
        };

        Self {
            id: event.id.clone(),
            timestamp: event.timestamp,
            change_type: change_type as i32,
            resource: Some(ResourceRecord {
                group: event.resource.group.clone(),
                version: event.resource.version.clone(),
                kind: event.resource.kind.clone(),
                namespace: event.resource.namespace.clone(),
                name: event.resource.name.clone(),
                uid: event.resource.uid.clone(),
                involved_object_uid: event.resource.involved_object_uid.clone(),
            }),
            data: event.data.clone(),
            data_size: event.data_size,
            compressed_size: event.compressed_size,
        }
    }
}

impl TryFrom<EventRecord> for Event {
    type Error = DecodeError;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        let event_type = match ChangeType::try_from(record.change_type) {
            Ok(ChangeType::Create) => EventType::Create,
            Ok(ChangeType::Update) => EventType::Update,
            Ok(ChangeType::Delete) => EventType::Delete,

            // NOTE: Truncation is OK, only used for the error message
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Err(_) => return Err(DecodeError::InvalidTag(("EventType", record.change_type as u8))),
        };

        let resource = record.resource.unwrap_or_default();

        Ok(Self {
            id: record.id,
            timestamp: record.timestamp,
            event_type,
            resource: ResourceRef {
                group: resource.group,
                version: resource.version,
                kind: resource.kind,
                namespace: resource.namespace,
                name: resource.name,
                uid: resource.uid,
                involved_object_uid: resource.involved_object_uid,
            },
            data: record.data,
            data_size: record.data_size,
            compressed_size: record.compressed_size,
        })
    }
}

impl Codec for ProtobufCodec {
    fn encode_event(&self, event: &Event) -> Result<Vec<u8>, EncodeError> {
        Ok(EventRecord::from(event).encode_to_vec())
    }

    fn decode_event(&self, bytes: &[u8]) -> Result<Event, DecodeError> {
        let record = EventRecord::decode(bytes)?;
        Event::try_from(record)
    }
}
