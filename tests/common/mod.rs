#![allow(dead_code)]

use spectre_store::{Event, EventType, HourStamp, ResourceRef};

/// The hour all single-file scenarios write into.
#[must_use]
pub fn test_hour() -> HourStamp {
    HourStamp::from_ymdh(2025, 3, 14, 9).expect("valid date")
}

/// Builds one small event inside `hour`, `offset_ms` milliseconds
/// after its start.
#[must_use]
pub fn event_at(hour: HourStamp, offset_ms: i64, kind: &str, namespace: &str) -> Event {
    event_with_group(hour, offset_ms, kind, namespace, "")
}

/// Builds one small event with an explicit API group.
#[must_use]
pub fn event_with_group(
    hour: HourStamp,
    offset_ms: i64,
    kind: &str,
    namespace: &str,
    group: &str,
) -> Event {
    Event {
        id: format!("{kind}-{namespace}-{offset_ms}"),
        timestamp: hour.start_ns() + offset_ms * 1_000_000,
        event_type: EventType::Update,
        resource: ResourceRef {
            group: group.into(),
            version: "v1".into(),
            kind: kind.into(),
            namespace: namespace.into(),
            name: format!("{kind}-{offset_ms}"),
            uid: nanoid::nanoid!(),
            involved_object_uid: String::new(),
        },
        data: br#"{"phase":"Running"}"#.to_vec(),
        data_size: 19,
        compressed_size: 0,
    }
}

/// Builds one event with a payload bulky enough to rotate blocks
/// quickly at the smallest block size.
#[must_use]
pub fn bulky_event_at(hour: HourStamp, offset_ms: i64, kind: &str, namespace: &str) -> Event {
    let mut event = event_at(hour, offset_ms, kind, namespace);

    // K8s payloads are highly repetitive JSON
    event.data =
        br#"{"status":{"phase":"Running","conditions":[{"type":"Ready","status":"True"}]}}"#
            .repeat(12);
    event.data_size = event.data.len() as i64;

    event
}
