// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

pub mod json;
pub mod proto;

use crate::{
    coding::{Decode, DecodeError, Encode, EncodeError},
    event::Event,
};
use byteorder::{ReadBytesExt, WriteBytesExt};
use enum_dispatch::enum_dispatch;
use std::io::{Read, Write};

pub use {json::JsonCodec, proto::ProtobufCodec};

/// Per-event payload codec
///
/// The codec is chosen once per file (recorded in the file header)
/// and dispatched per file, never per event.
#[enum_dispatch]
pub trait Codec {
    /// Serializes one event into its record bytes.
    fn encode_event(&self, event: &Event) -> Result<Vec<u8>, EncodeError>;

    /// Deserializes one event from its record bytes.
    fn decode_event(&self, bytes: &[u8]) -> Result<Event, DecodeError>;
}

/// Codec for either supported encoding
#[enum_dispatch(Codec)]
#[derive(Copy, Clone, Debug)]
pub enum AnyCodec {
    /// JSON records
    Json(JsonCodec),

    /// Protobuf records
    Protobuf(ProtobufCodec),
}

/// Event payload encoding of a file
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Encoding {
    /// JSON records
    #[default]
    Json,

    /// Protobuf records
    Protobuf,
}

impl Encoding {
    /// Returns the codec for this encoding.
    #[must_use]
    pub fn codec(self) -> AnyCodec {
        match self {
            Self::Json => AnyCodec::from(JsonCodec),
            Self::Protobuf => AnyCodec::from(ProtobufCodec),
        }
    }
}

impl Encode for Encoding {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        match self {
            Self::Json => writer.write_u8(0)?,
            Self::Protobuf => writer.write_u8(1)?,
        }

        Ok(())
    }
}

impl Decode for Encoding {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let tag = reader.read_u8()?;

        match tag {
            0 => Ok(Self::Json),
            1 => Ok(Self::Protobuf),
            tag => Err(DecodeError::InvalidTag(("Encoding", tag))),
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Json => "json",
                Self::Protobuf => "protobuf",
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventType, ResourceRef};
    use test_log::test;

    fn deployment_event() -> Event {
        Event {
            id: "ev-42".into(),
            timestamp: 1_700_000_000_000_000_000,
            event_type: EventType::Update,
            resource: ResourceRef {
                group: "apps".into(),
                version: "v1".into(),
                kind: "Deployment".into(),
                namespace: "kube-system".into(),
                name: "coredns".into(),
                uid: "d2c8".into(),
                involved_object_uid: "a1b2".into(),
            },
            data: br#"{"replicas":3}"#.to_vec(),
            data_size: 14,
            compressed_size: 0,
        }
    }

    #[test]
    fn codec_round_trip_both_encodings() -> crate::Result<()> {
        let event = deployment_event();

        for encoding in [Encoding::Json, Encoding::Protobuf] {
            let codec = encoding.codec();
            let bytes = codec.encode_event(&event).map_err(crate::Error::Encode)?;
            let decoded = codec.decode_event(&bytes).map_err(crate::Error::Decode)?;
            assert_eq!(event, decoded, "{encoding} round trip");
        }

        Ok(())
    }

    #[test]
    fn encoding_tag_round_trip() -> crate::Result<()> {
        for encoding in [Encoding::Json, Encoding::Protobuf] {
            let bytes = encoding.encode_into_vec();
            assert_eq!(1, bytes.len());

            let mut cursor = std::io::Cursor::new(bytes);
            assert_eq!(encoding, Encoding::decode_from(&mut cursor)?);
        }

        Ok(())
    }

    #[test]
    fn codec_rejects_garbage() {
        for encoding in [Encoding::Json, Encoding::Protobuf] {
            assert!(encoding.codec().decode_event(&[0xFF, 0x00, 0x13]).is_err());
        }
    }
}
