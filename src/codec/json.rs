// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::Codec;
use crate::{
    coding::{DecodeError, EncodeError},
    event::Event,
};

/// JSON event records
#[derive(Copy, Clone, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode_event(&self, event: &Event) -> Result<Vec<u8>, EncodeError> {
        serde_json::to_vec(event).map_err(EncodeError::Json)
    }

    fn decode_event(&self, bytes: &[u8]) -> Result<Event, DecodeError> {
        serde_json::from_slice(bytes).map_err(DecodeError::Json)
    }
}
