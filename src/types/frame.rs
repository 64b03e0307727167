//! Frame packet and extraction result types

use std::sync::Arc;

use serde::Serialize;

use super::{FieldType, Value};
use crate::protocol::ProtocolKind;

/// A verified frame travelling from ingestion to extraction.
#[derive(Debug, Clone)]
pub struct FramePacket {
    /// Raw frame bytes (shared, never copied again downstream)
    pub data: Arc<[u8]>,

    /// True when a checksum was present and matched; false when checking was skipped
    pub checksum_verified: bool,

    /// Protocol in effect when the frame was assembled
    pub protocol: ProtocolKind,
}

impl FramePacket {
    pub fn new(data: Vec<u8>, checksum_verified: bool, protocol: ProtocolKind) -> Self {
        Self { data: data.into(), checksum_verified, protocol }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Outcome of decoding a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Decoded,
    /// The field does not fit the payload; its value is the zero default.
    OutOfRange,
    /// The descriptor names an unknown type; its value is [`Value::Unsupported`].
    UnknownType,
}

/// One decoded, scaled field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedField {
    pub name: String,
    pub field_type: FieldType,
    pub value: Value,
    /// `raw * scale + offset`; 0.0 for string and hex-string fields
    pub scaled_value: f64,
    pub status: FieldStatus,
}

/// Metadata attached to every published result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameMetadata {
    /// Increments once per successfully extracted frame, wrapping at `u32::MAX`
    pub sequence: u32,
    pub raw_length: usize,
    pub checksum_verified: bool,
    pub protocol: ProtocolKind,
}

/// A frame together with the fields extracted from it.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedFrame {
    pub metadata: FrameMetadata,
    #[serde(skip)]
    pub raw: Arc<[u8]>,
    pub fields: Vec<ParsedField>,
}

impl ExtractedFrame {
    /// First field with the given name.
    pub fn field(&self, name: &str) -> Option<&ParsedField> {
        self.fields.iter().find(|field| field.name == name)
    }
}
