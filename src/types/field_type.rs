//! Field data type definitions

use serde::{Deserialize, Serialize};

/// Wire data type of a field descriptor.
///
/// Codes that are not recognised are preserved as [`FieldType::Unknown`]; such fields are
/// still emitted by extraction, with a zero value and a logged anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Single bit at `bit_offset` (code 0x00)
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    /// IEEE-754 single precision (code 0x10)
    F32,
    /// IEEE-754 double precision (code 0x11)
    F64,
    /// Packed BCD, two digits per byte, `bit_length` wide (code 0x20)
    Bcd,
    /// Raw text, `bit_length / 8` bytes (code 0x30)
    String,
    /// Bytes rendered as uppercase hex, `bit_length / 8` bytes (code 0x31)
    HexString,
    /// Seconds since the epoch, 32 bits (code 0x40)
    Timestamp32,
    /// Milliseconds since the epoch, 64 bits (code 0x41)
    TimestampMs64,
    /// Unrecognised wire code
    Unknown(u8),
}

impl FieldType {
    /// Map a wire code to its type. Never fails; unrecognised codes become `Unknown`.
    pub const fn from_code(code: u8) -> Self {
        match code {
            0x00 => FieldType::Bool,
            0x01 => FieldType::U8,
            0x02 => FieldType::I8,
            0x03 => FieldType::U16,
            0x04 => FieldType::I16,
            0x05 => FieldType::U32,
            0x06 => FieldType::I32,
            0x07 => FieldType::U64,
            0x08 => FieldType::I64,
            0x10 => FieldType::F32,
            0x11 => FieldType::F64,
            0x20 => FieldType::Bcd,
            0x30 => FieldType::String,
            0x31 => FieldType::HexString,
            0x40 => FieldType::Timestamp32,
            0x41 => FieldType::TimestampMs64,
            other => FieldType::Unknown(other),
        }
    }

    /// Wire code of this type.
    pub const fn code(self) -> u8 {
        match self {
            FieldType::Bool => 0x00,
            FieldType::U8 => 0x01,
            FieldType::I8 => 0x02,
            FieldType::U16 => 0x03,
            FieldType::I16 => 0x04,
            FieldType::U32 => 0x05,
            FieldType::I32 => 0x06,
            FieldType::U64 => 0x07,
            FieldType::I64 => 0x08,
            FieldType::F32 => 0x10,
            FieldType::F64 => 0x11,
            FieldType::Bcd => 0x20,
            FieldType::String => 0x30,
            FieldType::HexString => 0x31,
            FieldType::Timestamp32 => 0x40,
            FieldType::TimestampMs64 => 0x41,
            FieldType::Unknown(code) => code,
        }
    }

    /// Whether the scale/offset transform applies to this type.
    pub const fn is_scaled(self) -> bool {
        !matches!(self, FieldType::String | FieldType::HexString)
    }
}

/// Decoded value of one field, tagged by its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Bcd(u64),
    Text(String),
    Hex(String),
    Timestamp(u32),
    TimestampMs(u64),
    /// The descriptor carried a type code this gateway does not know.
    Unsupported,
}

impl Value {
    /// Zero value of the variant matching `field_type`.
    pub fn zero(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Bool => Value::Bool(false),
            FieldType::U8 => Value::U8(0),
            FieldType::I8 => Value::I8(0),
            FieldType::U16 => Value::U16(0),
            FieldType::I16 => Value::I16(0),
            FieldType::U32 => Value::U32(0),
            FieldType::I32 => Value::I32(0),
            FieldType::U64 => Value::U64(0),
            FieldType::I64 => Value::I64(0),
            FieldType::F32 => Value::F32(0.0),
            FieldType::F64 => Value::F64(0.0),
            FieldType::Bcd => Value::Bcd(0),
            FieldType::String => Value::Text(String::new()),
            FieldType::HexString => Value::Hex(String::new()),
            FieldType::Timestamp32 => Value::Timestamp(0),
            FieldType::TimestampMs64 => Value::TimestampMs(0),
            FieldType::Unknown(_) => Value::Unsupported,
        }
    }

    /// Numeric raw value fed into scaling. Text values and unsupported values yield 0.
    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::U8(v) => f64::from(*v),
            Value::I8(v) => f64::from(*v),
            Value::U16(v) => f64::from(*v),
            Value::I16(v) => f64::from(*v),
            Value::U32(v) => f64::from(*v),
            Value::I32(v) => f64::from(*v),
            Value::U64(v) => *v as f64,
            Value::I64(v) => *v as f64,
            Value::F32(v) => f64::from(*v),
            Value::F64(v) => *v,
            Value::Bcd(v) => *v as f64,
            Value::Timestamp(v) => f64::from(*v),
            Value::TimestampMs(v) => *v as f64,
            Value::Text(_) | Value::Hex(_) | Value::Unsupported => 0.0,
        }
    }

    /// Borrow the textual content of string and hex-string values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Hex(s) => Some(s),
            _ => None,
        }
    }
}
