//! Field extraction.
//!
//! Applies a [`FieldTable`] to a raw frame and produces one [`ParsedField`] per
//! descriptor, in table order. Descriptor offsets are relative to the table's
//! `data_offset`. A field that does not fit the payload is reported as
//! [`FieldStatus::OutOfRange`] with a zero value; it never aborts the remaining fields.

use tracing::{trace, warn};

use crate::types::{
    FieldDescriptor, FieldStatus, FieldTable, FieldType, MAX_FIELDS, ParsedField, RawDecode, Value,
};
use crate::{GatewayError, Result};

/// Longest string field, in bytes.
pub const MAX_STRING_LEN: usize = 63;

/// Longest hex-string field, in source bytes.
pub const MAX_HEX_BYTES: usize = 31;

/// Extract every field of `table` from `raw`.
pub fn extract(raw: &[u8], table: &FieldTable) -> Result<Vec<ParsedField>> {
    extract_with_capacity(raw, table, MAX_FIELDS)
}

/// Extract at most `capacity` fields of `table` from `raw`.
///
/// Fails when `capacity` is zero, when the table is empty, or when `data_offset` leaves no
/// payload.
pub fn extract_with_capacity(
    raw: &[u8],
    table: &FieldTable,
    capacity: usize,
) -> Result<Vec<ParsedField>> {
    if capacity == 0 {
        return Err(GatewayError::invalid_argument("output capacity must be non-zero"));
    }
    if table.is_empty() {
        return Err(GatewayError::EmptyFieldTable);
    }

    let data_offset = usize::from(table.data_offset());
    let payload = match raw.get(data_offset..) {
        Some(payload) if !payload.is_empty() => payload,
        _ => {
            return Err(GatewayError::DataOffsetBeyondFrame { data_offset, frame_len: raw.len() });
        }
    };

    let fields = table
        .fields()
        .iter()
        .take(capacity)
        .enumerate()
        .map(|(index, descriptor)| {
            let field = decode_field(payload, descriptor, table.field_name(index));
            trace!(
                index,
                name = %field.name,
                scaled = field.scaled_value,
                status = ?field.status,
                "Field decoded"
            );
            field
        })
        .collect();

    Ok(fields)
}

fn decode_field(payload: &[u8], descriptor: &FieldDescriptor, name: String) -> ParsedField {
    let field_type = descriptor.field_type;
    let (value, status) = match decode_value(payload, descriptor) {
        Some(value) => {
            let status = if matches!(value, Value::Unsupported) {
                FieldStatus::UnknownType
            } else {
                FieldStatus::Decoded
            };
            (value, status)
        }
        None => {
            warn!(
                field = %name,
                offset = descriptor.start_offset,
                payload_len = payload.len(),
                "Field offset out of bounds"
            );
            (Value::zero(field_type), FieldStatus::OutOfRange)
        }
    };

    let scaled_value = match status {
        FieldStatus::OutOfRange => 0.0,
        _ if !field_type.is_scaled() => 0.0,
        _ => descriptor.apply_scale(value.as_f64()),
    };

    ParsedField { name, field_type, value, scaled_value, status }
}

fn read<T: RawDecode>(payload: &[u8], descriptor: &FieldDescriptor) -> Option<T> {
    T::read(payload, usize::from(descriptor.start_offset), descriptor.byte_order)
}

/// `None` when the field starts (or, for fixed-width types, ends) beyond the payload.
fn decode_value(payload: &[u8], descriptor: &FieldDescriptor) -> Option<Value> {
    let start = usize::from(descriptor.start_offset);
    let first = *payload.get(start)?;
    let available = &payload[start..];

    let value = match descriptor.field_type {
        FieldType::Bool => {
            let bit = first.checked_shr(u32::from(descriptor.bit_offset)).unwrap_or(0) & 0x01;
            Value::Bool(bit == 1)
        }
        FieldType::U8 => Value::U8(first),
        FieldType::I8 => Value::I8(first as i8),
        FieldType::U16 => Value::U16(read(payload, descriptor)?),
        FieldType::I16 => Value::I16(read(payload, descriptor)?),
        FieldType::U32 => Value::U32(read(payload, descriptor)?),
        FieldType::I32 => Value::I32(read(payload, descriptor)?),
        FieldType::U64 => Value::U64(read(payload, descriptor)?),
        FieldType::I64 => Value::I64(read(payload, descriptor)?),
        FieldType::F32 => Value::F32(read(payload, descriptor)?),
        FieldType::F64 => Value::F64(read(payload, descriptor)?),
        FieldType::Timestamp32 => Value::Timestamp(read(payload, descriptor)?),
        FieldType::TimestampMs64 => Value::TimestampMs(read(payload, descriptor)?),
        FieldType::Bcd => {
            let byte_len = usize::from(descriptor.bit_length).div_ceil(8);
            let digits = available.iter().take(byte_len).fold(0u64, |acc, byte| {
                acc.wrapping_mul(100).wrapping_add(u64::from((byte >> 4) * 10 + (byte & 0x0F)))
            });
            Value::Bcd(digits)
        }
        FieldType::String => {
            let len = (usize::from(descriptor.bit_length) / 8).min(MAX_STRING_LEN);
            let bytes = &available[..len.min(available.len())];
            let text = bytes.split(|b| *b == 0).next().unwrap_or_default();
            Value::Text(String::from_utf8_lossy(text).into_owned())
        }
        FieldType::HexString => {
            let len = (usize::from(descriptor.bit_length) / 8).min(MAX_HEX_BYTES);
            Value::Hex(hex::encode_upper(&available[..len.min(available.len())]))
        }
        FieldType::Unknown(code) => {
            warn!("Unknown field type {code:#04x}");
            Value::Unsupported
        }
    };

    Some(value)
}
