//! Field descriptors, the shared name arena and the field table

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::FieldType;
use crate::{GatewayError, Result};

/// Maximum number of descriptors in a table.
pub const MAX_FIELDS: usize = 64;

/// Maximum size of the shared name arena in bytes.
pub const MAX_NAMES_SIZE: usize = 1024;

/// Maximum length of a resolved field name in bytes.
pub const MAX_NAME_LEN: usize = 31;

/// Byte order of a multi-byte field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Wire code: 0 is little-endian, anything else big-endian.
    pub const fn from_code(code: u8) -> Self {
        if code == 0 { ByteOrder::Little } else { ByteOrder::Big }
    }

    pub const fn code(self) -> u8 {
        match self {
            ByteOrder::Little => 0,
            ByteOrder::Big => 1,
        }
    }
}

/// Location, type and scaling of one field inside a frame payload.
///
/// Offsets are relative to the table's `data_offset`. Whether the field fits the payload
/// is only known at extraction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub field_type: FieldType,
    pub byte_order: ByteOrder,
    pub start_offset: u8,
    /// Bit within the byte at `start_offset`, used by `Bool` fields.
    pub bit_offset: u8,
    /// Sizes BCD, string and hex-string fields.
    pub bit_length: u8,
    /// Fixed point, real value = stored / 1000. Zero means no scaling.
    pub scale_factor: u16,
    /// Fixed point, real value = stored / 100.
    pub offset_value: i16,
    pub name_length: u8,
    pub name_index: u16,
}

impl FieldDescriptor {
    /// Size of the packed wire record.
    pub const WIRE_SIZE: usize = 12;

    /// Unscaled little-endian descriptor of `field_type` at `start_offset`.
    pub const fn new(field_type: FieldType, start_offset: u8) -> Self {
        Self {
            field_type,
            byte_order: ByteOrder::Little,
            start_offset,
            bit_offset: 0,
            bit_length: 0,
            scale_factor: 0,
            offset_value: 0,
            name_length: 0,
            name_index: 0,
        }
    }

    pub const fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub const fn with_bit_offset(mut self, bit_offset: u8) -> Self {
        self.bit_offset = bit_offset;
        self
    }

    pub const fn with_bit_length(mut self, bit_length: u8) -> Self {
        self.bit_length = bit_length;
        self
    }

    /// Set the fixed-point scale (thousandths) and offset (hundredths).
    pub const fn with_scaling(mut self, scale_factor: u16, offset_value: i16) -> Self {
        self.scale_factor = scale_factor;
        self.offset_value = offset_value;
        self
    }

    /// Real multiplier; a stored zero behaves as 1.0.
    pub fn scale(&self) -> f64 {
        if self.scale_factor == 0 { 1.0 } else { f64::from(self.scale_factor) / 1000.0 }
    }

    /// Real additive offset.
    pub fn offset(&self) -> f64 {
        f64::from(self.offset_value) / 100.0
    }

    /// `raw * scale + offset`
    pub fn apply_scale(&self, raw: f64) -> f64 {
        raw * self.scale() + self.offset()
    }

    /// Decode a packed little-endian record.
    pub fn decode(record: &[u8; Self::WIRE_SIZE]) -> Self {
        Self {
            field_type: FieldType::from_code(record[0]),
            byte_order: ByteOrder::from_code(record[1]),
            start_offset: record[2],
            bit_offset: record[3],
            bit_length: record[4],
            scale_factor: u16::from_le_bytes([record[5], record[6]]),
            offset_value: i16::from_le_bytes([record[7], record[8]]),
            name_length: record[9],
            name_index: u16::from_le_bytes([record[10], record[11]]),
        }
    }

    /// Encode as a packed little-endian record.
    pub fn encode(&self) -> [u8; Self::WIRE_SIZE] {
        let scale = self.scale_factor.to_le_bytes();
        let offset = self.offset_value.to_le_bytes();
        let name_index = self.name_index.to_le_bytes();
        [
            self.field_type.code(),
            self.byte_order.code(),
            self.start_offset,
            self.bit_offset,
            self.bit_length,
            scale[0],
            scale[1],
            offset[0],
            offset[1],
            self.name_length,
            name_index[0],
            name_index[1],
        ]
    }
}

/// Flat byte buffer holding every field name of a table.
///
/// Names are addressed by offset and length and resolved with bounds-checked slicing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameArena {
    bytes: Vec<u8>,
}

impl NameArena {
    /// Wrap raw name bytes, truncating to [`MAX_NAMES_SIZE`].
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let kept = bytes.len().min(MAX_NAMES_SIZE);
        if kept < bytes.len() {
            warn!(len = bytes.len(), max = MAX_NAMES_SIZE, "Field name arena truncated");
        }
        Self { bytes: bytes[..kept].to_vec() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Resolve the name at `index`.
    ///
    /// Reads `length` bytes (or up to the first NUL when `length` is 0), clamped to the
    /// arena, stopping at NUL and capped at [`MAX_NAME_LEN`]. Returns `None` when `index`
    /// lies outside the arena.
    pub fn resolve(&self, index: u16, length: u8) -> Option<String> {
        let start = usize::from(index);
        let tail = self.bytes.get(start..)?;
        if tail.is_empty() {
            return None;
        }
        let wanted = if length == 0 { tail.len() } else { usize::from(length).min(tail.len()) };
        let window = &tail[..wanted];
        let end = window.iter().position(|b| *b == 0).unwrap_or(window.len()).min(MAX_NAME_LEN);
        Some(String::from_utf8_lossy(&window[..end]).into_owned())
    }

    /// Append a NUL-terminated name and return its index and length.
    fn push(&mut self, name: &str) -> Result<(u16, u8)> {
        let bytes = name.as_bytes();
        if bytes.len() > MAX_NAME_LEN {
            return Err(GatewayError::config(
                "field table",
                format!("field name '{name}' exceeds {MAX_NAME_LEN} bytes"),
            ));
        }
        if self.bytes.len() + bytes.len() + 1 > MAX_NAMES_SIZE {
            return Err(GatewayError::config(
                "field table",
                format!("field names exceed {MAX_NAMES_SIZE} bytes"),
            ));
        }
        let index = self.bytes.len() as u16;
        self.bytes.extend_from_slice(bytes);
        self.bytes.push(0);
        Ok((index, bytes.len() as u8))
    }
}

/// Ordered descriptors, their names and the payload start offset.
///
/// A table is built or decoded whole and never mutated afterwards; replacing the active
/// table swaps the entire value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTable {
    fields: Vec<FieldDescriptor>,
    names: NameArena,
    data_offset: u8,
}

impl FieldTable {
    pub fn builder() -> FieldTableBuilder {
        FieldTableBuilder::default()
    }

    /// Assemble a table from parts. Fails when more than [`MAX_FIELDS`] descriptors are given.
    pub fn from_parts(
        fields: Vec<FieldDescriptor>,
        names: NameArena,
        data_offset: u8,
    ) -> Result<Self> {
        if fields.len() > MAX_FIELDS {
            return Err(GatewayError::TooManyFields { count: fields.len(), max: MAX_FIELDS });
        }
        Ok(Self { fields, names, data_offset })
    }

    /// Decode the packed definition blob:
    /// `[count][data_offset][count x 12-byte descriptors][name bytes]`.
    ///
    /// A blob cut short inside the descriptor block keeps the descriptors that are fully
    /// present.
    pub fn decode(blob: &[u8]) -> Result<Self> {
        let (&count, rest) = blob.split_first().ok_or_else(|| GatewayError::Parse {
            context: "field table".to_string(),
            details: "definition blob is empty".to_string(),
        })?;
        let (&data_offset, rest) = rest.split_first().ok_or_else(|| GatewayError::Parse {
            context: "field table".to_string(),
            details: "definition blob has no data offset".to_string(),
        })?;

        let count = usize::from(count);
        if count > MAX_FIELDS {
            return Err(GatewayError::TooManyFields { count, max: MAX_FIELDS });
        }

        let records = rest.chunks_exact(FieldDescriptor::WIRE_SIZE);
        let fields: Vec<FieldDescriptor> = records
            .take(count)
            .filter_map(|chunk| <&[u8; FieldDescriptor::WIRE_SIZE]>::try_from(chunk).ok())
            .map(FieldDescriptor::decode)
            .collect();
        if fields.len() < count {
            warn!(
                declared = count,
                present = fields.len(),
                "Field definition blob truncated; keeping complete descriptors"
            );
        }

        let names_start = (count * FieldDescriptor::WIRE_SIZE).min(rest.len());
        let names = NameArena::from_bytes(&rest[names_start..]);

        debug!(fields = fields.len(), data_offset, names = names.len(), "Field table decoded");
        Ok(Self { fields, names, data_offset })
    }

    /// Encode as a packed definition blob.
    pub fn encode(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(
            2 + self.fields.len() * FieldDescriptor::WIRE_SIZE + self.names.len(),
        );
        blob.push(self.fields.len() as u8);
        blob.push(self.data_offset);
        for field in &self.fields {
            blob.extend_from_slice(&field.encode());
        }
        blob.extend_from_slice(self.names.as_bytes());
        blob
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn names(&self) -> &NameArena {
        &self.names
    }

    pub fn data_offset(&self) -> u8 {
        self.data_offset
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Name of field `index`, or `Field{index}` when its name index is outside the arena.
    pub fn field_name(&self, index: usize) -> String {
        self.fields
            .get(index)
            .and_then(|field| self.names.resolve(field.name_index, field.name_length))
            .unwrap_or_else(|| format!("Field{index}"))
    }
}

/// Incremental construction of a [`FieldTable`].
#[derive(Debug, Default)]
pub struct FieldTableBuilder {
    fields: Vec<FieldDescriptor>,
    names: NameArena,
    data_offset: u8,
    error: Option<GatewayError>,
}

impl FieldTableBuilder {
    pub fn data_offset(mut self, data_offset: u8) -> Self {
        self.data_offset = data_offset;
        self
    }

    /// Append a named field. The descriptor's name index and length are overwritten.
    pub fn field(mut self, name: &str, mut descriptor: FieldDescriptor) -> Self {
        if self.error.is_some() {
            return self;
        }
        match self.names.push(name) {
            Ok((index, length)) => {
                descriptor.name_index = index;
                descriptor.name_length = length;
                self.fields.push(descriptor);
            }
            Err(e) => self.error = Some(e),
        }
        self
    }

    pub fn build(self) -> Result<FieldTable> {
        if let Some(e) = self.error {
            return Err(e);
        }
        FieldTable::from_parts(self.fields, self.names, self.data_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_wire_layout_is_little_endian() {
        let descriptor = FieldDescriptor {
            field_type: FieldType::F32,
            byte_order: ByteOrder::Big,
            start_offset: 3,
            bit_offset: 1,
            bit_length: 32,
            scale_factor: 0x1234,
            offset_value: -2,
            name_length: 5,
            name_index: 0x0102,
        };
        let record = descriptor.encode();
        assert_eq!(record, [0x10, 1, 3, 1, 32, 0x34, 0x12, 0xFE, 0xFF, 5, 0x02, 0x01]);
        assert_eq!(FieldDescriptor::decode(&record), descriptor);
    }

    #[test]
    fn zero_scale_factor_passes_values_through() {
        let descriptor = FieldDescriptor::new(FieldType::U16, 0);
        assert_eq!(descriptor.apply_scale(42.0), 42.0);

        let scaled = FieldDescriptor::new(FieldType::U16, 0).with_scaling(500, -150);
        assert!((scaled.apply_scale(10.0) - 3.5).abs() < 1e-9);
    }

    #[test]
    fn names_resolve_with_bounds_checks() {
        let arena = NameArena::from_bytes(b"temp\0pressure\0");
        assert_eq!(arena.resolve(0, 4).as_deref(), Some("temp"));
        assert_eq!(arena.resolve(5, 0).as_deref(), Some("pressure"));
        assert_eq!(arena.resolve(5, 3).as_deref(), Some("pre"));
        // length running past the arena is clamped
        assert_eq!(arena.resolve(5, 200).as_deref(), Some("pressure"));
        assert_eq!(arena.resolve(14, 1), None);
        assert_eq!(arena.resolve(u16::MAX, 1), None);
    }

    #[test]
    fn long_names_are_capped() {
        let arena = NameArena::from_bytes(&[b'a'; 60]);
        assert_eq!(arena.resolve(0, 0).map(|n| n.len()), Some(MAX_NAME_LEN));
    }

    #[test]
    fn arena_is_truncated_to_maximum() {
        let arena = NameArena::from_bytes(&[b'x'; MAX_NAMES_SIZE + 10]);
        assert_eq!(arena.len(), MAX_NAMES_SIZE);
    }

    #[test]
    fn builder_assigns_name_slots() {
        let table = FieldTable::builder()
            .data_offset(3)
            .field("temperature", FieldDescriptor::new(FieldType::I16, 0))
            .field("humidity", FieldDescriptor::new(FieldType::U16, 2))
            .build()
            .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.data_offset(), 3);
        assert_eq!(table.field_name(0), "temperature");
        assert_eq!(table.field_name(1), "humidity");
        assert_eq!(table.fields()[1].name_index, 12);
        assert_eq!(table.field_name(7), "Field7");
    }

    #[test]
    fn builder_rejects_too_many_fields() {
        let builder = (0..=MAX_FIELDS).fold(FieldTable::builder(), |b, i| {
            b.field(&format!("f{i}"), FieldDescriptor::new(FieldType::U8, 0))
        });
        let err = builder.build().unwrap_err();
        assert!(matches!(err, GatewayError::TooManyFields { count: 65, max: 64 }));
    }

    #[test]
    fn builder_rejects_overlong_names() {
        let err = FieldTable::builder()
            .field(&"n".repeat(40), FieldDescriptor::new(FieldType::U8, 0))
            .build()
            .unwrap_err();
        assert!(matches!(err, GatewayError::Config { .. }));
    }

    #[test]
    fn blob_round_trips() {
        let table = FieldTable::builder()
            .data_offset(2)
            .field("level", FieldDescriptor::new(FieldType::U16, 0).with_byte_order(ByteOrder::Big))
            .field("alarm", FieldDescriptor::new(FieldType::Bool, 2).with_bit_offset(3))
            .build()
            .unwrap();

        let blob = table.encode();
        assert_eq!(blob[0], 2);
        assert_eq!(blob[1], 2);
        assert_eq!(FieldTable::decode(&blob).unwrap(), table);
    }

    #[test]
    fn truncated_blob_keeps_complete_descriptors() {
        let table = FieldTable::builder()
            .field("a", FieldDescriptor::new(FieldType::U8, 0))
            .field("b", FieldDescriptor::new(FieldType::U8, 1))
            .build()
            .unwrap();
        let blob = table.encode();
        // cut in the middle of the second descriptor
        let truncated = &blob[..2 + FieldDescriptor::WIRE_SIZE + 5];

        let decoded = FieldTable::decode(truncated).unwrap();
        assert_eq!(decoded.len(), 1);
        assert!(decoded.names().is_empty());
        assert_eq!(decoded.field_name(0), "Field0");
    }

    #[test]
    fn blob_with_too_many_fields_is_rejected() {
        let err = FieldTable::decode(&[65, 0]).unwrap_err();
        assert!(matches!(err, GatewayError::TooManyFields { count: 65, .. }));
        assert!(matches!(FieldTable::decode(&[]), Err(GatewayError::Parse { .. })));
        assert!(matches!(FieldTable::decode(&[1]), Err(GatewayError::Parse { .. })));
    }

    #[test]
    fn unknown_type_codes_survive_decoding() {
        let mut record = FieldDescriptor::new(FieldType::U8, 0).encode();
        record[0] = 0x99;
        assert_eq!(FieldDescriptor::decode(&record).field_type, FieldType::Unknown(0x99));
    }
}
