//! Core types for field maps and extracted frames.
//!
//! ## Architecture
//!
//! - [`FieldDescriptor`] is the 12-byte record locating one field inside a payload
//! - [`FieldTable`] holds up to [`MAX_FIELDS`] descriptors, the shared [`NameArena`]
//!   and the payload `data_offset`
//! - [`FieldType`] maps wire type codes, [`Value`] holds a decoded value
//! - [`RawDecode`] reads fixed-width values with explicit byte accumulation
//! - [`FramePacket`] carries a verified frame from ingestion to extraction and
//!   [`ExtractedFrame`] carries the result to the sink
//!
//! ## Usage Example
//!
//! ```rust
//! use serialgate::types::{ByteOrder, FieldDescriptor, FieldTable, FieldType};
//!
//! let table = FieldTable::builder()
//!     .data_offset(3)
//!     .field(
//!         "temperature",
//!         FieldDescriptor::new(FieldType::F32, 0).with_byte_order(ByteOrder::Big),
//!     )
//!     .field("pressure", FieldDescriptor::new(FieldType::U16, 4).with_scaling(100, 0))
//!     .build()
//!     .unwrap();
//!
//! let blob = table.encode();
//! assert_eq!(FieldTable::decode(&blob).unwrap(), table);
//! assert_eq!(table.field_name(1), "pressure");
//! ```

mod descriptor;
mod field_type;
mod frame;
mod raw_value;
mod update_rate;

pub use descriptor::{
    ByteOrder, FieldDescriptor, FieldTable, FieldTableBuilder, MAX_FIELDS, MAX_NAME_LEN,
    MAX_NAMES_SIZE, NameArena,
};
pub use field_type::{FieldType, Value};
pub use frame::{ExtractedFrame, FieldStatus, FrameMetadata, FramePacket, ParsedField};
pub use raw_value::{RawDecode, accumulate};
pub use update_rate::UpdateRate;

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn arb_field_type() -> impl Strategy<Value = FieldType> {
        any::<u8>().prop_map(FieldType::from_code)
    }

    prop_compose! {
        fn arb_descriptor()(
            field_type in arb_field_type(),
            big_endian in any::<bool>(),
            start_offset in any::<u8>(),
            bit_offset in 0u8..8,
            bit_length in any::<u8>(),
            scale_factor in any::<u16>(),
            offset_value in any::<i16>(),
            name_length in any::<u8>(),
            name_index in any::<u16>()
        ) -> FieldDescriptor {
            FieldDescriptor {
                field_type,
                byte_order: if big_endian { ByteOrder::Big } else { ByteOrder::Little },
                start_offset,
                bit_offset,
                bit_length,
                scale_factor,
                offset_value,
                name_length,
                name_index,
            }
        }
    }

    proptest! {
        #[test]
        fn prop_type_codes_are_preserved(code in any::<u8>()) {
            prop_assert_eq!(FieldType::from_code(code).code(), code);
        }

        #[test]
        fn prop_descriptor_records_are_stable(descriptor in arb_descriptor()) {
            let record = descriptor.encode();
            prop_assert_eq!(record.len(), FieldDescriptor::WIRE_SIZE);
            prop_assert_eq!(FieldDescriptor::decode(&record), descriptor);
        }

        #[test]
        fn prop_table_decode_never_panics(blob in prop::collection::vec(any::<u8>(), 0..2048)) {
            match FieldTable::decode(&blob) {
                Ok(table) => {
                    prop_assert!(table.len() <= MAX_FIELDS);
                    prop_assert!(table.names().len() <= MAX_NAMES_SIZE);
                    for index in 0..table.len() {
                        prop_assert!(table.field_name(index).len() <= MAX_NAME_LEN * 3);
                    }
                }
                Err(e) => prop_assert!(!e.is_retryable()),
            }
        }

        #[test]
        fn prop_name_resolution_stays_in_bounds(
            names in prop::collection::vec(any::<u8>(), 0..1100),
            index in any::<u16>(),
            length in any::<u8>()
        ) {
            let arena = NameArena::from_bytes(&names);
            match arena.resolve(index, length) {
                Some(name) => {
                    prop_assert!(usize::from(index) < arena.len() && !name.contains('\0'))
                }
                None => prop_assert!(usize::from(index) >= arena.len()),
            }
        }

        #[test]
        fn prop_zero_values_match_their_type(field_type in arb_field_type()) {
            let zero = Value::zero(field_type);
            prop_assert_eq!(zero.as_f64(), 0.0);
            let unknown = matches!(field_type, FieldType::Unknown(_));
            prop_assert_eq!(matches!(zero, Value::Unsupported), unknown);
        }
    }
}
