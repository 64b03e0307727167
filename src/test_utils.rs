//! Frame fixtures for unit tests and benches
//!
//! Builders that produce correctly checksummed frames for each protocol, plus a
//! representative field table.

#![cfg(any(test, feature = "benchmark"))]

use crate::checksum::{self, ChecksumKind};
use crate::protocol::{ChecksumSpec, CustomConfig, Marker, ProtocolConfig};
use crate::types::{ByteOrder, FieldDescriptor, FieldTable, FieldType};

/// Start and end markers used by [`custom_frame`].
pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;

/// `payload` followed by its little-endian CRC16-Modbus.
pub fn modbus_rtu_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = payload.to_vec();
    let crc = ChecksumKind::Crc16Modbus.compute(payload) as u16;
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// `:` + uppercase hex of `payload` and its LRC + CR LF.
pub fn modbus_ascii_frame(payload: &[u8]) -> Vec<u8> {
    let mut body = payload.to_vec();
    body.push(checksum::lrc(payload));
    let mut frame = vec![b':'];
    frame.extend_from_slice(hex::encode_upper(body).as_bytes());
    frame.extend_from_slice(b"\r\n");
    frame
}

/// `$` + `body` + `*` + XOR checksum + CR LF.
pub fn nmea_sentence(body: &str) -> Vec<u8> {
    let xor = ChecksumKind::Xor.compute(body.as_bytes()) as u8;
    format!("${body}*{xor:02X}\r\n").into_bytes()
}

/// Configuration matching [`custom_frame`]: ETX-terminated, CRC16-Modbus over the payload.
pub fn custom_config(payload_len: u16) -> ProtocolConfig {
    ProtocolConfig::Custom(CustomConfig {
        stx: Some(Marker(u16::from(STX))),
        etx: Some(Marker(u16::from(ETX))),
        checksum: ChecksumSpec {
            kind: ChecksumKind::Crc16Modbus,
            start: 1,
            end: 1 + payload_len,
            offset: 1 + payload_len,
        },
        ..Default::default()
    })
}

/// `STX payload CRC16(LE) ETX`.
pub fn custom_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = vec![STX];
    frame.extend_from_slice(payload);
    let crc = ChecksumKind::Crc16Modbus.compute(payload) as u16;
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.push(ETX);
    frame
}

/// Sensor payload layout used across tests and benches:
///
/// | offset | field       | type                 |
/// |--------|-------------|----------------------|
/// | 0      | temperature | i16 LE, scale 0.1    |
/// | 2      | pressure    | u32 BE               |
/// | 6      | humidity    | f32 LE               |
/// | 10     | alarm       | bool, bit 2          |
/// | 11     | serial      | BCD, 4 bytes         |
/// | 15     | tag         | string, 4 bytes      |
pub fn sensor_table(data_offset: u8) -> FieldTable {
    let built = FieldTable::builder()
        .data_offset(data_offset)
        .field("temperature", FieldDescriptor::new(FieldType::I16, 0).with_scaling(100, 0))
        .field("pressure", FieldDescriptor::new(FieldType::U32, 2).with_byte_order(ByteOrder::Big))
        .field("humidity", FieldDescriptor::new(FieldType::F32, 6))
        .field("alarm", FieldDescriptor::new(FieldType::Bool, 10).with_bit_offset(2))
        .field("serial", FieldDescriptor::new(FieldType::Bcd, 11).with_bit_length(32))
        .field("tag", FieldDescriptor::new(FieldType::String, 15).with_bit_length(32))
        .build();
    match built {
        Ok(table) => table,
        Err(e) => panic!("sensor table fixture is invalid: {e}"),
    }
}

/// A payload matching [`sensor_table`]: 21.5 C, 101325 Pa, 45.5 %, alarm set,
/// serial 12345678, tag "AB01".
pub fn sensor_payload() -> Vec<u8> {
    let mut payload = Vec::with_capacity(19);
    payload.extend_from_slice(&215i16.to_le_bytes());
    payload.extend_from_slice(&101_325u32.to_be_bytes());
    payload.extend_from_slice(&45.5f32.to_le_bytes());
    payload.push(0b0000_0100);
    payload.extend_from_slice(&[0x12, 0x34, 0x56, 0x78]);
    payload.extend_from_slice(b"AB01");
    payload
}
