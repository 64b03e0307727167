//! Endian-aware decoding of fixed-width values from frame payloads

use super::ByteOrder;

/// Accumulate `bytes` into an unsigned integer in the given byte order.
///
/// At most eight bytes are meaningful; callers pass exactly the field width.
pub fn accumulate(bytes: &[u8], order: ByteOrder) -> u64 {
    match order {
        ByteOrder::Big => bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)),
        ByteOrder::Little => {
            bytes.iter().rev().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
        }
    }
}

/// Types that can be read from a payload at a byte offset.
///
/// Reads are bounds-checked: a value that does not fit entirely inside `data` yields `None`.
pub trait RawDecode: Sized {
    /// Width of the encoded value in bytes.
    const WIDTH: usize;

    /// Build the value from its accumulated bit pattern.
    fn from_raw(raw: u64) -> Self;

    /// Read the value at `offset` in `data`.
    fn read(data: &[u8], offset: usize, order: ByteOrder) -> Option<Self> {
        let bytes = data.get(offset..offset.checked_add(Self::WIDTH)?)?;
        Some(Self::from_raw(accumulate(bytes, order)))
    }
}

impl RawDecode for u8 {
    const WIDTH: usize = 1;
    fn from_raw(raw: u64) -> Self {
        raw as u8
    }
}

impl RawDecode for i8 {
    const WIDTH: usize = 1;
    fn from_raw(raw: u64) -> Self {
        raw as u8 as i8
    }
}

impl RawDecode for u16 {
    const WIDTH: usize = 2;
    fn from_raw(raw: u64) -> Self {
        raw as u16
    }
}

impl RawDecode for i16 {
    const WIDTH: usize = 2;
    fn from_raw(raw: u64) -> Self {
        raw as u16 as i16
    }
}

impl RawDecode for u32 {
    const WIDTH: usize = 4;
    fn from_raw(raw: u64) -> Self {
        raw as u32
    }
}

impl RawDecode for i32 {
    const WIDTH: usize = 4;
    fn from_raw(raw: u64) -> Self {
        raw as u32 as i32
    }
}

impl RawDecode for u64 {
    const WIDTH: usize = 8;
    fn from_raw(raw: u64) -> Self {
        raw
    }
}

impl RawDecode for i64 {
    const WIDTH: usize = 8;
    fn from_raw(raw: u64) -> Self {
        raw as i64
    }
}

impl RawDecode for f32 {
    const WIDTH: usize = 4;
    fn from_raw(raw: u64) -> Self {
        f32::from_bits(raw as u32)
    }
}

impl RawDecode for f64 {
    const WIDTH: usize = 8;
    fn from_raw(raw: u64) -> Self {
        f64::from_bits(raw)
    }
}
