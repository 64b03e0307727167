//! Checksum and CRC algorithms used to verify received frames.
//!
//! Every algorithm is bit-exact with the attached field equipment. The catalogued CRCs
//! come from the `crc` crate; CRC-8 with polynomial 0x8D is not in the catalogue and is
//! declared locally. All functions here are pure.
//!
//! | Kind          | Width | Definition                                      |
//! |---------------|-------|-------------------------------------------------|
//! | `None`        | 0     | never checked                                   |
//! | `Xor`         | 1     | running XOR (LRC)                               |
//! | `Sum8`        | 1     | additive sum mod 2^8                            |
//! | `Sum16`       | 2     | additive sum mod 2^16                           |
//! | `Crc8`        | 1     | poly 0x07, init 0x00, MSB-first                 |
//! | `Crc8Ccitt`   | 1     | poly 0x8D, init 0x00, MSB-first                 |
//! | `Crc16Ibm`    | 2     | poly 0x8005 reflected, init 0x0000              |
//! | `Crc16Ccitt`  | 2     | poly 0x1021, init 0xFFFF, MSB-first             |
//! | `Crc16Modbus` | 2     | poly 0x8005 reflected, init 0xFFFF              |
//! | `Crc16Xmodem` | 2     | poly 0x1021, init 0x0000, MSB-first             |
//! | `Crc32`       | 4     | poly 0x04C11DB7 reflected, init/xorout 0xFFFFFFFF |
//! | `Crc32c`      | 4     | poly 0x1EDC6F41 reflected, init/xorout 0xFFFFFFFF |

use crc::{
    Algorithm, CRC_8_SMBUS, CRC_16_ARC, CRC_16_IBM_3740, CRC_16_MODBUS, CRC_16_XMODEM,
    CRC_32_ISCSI, CRC_32_ISO_HDLC, Crc,
};
use serde::{Deserialize, Serialize};

use crate::{GatewayError, Result};

/// CRC-8 with polynomial 0x8D, no reflection, zero init and xorout.
pub const CRC_8_CCITT_8D: Algorithm<u8> = Algorithm {
    width: 8,
    poly: 0x8d,
    init: 0x00,
    refin: false,
    refout: false,
    xorout: 0x00,
    check: 0xd2,
    residue: 0x00,
};

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);
const CRC8_CCITT: Crc<u8> = Crc::<u8>::new(&CRC_8_CCITT_8D);
const CRC16_IBM: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);
const CRC16_CCITT: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);
const CRC16_MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);
const CRC16_XMODEM: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
const CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Checksum algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ChecksumKind {
    /// No checksum; frames always pass.
    #[default]
    None = 0x00,
    /// Running XOR of all bytes (LRC).
    Xor = 0x01,
    /// 8-bit additive sum.
    Sum8 = 0x02,
    /// 16-bit additive sum.
    Sum16 = 0x03,
    Crc8 = 0x10,
    Crc8Ccitt = 0x11,
    Crc16Ibm = 0x20,
    Crc16Ccitt = 0x21,
    Crc16Modbus = 0x22,
    Crc16Xmodem = 0x23,
    Crc32 = 0x30,
    Crc32c = 0x31,
}

impl ChecksumKind {
    /// Every supported kind, in wire-code order.
    pub const ALL: [ChecksumKind; 12] = [
        ChecksumKind::None,
        ChecksumKind::Xor,
        ChecksumKind::Sum8,
        ChecksumKind::Sum16,
        ChecksumKind::Crc8,
        ChecksumKind::Crc8Ccitt,
        ChecksumKind::Crc16Ibm,
        ChecksumKind::Crc16Ccitt,
        ChecksumKind::Crc16Modbus,
        ChecksumKind::Crc16Xmodem,
        ChecksumKind::Crc32,
        ChecksumKind::Crc32c,
    ];

    /// Width of the checksum field in bytes (0, 1, 2 or 4).
    pub const fn size(self) -> usize {
        match self {
            ChecksumKind::None => 0,
            ChecksumKind::Xor
            | ChecksumKind::Sum8
            | ChecksumKind::Crc8
            | ChecksumKind::Crc8Ccitt => 1,
            ChecksumKind::Sum16
            | ChecksumKind::Crc16Ibm
            | ChecksumKind::Crc16Ccitt
            | ChecksumKind::Crc16Modbus
            | ChecksumKind::Crc16Xmodem => 2,
            ChecksumKind::Crc32 | ChecksumKind::Crc32c => 4,
        }
    }

    /// Wire code of this kind.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Compute the checksum of `data`. The result is zero-extended to 32 bits.
    pub fn compute(self, data: &[u8]) -> u32 {
        match self {
            ChecksumKind::None => 0,
            ChecksumKind::Xor => u32::from(data.iter().fold(0u8, |acc, b| acc ^ b)),
            ChecksumKind::Sum8 => u32::from(data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))),
            ChecksumKind::Sum16 => u32::from(
                data.iter().fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b))),
            ),
            ChecksumKind::Crc8 => u32::from(CRC8.checksum(data)),
            ChecksumKind::Crc8Ccitt => u32::from(CRC8_CCITT.checksum(data)),
            ChecksumKind::Crc16Ibm => u32::from(CRC16_IBM.checksum(data)),
            ChecksumKind::Crc16Ccitt => u32::from(CRC16_CCITT.checksum(data)),
            ChecksumKind::Crc16Modbus => u32::from(CRC16_MODBUS.checksum(data)),
            ChecksumKind::Crc16Xmodem => u32::from(CRC16_XMODEM.checksum(data)),
            ChecksumKind::Crc32 => CRC32.checksum(data),
            ChecksumKind::Crc32c => CRC32C.checksum(data),
        }
    }

    /// Render `value` little-endian at this kind's width, as it appears in a frame.
    pub fn to_le_bytes(self, value: u32) -> Vec<u8> {
        value.to_le_bytes()[..self.size()].to_vec()
    }

    /// Read a little-endian checksum of this kind's width from `data` at `offset`.
    pub fn read_le(self, data: &[u8], offset: usize) -> Option<u32> {
        let bytes = data.get(offset..offset.checked_add(self.size())?)?;
        Some(bytes.iter().rev().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
    }
}

impl TryFrom<u8> for ChecksumKind {
    type Error = GatewayError;

    fn try_from(code: u8) -> Result<Self> {
        ChecksumKind::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or(GatewayError::UnknownCode { what: "checksum kind", code })
    }
}

/// Compute the checksum of `data` with the selected algorithm.
pub fn compute(kind: ChecksumKind, data: &[u8]) -> u32 {
    kind.compute(data)
}

/// Width in bytes of the selected algorithm's checksum field.
pub fn size_of(kind: ChecksumKind) -> usize {
    kind.size()
}

/// Modbus ASCII LRC: two's complement of the 8-bit sum of `data`.
pub fn lrc(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b)).wrapping_neg()
}
