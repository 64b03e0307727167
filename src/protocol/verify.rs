//! Post-completion integrity checks, one per protocol

use serde::Serialize;

use super::{CustomConfig, NmeaConfig, ProtocolConfig};
use crate::checksum::{self, ChecksumKind};

/// Why a candidate frame was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyFailure {
    /// The computed and received checksums differ.
    Mismatch { computed: u32, received: u32 },
    /// The frame is too short to hold its checksum or covered range.
    Truncated,
    /// The frame does not have the shape its protocol requires.
    Malformed,
}

/// Result of verifying one candidate frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    /// A checksum was present and matched.
    Passed,
    /// The configuration disables checking for this frame.
    Skipped,
    Failed(VerifyFailure),
}

impl Verification {
    pub fn is_accepted(self) -> bool {
        !matches!(self, Verification::Failed(_))
    }

    fn compare(computed: u32, received: u32) -> Self {
        if computed == received {
            Verification::Passed
        } else {
            Verification::Failed(VerifyFailure::Mismatch { computed, received })
        }
    }
}

/// Verify a completed frame under `config`.
pub fn verify(config: &ProtocolConfig, frame: &[u8]) -> Verification {
    match config {
        ProtocolConfig::Custom(cfg) => verify_custom(cfg, frame),
        ProtocolConfig::ModbusRtu(_) => verify_modbus_rtu(frame),
        ProtocolConfig::ModbusAscii(_) => verify_modbus_ascii(frame),
        ProtocolConfig::Nmea0183(cfg) => verify_nmea(cfg, frame),
        ProtocolConfig::Iec101(_) => verify_iec101(frame),
    }
}

fn verify_custom(cfg: &CustomConfig, frame: &[u8]) -> Verification {
    let spec = cfg.checksum;
    if spec.kind == ChecksumKind::None {
        return Verification::Skipped;
    }

    let len = frame.len();
    let start = usize::from(spec.start);
    let offset = usize::from(spec.offset);
    let end = match usize::from(spec.end) {
        0 => offset,
        end if end > len => offset,
        end => end,
    };
    if end <= start {
        return Verification::Skipped;
    }
    if start >= len || offset + spec.kind.size() > len {
        return Verification::Failed(VerifyFailure::Truncated);
    }

    let (Some(covered), Some(received)) = (frame.get(start..end), spec.kind.read_le(frame, offset))
    else {
        return Verification::Failed(VerifyFailure::Truncated);
    };
    Verification::compare(spec.kind.compute(covered), received)
}

fn verify_modbus_rtu(frame: &[u8]) -> Verification {
    if frame.len() < 4 {
        return Verification::Failed(VerifyFailure::Truncated);
    }
    let body = frame.len() - 2;
    let computed = ChecksumKind::Crc16Modbus.compute(&frame[..body]);
    let received = u32::from(u16::from_le_bytes([frame[body], frame[body + 1]]));
    Verification::compare(computed, received)
}

/// `:` + hex(address, function, data, LRC) + CR LF
fn verify_modbus_ascii(frame: &[u8]) -> Verification {
    if frame.len() < 9 {
        return Verification::Failed(VerifyFailure::Truncated);
    }
    let Ok(decoded) = hex::decode(&frame[1..frame.len() - 2]) else {
        return Verification::Failed(VerifyFailure::Malformed);
    };
    let Some((&received, payload)) = decoded.split_last() else {
        return Verification::Failed(VerifyFailure::Malformed);
    };
    Verification::compare(u32::from(checksum::lrc(payload)), u32::from(received))
}

/// `$` + body + `*` + two hex digits + CR LF
fn verify_nmea(cfg: &NmeaConfig, frame: &[u8]) -> Verification {
    if !cfg.validate_checksum {
        return Verification::Skipped;
    }
    let search_end = frame.len().saturating_sub(3);
    let Some(star) = frame.get(1..search_end).and_then(|s| s.iter().position(|b| *b == b'*'))
    else {
        return Verification::Failed(VerifyFailure::Malformed);
    };
    let star = star + 1;
    let mut received = [0u8; 1];
    if hex::decode_to_slice(&frame[star + 1..star + 3], &mut received).is_err() {
        return Verification::Failed(VerifyFailure::Malformed);
    }
    let computed = ChecksumKind::Xor.compute(&frame[1..star]);
    Verification::compare(computed, u32::from(received[0]))
}

/// Single ACK `E5`, fixed `10 C A CS 16`, variable `68 L L 68 data CS 16`.
fn verify_iec101(frame: &[u8]) -> Verification {
    match frame {
        [0xE5] => Verification::Passed,
        [0x10, control, address, cs, end, ..] => {
            if *end != 0x16 {
                return Verification::Failed(VerifyFailure::Malformed);
            }
            Verification::compare(u32::from(control.wrapping_add(*address)), u32::from(*cs))
        }
        [0x68, length, repeat, 0x68, rest @ ..] if frame.len() >= 6 => {
            if length != repeat {
                return Verification::Failed(VerifyFailure::Malformed);
            }
            let length = usize::from(*length);
            let (Some(user_data), Some(&cs), Some(&end)) =
                (rest.get(..length), rest.get(length), rest.get(length + 1))
            else {
                return Verification::Failed(VerifyFailure::Truncated);
            };
            if end != 0x16 {
                return Verification::Failed(VerifyFailure::Malformed);
            }
            Verification::compare(ChecksumKind::Sum8.compute(user_data), u32::from(cs))
        }
        _ => Verification::Failed(VerifyFailure::Malformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ChecksumSpec, Iec101Config, Marker, ModbusAsciiConfig, ModbusRtuConfig};

    fn custom_crc16() -> ProtocolConfig {
        ProtocolConfig::Custom(CustomConfig {
            etx: Some(Marker(0x03)),
            checksum: ChecksumSpec { kind: ChecksumKind::Crc16Modbus, start: 1, end: 4, offset: 4 },
            ..Default::default()
        })
    }

    #[test]
    fn custom_crc_over_configured_range() {
        let config = custom_crc16();
        assert_eq!(verify(&config, &[0x02, 0x01, 0x00, 0x03, 0x60, 0x01]), Verification::Passed);
        assert!(matches!(
            verify(&config, &[0x02, 0x01, 0x00, 0x03, 0x61, 0x01]),
            Verification::Failed(VerifyFailure::Mismatch { computed: 0x0160, received: 0x0161 })
        ));
        assert_eq!(
            verify(&config, &[0x02, 0x01, 0x00, 0x03, 0x60]),
            Verification::Failed(VerifyFailure::Truncated)
        );
    }

    #[test]
    fn custom_end_falls_back_to_checksum_offset() {
        let config = ProtocolConfig::Custom(CustomConfig {
            checksum: ChecksumSpec { kind: ChecksumKind::Sum8, start: 0, end: 40, offset: 3 },
            ..Default::default()
        });
        // end beyond the frame, so [0, 3) is covered
        assert_eq!(verify(&config, &[1, 2, 3, 6]), Verification::Passed);
    }

    #[test]
    fn custom_without_checksum_is_skipped() {
        let config = ProtocolConfig::default();
        assert_eq!(verify(&config, &[1, 2, 3]), Verification::Skipped);

        let empty_range = ProtocolConfig::Custom(CustomConfig {
            checksum: ChecksumSpec { kind: ChecksumKind::Xor, start: 2, end: 0, offset: 2 },
            ..Default::default()
        });
        assert_eq!(verify(&empty_range, &[1, 2, 3]), Verification::Skipped);
    }

    #[test]
    fn custom_start_beyond_frame_fails() {
        let config = ProtocolConfig::Custom(CustomConfig {
            checksum: ChecksumSpec { kind: ChecksumKind::Xor, start: 5, end: 0, offset: 6 },
            ..Default::default()
        });
        assert_eq!(verify(&config, &[0, 1, 2]), Verification::Failed(VerifyFailure::Truncated));
    }

    #[test]
    fn modbus_rtu_trailing_crc() {
        let config = ProtocolConfig::ModbusRtu(ModbusRtuConfig::default());
        let frame = [0x01, 0x03, 0x02, 0x00, 0x0A, 0x38, 0x43];
        assert_eq!(verify(&config, &frame), Verification::Passed);
        assert!(!verify(&config, &frame[..5]).is_accepted());
        assert_eq!(verify(&config, &[1, 2, 3]), Verification::Failed(VerifyFailure::Truncated));
    }

    #[test]
    fn modbus_ascii_lrc() {
        let config = ProtocolConfig::ModbusAscii(ModbusAsciiConfig {});
        assert_eq!(verify(&config, b":010302000AF0\r\n"), Verification::Passed);
        assert_eq!(verify(&config, b":010302000af0\r\n"), Verification::Passed);
        assert!(matches!(
            verify(&config, b":010302000AF1\r\n"),
            Verification::Failed(VerifyFailure::Mismatch { .. })
        ));
        assert_eq!(
            verify(&config, b":010302000XF0\r\n"),
            Verification::Failed(VerifyFailure::Malformed)
        );
        assert_eq!(
            verify(&config, b":010302000F0\r\n"),
            Verification::Failed(VerifyFailure::Malformed)
        );
    }

    #[test]
    fn nmea_xor_between_dollar_and_star() {
        let config = ProtocolConfig::Nmea0183(NmeaConfig::default());
        let good = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";
        assert_eq!(verify(&config, good), Verification::Passed);

        let bad = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*48\r\n";
        assert!(matches!(
            verify(&config, bad),
            Verification::Failed(VerifyFailure::Mismatch { .. })
        ));

        assert_eq!(
            verify(&config, b"$GPGGA,1\r\n"),
            Verification::Failed(VerifyFailure::Malformed)
        );

        let unchecked = ProtocolConfig::Nmea0183(NmeaConfig {
            validate_checksum: false,
            ..Default::default()
        });
        assert_eq!(verify(&unchecked, bad), Verification::Skipped);
    }

    #[test]
    fn iec101_frame_shapes() {
        let config = ProtocolConfig::Iec101(Iec101Config::default());
        assert_eq!(verify(&config, &[0xE5]), Verification::Passed);
        assert_eq!(verify(&config, &[0x10, 0x49, 0x01, 0x4A, 0x16]), Verification::Passed);
        assert!(!verify(&config, &[0x10, 0x49, 0x01, 0x4B, 0x16]).is_accepted());
        assert_eq!(
            verify(&config, &[0x10, 0x49, 0x01, 0x4A, 0x17]),
            Verification::Failed(VerifyFailure::Malformed)
        );

        let variable = [0x68, 0x03, 0x03, 0x68, 0x08, 0x01, 0x02, 0x0B, 0x16];
        assert_eq!(verify(&config, &variable), Verification::Passed);
        assert_eq!(
            verify(&config, &[0x68, 0x03, 0x04, 0x68, 0x08, 0x01, 0x02, 0x0B, 0x16]),
            Verification::Failed(VerifyFailure::Malformed)
        );
        assert_eq!(
            verify(&config, &[0x68, 0x03, 0x03, 0x68, 0x08, 0x01]),
            Verification::Failed(VerifyFailure::Truncated)
        );
        assert_eq!(verify(&config, &[0x42, 0x16]), Verification::Failed(VerifyFailure::Malformed));
    }
}
