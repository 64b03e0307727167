//! Wire protocol settings.
//!
//! [`ProtocolConfig`] is a closed sum type with one variant per supported protocol. The
//! frame assembler and [`verify`] match on it exhaustively, so adding a protocol is a
//! compile error everywhere it has to be handled.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::checksum::ChecksumKind;
use crate::{GatewayError, Result};

mod verify;

pub use verify::{Verification, VerifyFailure, verify};

/// Default silence timeout for protocols without their own setting.
pub const DEFAULT_SILENCE_TIMEOUT: Duration = Duration::from_millis(100);

/// Default Modbus RTU inter-frame delay used for completion.
pub const DEFAULT_INTER_FRAME_DELAY: Duration = Duration::from_millis(4);

/// Default Modbus RTU silence timeout used for force-emission.
pub const DEFAULT_RTU_SILENCE_TIMEOUT: Duration = Duration::from_millis(10);

/// Maximum number of NMEA sentence filters.
pub const MAX_NMEA_FILTERS: usize = 8;

/// Protocol selector with its wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ProtocolKind {
    Custom = 0x00,
    ModbusRtu = 0x01,
    ModbusAscii = 0x02,
    Nmea0183 = 0x03,
    /// IEC 60870-5-101
    Iec101 = 0x04,
}

impl ProtocolKind {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ProtocolKind {
    type Error = GatewayError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0x00 => Ok(ProtocolKind::Custom),
            0x01 => Ok(ProtocolKind::ModbusRtu),
            0x02 => Ok(ProtocolKind::ModbusAscii),
            0x03 => Ok(ProtocolKind::Nmea0183),
            0x04 => Ok(ProtocolKind::Iec101),
            code => Err(GatewayError::UnknownCode { what: "protocol", code }),
        }
    }
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProtocolKind::Custom => "custom",
            ProtocolKind::ModbusRtu => "modbus-rtu",
            ProtocolKind::ModbusAscii => "modbus-ascii",
            ProtocolKind::Nmea0183 => "nmea-0183",
            ProtocolKind::Iec101 => "iec60870-5-101",
        };
        f.write_str(name)
    }
}

/// Start or end marker: one byte when the value fits in 8 bits, otherwise two bytes with
/// the high byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marker(pub u16);

impl Marker {
    fn encoded(self) -> ([u8; 2], usize) {
        match u8::try_from(self.0) {
            Ok(byte) => ([byte, 0], 1),
            Err(_) => (self.0.to_be_bytes(), 2),
        }
    }

    /// Marker width in bytes.
    pub fn width(self) -> usize {
        self.encoded().1
    }

    /// Whether the marker occupies `data[end - len..end]`.
    pub fn ends_at(self, data: &[u8], end: usize) -> bool {
        let (bytes, len) = self.encoded();
        end >= len && data.get(end - len..end) == Some(&bytes[..len])
    }
}

/// Declared-length field of a custom frame. The value is read little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthField {
    pub offset: u8,
    /// 1 or 2 bytes
    pub size: u8,
    /// The value is the total frame length rather than the length after the field.
    #[serde(default)]
    pub includes_header: bool,
}

/// Checksum placement of a custom frame.
///
/// The checksum covers `[start, end)`, falling back to `[start, offset)` when `end` is 0 or
/// beyond the frame, and is stored little-endian at `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksumSpec {
    pub kind: ChecksumKind,
    pub start: u16,
    pub end: u16,
    pub offset: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomConfig {
    /// Fixed frame length; 0 for variable-length frames
    pub frame_length: u16,
    /// Informational; framing never waits for the start marker
    pub stx: Option<Marker>,
    pub etx: Option<Marker>,
    pub length_field: Option<LengthField>,
    pub checksum: ChecksumSpec,
    /// Silence timeout in milliseconds; 0 for the default
    pub timeout_ms: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusRtuConfig {
    pub slave_address: u8,
    /// Bitmask of expected function codes (informational)
    pub function_codes: u32,
    /// Silence that completes a frame, in milliseconds; 0 for the default
    pub inter_frame_delay_ms: u16,
    pub response_timeout_ms: u16,
}

impl ModbusRtuConfig {
    pub fn inter_frame_delay(&self) -> Duration {
        match self.inter_frame_delay_ms {
            0 => DEFAULT_INTER_FRAME_DELAY,
            ms => Duration::from_millis(u64::from(ms)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModbusAsciiConfig {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NmeaConfig {
    /// Allowed five-character sentence addresses (talker + sentence), empty for all
    pub sentence_filters: Vec<String>,
    pub validate_checksum: bool,
    /// Allowed two-character talker id
    pub talker_filter: Option<String>,
}

impl Default for NmeaConfig {
    fn default() -> Self {
        Self { sentence_filters: Vec::new(), validate_checksum: true, talker_filter: None }
    }
}

impl NmeaConfig {
    /// Whether a sentence passes the allow-lists.
    pub fn accepts(&self, sentence: &[u8]) -> bool {
        let address = sentence.get(1..6);
        let sentence_ok = self.sentence_filters.is_empty()
            || address.is_some_and(|address| {
                self.sentence_filters.iter().any(|filter| filter.as_bytes() == address)
            });
        let talker_ok = match &self.talker_filter {
            Some(talker) => sentence.get(1..3) == Some(talker.as_bytes()),
            None => true,
        };
        sentence_ok && talker_ok
    }
}

/// IEC 60870-5-101 link settings (informational; framing does not depend on them).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Iec101Config {
    pub link_address_size: u8,
    pub asdu_address_size: u8,
    pub ioa_size: u8,
    pub cause_of_tx_size: u8,
    pub originator_address: u8,
    pub balanced_mode: bool,
    pub type_id_filter: u32,
}

impl Default for Iec101Config {
    fn default() -> Self {
        Self {
            link_address_size: 1,
            asdu_address_size: 2,
            ioa_size: 3,
            cause_of_tx_size: 2,
            originator_address: 0,
            balanced_mode: false,
            type_id_filter: 0,
        }
    }
}

/// Active protocol and its settings.
///
/// ```rust
/// use serialgate::protocol::{ProtocolConfig, ProtocolKind};
///
/// let yaml = "kind: modbus_rtu\ninter_frame_delay_ms: 5\n";
/// let config: ProtocolConfig = serde_yaml_ng::from_str(yaml).unwrap();
/// assert_eq!(config.kind(), ProtocolKind::ModbusRtu);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProtocolConfig {
    Custom(CustomConfig),
    ModbusRtu(ModbusRtuConfig),
    ModbusAscii(ModbusAsciiConfig),
    Nmea0183(NmeaConfig),
    Iec101(Iec101Config),
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig::Custom(CustomConfig::default())
    }
}

impl ProtocolConfig {
    pub fn kind(&self) -> ProtocolKind {
        match self {
            ProtocolConfig::Custom(_) => ProtocolKind::Custom,
            ProtocolConfig::ModbusRtu(_) => ProtocolKind::ModbusRtu,
            ProtocolConfig::ModbusAscii(_) => ProtocolKind::ModbusAscii,
            ProtocolConfig::Nmea0183(_) => ProtocolKind::Nmea0183,
            ProtocolConfig::Iec101(_) => ProtocolKind::Iec101,
        }
    }

    /// Silence after which a non-empty buffer is force-emitted (or dropped when short).
    pub fn silence_timeout(&self) -> Duration {
        match self {
            ProtocolConfig::Custom(cfg) if cfg.timeout_ms > 0 => {
                Duration::from_millis(u64::from(cfg.timeout_ms))
            }
            ProtocolConfig::ModbusRtu(cfg) if cfg.inter_frame_delay_ms > 0 => {
                Duration::from_millis(u64::from(cfg.inter_frame_delay_ms))
            }
            ProtocolConfig::ModbusRtu(_) => DEFAULT_RTU_SILENCE_TIMEOUT,
            _ => DEFAULT_SILENCE_TIMEOUT,
        }
    }

    /// Check settings that cannot be expressed in the types.
    pub fn validate(&self) -> Result<()> {
        match self {
            ProtocolConfig::Custom(cfg) => {
                if let Some(field) = cfg.length_field {
                    if !matches!(field.size, 1 | 2) {
                        return Err(GatewayError::config(
                            "custom protocol",
                            format!("length field size must be 1 or 2, got {}", field.size),
                        ));
                    }
                }
                let spec = cfg.checksum;
                let covered_end = if spec.end != 0 { spec.end } else { spec.offset };
                if spec.kind != ChecksumKind::None && covered_end < spec.start {
                    return Err(GatewayError::config(
                        "custom protocol",
                        format!(
                            "checksum range ends at {covered_end} before it starts at {}",
                            spec.start
                        ),
                    ));
                }
                Ok(())
            }
            ProtocolConfig::Nmea0183(cfg) => {
                if cfg.sentence_filters.len() > MAX_NMEA_FILTERS {
                    return Err(GatewayError::config(
                        "nmea",
                        format!(
                            "{} sentence filters given, at most {MAX_NMEA_FILTERS} allowed",
                            cfg.sentence_filters.len()
                        ),
                    ));
                }
                let invalid = cfg.sentence_filters.iter().find(|f| !is_alphanumeric_of_len(f, 5));
                if let Some(bad) = invalid {
                    return Err(GatewayError::config(
                        "nmea",
                        format!("sentence filter '{bad}' must be five ASCII alphanumerics"),
                    ));
                }
                match &cfg.talker_filter {
                    Some(talker) if !is_alphanumeric_of_len(talker, 2) => {
                        return Err(GatewayError::config(
                            "nmea",
                            format!("talker filter '{talker}' must be two ASCII alphanumerics"),
                        ));
                    }
                    _ => {}
                }
                Ok(())
            }
            ProtocolConfig::ModbusRtu(_)
            | ProtocolConfig::ModbusAscii(_)
            | ProtocolConfig::Iec101(_) => Ok(()),
        }
    }
}

fn is_alphanumeric_of_len(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_codes_round_trip() {
        for kind in [
            ProtocolKind::Custom,
            ProtocolKind::ModbusRtu,
            ProtocolKind::ModbusAscii,
            ProtocolKind::Nmea0183,
            ProtocolKind::Iec101,
        ] {
            assert_eq!(ProtocolKind::try_from(kind.code()).unwrap(), kind);
        }
        assert!(matches!(
            ProtocolKind::try_from(0x05),
            Err(GatewayError::UnknownCode { what: "protocol", code: 0x05 })
        ));
    }

    #[test]
    fn markers_match_one_or_two_bytes() {
        let single = Marker(0x03);
        assert_eq!(single.width(), 1);
        assert!(single.ends_at(&[0x02, 0x03], 2));
        assert!(!single.ends_at(&[0x02, 0x03], 1));
        assert!(!single.ends_at(&[], 0));

        let double = Marker(0x0D0A);
        assert_eq!(double.width(), 2);
        assert!(double.ends_at(b"abc\r\n", 5));
        assert!(!double.ends_at(b"\n", 1));
    }

    #[test]
    fn silence_timeouts_follow_protocol_defaults() {
        assert_eq!(ProtocolConfig::default().silence_timeout(), Duration::from_millis(100));
        let custom = ProtocolConfig::Custom(CustomConfig { timeout_ms: 30, ..Default::default() });
        assert_eq!(custom.silence_timeout(), Duration::from_millis(30));

        let rtu = ModbusRtuConfig::default();
        assert_eq!(rtu.inter_frame_delay(), Duration::from_millis(4));
        assert_eq!(ProtocolConfig::ModbusRtu(rtu).silence_timeout(), Duration::from_millis(10));

        let rtu = ModbusRtuConfig { inter_frame_delay_ms: 7, ..Default::default() };
        assert_eq!(rtu.inter_frame_delay(), Duration::from_millis(7));
        assert_eq!(ProtocolConfig::ModbusRtu(rtu).silence_timeout(), Duration::from_millis(7));

        let nmea = ProtocolConfig::Nmea0183(NmeaConfig::default());
        assert_eq!(nmea.silence_timeout(), DEFAULT_SILENCE_TIMEOUT);
    }

    #[test]
    fn validation_rejects_bad_settings() {
        let bad_length = ProtocolConfig::Custom(CustomConfig {
            length_field: Some(LengthField { offset: 1, size: 3, includes_header: false }),
            ..Default::default()
        });
        assert!(bad_length.validate().is_err());

        let inverted = ProtocolConfig::Custom(CustomConfig {
            checksum: ChecksumSpec { kind: ChecksumKind::Sum8, start: 4, end: 2, offset: 5 },
            ..Default::default()
        });
        assert!(inverted.validate().is_err());

        let filters = (0..9).map(|i| format!("GPGG{i}")).collect();
        let too_many = ProtocolConfig::Nmea0183(NmeaConfig {
            sentence_filters: filters,
            ..Default::default()
        });
        assert!(too_many.validate().is_err());

        let malformed = ProtocolConfig::Nmea0183(NmeaConfig {
            sentence_filters: vec!["GP-GA".into()],
            ..Default::default()
        });
        assert!(malformed.validate().is_err());

        let talker = ProtocolConfig::Nmea0183(NmeaConfig {
            talker_filter: Some("GPS".into()),
            ..Default::default()
        });
        assert!(talker.validate().is_err());

        let good = ProtocolConfig::Nmea0183(NmeaConfig {
            sentence_filters: vec!["GPGGA".into(), "GPRMC".into()],
            talker_filter: Some("GP".into()),
            validate_checksum: true,
        });
        assert!(good.validate().is_ok());
    }

    #[test]
    fn nmea_filters_select_sentences() {
        let cfg = NmeaConfig {
            sentence_filters: vec!["GPGGA".into()],
            talker_filter: None,
            validate_checksum: true,
        };
        assert!(cfg.accepts(b"$GPGGA,1*00\r\n"));
        assert!(!cfg.accepts(b"$GPRMC,1*00\r\n"));
        assert!(!cfg.accepts(b"$GP"));

        let talker_only = NmeaConfig { talker_filter: Some("GN".into()), ..Default::default() };
        assert!(talker_only.accepts(b"$GNRMC,1*00\r\n"));
        assert!(!talker_only.accepts(b"$GPRMC,1*00\r\n"));
    }

    #[test]
    fn yaml_uses_kind_tag() {
        let yaml = "kind: custom\nframe_length: 8\netx: 3\n\
                    checksum:\n  kind: crc16_modbus\n  start: 1\n  offset: 4\n";
        let config: ProtocolConfig = serde_yaml_ng::from_str(yaml).unwrap();
        let ProtocolConfig::Custom(custom) = &config else {
            panic!("expected custom protocol, got {config:?}");
        };
        assert_eq!(custom.frame_length, 8);
        assert_eq!(custom.etx, Some(Marker(3)));
        assert_eq!(custom.checksum.kind, ChecksumKind::Crc16Modbus);
        assert_eq!(custom.checksum.end, 0);

        let nmea: ProtocolConfig = serde_yaml_ng::from_str("kind: nmea0183\n").unwrap();
        assert_eq!(nmea, ProtocolConfig::Nmea0183(NmeaConfig::default()));

        let text = serde_yaml_ng::to_string(&config).unwrap();
        assert_eq!(serde_yaml_ng::from_str::<ProtocolConfig>(&text).unwrap(), config);
    }
}
