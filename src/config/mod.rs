//! Gateway configuration loaded from YAML.
//!
//! ```yaml
//! protocol:
//!   kind: custom
//!   etx: 0x03
//!   checksum: { kind: sum8, start: 1, offset: 6 }
//! data_offset: 1
//! fields:
//!   - { name: temperature, type: i16, start: 0, scale: 0.1 }
//!   - { name: status, type: bool, start: 2, bit: 3 }
//! ```
//!
//! Field maps may instead be given as a hex-encoded binary table (`field_table_hex`),
//! the same layout [`FieldTable::decode`] accepts.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assembler::DEFAULT_FRAME_CAPACITY;
use crate::protocol::ProtocolConfig;
use crate::types::{ByteOrder, FieldDescriptor, FieldTable, FieldType};
use crate::{GatewayError, Result};

mod store;

pub use store::ConfigStore;

/// Default depth of the queue between ingestion and extraction.
pub const DEFAULT_QUEUE_DEPTH: usize = 10;

/// Default ingestion tick in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// One named field of the YAML field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Byte offset relative to the payload start
    pub start: u8,
    #[serde(default)]
    pub byte_order: ByteOrder,
    /// Bit index for `bool` fields
    #[serde(default)]
    pub bit: u8,
    /// Width in bits for BCD, string and hex fields
    #[serde(default)]
    pub bits: u8,
    /// Real multiplier, stored with three decimals
    #[serde(default)]
    pub scale: Option<f64>,
    /// Real additive offset, stored with two decimals
    #[serde(default)]
    pub offset: f64,
}

impl FieldSpec {
    /// Convert to a descriptor, rejecting scaling that does not fit the fixed-point encoding.
    pub fn descriptor(&self) -> Result<FieldDescriptor> {
        let scale_factor = match self.scale {
            None => 0,
            Some(scale) => {
                let stored = (scale * 1000.0).round();
                if !(1.0..=f64::from(u16::MAX)).contains(&stored) {
                    return Err(GatewayError::config(
                        "field",
                        format!("scale {scale} of '{}' outside 0.001..=65.535", self.name),
                    ));
                }
                stored as u16
            }
        };

        let stored = (self.offset * 100.0).round();
        if !(f64::from(i16::MIN)..=f64::from(i16::MAX)).contains(&stored) {
            return Err(GatewayError::config(
                "field",
                format!("offset {} of '{}' outside -327.68..=327.67", self.offset, self.name),
            ));
        }
        if self.bit > 7 {
            return Err(GatewayError::config(
                "field",
                format!("bit {} of '{}' must be 0..=7", self.bit, self.name),
            ));
        }

        Ok(FieldDescriptor::new(self.field_type, self.start)
            .with_byte_order(self.byte_order)
            .with_bit_offset(self.bit)
            .with_bit_length(self.bits)
            .with_scaling(scale_factor, stored as i16))
    }
}

/// Full gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub data_offset: u8,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Binary field table as hex, used instead of `fields` and `data_offset`
    #[serde(default)]
    pub field_table_hex: Option<String>,
    #[serde(default = "default_frame_capacity")]
    pub frame_capacity: usize,
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_frame_capacity() -> usize {
    DEFAULT_FRAME_CAPACITY
}

fn default_queue_depth() -> usize {
    DEFAULT_QUEUE_DEPTH
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl GatewayConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| GatewayError::Parse {
            context: "gateway configuration".to_string(),
            details: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::file_error(path.to_path_buf(), e))?;
        debug!(path = %path.display(), bytes = yaml.len(), "Loaded configuration file");
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        self.protocol.validate()?;
        if self.frame_capacity == 0 {
            return Err(GatewayError::config("gateway", "frame_capacity must be positive"));
        }
        if self.queue_depth == 0 {
            return Err(GatewayError::config("gateway", "queue_depth must be positive"));
        }
        if self.poll_interval_ms == 0 {
            return Err(GatewayError::config("gateway", "poll_interval_ms must be positive"));
        }
        if self.field_table_hex.is_some() && !self.fields.is_empty() {
            return Err(GatewayError::config(
                "gateway",
                "fields and field_table_hex are mutually exclusive",
            ));
        }
        if self.field_table_hex.is_some() && self.data_offset != 0 {
            return Err(GatewayError::config(
                "gateway",
                "data_offset is carried by field_table_hex and cannot be set alongside it",
            ));
        }
        self.field_table().map(|_| ())
    }

    /// Build the field table this configuration describes.
    pub fn field_table(&self) -> Result<FieldTable> {
        if let Some(encoded) = &self.field_table_hex {
            let compact: String = encoded.split_whitespace().collect();
            let blob = hex::decode(&compact).map_err(|e| GatewayError::Parse {
                context: "field_table_hex".to_string(),
                details: e.to_string(),
            })?;
            return FieldTable::decode(&blob);
        }

        self.fields
            .iter()
            .try_fold(FieldTable::builder().data_offset(self.data_offset), |builder, spec| {
                Ok::<_, GatewayError>(builder.field(&spec.name, spec.descriptor()?))
            })?
            .build()
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCategory;
    use crate::checksum::ChecksumKind;
    use crate::protocol::ProtocolKind;

    const CUSTOM_YAML: &str = r#"
protocol:
  kind: custom
  etx: 0x03
  checksum: { kind: sum8, start: 1, offset: 6 }
data_offset: 1
fields:
  - { name: temperature, type: i16, start: 0, scale: 0.1 }
  - { name: pressure, type: u16, start: 2, byte_order: big, offset: -1.5 }
  - { name: alarm, type: bool, start: 4, bit: 3 }
"#;

    #[test]
    fn parses_fields_with_defaults() {
        let config = GatewayConfig::from_yaml_str(CUSTOM_YAML).unwrap();
        assert_eq!(config.protocol.kind(), ProtocolKind::Custom);
        assert_eq!(config.frame_capacity, DEFAULT_FRAME_CAPACITY);
        assert_eq!(config.queue_depth, DEFAULT_QUEUE_DEPTH);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);

        let ProtocolConfig::Custom(custom) = &config.protocol else {
            panic!("expected custom protocol");
        };
        assert_eq!(custom.checksum.kind, ChecksumKind::Sum8);

        let table = config.field_table().unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.data_offset(), 1);
        assert_eq!(table.field_name(1), "pressure");

        let temperature = table.fields()[0];
        assert_eq!(temperature.scale_factor, 100);
        let pressure = table.fields()[1];
        assert_eq!(pressure.byte_order, ByteOrder::Big);
        assert_eq!(pressure.offset_value, -150);
        assert_eq!(table.fields()[2].bit_offset, 3);
    }

    #[test]
    fn hex_field_table_matches_builder_output() {
        let built = GatewayConfig::from_yaml_str(CUSTOM_YAML).unwrap().field_table().unwrap();
        let yaml = format!(
            "protocol: {{ kind: modbus_rtu }}\nfield_table_hex: \"{}\"\n",
            hex::encode(built.encode())
        );
        let config = GatewayConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.field_table().unwrap(), built);
        assert_eq!(config.field_table().unwrap().data_offset(), 1);
    }

    #[test]
    fn hex_field_table_rejects_separate_data_offset() {
        let blob = hex::encode(FieldTable::builder().data_offset(4).build().unwrap().encode());
        let yaml = format!(
            "protocol: {{ kind: modbus_rtu }}\ndata_offset: 2\nfield_table_hex: \"{blob}\"\n"
        );
        let err = GatewayConfig::from_yaml_str(&yaml).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.to_string().contains("data_offset"));
    }

    #[test]
    fn rejects_unrepresentable_scaling() {
        let spec = FieldSpec {
            name: "x".into(),
            field_type: FieldType::U16,
            start: 0,
            byte_order: ByteOrder::Little,
            bit: 0,
            bits: 0,
            scale: Some(100.0),
            offset: 0.0,
        };
        assert!(spec.descriptor().is_err());
        assert!(FieldSpec { scale: Some(0.0), ..spec.clone() }.descriptor().is_err());
        assert!(FieldSpec { scale: None, offset: 400.0, ..spec.clone() }.descriptor().is_err());
        assert!(FieldSpec { scale: None, bit: 8, ..spec }.descriptor().is_err());
    }

    #[test]
    fn rejects_bad_gateway_settings() {
        let err = GatewayConfig::from_yaml_str("protocol: { kind: custom }\nqueue_depth: 0\n")
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Configuration);

        let err = GatewayConfig::from_yaml_str("protocol: { kind: telnet }\n").unwrap_err();
        assert!(matches!(err, GatewayError::Parse { .. }));

        let err = GatewayConfig::from_yaml_str(
            "protocol: { kind: custom }\nfield_table_hex: \"zz\"\n",
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::Parse { .. }));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = GatewayConfig::load("/nonexistent/serialgate.yaml").unwrap_err();
        assert!(matches!(err, GatewayError::File { .. }));
    }
}
