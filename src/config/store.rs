//! Hot-swappable protocol and field-table snapshots

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::Result;
use crate::protocol::ProtocolConfig;
use crate::types::FieldTable;

/// Holder of the active protocol configuration and field table.
///
/// Replacements publish a new `Arc` snapshot. Readers that already took a snapshot keep
/// using it until they take the next one, so a frame is always framed under one
/// protocol configuration and extracted under one field table.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    protocol: Arc<watch::Sender<Arc<ProtocolConfig>>>,
    fields: Arc<watch::Sender<Arc<FieldTable>>>,
}

impl ConfigStore {
    /// Create a store from validated settings.
    pub fn new(protocol: ProtocolConfig, fields: FieldTable) -> Result<Self> {
        protocol.validate()?;
        let (protocol, _) = watch::channel(Arc::new(protocol));
        let (fields, _) = watch::channel(Arc::new(fields));
        Ok(Self { protocol: Arc::new(protocol), fields: Arc::new(fields) })
    }

    pub fn protocol(&self) -> Arc<ProtocolConfig> {
        self.protocol.borrow().clone()
    }

    pub fn field_table(&self) -> Arc<FieldTable> {
        self.fields.borrow().clone()
    }

    /// Validate and publish a new protocol configuration.
    pub fn replace_protocol(&self, protocol: ProtocolConfig) -> Result<()> {
        protocol.validate()?;
        info!(protocol = %protocol.kind(), "Protocol configuration replaced");
        self.protocol.send_replace(Arc::new(protocol));
        Ok(())
    }

    /// Publish a new field table.
    pub fn replace_field_table(&self, fields: FieldTable) {
        info!(fields = fields.len(), data_offset = fields.data_offset(), "Field table replaced");
        self.fields.send_replace(Arc::new(fields));
    }

    /// Receiver notified on every protocol replacement.
    pub fn watch_protocol(&self) -> watch::Receiver<Arc<ProtocolConfig>> {
        self.protocol.subscribe()
    }

    pub fn watch_field_table(&self) -> watch::Receiver<Arc<FieldTable>> {
        self.fields.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ModbusRtuConfig, NmeaConfig, ProtocolKind};
    use crate::types::{FieldDescriptor, FieldType};

    fn table(name: &str) -> FieldTable {
        FieldTable::builder().field(name, FieldDescriptor::new(FieldType::U8, 0)).build().unwrap()
    }

    #[test]
    fn snapshots_survive_replacement() {
        let store = ConfigStore::new(ProtocolConfig::default(), table("a")).unwrap();
        let before = store.field_table();
        store.replace_field_table(table("b"));

        assert_eq!(before.field_name(0), "a");
        assert_eq!(store.field_table().field_name(0), "b");
    }

    #[test]
    fn protocol_replacement_is_validated_and_observed() {
        let store = ConfigStore::new(ProtocolConfig::default(), table("a")).unwrap();
        let mut rx = store.watch_protocol();

        let invalid = ProtocolConfig::Nmea0183(NmeaConfig {
            talker_filter: Some("GPS".into()),
            ..Default::default()
        });
        assert!(store.replace_protocol(invalid).is_err());
        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.protocol().kind(), ProtocolKind::Custom);

        store.replace_protocol(ProtocolConfig::ModbusRtu(ModbusRtuConfig::default())).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().kind(), ProtocolKind::ModbusRtu);
    }
}
