//! Record layout of schema version 1.

use idreg_attribute::keys::{legacy_attribute_key, LEGACY_ADDRESS_BYTES};
use idreg_attribute::{Attribute, AttributeType};
use idreg_storage::KvStore;
use idreg_types::{Address, ADDRESS_BYTES};
use serde::{Deserialize, Serialize};

/// Attribute as stored before addresses were widened. Version 1 had no
/// expirations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyAttribute {
    pub name: String,
    pub value: Vec<u8>,
    pub attribute_type: AttributeType,
    pub address: [u8; LEGACY_ADDRESS_BYTES],
}

/// Zero-pad a 20-byte address on the right to the current width.
pub fn widen_address(legacy: &[u8; LEGACY_ADDRESS_BYTES]) -> Address {
    let mut bytes = [0u8; ADDRESS_BYTES];
    bytes[..LEGACY_ADDRESS_BYTES].copy_from_slice(legacy);
    Address(bytes)
}

impl LegacyAttribute {
    pub fn key(&self) -> Vec<u8> {
        legacy_attribute_key(&self.address, &self.name, &self.value)
    }

    pub fn into_attribute(self) -> Attribute {
        Attribute {
            address: widen_address(&self.address),
            name: self.name,
            value: self.value,
            attribute_type: self.attribute_type,
            expiration: None,
        }
    }
}

/// Write a version 1 record into the attribute key space. Used to load
/// state exported by old nodes.
pub fn write_legacy_attribute(store: &dyn KvStore, attr: &LegacyAttribute) -> anyhow::Result<()> {
    store.set(&attr.key(), &bincode::serialize(attr)?)
}
