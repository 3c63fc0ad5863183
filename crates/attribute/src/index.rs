//! Secondary indexes kept beside every stored attribute: the expiration
//! index and the per name and account record count.
//!
//! These work on the raw module store so the migrations can rebuild them
//! without going through the keeper.

use crate::keys::{expiration_key, name_address_key};
use crate::types::Attribute;
use anyhow::Result;
use idreg_storage::KvStore;
use idreg_types::Address;

pub fn decode_attribute(bytes: &[u8]) -> bincode::Result<Attribute> {
    bincode::deserialize(bytes)
}

pub fn encode_attribute(attr: &Attribute) -> bincode::Result<Vec<u8>> {
    bincode::serialize(attr)
}

/// Stored number of `name` records on `address`.
pub fn name_address_count(store: &dyn KvStore, name: &str, address: &Address) -> Result<u64> {
    let Some(bytes) = store.get(&name_address_key(name, address))? else {
        return Ok(0);
    };
    let raw: [u8; 8] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("name/address counter has {} bytes", bytes.len()))?;
    Ok(u64::from_be_bytes(raw))
}

pub fn increment_name_address(store: &dyn KvStore, name: &str, address: &Address) -> Result<()> {
    let count = name_address_count(store, name, address)?;
    store.set(&name_address_key(name, address), &(count + 1).to_be_bytes())
}

/// Removes the counter once it drops to zero.
pub fn decrement_name_address(store: &dyn KvStore, name: &str, address: &Address) -> Result<()> {
    let key = name_address_key(name, address);
    match name_address_count(store, name, address)? {
        0 => Ok(()),
        1 => store.delete(&key),
        n => store.set(&key, &(n - 1).to_be_bytes()),
    }
}

/// Add the expiration and counter entries for a record newly stored under
/// `key`.
pub fn add_indexes(store: &dyn KvStore, key: &[u8], attr: &Attribute) -> Result<()> {
    if let Some(at) = attr.expiration {
        store.set(&expiration_key(&at, key), &[])?;
    }
    increment_name_address(store, &attr.name, &attr.address)
}

pub fn remove_indexes(store: &dyn KvStore, key: &[u8], attr: &Attribute) -> Result<()> {
    if let Some(at) = attr.expiration {
        store.delete(&expiration_key(&at, key))?;
    }
    decrement_name_address(store, &attr.name, &attr.address)
}
