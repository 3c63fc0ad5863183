//! Store layout of the attribute module.
//!
//! | key                                                    | value        |
//! |--------------------------------------------------------|--------------|
//! | `0x01 \| legacy_address(20) \| name_hash \| value_hash`   | legacy attr  |
//! | `0x02 \| address(32) \| name_hash \| value_hash`          | `Attribute`  |
//! | `0x03 \| expiration(12) \| address \| name_hash \| value_hash` | empty  |
//! | `0x04 \| name_hash \| address(32)`                       | u64 BE count |
//! | `0x05`                                                 | `Params`     |
//!
//! `name_hash` is the name registry's digest of the reversed name, so an
//! attribute's name and the binding it depends on share one hash.

use crate::types::Attribute;
use chrono::{DateTime, Utc};
use idreg_name::keys::{name_hash, NameHash, NAME_HASH_BYTES};
use idreg_types::{time_from_key, time_to_key, Address, ADDRESS_BYTES, TIME_KEY_BYTES};
use sha2::{Digest, Sha256};

pub const LEGACY_ATTRIBUTE_KEY_PREFIX: u8 = 0x01;
pub const ATTRIBUTE_KEY_PREFIX: u8 = 0x02;
pub const EXPIRATION_KEY_PREFIX: u8 = 0x03;
pub const NAME_ADDRESS_KEY_PREFIX: u8 = 0x04;
pub const PARAMS_KEY: &[u8] = &[0x05];

pub const LEGACY_ADDRESS_BYTES: usize = 20;
pub const VALUE_HASH_BYTES: usize = 32;

/// Length of `address || name_hash || value_hash`.
pub const ATTRIBUTE_SUFFIX_BYTES: usize = ADDRESS_BYTES + NAME_HASH_BYTES + VALUE_HASH_BYTES;

pub fn value_hash(value: &[u8]) -> [u8; VALUE_HASH_BYTES] {
    Sha256::digest(value).into()
}

/// Every attribute on `address`.
pub fn account_prefix(address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + ATTRIBUTE_SUFFIX_BYTES);
    key.push(ATTRIBUTE_KEY_PREFIX);
    key.extend_from_slice(address.as_bytes());
    key
}

/// Every value of `name` on `address`. `name` must already be normalized.
pub fn account_name_prefix(address: &Address, name: &str) -> Vec<u8> {
    let mut key = account_prefix(address);
    key.extend_from_slice(&name_hash(name));
    key
}

pub fn attribute_key(attr: &Attribute) -> Vec<u8> {
    let mut key = account_name_prefix(&attr.address, &attr.name);
    key.extend_from_slice(&value_hash(&attr.value));
    key
}

/// Legacy key of an attribute stored under a 20-byte address.
pub fn legacy_attribute_key(address: &[u8; LEGACY_ADDRESS_BYTES], name: &str, value: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + LEGACY_ADDRESS_BYTES + NAME_HASH_BYTES + VALUE_HASH_BYTES);
    key.push(LEGACY_ATTRIBUTE_KEY_PREFIX);
    key.extend_from_slice(address);
    key.extend_from_slice(&name_hash(name));
    key.extend_from_slice(&value_hash(value));
    key
}

/// Entries for attributes expiring at or before `at` sort before this key.
pub fn expiration_prefix(at: &DateTime<Utc>) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + TIME_KEY_BYTES);
    key.push(EXPIRATION_KEY_PREFIX);
    key.extend_from_slice(&time_to_key(at));
    key
}

/// Index entry for `attr_key` expiring at `at`.
pub fn expiration_key(at: &DateTime<Utc>, attr_key: &[u8]) -> Vec<u8> {
    let mut key = expiration_prefix(at);
    key.extend_from_slice(&attr_key[1..]);
    key
}

/// Split an expiration index key into its time and the attribute key it
/// points at.
pub fn split_expiration_key(key: &[u8]) -> Option<(DateTime<Utc>, Vec<u8>)> {
    if key.len() != 1 + TIME_KEY_BYTES + ATTRIBUTE_SUFFIX_BYTES || key[0] != EXPIRATION_KEY_PREFIX {
        return None;
    }
    let at = time_from_key(&key[1..1 + TIME_KEY_BYTES])?;
    let mut attr_key = Vec::with_capacity(1 + ATTRIBUTE_SUFFIX_BYTES);
    attr_key.push(ATTRIBUTE_KEY_PREFIX);
    attr_key.extend_from_slice(&key[1 + TIME_KEY_BYTES..]);
    Some((at, attr_key))
}

pub fn name_address_prefix_from_hash(hash: &NameHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + NAME_HASH_BYTES + ADDRESS_BYTES);
    key.push(NAME_ADDRESS_KEY_PREFIX);
    key.extend_from_slice(hash);
    key
}

/// Every account holding `name`.
pub fn name_address_prefix(name: &str) -> Vec<u8> {
    name_address_prefix_from_hash(&name_hash(name))
}

pub fn name_address_key(name: &str, address: &Address) -> Vec<u8> {
    let mut key = name_address_prefix(name);
    key.extend_from_slice(address.as_bytes());
    key
}
