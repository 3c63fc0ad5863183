//! Store layout of the name module.
//!
//! | key                                       | value              |
//! |-------------------------------------------|--------------------|
//! | `0x03 \| name_hash`                        | `NameRecord`       |
//! | `0x05 \| address(32) \| name_hash`          | empty              |
//! | `0x06`                                    | `Params`           |
//!
//! `name_hash` is the SHA-256 of the name with its segments in reverse
//! order. It is a fixed digest and cannot be prefix-scanned by parent name.

use idreg_types::{Address, ADDRESS_BYTES};
use sha2::{Digest, Sha256};

pub const NAME_KEY_PREFIX: u8 = 0x03;
pub const ADDRESS_KEY_PREFIX: u8 = 0x05;
pub const PARAMS_KEY: &[u8] = &[0x06];

pub const NAME_HASH_BYTES: usize = 32;

pub type NameHash = [u8; NAME_HASH_BYTES];

/// `"a.b.c"` becomes `"c.b.a"`.
pub fn reverse_name(name: &str) -> String {
    name.rsplit('.').collect::<Vec<_>>().join(".")
}

/// SHA-256 of the reversed name.
pub fn name_hash(name: &str) -> NameHash {
    Sha256::digest(reverse_name(name).as_bytes()).into()
}

pub fn name_record_key(name: &str) -> Vec<u8> {
    name_record_key_from_hash(&name_hash(name))
}

pub fn name_record_key_from_hash(hash: &NameHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + NAME_HASH_BYTES);
    key.push(NAME_KEY_PREFIX);
    key.extend_from_slice(hash);
    key
}

/// Prefix of every reverse-index entry for `address`.
pub fn address_index_prefix(address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + ADDRESS_BYTES + NAME_HASH_BYTES);
    key.push(ADDRESS_KEY_PREFIX);
    key.extend_from_slice(address.as_bytes());
    key
}

pub fn address_index_key(address: &Address, hash: &NameHash) -> Vec<u8> {
    let mut key = address_index_prefix(address);
    key.extend_from_slice(hash);
    key
}

/// Split a full reverse-index key into its address and name hash.
pub fn split_address_index_key(key: &[u8]) -> Option<(Address, NameHash)> {
    if key.len() != 1 + ADDRESS_BYTES + NAME_HASH_BYTES || key[0] != ADDRESS_KEY_PREFIX {
        return None;
    }
    let address = Address::from_slice(&key[1..1 + ADDRESS_BYTES]).ok()?;
    let hash = key[1 + ADDRESS_BYTES..].try_into().ok()?;
    Some((address, hash))
}
