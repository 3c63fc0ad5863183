//! Serde helpers for raw byte payloads.
//!
//! Use with `#[serde(with = "idreg_types::hex_bytes")]`: human readable
//! formats (JSON genesis and block files) see a lowercase hex string, binary
//! formats (bincode records) see the bytes themselves.

pub mod hex_bytes {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        if s.is_human_readable() {
            s.serialize_str(&hex::encode(bytes))
        } else {
            s.serialize_bytes(bytes)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        if d.is_human_readable() {
            let raw = String::deserialize(d)?;
            hex::decode(raw).map_err(D::Error::custom)
        } else {
            Vec::<u8>::deserialize(d)
        }
    }
}
