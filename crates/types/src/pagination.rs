use serde::{Deserialize, Serialize};

/// Page size used when a request does not specify one.
pub const DEFAULT_PAGE_LIMIT: u64 = 100;
/// Largest page a single request may ask for.
pub const MAX_PAGE_LIMIT: u64 = 1_000;

/// Cursor or offset based page request.
///
/// When `key` is set it takes precedence over `offset` and names the first
/// store key (relative to the scanned prefix) to return.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    #[serde(default, with = "hex_opt")]
    pub key: Option<Vec<u8>>,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub count_total: bool,
}

impl PageRequest {
    pub fn with_limit(limit: u64) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn after(key: Vec<u8>, limit: u64) -> Self {
        Self {
            key: Some(key),
            limit,
            ..Default::default()
        }
    }

    /// Limit clamped into `1..=MAX_PAGE_LIMIT`, defaulting when zero.
    pub fn effective_limit(&self) -> u64 {
        match self.limit {
            0 => DEFAULT_PAGE_LIMIT,
            n => n.min(MAX_PAGE_LIMIT),
        }
    }
}

/// Page metadata returned alongside results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResponse {
    /// Key to pass back as `PageRequest::key` to continue, `None` when done.
    #[serde(default, with = "hex_opt")]
    pub next_key: Option<Vec<u8>>,
    /// Total matching entries, only when requested and the walk completed.
    #[serde(default)]
    pub total: Option<u64>,
}

mod hex_opt {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_some(&hex::encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(PageRequest::default().effective_limit(), DEFAULT_PAGE_LIMIT);
        assert_eq!(PageRequest::with_limit(5).effective_limit(), 5);
        assert_eq!(
            PageRequest::with_limit(MAX_PAGE_LIMIT * 10).effective_limit(),
            MAX_PAGE_LIMIT
        );
    }

    #[test]
    fn page_key_is_hex_in_json() {
        let req = PageRequest::after(vec![0xde, 0xad], 2);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["key"], "dead");
        let back: PageRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, req);
    }
}
