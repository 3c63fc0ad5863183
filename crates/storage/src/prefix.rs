use crate::{KvPair, KvStore};
use anyhow::Result;
use std::sync::Arc;

/// Smallest key strictly greater than every key starting with `prefix`.
///
/// Returns `None` when no such key exists (empty prefix or all `0xff`), in
/// which case a prefix walk has no upper bound.
pub fn prefix_end_bytes(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// View of a parent store restricted to keys under a fixed prefix.
///
/// Keys passed in and returned are relative to the prefix.
#[derive(Clone)]
pub struct PrefixStore {
    parent: Arc<dyn KvStore>,
    prefix: Vec<u8>,
}

impl PrefixStore {
    pub fn new(parent: Arc<dyn KvStore>, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            parent,
            prefix: prefix.into(),
        }
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }
}

impl KvStore for PrefixStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.parent.get(&self.full_key(key))
    }

    fn has(&self, key: &[u8]) -> Result<bool> {
        self.parent.has(&self.full_key(key))
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.parent.set(&self.full_key(key), value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.parent.delete(&self.full_key(key))
    }

    fn range(&self, start: &[u8], end: Option<&[u8]>, limit: Option<usize>) -> Result<Vec<KvPair>> {
        let start = self.full_key(start);
        let end = match end {
            Some(end) => Some(self.full_key(end)),
            None => prefix_end_bytes(&self.prefix),
        };
        let strip = self.prefix.len();
        Ok(self
            .parent
            .range(&start, end.as_deref(), limit)?
            .into_iter()
            .map(|(k, v)| (k[strip..].to_vec(), v))
            .collect())
    }
}
