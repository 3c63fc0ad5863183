//! Storage layer for the registry modules.
//!
//! Everything the modules persist goes through the ordered byte-keyed
//! [`KvStore`] trait. Backends: [`SledStore`] on disk and [`MemoryStore`] for
//! tests. [`CacheStore`] buffers writes so an operation can be committed or
//! discarded as a whole, and [`PrefixStore`] gives each module its own key
//! space.

use anyhow::Result;

pub mod cache;
pub mod context;
pub mod memory;
pub mod paginate;
pub mod prefix;
pub mod sled_store;

pub use cache::CacheStore;
pub use context::{Context, EventManager, StoreKey};
pub use memory::MemoryStore;
pub use paginate::{filtered_paginate, paginate, DEFAULT_MAX_SCAN_ENTRIES};
pub use prefix::{prefix_end_bytes, PrefixStore};
pub use sled_store::SledStore;

/// Key/value pair returned by range reads.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Abstract ordered key-value store.
///
/// Implementations use interior mutability so a store can be shared behind an
/// `Arc`. Range reads return an owned snapshot of the requested entries in
/// ascending key order.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    fn delete(&self, key: &[u8]) -> Result<()>;

    /// Entries with `start <= key < end` (no upper bound when `end` is
    /// `None`), at most `limit` of them when given.
    fn range(&self, start: &[u8], end: Option<&[u8]>, limit: Option<usize>)
        -> Result<Vec<KvPair>>;

    /// Entries whose key starts with `prefix`.
    fn prefix_scan(&self, prefix: &[u8], limit: Option<usize>) -> Result<Vec<KvPair>> {
        let end = prefix_end_bytes(prefix);
        self.range(prefix, end.as_deref(), limit)
    }
}
