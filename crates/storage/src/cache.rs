use crate::{KvPair, KvStore};
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// Write buffer layered over a parent store.
///
/// Reads see the buffered writes on top of the parent. Nothing reaches the
/// parent until [`CacheStore::write`]; dropping the cache discards every
/// pending write.
pub struct CacheStore {
    parent: Arc<dyn KvStore>,
    // `None` marks a pending delete.
    pending: RwLock<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl CacheStore {
    pub fn new(parent: Arc<dyn KvStore>) -> Self {
        Self {
            parent,
            pending: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of buffered writes and deletes.
    pub fn pending_len(&self) -> usize {
        self.pending.read().len()
    }

    /// Flush buffered writes to the parent in key order.
    pub fn write(&self) -> Result<()> {
        let pending = std::mem::take(&mut *self.pending.write());
        for (key, value) in pending {
            match value {
                Some(value) => self.parent.set(&key, &value)?,
                None => self.parent.delete(&key)?,
            }
        }
        Ok(())
    }

    /// Drop buffered writes.
    pub fn discard(&self) {
        self.pending.write().clear();
    }
}

impl KvStore for CacheStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.pending.read().get(key) {
            return Ok(entry.clone());
        }
        self.parent.get(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.pending
            .write()
            .insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.pending.write().insert(key.to_vec(), None);
        Ok(())
    }

    fn range(&self, start: &[u8], end: Option<&[u8]>, limit: Option<usize>) -> Result<Vec<KvPair>> {
        if end.is_some_and(|end| end <= start) {
            return Ok(Vec::new());
        }
        let upper = match end {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };
        let pending = self.pending.read();
        let overlay: Vec<(&Vec<u8>, &Option<Vec<u8>>)> = pending
            .range::<[u8], _>((Bound::Included(start), upper))
            .collect();

        // Every pending delete can hide at most one parent entry.
        let deletes = overlay.iter().filter(|(_, v)| v.is_none()).count();
        let parent_limit = limit.map(|n| n.saturating_add(deletes));

        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = self
            .parent
            .range(start, end, parent_limit)?
            .into_iter()
            .collect();
        for (key, value) in overlay {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        let iter = merged.into_iter();
        Ok(match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn parent_with(entries: &[(&[u8], &[u8])]) -> Arc<dyn KvStore> {
        let store = MemoryStore::default();
        for (k, v) in entries {
            store.set(k, v).unwrap();
        }
        Arc::new(store)
    }

    #[test]
    fn writes_stay_buffered_until_flushed() {
        let parent = parent_with(&[(b"a", b"1")]);
        let cache = CacheStore::new(parent.clone());

        cache.set(b"b", b"2").unwrap();
        cache.delete(b"a").unwrap();

        assert_eq!(cache.get(b"a").unwrap(), None);
        assert_eq!(cache.get(b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(parent.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(parent.get(b"b").unwrap(), None);

        cache.write().unwrap();
        assert_eq!(parent.get(b"a").unwrap(), None);
        assert_eq!(parent.get(b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(cache.pending_len(), 0);
    }

    #[test]
    fn discard_leaves_parent_untouched() {
        let parent = parent_with(&[(b"a", b"1")]);
        let cache = CacheStore::new(parent.clone());
        cache.set(b"a", b"changed").unwrap();
        cache.discard();
        assert_eq!(cache.get(b"a").unwrap(), Some(b"1".to_vec()));
        cache.write().unwrap();
        assert_eq!(parent.get(b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn limited_range_accounts_for_pending_deletes() {
        let parent = parent_with(&[(b"k1", b"1"), (b"k2", b"2"), (b"k3", b"3"), (b"k4", b"4")]);
        let cache = CacheStore::new(parent);
        cache.delete(b"k1").unwrap();
        cache.delete(b"k2").unwrap();
        cache.set(b"k0", b"0").unwrap();

        let got = cache.range(b"k", None, Some(2)).unwrap();
        assert_eq!(
            got,
            vec![(b"k0".to_vec(), b"0".to_vec()), (b"k3".to_vec(), b"3".to_vec())]
        );
    }

    #[test]
    fn nested_caches_flush_one_level_at_a_time() {
        let parent = parent_with(&[]);
        let outer = Arc::new(CacheStore::new(parent.clone()));
        let inner = CacheStore::new(outer.clone());

        inner.set(b"x", b"1").unwrap();
        inner.write().unwrap();
        assert_eq!(outer.get(b"x").unwrap(), Some(b"1".to_vec()));
        assert_eq!(parent.get(b"x").unwrap(), None);

        outer.write().unwrap();
        assert_eq!(parent.get(b"x").unwrap(), Some(b"1".to_vec()));
    }
}
