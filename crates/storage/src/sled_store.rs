use crate::{KvPair, KvStore};
use anyhow::Result;
use sled::{Db, Tree};
use std::path::Path;

const STATE_TREE: &str = "state";

/// Sled-backed implementation
pub struct SledStore {
    db: Db,
    state: Tree,
}

impl SledStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        let state = db.open_tree(STATE_TREE)?;
        tracing::debug!(entries = state.len(), "opened sled state tree");
        Ok(Self { db, state })
    }

    /// Temporary database removed on drop, for tests and dry runs.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        let state = db.open_tree(STATE_TREE)?;
        Ok(Self { db, state })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

impl KvStore for SledStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.state.get(key)?.map(|v| v.to_vec()))
    }

    fn has(&self, key: &[u8]) -> Result<bool> {
        Ok(self.state.contains_key(key)?)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.state.insert(key, value)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.state.remove(key)?;
        Ok(())
    }

    fn range(&self, start: &[u8], end: Option<&[u8]>, limit: Option<usize>) -> Result<Vec<KvPair>> {
        if end.is_some_and(|end| end <= start) {
            return Ok(Vec::new());
        }
        let iter = match end {
            Some(end) => self.state.range(start.to_vec()..end.to_vec()),
            None => self.state.range(start.to_vec()..),
        };
        let mut out = Vec::new();
        for item in iter {
            if limit.is_some_and(|n| out.len() >= n) {
                break;
            }
            let (k, v) = item?;
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }
}
