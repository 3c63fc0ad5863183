use crate::{CacheStore, KvStore, PrefixStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use idreg_types::{BlockHeader, Event, Height, TypedEvent};
use parking_lot::Mutex;
use std::sync::Arc;

/// Name of a module's key space inside the shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreKey(&'static str);

impl StoreKey {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }

    fn prefix(&self) -> Vec<u8> {
        let mut prefix = self.0.as_bytes().to_vec();
        prefix.push(b'/');
        prefix
    }
}

/// Ordered, append-only event buffer.
#[derive(Debug, Default)]
pub struct EventManager {
    events: Mutex<Vec<Event>>,
}

impl EventManager {
    pub fn emit(&self, event: Event) {
        self.events.lock().push(event);
    }

    pub fn emit_typed<E: TypedEvent>(&self, event: &E) -> Result<()> {
        self.emit(Event::from_typed(event)?);
        Ok(())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    fn take(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    fn extend(&self, events: Vec<Event>) {
        self.events.lock().extend(events);
    }
}

/// Execution context handed to every keeper operation.
///
/// Carries the block header, a write-buffered view of state and the events
/// emitted so far. Writes only reach the parent store through
/// [`Context::run_atomic`] or [`Context::commit`].
pub struct Context {
    store: Arc<CacheStore>,
    header: BlockHeader,
    events: EventManager,
}

impl Context {
    pub fn new(parent: Arc<dyn KvStore>, header: BlockHeader) -> Self {
        Self {
            store: Arc::new(CacheStore::new(parent)),
            header,
            events: EventManager::default(),
        }
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn block_time(&self) -> DateTime<Utc> {
        self.header.time
    }

    pub fn block_height(&self) -> Height {
        self.header.height
    }

    /// Key space of one module.
    pub fn kv_store(&self, key: &StoreKey) -> PrefixStore {
        let parent: Arc<dyn KvStore> = self.store.clone();
        PrefixStore::new(parent, key.prefix())
    }

    pub fn emit<E: TypedEvent>(&self, event: &E) -> Result<()> {
        self.events.emit_typed(event)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.events()
    }

    pub fn event_manager(&self) -> &EventManager {
        &self.events
    }

    /// Child context whose writes and events stay private until committed.
    pub fn branch(&self) -> Context {
        let parent: Arc<dyn KvStore> = self.store.clone();
        Context::new(parent, self.header)
    }

    /// Run `f` on a branch. On `Ok` the branch's writes and events are merged
    /// into `self`; on `Err` they are dropped.
    pub fn run_atomic<T, E, F>(&self, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Context) -> std::result::Result<T, E>,
        E: From<anyhow::Error>,
    {
        let branch = self.branch();
        let out = f(&branch)?;
        branch.store.write().map_err(E::from)?;
        self.events.extend(branch.events.take());
        Ok(out)
    }

    /// Flush all buffered writes to the parent store and hand back the
    /// events collected in this context.
    pub fn commit(self) -> Result<Vec<Event>> {
        self.store.write()?;
        Ok(self.events.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use serde::{Deserialize, Serialize};

    const ONE: StoreKey = StoreKey::new("one");
    const TWO: StoreKey = StoreKey::new("two");

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Touched {
        key: String,
    }

    impl TypedEvent for Touched {
        const TYPE_NAME: &'static str = "idreg.test.v1.EventTouched";
    }

    fn root() -> Arc<dyn KvStore> {
        Arc::new(MemoryStore::default())
    }

    #[test]
    fn module_stores_are_isolated() {
        let ctx = Context::new(root(), BlockHeader::default());
        ctx.kv_store(&ONE).set(b"k", b"1").unwrap();
        assert_eq!(ctx.kv_store(&TWO).get(b"k").unwrap(), None);
        assert_eq!(ctx.kv_store(&ONE).get(b"k").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn failed_atomic_run_leaves_nothing_behind() {
        let parent = root();
        let ctx = Context::new(parent.clone(), BlockHeader::at_unix(3, 100));

        let res: std::result::Result<(), anyhow::Error> = ctx.run_atomic(|branch| {
            branch.kv_store(&ONE).set(b"k", b"1")?;
            branch.emit(&Touched { key: "k".into() })?;
            anyhow::bail!("rejected")
        });
        assert!(res.is_err());
        assert_eq!(ctx.kv_store(&ONE).get(b"k").unwrap(), None);
        assert!(ctx.events().is_empty());

        ctx.run_atomic(|branch| -> Result<()> {
            branch.kv_store(&ONE).set(b"k", b"2")?;
            branch.emit(&Touched { key: "k".into() })
        })
        .unwrap();
        assert_eq!(ctx.kv_store(&ONE).get(b"k").unwrap(), Some(b"2".to_vec()));
        assert_eq!(ctx.events().len(), 1);
        assert_eq!(parent.get(b"one/k").unwrap(), None);

        let events = ctx.commit().unwrap();
        assert_eq!(events[0].decode::<Touched>(), Some(Touched { key: "k".into() }));
        assert_eq!(parent.get(b"one/k").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn branch_sees_parent_writes() {
        let ctx = Context::new(root(), BlockHeader::default());
        ctx.kv_store(&ONE).set(b"a", b"1").unwrap();
        let branch = ctx.branch();
        assert_eq!(branch.kv_store(&ONE).get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(branch.block_height(), 0);
    }
}
