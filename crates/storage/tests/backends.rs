//! Integration tests for the storage backends (sled and in-memory) and the
//! write-buffered context layered over them.

use std::sync::Arc;

use idreg_storage::{CacheStore, Context, KvStore, MemoryStore, SledStore, StoreKey};
use idreg_types::BlockHeader;
use proptest::prelude::*;
use tempfile::TempDir;

const MODULE: StoreKey = StoreKey::new("module");

fn fill(store: &dyn KvStore) {
    let entries: [(&[u8], &[u8]); 4] = [
        (b"a/1", b"x"),
        (b"a/2", b"y"),
        (b"a/3", b"z"),
        (b"b/1", b"w"),
    ];
    for (k, v) in entries {
        store.set(k, v).unwrap();
    }
}

#[test]
fn sled_and_memory_agree_on_ranges() {
    let dir = TempDir::new().unwrap();
    let sled = SledStore::new(dir.path()).unwrap();
    let memory = MemoryStore::new();
    fill(&sled);
    fill(&memory);

    let cases: [(&[u8], Option<&[u8]>, Option<usize>); 4] = [
        (b"", None, None),
        (b"a/", Some(&b"a0"[..]), None),
        (b"a/2", None, Some(2)),
        (b"b/", Some(&b"a/"[..]), None),
    ];
    for (start, end, limit) in cases {
        assert_eq!(
            sled.range(start, end, limit).unwrap(),
            memory.range(start, end, limit).unwrap()
        );
    }
    assert_eq!(sled.prefix_scan(b"a/", None).unwrap().len(), 3);
    assert_eq!(memory.prefix_scan(b"b/", None).unwrap().len(), 1);
}

#[test]
fn committed_context_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let sled: Arc<dyn KvStore> = Arc::new(SledStore::new(dir.path()).unwrap());
        let ctx = Context::new(sled.clone(), BlockHeader::at_unix(1, 10));
        ctx.kv_store(&MODULE).set(b"key", b"value").unwrap();
        ctx.kv_store(&MODULE).set(b"gone", b"soon").unwrap();
        ctx.kv_store(&MODULE).delete(b"gone").unwrap();
        ctx.commit().unwrap();
    }

    let reopened = SledStore::new(dir.path()).unwrap();
    assert_eq!(reopened.get(b"module/key").unwrap(), Some(b"value".to_vec()));
    assert!(!reopened.has(b"module/gone").unwrap());
}

#[test]
fn dropped_context_writes_nothing() {
    let store: Arc<dyn KvStore> = Arc::new(SledStore::temporary().unwrap());
    {
        let ctx = Context::new(store.clone(), BlockHeader::default());
        ctx.kv_store(&MODULE).set(b"key", b"value").unwrap();
    }
    assert!(store.prefix_scan(b"", None).unwrap().is_empty());
}

#[derive(Debug, Clone)]
enum Op {
    Set(Vec<u8>, Vec<u8>),
    Delete(Vec<u8>),
}

fn arbitrary_key() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..4, 1..4)
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (arbitrary_key(), prop::collection::vec(any::<u8>(), 0..4)).prop_map(|(k, v)| Op::Set(k, v)),
        arbitrary_key().prop_map(Op::Delete),
    ]
}

fn apply(store: &dyn KvStore, op: &Op) {
    match op {
        Op::Set(k, v) => store.set(k, v).unwrap(),
        Op::Delete(k) => store.delete(k).unwrap(),
    }
}

proptest! {
    #[test]
    fn cache_reads_match_direct_writes(
        base in prop::collection::vec(arbitrary_op(), 0..16),
        ops in prop::collection::vec(arbitrary_op(), 0..16),
        limit in prop::option::of(1usize..6),
    ) {
        let direct = MemoryStore::new();
        let parent = Arc::new(MemoryStore::new());
        for op in &base {
            apply(&direct, op);
            apply(parent.as_ref(), op);
        }
        let cache = CacheStore::new(parent.clone());
        for op in &ops {
            apply(&direct, op);
            apply(&cache, op);
        }

        prop_assert_eq!(cache.range(b"", None, limit).unwrap(), direct.range(b"", None, limit).unwrap());

        cache.write().unwrap();
        prop_assert_eq!(parent.range(b"", None, None).unwrap(), direct.range(b"", None, None).unwrap());
    }
}
