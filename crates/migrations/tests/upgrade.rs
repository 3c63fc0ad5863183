//! Upgrading version 1 state to the current layout.

use std::sync::Arc;

use idreg_attribute::keys::LEGACY_ATTRIBUTE_KEY_PREFIX;
use idreg_attribute::{AccountKeeper, AttributeKeeper, AttributeType, STORE_KEY as ATTRIBUTE_STORE};
use idreg_migrations::{
    widen_address, write_legacy_attribute, EventMigrationApplied, LegacyAttribute,
    MigrationError, MigrationOutcome, MigrationPlan, LATEST_SCHEMA_VERSION,
    LEGACY_SCHEMA_VERSION,
};
use idreg_name::keys::{address_index_key, name_hash};
use idreg_name::{NameKeeper, STORE_KEY as NAME_STORE};
use idreg_storage::{Context, KvStore, MemoryStore, SledStore};
use idreg_types::{Address, BlockHeader};
use proptest::prelude::*;

struct AllAccounts;

impl AccountKeeper for AllAccounts {
    fn account_exists(&self, _ctx: &Context, address: &Address) -> anyhow::Result<bool> {
        Ok(!address.is_empty())
    }
}

fn keepers() -> (Arc<NameKeeper>, AttributeKeeper) {
    let accounts: Arc<dyn AccountKeeper> = Arc::new(AllAccounts);
    let names = Arc::new(NameKeeper::new(Address([0xaa; 32]), accounts.clone()));
    let attrs = AttributeKeeper::new(Address([0xaa; 32]), names.clone(), accounts);
    (names, attrs)
}

fn legacy(i: usize) -> LegacyAttribute {
    LegacyAttribute {
        name: format!("attr{}.legacy", i % 3),
        value: format!("value-{i}").into_bytes(),
        attribute_type: AttributeType::String,
        address: [(i % 4) as u8 + 1; 20],
    }
}

fn legacy_context(store: Arc<dyn KvStore>, records: &[LegacyAttribute]) -> Context {
    let ctx = Context::new(store, BlockHeader::at_unix(100, 1_700_000_000));
    MigrationPlan::set_version(&ctx, LEGACY_SCHEMA_VERSION).unwrap();
    let attribute_store = ctx.kv_store(&ATTRIBUTE_STORE);
    for record in records {
        write_legacy_attribute(&attribute_store, record).unwrap();
    }
    ctx
}

fn legacy_count(ctx: &Context) -> usize {
    ctx.kv_store(&ATTRIBUTE_STORE)
        .prefix_scan(&[LEGACY_ATTRIBUTE_KEY_PREFIX], None)
        .unwrap()
        .len()
}

#[test]
fn batches_resume_and_version_advances_once() {
    let records: Vec<_> = (0..5).map(legacy).collect();
    let ctx = legacy_context(Arc::new(MemoryStore::new()), &records);
    let plan = MigrationPlan::standard().unwrap();
    assert!(plan.is_pending(&ctx).unwrap());

    let mut outcomes = Vec::new();
    loop {
        match plan.run_pending(&ctx, 2).unwrap() {
            MigrationOutcome::UpToDate { version } => {
                assert_eq!(version, LATEST_SCHEMA_VERSION);
                break;
            }
            outcome => outcomes.push(outcome),
        }
    }

    let applied: Vec<_> = ctx
        .events()
        .iter()
        .filter_map(|e| e.decode::<EventMigrationApplied>())
        .map(|e| (e.from, e.to))
        .collect();
    assert_eq!(applied, vec![(1, 2), (2, 3)]);
    assert!(matches!(
        outcomes[0],
        MigrationOutcome::InProgress { version: 1, migrated: 2, .. }
    ));
    assert!(matches!(
        outcomes[2],
        MigrationOutcome::Applied { from: 1, to: 2, migrated: 1, .. }
    ));
    assert_eq!(legacy_count(&ctx), 0);
    assert!(!plan.is_pending(&ctx).unwrap());
}

#[test]
fn migrated_records_are_indexed() {
    let records: Vec<_> = (0..6).map(legacy).collect();
    let ctx = legacy_context(Arc::new(MemoryStore::new()), &records);
    MigrationPlan::standard().unwrap().run_all(&ctx, 100).unwrap();

    let (_, attrs) = keepers();
    let mut holders = attrs.accounts_by_attribute(&ctx, "attr0.legacy").unwrap();
    holders.sort();
    let mut expected: Vec<_> = records
        .iter()
        .filter(|r| r.name == "attr0.legacy")
        .map(|r| widen_address(&r.address))
        .collect();
    expected.sort();
    expected.dedup();
    assert_eq!(holders, expected);
}

#[test]
fn corrupt_legacy_record_aborts_the_batch() {
    let records: Vec<_> = (0..3).map(legacy).collect();
    let ctx = legacy_context(Arc::new(MemoryStore::new()), &records);
    let mut bad_key = vec![LEGACY_ATTRIBUTE_KEY_PREFIX];
    bad_key.extend_from_slice(&[0u8; 84]);
    ctx.kv_store(&ATTRIBUTE_STORE).set(&bad_key, b"\xff\xff").unwrap();

    let plan = MigrationPlan::standard().unwrap();
    let err = plan.run_pending(&ctx, 100).unwrap_err();
    assert!(matches!(err, MigrationError::Corrupt { .. }));
    assert_eq!(legacy_count(&ctx), 4);
    assert_eq!(MigrationPlan::stored_version(&ctx).unwrap(), Some(LEGACY_SCHEMA_VERSION));
}

#[test]
fn reverse_index_is_repaired() {
    let ctx = Context::new(Arc::new(MemoryStore::new()), BlockHeader::at_unix(1, 0));
    let (names, _) = keepers();
    let alice = Address([1; 32]);
    let bob = Address([2; 32]);
    names.set_name_record(&ctx, "alpha", &alice, false).unwrap();
    names.set_name_record(&ctx, "beta", &alice, false).unwrap();

    let store = ctx.kv_store(&NAME_STORE);
    store.delete(&address_index_key(&alice, &name_hash("beta"))).unwrap();
    store.set(&address_index_key(&bob, &name_hash("alpha")), &[]).unwrap();
    store.set(&address_index_key(&bob, &name_hash("gone")), &[]).unwrap();
    MigrationPlan::set_version(&ctx, 2).unwrap();

    let plan = MigrationPlan::standard().unwrap();
    assert_eq!(plan.run_all(&ctx, 1).unwrap(), LATEST_SCHEMA_VERSION);

    let mut owned: Vec<_> = names
        .records_by_address(&ctx, &alice)
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    owned.sort();
    assert_eq!(owned, vec!["alpha".to_string(), "beta".to_string()]);
    assert!(names.records_by_address(&ctx, &bob).unwrap().is_empty());
}

#[test]
fn upgrade_survives_reopening_sled() {
    let dir = tempfile::tempdir().unwrap();
    let records: Vec<_> = (0..4).map(legacy).collect();
    {
        let backend = Arc::new(SledStore::new(dir.path()).unwrap());
        let ctx = legacy_context(backend.clone(), &records);
        MigrationPlan::standard().unwrap().run_pending(&ctx, 100).unwrap();
        ctx.commit().unwrap();
        backend.flush().unwrap();
    }

    let store: Arc<dyn KvStore> = Arc::new(SledStore::new(dir.path()).unwrap());
    let ctx = Context::new(store, BlockHeader::at_unix(101, 1_700_000_005));
    assert_eq!(MigrationPlan::stored_version(&ctx).unwrap(), Some(2));
    assert_eq!(legacy_count(&ctx), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_legacy_record_is_carried_over(n in 0usize..40, batch in 1usize..10) {
        let records: Vec<_> = (0..n).map(legacy).collect();
        let ctx = legacy_context(Arc::new(MemoryStore::new()), &records);
        MigrationPlan::standard().unwrap().run_all(&ctx, batch).unwrap();

        prop_assert_eq!(legacy_count(&ctx), 0);
        let (_, attrs) = keepers();
        let mut migrated = Vec::new();
        attrs.iterate_attributes(&ctx, |attr| {
            migrated.push(attr);
            Ok(())
        }).unwrap();
        prop_assert_eq!(migrated.len(), n);

        for record in records {
            let expected = record.into_attribute();
            prop_assert!(migrated.contains(&expected));
        }
    }
}
