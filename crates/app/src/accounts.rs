//! Minimal account registry backing the account existence check used by
//! the name and attribute keepers.

use idreg_name::AccountKeeper;
use idreg_storage::{Context, KvStore, StoreKey};
use idreg_types::Address;
use tracing::debug;

pub const ACCOUNT_STORE_KEY: StoreKey = StoreKey::new("account");

const ACCOUNT_KEY_PREFIX: u8 = 0x01;

fn account_key(address: &Address) -> Vec<u8> {
    let mut key = vec![ACCOUNT_KEY_PREFIX];
    key.extend_from_slice(address.as_bytes());
    key
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AccountRegistry;

impl AccountRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Record `address` as existing. Registering twice is a no-op.
    pub fn register(&self, ctx: &Context, address: &Address) -> anyhow::Result<()> {
        if address.is_empty() {
            anyhow::bail!("cannot register the empty address");
        }
        let store = ctx.kv_store(&ACCOUNT_STORE_KEY);
        let key = account_key(address);
        if !store.has(&key)? {
            store.set(&key, &[])?;
            debug!(address = %address, "registered account");
        }
        Ok(())
    }

    /// Every registered account in key order.
    pub fn accounts(&self, ctx: &Context) -> anyhow::Result<Vec<Address>> {
        ctx.kv_store(&ACCOUNT_STORE_KEY)
            .prefix_scan(&[ACCOUNT_KEY_PREFIX], None)?
            .into_iter()
            .map(|(key, _)| Ok(Address::from_slice(&key[1..])?))
            .collect()
    }
}

impl AccountKeeper for AccountRegistry {
    fn account_exists(&self, ctx: &Context, address: &Address) -> anyhow::Result<bool> {
        ctx.kv_store(&ACCOUNT_STORE_KEY).has(&account_key(address))
    }
}
