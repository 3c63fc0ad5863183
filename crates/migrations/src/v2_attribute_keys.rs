//! Version 1 to 2: re-key attributes stored with 20-byte addresses.
//!
//! Each legacy record is decoded, its address zero-padded, written under the
//! current key with its indexes, and the legacy key deleted. Legacy keys are
//! consumed as they are migrated, so the next batch simply starts from the
//! front of the legacy prefix again.

use crate::engine::{Cursor, StepProgress};
use crate::errors::{MigrationError, Result};
use crate::legacy::LegacyAttribute;
use idreg_attribute::index::{add_indexes, decode_attribute, encode_attribute, remove_indexes};
use idreg_attribute::keys::{attribute_key, LEGACY_ATTRIBUTE_KEY_PREFIX};
use idreg_attribute::STORE_KEY;
use idreg_storage::{Context, KvStore};
use tracing::debug;

pub const NAME: &str = "attribute-address-length";

pub fn migrate(ctx: &Context, _cursor: &Cursor, batch_limit: usize) -> Result<StepProgress> {
    let store = ctx.kv_store(&STORE_KEY);
    let batch = store.prefix_scan(&[LEGACY_ATTRIBUTE_KEY_PREFIX], Some(batch_limit))?;

    let mut migrated = 0;
    for (legacy_key, bytes) in &batch {
        let legacy: LegacyAttribute =
            bincode::deserialize(bytes).map_err(|e| MigrationError::corrupt(legacy_key, e))?;
        let attr = legacy.into_attribute();
        let key = attribute_key(&attr);

        if let Some(existing) = store.get(&key)? {
            let existing =
                decode_attribute(&existing).map_err(|e| MigrationError::corrupt(&key, e))?;
            remove_indexes(&store, &key, &existing)?;
        }
        store.set(&key, &encode_attribute(&attr)?)?;
        add_indexes(&store, &key, &attr)?;
        store.delete(legacy_key)?;
        migrated += 1;
        debug!(name = %attr.name, account = %attr.address, "re-keyed legacy attribute");
    }

    if batch.len() < batch_limit {
        Ok(StepProgress::done(migrated))
    } else {
        Ok(StepProgress::partial(migrated))
    }
}
