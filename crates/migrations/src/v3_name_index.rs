//! Version 2 to 3: repair the address to name reverse index.
//!
//! Runs in two passes over the name key space. The first drops reverse
//! entries whose record is gone or now owned by another address; the second
//! adds entries missing for existing records. The cursor holds the pass
//! byte followed by the next key to visit.

use crate::engine::{Cursor, StepProgress};
use crate::errors::{MigrationError, Result};
use idreg_name::keys::{
    address_index_key, name_hash, name_record_key_from_hash, split_address_index_key,
    ADDRESS_KEY_PREFIX, NAME_KEY_PREFIX,
};
use idreg_name::{NameRecord, STORE_KEY};
use idreg_storage::{prefix_end_bytes, Context, KvStore, PrefixStore};
use tracing::{debug, warn};

pub const NAME: &str = "name-address-index-repair";

const PRUNE_PASS: u8 = 0;
const FILL_PASS: u8 = 1;

pub fn migrate(ctx: &Context, cursor: &Cursor, batch_limit: usize) -> Result<StepProgress> {
    let store = ctx.kv_store(&STORE_KEY);
    let (pass, start) = match cursor.load()? {
        Some(saved) => match saved.split_first() {
            Some((&pass, rest)) if pass == PRUNE_PASS || pass == FILL_PASS => (pass, rest.to_vec()),
            _ => return Err(MigrationError::corrupt(&saved, "unknown index repair cursor")),
        },
        None => (PRUNE_PASS, vec![ADDRESS_KEY_PREFIX]),
    };

    let prefix = if pass == PRUNE_PASS {
        ADDRESS_KEY_PREFIX
    } else {
        NAME_KEY_PREFIX
    };
    let end = prefix_end_bytes(&[prefix]);
    let batch = store.range(&start, end.as_deref(), Some(batch_limit))?;

    let mut repaired = 0;
    for (key, _) in &batch {
        let fixed = if pass == PRUNE_PASS {
            prune_entry(&store, key)?
        } else {
            fill_entry(&store, key)?
        };
        if fixed {
            repaired += 1;
        }
    }

    if let Some((last, _)) = batch.last().filter(|_| batch.len() == batch_limit) {
        let mut next = vec![pass];
        next.extend_from_slice(last);
        next.push(0);
        cursor.save(&next)?;
        return Ok(StepProgress::partial(repaired));
    }
    if pass == PRUNE_PASS {
        cursor.save(&[FILL_PASS, NAME_KEY_PREFIX])?;
        return Ok(StepProgress::partial(repaired));
    }
    Ok(StepProgress::done(repaired))
}

fn load_record(store: &PrefixStore, key: &[u8]) -> Result<Option<NameRecord>> {
    match store.get(key)? {
        Some(bytes) => Ok(Some(
            bincode::deserialize(&bytes).map_err(|e| MigrationError::corrupt(key, e))?,
        )),
        None => Ok(None),
    }
}

/// Drop one reverse entry if it no longer matches its record.
fn prune_entry(store: &PrefixStore, key: &[u8]) -> Result<bool> {
    let Some((address, hash)) = split_address_index_key(key) else {
        warn!(key = %hex::encode(key), "dropping malformed reverse index entry");
        store.delete(key)?;
        return Ok(true);
    };
    let keep = matches!(
        load_record(store, &name_record_key_from_hash(&hash))?,
        Some(record) if record.address == address
    );
    if !keep {
        debug!(address = %address, "dropping stale reverse index entry");
        store.delete(key)?;
    }
    Ok(!keep)
}

/// Add the reverse entry of one record if it is missing.
fn fill_entry(store: &PrefixStore, key: &[u8]) -> Result<bool> {
    let Some(record) = load_record(store, key)? else {
        return Ok(false);
    };
    let index_key = address_index_key(&record.address, &name_hash(&record.name));
    if store.has(&index_key)? {
        return Ok(false);
    }
    debug!(name = %record.name, address = %record.address, "restoring reverse index entry");
    store.set(&index_key, &[])?;
    Ok(true)
}
