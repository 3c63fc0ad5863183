use crate::errors::Result;
use crate::events::EventAttributeExpiredDelete;
use crate::keeper::AttributeKeeper;
use crate::keys::{expiration_prefix, split_expiration_key, EXPIRATION_KEY_PREFIX};
use idreg_storage::{prefix_end_bytes, Context, KvStore};
use tracing::{debug, info, warn};

/// Index entries examined by one end-of-block sweep.
pub const DEFAULT_EXPIRED_DELETE_LIMIT: usize = 100_000;

impl AttributeKeeper {
    /// Remove up to `limit` attributes whose expiration is at or before the
    /// current block time. Returns the number of records removed; anything
    /// left over is picked up by the next sweep.
    pub fn delete_expired_attributes(&self, ctx: &Context, limit: usize) -> Result<usize> {
        let store = self.store(ctx);
        let now = ctx.block_time();
        let end = prefix_end_bytes(&expiration_prefix(&now));
        let entries = store.range(&[EXPIRATION_KEY_PREFIX], end.as_deref(), Some(limit))?;

        let mut deleted = 0;
        for (index_key, _) in entries {
            let Some((at, attr_key)) = split_expiration_key(&index_key) else {
                warn!(key = %hex::encode(&index_key), "dropping malformed expiration entry");
                store.delete(&index_key)?;
                continue;
            };
            let attr = match self.read_attribute(&store, &attr_key)? {
                Some(attr) if attr.expiration == Some(at) => attr,
                _ => {
                    warn!(key = %hex::encode(&attr_key), "dropping stale expiration entry");
                    store.delete(&index_key)?;
                    continue;
                }
            };

            self.remove_attribute(&store, &attr_key, &attr)?;
            deleted += 1;
            debug!(name = %attr.name, account = %attr.address, "attribute expired");
            ctx.emit(&EventAttributeExpiredDelete {
                name: attr.name,
                value: attr.value,
                attribute_type: attr.attribute_type,
                account: attr.address,
                expiration: attr.expiration,
            })?;
        }

        if deleted > 0 {
            info!(
                "Deleted {} expired attributes at height {}",
                deleted,
                ctx.block_height()
            );
        }
        Ok(deleted)
    }
}
