//! Attribute store keeper
//!
//! Writes are gated by the name registry: the caller must own the name an
//! attribute is stored under. Reads and deletes of orphaned attributes (the
//! name was unbound afterwards) skip that check.

use crate::account_data::ACCOUNT_DATA_NAME;
use crate::errors::{AttributeError, Result};
use crate::events::{
    EventAttributeAdd, EventAttributeDelete, EventAttributeDistinctDelete,
    EventAttributeExpirationUpdate, EventAttributeParamsUpdated, EventAttributeUpdate,
};
use crate::expected::{AccountKeeper, NameResolver};
use crate::index::{add_indexes, decode_attribute, encode_attribute, remove_indexes};
use crate::keys::{
    account_name_prefix, account_prefix, attribute_key, name_address_prefix, value_hash,
    PARAMS_KEY,
};
use crate::types::{Attribute, Params};
use crate::STORE_KEY;
use chrono::{DateTime, Utc};
use idreg_storage::{Context, KvStore, PrefixStore, DEFAULT_MAX_SCAN_ENTRIES};
use idreg_types::{Address, ADDRESS_BYTES};
use std::sync::Arc;
use tracing::{debug, info};

pub struct AttributeKeeper {
    authority: Address,
    names: Arc<dyn NameResolver>,
    accounts: Arc<dyn AccountKeeper>,
    max_scan_entries: usize,
}

impl AttributeKeeper {
    pub fn new(
        authority: Address,
        names: Arc<dyn NameResolver>,
        accounts: Arc<dyn AccountKeeper>,
    ) -> Self {
        Self {
            authority,
            names,
            accounts,
            max_scan_entries: DEFAULT_MAX_SCAN_ENTRIES,
        }
    }

    pub fn with_max_scan_entries(mut self, max: usize) -> Self {
        self.max_scan_entries = max;
        self
    }

    pub fn authority(&self) -> &Address {
        &self.authority
    }

    pub(crate) fn max_scan_entries(&self) -> usize {
        self.max_scan_entries
    }

    pub(crate) fn store(&self, ctx: &Context) -> PrefixStore {
        ctx.kv_store(&STORE_KEY)
    }

    pub(crate) fn names(&self) -> &dyn NameResolver {
        self.names.as_ref()
    }

    // ---------------------------------------------------------------------
    // Params
    // ---------------------------------------------------------------------

    pub fn params(&self, ctx: &Context) -> Result<Params> {
        match self.store(ctx).get(PARAMS_KEY)? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(Params::default()),
        }
    }

    pub fn set_params(&self, ctx: &Context, params: &Params) -> Result<()> {
        params.validate()?;
        self.store(ctx).set(PARAMS_KEY, &bincode::serialize(params)?)?;
        Ok(())
    }

    pub fn update_params(&self, ctx: &Context, signer: &Address, params: Params) -> Result<()> {
        if *signer != self.authority {
            return Err(AttributeError::NotAuthority {
                expected: self.authority,
                signer: *signer,
            });
        }
        self.set_params(ctx, &params)?;
        info!(?params, "updated attribute params");
        ctx.emit(&EventAttributeParamsUpdated { params })?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Checks
    // ---------------------------------------------------------------------

    pub(crate) fn check_value_length(&self, params: &Params, value: &[u8]) -> Result<()> {
        if value.len() > params.max_value_length as usize {
            return Err(AttributeError::ValueTooLong {
                length: value.len(),
                max: params.max_value_length,
            });
        }
        Ok(())
    }

    fn check_expiration(&self, ctx: &Context, expiration: Option<DateTime<Utc>>) -> Result<()> {
        match expiration {
            Some(exp) if exp < ctx.block_time() => Err(AttributeError::ExpirationInPast {
                expiration: exp.to_rfc3339(),
                block_time: ctx.block_time().to_rfc3339(),
            }),
            _ => Ok(()),
        }
    }

    fn check_not_reserved(&self, name: &str) -> Result<()> {
        if name == ACCOUNT_DATA_NAME {
            return Err(AttributeError::ReservedName {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_account(&self, ctx: &Context, owner: &Address) -> Result<()> {
        if !self.accounts.account_exists(ctx, owner)? {
            return Err(AttributeError::AccountNotFound { address: *owner });
        }
        Ok(())
    }

    fn ensure_owns(&self, ctx: &Context, name: &str, owner: &Address) -> Result<()> {
        if !self.names.resolves_to(ctx, name, owner) {
            return Err(AttributeError::Unauthorized {
                name: name.to_string(),
                owner: *owner,
            });
        }
        Ok(())
    }

    /// Owner check for deletes: a name that is no longer bound has no owner
    /// to check against.
    fn ensure_owns_if_bound(&self, ctx: &Context, name: &str, owner: &Address) -> Result<()> {
        if !self.names.resolves_to(ctx, name, owner) && self.names.name_exists(ctx, name)? {
            return Err(AttributeError::Unauthorized {
                name: name.to_string(),
                owner: *owner,
            });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Raw record access
    // ---------------------------------------------------------------------

    pub(crate) fn read_attribute(&self, store: &PrefixStore, key: &[u8]) -> Result<Option<Attribute>> {
        match store.get(key)? {
            Some(bytes) => Ok(Some(decode_attribute(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Store `attr` and keep its indexes in step. Returns true when the key
    /// was not present before.
    pub(crate) fn write_attribute(&self, store: &PrefixStore, attr: &Attribute) -> Result<bool> {
        let key = attribute_key(attr);
        let previous = self.read_attribute(store, &key)?;
        if let Some(prev) = &previous {
            remove_indexes(store, &key, prev)?;
        }
        store.set(&key, &encode_attribute(attr)?)?;
        add_indexes(store, &key, attr)?;
        Ok(previous.is_none())
    }

    pub(crate) fn remove_attribute(&self, store: &PrefixStore, key: &[u8], attr: &Attribute) -> Result<()> {
        store.delete(key)?;
        remove_indexes(store, key, attr)?;
        Ok(())
    }

    /// Every entry under `prefix`, or `ScanLimitExceeded` when more than
    /// `max_scan_entries` match.
    fn bounded_scan(&self, store: &PrefixStore, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let limit = self.max_scan_entries;
        let entries = store.prefix_scan(prefix, Some(limit.saturating_add(1)))?;
        if entries.len() > limit {
            return Err(AttributeError::ScanLimitExceeded { limit });
        }
        Ok(entries)
    }

    fn scan_prefix(&self, store: &PrefixStore, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Attribute)>> {
        self.bounded_scan(store, prefix)?
            .into_iter()
            .map(|(key, bytes)| Ok((key, decode_attribute(&bytes)?)))
            .collect()
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Store an attribute on `attr.address`. `owner` must own `attr.name`.
    /// Setting an identical record again leaves a single record.
    pub fn set_attribute(&self, ctx: &Context, mut attr: Attribute, owner: &Address) -> Result<()> {
        attr.validate_basic()?;
        let params = self.params(ctx)?;
        self.check_value_length(&params, &attr.value)?;
        self.check_expiration(ctx, attr.expiration)?;

        attr.name = self.names.normalize(ctx, &attr.name)?;
        self.check_not_reserved(&attr.name)?;
        self.ensure_account(ctx, owner)?;
        self.ensure_owns(ctx, &attr.name, owner)?;

        let inserted = self.write_attribute(&self.store(ctx), &attr)?;
        debug!(name = %attr.name, account = %attr.address, inserted, "set attribute");
        ctx.emit(&EventAttributeAdd {
            name: attr.name,
            value: attr.value,
            attribute_type: attr.attribute_type,
            account: attr.address,
            owner: *owner,
            expiration: attr.expiration,
        })?;
        Ok(())
    }

    /// Replace the record exactly matching `original` (name, value and type)
    /// with `update`. Names and accounts of both must agree.
    pub fn update_attribute(
        &self,
        ctx: &Context,
        original: &Attribute,
        mut update: Attribute,
        owner: &Address,
    ) -> Result<()> {
        original.validate_basic()?;
        update.validate_basic()?;
        let params = self.params(ctx)?;
        self.check_value_length(&params, &update.value)?;
        self.check_expiration(ctx, update.expiration)?;

        let update_name = self.names.normalize(ctx, &update.name)?;
        let original_name = self.names.normalize(ctx, &original.name)?;
        if update_name != original_name {
            return Err(AttributeError::NameMismatch {
                original: original_name,
                update: update_name,
            });
        }
        if update.address != original.address {
            return Err(AttributeError::AddressMismatch {
                original: original.address,
                update: update.address,
            });
        }
        update.name = update_name;
        self.check_not_reserved(&update.name)?;
        self.ensure_account(ctx, owner)?;
        self.ensure_owns(ctx, &update.name, owner)?;

        let store = self.store(ctx);
        let mut key = account_name_prefix(&original.address, &original_name);
        key.extend_from_slice(&value_hash(&original.value));
        let stored = match self.read_attribute(&store, &key)? {
            Some(stored)
                if stored.name == original_name
                    && stored.value == original.value
                    && stored.attribute_type == original.attribute_type =>
            {
                stored
            }
            _ => {
                return Err(AttributeError::NotFound(format!(
                    "no attribute updated with name {:?} value {:?} type {}",
                    original_name,
                    String::from_utf8_lossy(&original.value),
                    original.attribute_type
                )))
            }
        };

        self.remove_attribute(&store, &key, &stored)?;
        self.write_attribute(&store, &update)?;
        debug!(name = %update.name, account = %update.address, "updated attribute");
        ctx.emit(&EventAttributeUpdate {
            name: update.name,
            original_value: stored.value,
            original_type: stored.attribute_type,
            update_value: update.value,
            update_type: update.attribute_type,
            account: update.address,
            owner: *owner,
        })?;
        Ok(())
    }

    /// Change only the expiration of the record `(account, name, value)`.
    pub fn update_attribute_expiration(
        &self,
        ctx: &Context,
        name: &str,
        value: &[u8],
        expiration: Option<DateTime<Utc>>,
        account: &Address,
        owner: &Address,
    ) -> Result<()> {
        self.check_expiration(ctx, expiration)?;
        let name = self.names.normalize(ctx, name)?;
        self.check_not_reserved(&name)?;
        self.ensure_account(ctx, owner)?;
        self.ensure_owns(ctx, &name, owner)?;

        let store = self.store(ctx);
        let mut key = account_name_prefix(account, &name);
        key.extend_from_slice(&value_hash(value));
        let mut attr = match self.read_attribute(&store, &key)? {
            Some(attr) if attr.name == name && attr.value == value => attr,
            _ => {
                return Err(AttributeError::NotFound(format!(
                    "no attribute with name {:?} value {:?} on {}",
                    name,
                    String::from_utf8_lossy(value),
                    account
                )))
            }
        };

        let original_expiration = attr.expiration;
        attr.expiration = expiration;
        self.write_attribute(&store, &attr)?;
        debug!(name = %attr.name, account = %attr.address, "updated attribute expiration");
        ctx.emit(&EventAttributeExpirationUpdate {
            name: attr.name,
            value: attr.value,
            account: attr.address,
            owner: *owner,
            original_expiration,
            updated_expiration: expiration,
        })?;
        Ok(())
    }

    /// Delete every `name` record on `account`, or only the ones whose value
    /// equals `value` when given.
    pub fn delete_attribute(
        &self,
        ctx: &Context,
        account: &Address,
        name: &str,
        value: Option<&[u8]>,
        owner: &Address,
    ) -> Result<usize> {
        self.ensure_account(ctx, owner)?;
        let name = self.names.normalize(ctx, name)?;
        self.check_not_reserved(&name)?;
        self.ensure_owns_if_bound(ctx, &name, owner)?;

        let store = self.store(ctx);
        let mut deleted = 0;
        for (key, attr) in self.scan_prefix(&store, &account_name_prefix(account, &name))? {
            if attr.name != name || value.is_some_and(|v| v != attr.value.as_slice()) {
                continue;
            }
            self.remove_attribute(&store, &key, &attr)?;
            deleted += 1;
            match value {
                Some(v) => ctx.emit(&EventAttributeDistinctDelete {
                    name: name.clone(),
                    value: v.to_vec(),
                    account: *account,
                    owner: *owner,
                })?,
                None => ctx.emit(&EventAttributeDelete {
                    name: name.clone(),
                    account: *account,
                    owner: *owner,
                })?,
            }
        }

        if deleted == 0 {
            return Err(AttributeError::NotFound(match value {
                Some(v) => format!(
                    "no keys deleted with name {:?} and value {:?}",
                    name,
                    String::from_utf8_lossy(v)
                ),
                None => format!("no keys deleted with name {name:?}"),
            }));
        }
        debug!(name = %name, account = %account, deleted, "deleted attributes");
        Ok(deleted)
    }

    /// Delete `name` from every account holding it.
    pub fn purge_attribute(&self, ctx: &Context, name: &str, owner: &Address) -> Result<usize> {
        self.ensure_account(ctx, owner)?;
        let name = self.names.normalize(ctx, name)?;
        self.check_not_reserved(&name)?;
        self.ensure_owns_if_bound(ctx, &name, owner)?;

        let store = self.store(ctx);
        let mut purged = 0;
        for account in self.accounts_by_attribute(ctx, &name)? {
            for (key, attr) in self.scan_prefix(&store, &account_name_prefix(&account, &name))? {
                if attr.name != name {
                    continue;
                }
                self.remove_attribute(&store, &key, &attr)?;
                purged += 1;
                ctx.emit(&EventAttributeDelete {
                    name: name.clone(),
                    account,
                    owner: *owner,
                })?;
            }
        }
        info!(name = %name, purged, "purged attribute");
        Ok(purged)
    }

    // ---------------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------------

    /// Every value of `name` on `account`, expired ones included.
    pub fn get_attributes(&self, ctx: &Context, account: &Address, name: &str) -> Result<Vec<Attribute>> {
        let name = self.names.normalize(ctx, name)?;
        let store = self.store(ctx);
        Ok(self
            .scan_prefix(&store, &account_name_prefix(account, &name))?
            .into_iter()
            .map(|(_, attr)| attr)
            .filter(|attr| attr.name == name)
            .collect())
    }

    pub fn get_all_attributes(&self, ctx: &Context, account: &Address) -> Result<Vec<Attribute>> {
        let store = self.store(ctx);
        Ok(self
            .scan_prefix(&store, &account_prefix(account))?
            .into_iter()
            .map(|(_, attr)| attr)
            .collect())
    }

    /// Accounts holding at least one `name` record.
    pub fn accounts_by_attribute(&self, ctx: &Context, name: &str) -> Result<Vec<Address>> {
        let name = self.names.normalize(ctx, name)?;
        let prefix = name_address_prefix(&name);
        self.bounded_scan(&self.store(ctx), &prefix)?
            .into_iter()
            .map(|(key, _)| {
                let raw = &key[prefix.len()..];
                if raw.len() != ADDRESS_BYTES {
                    return Err(AttributeError::Storage(anyhow::anyhow!(
                        "malformed name/address key of {} bytes",
                        key.len()
                    )));
                }
                Address::from_slice(raw).map_err(|e| AttributeError::Storage(e.into()))
            })
            .collect()
    }

    /// Visit every stored attribute in key order.
    pub fn iterate_attributes<F>(&self, ctx: &Context, mut handle: F) -> Result<()>
    where
        F: FnMut(Attribute) -> Result<()>,
    {
        let store = self.store(ctx);
        for (_, bytes) in store.prefix_scan(&[crate::keys::ATTRIBUTE_KEY_PREFIX], None)? {
            handle(decode_attribute(&bytes)?)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::name_address_count;
    use crate::types::AttributeType;
    use idreg_name::NameKeeper;
    use idreg_storage::MemoryStore;
    use idreg_types::{BlockHeader, ClassifyError, ErrorKind};

    struct AllAccounts;

    impl AccountKeeper for AllAccounts {
        fn account_exists(&self, _: &Context, address: &Address) -> anyhow::Result<bool> {
            Ok(!address.is_empty())
        }
    }

    fn addr(b: u8) -> Address {
        Address([b; 32])
    }

    fn setup() -> (AttributeKeeper, Context) {
        let accounts: Arc<dyn AccountKeeper> = Arc::new(AllAccounts);
        let names = Arc::new(NameKeeper::new(addr(0xaa), accounts.clone()));
        let ctx = Context::new(Arc::new(MemoryStore::new()), BlockHeader::at_unix(1, 1_000));
        names.set_name_record(&ctx, "attr.pb", &addr(1), true).unwrap();
        (AttributeKeeper::new(addr(0xaa), names, accounts), ctx)
    }

    #[test]
    fn repeated_set_keeps_one_record() {
        let (keeper, ctx) = setup();
        let attr = Attribute::new("attr.pb", addr(2), AttributeType::String, "v", None);
        keeper.set_attribute(&ctx, attr.clone(), &addr(1)).unwrap();
        keeper.set_attribute(&ctx, attr.clone(), &addr(1)).unwrap();

        assert_eq!(keeper.get_attributes(&ctx, &addr(2), "attr.pb").unwrap(), vec![attr]);
        let store = keeper.store(&ctx);
        assert_eq!(name_address_count(&store, "attr.pb", &addr(2)).unwrap(), 1);
        assert_eq!(keeper.accounts_by_attribute(&ctx, "attr.pb").unwrap(), vec![addr(2)]);
    }

    #[test]
    fn set_checks_owner_and_value() {
        let (keeper, ctx) = setup();
        let attr = Attribute::new("attr.pb", addr(2), AttributeType::Int, "12", None);
        let err = keeper.set_attribute(&ctx, attr, &addr(3)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);

        let bad = Attribute::new("attr.pb", addr(2), AttributeType::Int, "1.5", None);
        let err = keeper.set_attribute(&ctx, bad, &addr(1)).unwrap_err();
        assert!(matches!(err, AttributeError::InvalidValue { .. }));

        let long = Attribute::new("attr.pb", addr(2), AttributeType::Bytes, vec![0u8; 1_001], None);
        let err = keeper.set_attribute(&ctx, long, &addr(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceLimit);
        assert!(ctx.events().is_empty());
    }

    #[test]
    fn expiration_must_not_precede_block_time() {
        let (keeper, ctx) = setup();
        let past = BlockHeader::at_unix(0, 999).time;
        let attr = Attribute::new("attr.pb", addr(2), AttributeType::String, "v", Some(past));
        let err = keeper.set_attribute(&ctx, attr, &addr(1)).unwrap_err();
        assert!(matches!(err, AttributeError::ExpirationInPast { .. }));

        let now = ctx.block_time();
        let attr = Attribute::new("attr.pb", addr(2), AttributeType::String, "v", Some(now));
        keeper.set_attribute(&ctx, attr, &addr(1)).unwrap();
    }

    #[test]
    fn reserved_name_is_rejected() {
        let (keeper, ctx) = setup();
        let attr = Attribute::new(ACCOUNT_DATA_NAME, addr(2), AttributeType::String, "v", None);
        let err = keeper.set_attribute(&ctx, attr, &addr(1)).unwrap_err();
        assert!(matches!(err, AttributeError::ReservedName { .. }));
    }

    #[test]
    fn params_need_authority() {
        let (keeper, ctx) = setup();
        let params = Params { max_value_length: 10 };
        let err = keeper.update_params(&ctx, &addr(1), params.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);

        keeper.update_params(&ctx, &addr(0xaa), params.clone()).unwrap();
        assert_eq!(keeper.params(&ctx).unwrap(), params);
        let err = keeper.update_params(&ctx, &addr(0xaa), Params { max_value_length: 0 }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn expiration_update_moves_index_entry() {
        let (keeper, ctx) = setup();
        let attr = Attribute::new("attr.pb", addr(2), AttributeType::String, "v", None);
        keeper.set_attribute(&ctx, attr, &addr(1)).unwrap();

        let later = BlockHeader::at_unix(0, 5_000).time;
        keeper
            .update_attribute_expiration(&ctx, "attr.pb", b"v", Some(later), &addr(2), &addr(1))
            .unwrap();
        let stored = keeper.get_attributes(&ctx, &addr(2), "attr.pb").unwrap();
        assert_eq!(stored[0].expiration, Some(later));

        let store = keeper.store(&ctx);
        let index = store.prefix_scan(&[crate::keys::EXPIRATION_KEY_PREFIX], None).unwrap();
        assert_eq!(index.len(), 1);

        let err = keeper
            .update_attribute_expiration(&ctx, "attr.pb", b"other", None, &addr(2), &addr(1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn scans_past_the_entry_cap_fail_without_writes() {
        let (keeper, ctx) = setup();
        let keeper = keeper.with_max_scan_entries(2);
        for value in ["a", "b", "c"] {
            let attr = Attribute::new("attr.pb", addr(2), AttributeType::String, value, None);
            keeper.set_attribute(&ctx, attr, &addr(1)).unwrap();
        }
        let before = ctx.events().len();

        let err = keeper.get_attributes(&ctx, &addr(2), "attr.pb").unwrap_err();
        assert!(matches!(err, AttributeError::ScanLimitExceeded { limit: 2 }));
        assert_eq!(err.kind(), ErrorKind::ResourceLimit);
        let err = keeper.get_all_attributes(&ctx, &addr(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceLimit);
        let err = keeper.delete_attribute(&ctx, &addr(2), "attr.pb", None, &addr(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceLimit);
        assert_eq!(ctx.events().len(), before);

        let store = keeper.store(&ctx);
        assert_eq!(name_address_count(&store, "attr.pb", &addr(2)).unwrap(), 3);
        let keeper = keeper.with_max_scan_entries(3);
        assert_eq!(keeper.get_attributes(&ctx, &addr(2), "attr.pb").unwrap().len(), 3);
        assert_eq!(keeper.delete_attribute(&ctx, &addr(2), "attr.pb", None, &addr(1)).unwrap(), 3);
    }

    #[test]
    fn accounts_past_the_entry_cap_fail() {
        let (keeper, ctx) = setup();
        let keeper = keeper.with_max_scan_entries(2);
        for account in 2..5 {
            let attr = Attribute::new("attr.pb", addr(account), AttributeType::String, "v", None);
            keeper.set_attribute(&ctx, attr, &addr(1)).unwrap();
        }

        let err = keeper.accounts_by_attribute(&ctx, "attr.pb").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceLimit);
        let err = keeper.purge_attribute(&ctx, "attr.pb", &addr(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceLimit);
        assert_eq!(keeper.get_attributes(&ctx, &addr(3), "attr.pb").unwrap().len(), 1);
    }
}
