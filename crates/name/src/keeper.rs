//! Name registry keeper
//!
//! Owns the name records and the address reverse index inside the `name`
//! key space of a [`Context`]. Every mutating operation validates fully
//! before it writes.

use crate::errors::{NameError, Result};
use crate::events::{EventNameBound, EventNameParamsUpdated, EventNameUnbound, EventNameUpdate};
use crate::expected::AccountKeeper;
use crate::keys::{
    address_index_key, address_index_prefix, name_hash, name_record_key_from_hash,
    NAME_KEY_PREFIX, PARAMS_KEY,
};
use crate::normalize::normalize;
use crate::types::{NameRecord, Params};
use crate::STORE_KEY;
use idreg_storage::{filtered_paginate, Context, KvStore, PrefixStore, DEFAULT_MAX_SCAN_ENTRIES};
use idreg_types::{Address, PageRequest, PageResponse};
use std::sync::Arc;
use tracing::{debug, info};

pub struct NameKeeper {
    /// Governance authority allowed to create roots, modify any name and
    /// change params.
    authority: Address,
    accounts: Arc<dyn AccountKeeper>,
    max_scan_entries: usize,
}

impl NameKeeper {
    pub fn new(authority: Address, accounts: Arc<dyn AccountKeeper>) -> Self {
        Self {
            authority,
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

    pub(crate) fn store(&self, ctx: &Context) -> PrefixStore {
        ctx.kv_store(&STORE_KEY)
    }

    fn ensure_authority(&self, signer: &Address) -> Result<()> {
        if *signer != self.authority {
            return Err(NameError::Unauthorized {
                reason: format!("expected authority {} got {}", self.authority, signer),
            });
        }
        Ok(())
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

    /// Governance parameter change.
    pub fn update_params(&self, ctx: &Context, signer: &Address, params: Params) -> Result<()> {
        self.ensure_authority(signer)?;
        self.set_params(ctx, &params)?;
        info!(?params, "updated name params");
        ctx.emit(&EventNameParamsUpdated { params })?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Lookups
    // ---------------------------------------------------------------------

    /// Normalize `name` with the current params.
    pub fn normalize(&self, ctx: &Context, name: &str) -> Result<String> {
        normalize(&self.params(ctx)?, name)
    }

    pub(crate) fn get_record(&self, store: &PrefixStore, normalized: &str) -> Result<Option<NameRecord>> {
        let key = name_record_key_from_hash(&name_hash(normalized));
        match store.get(&key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Record bound to `name`.
    pub fn resolve(&self, ctx: &Context, name: &str) -> Result<NameRecord> {
        let normalized = self.normalize(ctx, name)?;
        self.get_record(&self.store(ctx), &normalized)?
            .ok_or(NameError::NotFound { name: normalized })
    }

    /// True iff `name` is bound to `address`. Any failure reads as false.
    pub fn resolves_to(&self, ctx: &Context, name: &str, address: &Address) -> bool {
        matches!(self.resolve(ctx, name), Ok(record) if record.address == *address)
    }

    /// False for invalid names as well as unbound ones.
    pub fn name_exists(&self, ctx: &Context, name: &str) -> Result<bool> {
        let Ok(normalized) = self.normalize(ctx, name) else {
            return Ok(false);
        };
        let key = name_record_key_from_hash(&name_hash(&normalized));
        Ok(self.store(ctx).has(&key)?)
    }

    /// Names owned by `address`, paged over the reverse index.
    pub fn reverse_lookup(
        &self,
        ctx: &Context,
        address: &Address,
        page: &PageRequest,
    ) -> Result<(Vec<NameRecord>, PageResponse)> {
        let store = self.store(ctx);
        let prefix = address_index_prefix(address);
        let (records, resp) =
            filtered_paginate(&store, &prefix, page, self.max_scan_entries, |hash, _| {
                let key = [&[NAME_KEY_PREFIX][..], hash].concat();
                match store.get(&key)? {
                    Some(bytes) => {
                        let record: NameRecord = bincode::deserialize(&bytes)?;
                        Ok((record.address == *address).then_some(record))
                    }
                    None => Ok(None),
                }
            })?;
        Ok((records, resp))
    }

    /// Every name owned by `address`.
    pub fn records_by_address(&self, ctx: &Context, address: &Address) -> Result<Vec<NameRecord>> {
        let store = self.store(ctx);
        let prefix = address_index_prefix(address);
        let mut out = Vec::new();
        for (key, _) in store.prefix_scan(&prefix, None)? {
            let name_key = [&[NAME_KEY_PREFIX][..], &key[prefix.len()..]].concat();
            if let Some(bytes) = store.get(&name_key)? {
                let record: NameRecord = bincode::deserialize(&bytes)?;
                if record.address == *address {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }

    /// Visit every stored record in key order.
    pub fn iterate_records<F>(&self, ctx: &Context, mut handle: F) -> Result<()>
    where
        F: FnMut(NameRecord) -> Result<()>,
    {
        for (_, bytes) in self.store(ctx).prefix_scan(&[NAME_KEY_PREFIX], None)? {
            handle(bincode::deserialize(&bytes)?)?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    pub(crate) fn write_record(&self, store: &PrefixStore, record: &NameRecord) -> Result<()> {
        let hash = name_hash(&record.name);
        store.set(&name_record_key_from_hash(&hash), &bincode::serialize(record)?)?;
        store.set(&address_index_key(&record.address, &hash), &[])?;
        Ok(())
    }

    fn remove_record(&self, store: &PrefixStore, record: &NameRecord) -> Result<()> {
        let hash = name_hash(&record.name);
        store.delete(&name_record_key_from_hash(&hash))?;
        store.delete(&address_index_key(&record.address, &hash))?;
        Ok(())
    }

    /// Store a new binding without any parent checks. Returns the record as
    /// stored.
    fn add_record(
        &self,
        ctx: &Context,
        name: &str,
        address: &Address,
        restricted: bool,
    ) -> Result<NameRecord> {
        let normalized = self.normalize(ctx, name)?;
        if address.is_empty() {
            return Err(NameError::InvalidAddress(format!(
                "cannot bind {normalized:?} to an empty address"
            )));
        }
        let store = self.store(ctx);
        if self.get_record(&store, &normalized)?.is_some() {
            return Err(NameError::AlreadyBound { name: normalized });
        }
        let record = NameRecord::new(normalized, *address, restricted);
        self.write_record(&store, &record)?;
        Ok(record)
    }

    /// Bind `name` to `address` without checking the parent. Used for roots
    /// and genesis.
    pub fn set_name_record(
        &self,
        ctx: &Context,
        name: &str,
        address: &Address,
        restricted: bool,
    ) -> Result<()> {
        let record = self.add_record(ctx, name, address, restricted)?;
        debug!(name = %record.name, address = %record.address, restricted, "bound name");
        ctx.emit(&EventNameBound {
            address: record.address,
            name: record.name,
            restricted,
        })?;
        Ok(())
    }

    /// Bind `record.name` below `parent.name`.
    ///
    /// The parent must be bound. When it is restricted, or unrestricted
    /// names are disabled, `caller` must own it.
    pub fn bind_name(
        &self,
        ctx: &Context,
        record: &NameRecord,
        parent: &NameRecord,
        caller: &Address,
    ) -> Result<()> {
        let params = self.params(ctx)?;
        let store = self.store(ctx);

        let parent_name = normalize(&params, &parent.name)?;
        let stored_parent = self
            .get_record(&store, &parent_name)?
            .ok_or_else(|| NameError::NotFound {
                name: parent_name.clone(),
            })?;
        if (stored_parent.restricted || !params.allow_unrestricted_names)
            && stored_parent.address != *caller
        {
            return Err(NameError::Unauthorized {
                reason: format!("{caller} does not own {parent_name:?}"),
            });
        }

        if record.address.is_empty() {
            return Err(NameError::InvalidAddress(format!(
                "cannot bind {:?} to an empty address",
                record.name
            )));
        }
        if !self.accounts.account_exists(ctx, &record.address)? {
            return Err(NameError::AccountNotFound {
                address: record.address,
            });
        }

        let full = format!("{}.{}", record.name, parent_name);
        self.set_name_record(ctx, &full, &record.address, record.restricted)
    }

    /// Create `name` and every missing ancestor, rightmost first, owned by
    /// `owner`. Authority only.
    pub fn create_root_name(
        &self,
        ctx: &Context,
        signer: &Address,
        name: &str,
        owner: &Address,
        restricted: bool,
    ) -> Result<()> {
        self.ensure_authority(signer)?;
        let normalized = self.normalize(ctx, name)?;
        let store = self.store(ctx);
        if self.get_record(&store, &normalized)?.is_some() {
            return Err(NameError::AlreadyBound { name: normalized });
        }

        let segments: Vec<&str> = normalized.split('.').collect();
        for start in (0..segments.len()).rev() {
            let domain = segments[start..].join(".");
            if self.get_record(&store, &domain)?.is_some() {
                debug!(name = %domain, "domain already exists, skipping");
                continue;
            }
            self.set_name_record(ctx, &domain, owner, restricted)?;
            info!(name = %domain, owner = %owner, "created root domain");
        }
        Ok(())
    }

    /// Remove the binding of `name`. Children and attributes are untouched.
    pub fn delete_name(&self, ctx: &Context, name: &str, caller: &Address) -> Result<()> {
        let record = self.resolve(ctx, name)?;
        if record.address != *caller {
            return Err(NameError::Unauthorized {
                reason: format!("{caller} does not own {:?}", record.name),
            });
        }
        self.remove_record(&self.store(ctx), &record)?;
        debug!(name = %record.name, address = %record.address, "unbound name");
        ctx.emit(&EventNameUnbound {
            address: record.address,
            name: record.name,
            restricted: record.restricted,
        })?;
        Ok(())
    }

    /// Rebind an existing name. `signer` must be the authority or the
    /// current owner.
    pub fn modify_name(
        &self,
        ctx: &Context,
        signer: &Address,
        name: &str,
        new_owner: &Address,
        restricted: bool,
    ) -> Result<()> {
        let existing = self.resolve(ctx, name)?;
        if *signer != self.authority && *signer != existing.address {
            return Err(NameError::Unauthorized {
                reason: format!(
                    "{signer} is neither the authority nor the owner of {:?}",
                    existing.name
                ),
            });
        }
        if new_owner.is_empty() {
            return Err(NameError::InvalidAddress(format!(
                "cannot move {:?} to an empty address",
                existing.name
            )));
        }

        let store = self.store(ctx);
        self.remove_record(&store, &existing)?;
        let updated = NameRecord::new(existing.name, *new_owner, restricted);
        self.write_record(&store, &updated)?;

        debug!(name = %updated.name, address = %updated.address, restricted, "modified name");
        ctx.emit(&EventNameUpdate {
            address: updated.address,
            name: updated.name,
            restricted,
        })?;
        Ok(())
    }
}
