//! Read-only, paginated views over the attribute store.
//!
//! Query results leave out attributes that have expired relative to the
//! current block time, even before the sweep has removed them.

use crate::errors::{AttributeError, Result};
use crate::index::decode_attribute;
use crate::keeper::AttributeKeeper;
use crate::keys::{account_name_prefix, account_prefix, name_address_prefix};
use crate::types::{Attribute, Params};
use idreg_storage::{filtered_paginate, Context};
use idreg_types::{Address, PageRequest, PageResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributesResponse {
    pub account: Address,
    pub attributes: Vec<Attribute>,
    pub pagination: PageResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountsResponse {
    pub accounts: Vec<Address>,
    pub pagination: PageResponse,
}

impl AttributeKeeper {
    fn page_attributes<P>(
        &self,
        ctx: &Context,
        prefix: &[u8],
        page: &PageRequest,
        mut keep: P,
    ) -> Result<(Vec<Attribute>, PageResponse)>
    where
        P: FnMut(&Attribute) -> bool,
    {
        let store = self.store(ctx);
        let (attributes, pagination) =
            filtered_paginate(&store, prefix, page, self.max_scan_entries(), |_, bytes| {
                let attr = decode_attribute(bytes)?;
                Ok(keep(&attr).then_some(attr))
            })?;
        Ok((attributes, pagination))
    }

    /// Attributes of `account` whose name ends with `suffix`, expired ones
    /// included. Walks every attribute of the account.
    pub fn scan(
        &self,
        ctx: &Context,
        account: &Address,
        suffix: &str,
        page: &PageRequest,
    ) -> Result<(Vec<Attribute>, PageResponse)> {
        self.page_attributes(ctx, &account_prefix(account), page, |attr| {
            attr.name.ends_with(suffix)
        })
    }

    /// Live values of `name` on `account`.
    pub fn query_attribute(
        &self,
        ctx: &Context,
        account: &Address,
        name: &str,
        page: &PageRequest,
    ) -> Result<AttributesResponse> {
        let name = self.names().normalize(ctx, name)?;
        let now = ctx.block_time();
        let (attributes, pagination) =
            self.page_attributes(ctx, &account_name_prefix(account, &name), page, |attr| {
                attr.name == name && !attr.is_expired(&now)
            })?;
        Ok(AttributesResponse {
            account: *account,
            attributes,
            pagination,
        })
    }

    /// Every live attribute on `account`.
    pub fn query_attributes(
        &self,
        ctx: &Context,
        account: &Address,
        page: &PageRequest,
    ) -> Result<AttributesResponse> {
        let now = ctx.block_time();
        let (attributes, pagination) =
            self.page_attributes(ctx, &account_prefix(account), page, |attr| {
                !attr.is_expired(&now)
            })?;
        Ok(AttributesResponse {
            account: *account,
            attributes,
            pagination,
        })
    }

    pub fn query_scan(
        &self,
        ctx: &Context,
        account: &Address,
        suffix: &str,
        page: &PageRequest,
    ) -> Result<AttributesResponse> {
        let suffix = suffix.trim();
        if suffix.is_empty() {
            return Err(AttributeError::InvalidAttribute {
                reason: "scan suffix cannot be empty".into(),
            });
        }
        let now = ctx.block_time();
        let (attributes, pagination) =
            self.page_attributes(ctx, &account_prefix(account), page, |attr| {
                attr.name.ends_with(suffix) && !attr.is_expired(&now)
            })?;
        Ok(AttributesResponse {
            account: *account,
            attributes,
            pagination,
        })
    }

    /// Accounts holding at least one `name` record. Backed by the record
    /// counter, so an account whose only value has expired but not yet been
    /// swept is still listed.
    pub fn query_attribute_accounts(
        &self,
        ctx: &Context,
        name: &str,
        page: &PageRequest,
    ) -> Result<AccountsResponse> {
        let name = self.names().normalize(ctx, name)?;
        let store = self.store(ctx);
        let (accounts, pagination) = filtered_paginate(
            &store,
            &name_address_prefix(&name),
            page,
            self.max_scan_entries(),
            |key, _| Ok(Address::from_slice(key).ok()),
        )?;
        Ok(AccountsResponse {
            accounts,
            pagination,
        })
    }

    pub fn query_account_data(&self, ctx: &Context, account: &Address) -> Result<String> {
        self.get_account_data(ctx, account)
    }

    pub fn query_params(&self, ctx: &Context) -> Result<Params> {
        self.params(ctx)
    }
}
