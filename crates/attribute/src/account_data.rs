//! Free-form account data kept as a single string attribute under a reserved
//! name that only the account itself can write.

use crate::errors::Result;
use crate::events::EventAccountDataUpdated;
use crate::index::decode_attribute;
use crate::keeper::AttributeKeeper;
use crate::keys::account_name_prefix;
use crate::types::{Attribute, AttributeType};
use idreg_storage::{Context, KvStore};
use idreg_types::Address;
use tracing::debug;

/// Reserved attribute name holding account data.
pub const ACCOUNT_DATA_NAME: &str = "accountdata";

impl AttributeKeeper {
    /// Stored account data, or an empty string.
    pub fn get_account_data(&self, ctx: &Context, account: &Address) -> Result<String> {
        let store = self.store(ctx);
        let prefix = account_name_prefix(account, ACCOUNT_DATA_NAME);
        match store.prefix_scan(&prefix, Some(1))?.into_iter().next() {
            Some((_, bytes)) => {
                let attr = decode_attribute(&bytes)?;
                Ok(String::from_utf8_lossy(&attr.value).into_owned())
            }
            None => Ok(String::new()),
        }
    }

    /// Replace the account data of `account`. A blank value clears it.
    pub fn set_account_data(&self, ctx: &Context, account: &Address, value: &str) -> Result<()> {
        let params = self.params(ctx)?;
        self.check_value_length(&params, value.as_bytes())?;

        let store = self.store(ctx);
        let prefix = account_name_prefix(account, ACCOUNT_DATA_NAME);
        for (key, bytes) in store.prefix_scan(&prefix, None)? {
            let existing = decode_attribute(&bytes)?;
            self.remove_attribute(&store, &key, &existing)?;
        }

        let value = value.trim();
        if !value.is_empty() {
            let attr = Attribute::new(ACCOUNT_DATA_NAME, *account, AttributeType::String, value, None);
            self.write_attribute(&store, &attr)?;
        }
        debug!(account = %account, cleared = value.is_empty(), "set account data");
        ctx.emit(&EventAccountDataUpdated { account: *account })?;
        Ok(())
    }
}
