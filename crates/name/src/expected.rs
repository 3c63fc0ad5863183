use idreg_storage::Context;
use idreg_types::Address;

/// Account registry consulted before a name is bound or an attribute written.
pub trait AccountKeeper: Send + Sync {
    fn account_exists(&self, ctx: &Context, address: &Address) -> anyhow::Result<bool>;
}
