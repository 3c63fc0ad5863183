use idreg_name::{NameError, NameKeeper};
use idreg_storage::Context;
use idreg_types::Address;

pub use idreg_name::AccountKeeper;

/// What the attribute store needs from the name registry.
pub trait NameResolver: Send + Sync {
    fn normalize(&self, ctx: &Context, name: &str) -> Result<String, NameError>;

    fn resolves_to(&self, ctx: &Context, name: &str, address: &Address) -> bool;

    fn name_exists(&self, ctx: &Context, name: &str) -> Result<bool, NameError>;
}

impl NameResolver for NameKeeper {
    fn normalize(&self, ctx: &Context, name: &str) -> Result<String, NameError> {
        NameKeeper::normalize(self, ctx, name)
    }

    fn resolves_to(&self, ctx: &Context, name: &str, address: &Address) -> bool {
        NameKeeper::resolves_to(self, ctx, name, address)
    }

    fn name_exists(&self, ctx: &Context, name: &str) -> Result<bool, NameError> {
        NameKeeper::name_exists(self, ctx, name)
    }
}
