use crate::errors::Result;
use crate::keeper::AttributeKeeper;
use crate::types::{Attribute, GenesisState};
use idreg_storage::Context;
use tracing::info;

impl AttributeKeeper {
    /// Store an attribute without the ownership checks of `set_attribute`.
    /// Used when loading state that was already validated on another chain.
    pub fn import_attribute(&self, ctx: &Context, mut attr: Attribute) -> Result<()> {
        attr.validate_basic()?;
        let params = self.params(ctx)?;
        self.check_value_length(&params, &attr.value)?;
        attr.name = self.names().normalize(ctx, &attr.name)?;
        self.write_attribute(&self.store(ctx), &attr)?;
        Ok(())
    }

    /// Load params and attributes. Emits no events.
    pub fn init_genesis(&self, ctx: &Context, state: &GenesisState) -> Result<()> {
        state.validate()?;
        self.set_params(ctx, &state.params)?;
        for attr in &state.attributes {
            self.import_attribute(ctx, attr.clone())?;
        }
        info!(attributes = state.attributes.len(), "initialized attribute genesis");
        Ok(())
    }

    pub fn export_genesis(&self, ctx: &Context) -> Result<GenesisState> {
        let mut attributes = Vec::new();
        self.iterate_attributes(ctx, |attr| {
            attributes.push(attr);
            Ok(())
        })?;
        Ok(GenesisState {
            params: self.params(ctx)?,
            attributes,
        })
    }
}
