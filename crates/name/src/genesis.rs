use crate::errors::{NameError, Result};
use crate::keeper::NameKeeper;
use crate::normalize::normalize;
use crate::types::{GenesisState, NameRecord};
use idreg_storage::Context;
use tracing::info;

impl NameKeeper {
    /// Load params and bindings. Emits no events.
    pub fn init_genesis(&self, ctx: &Context, state: &GenesisState) -> Result<()> {
        state.validate()?;
        self.set_params(ctx, &state.params)?;

        let store = self.store(ctx);
        for binding in &state.bindings {
            let name = normalize(&state.params, &binding.name)?;
            if self.get_record(&store, &name)?.is_some() {
                return Err(NameError::AlreadyBound { name });
            }
            self.write_record(&store, &NameRecord::new(name, binding.address, binding.restricted))?;
        }
        info!(bindings = state.bindings.len(), "initialized name genesis");
        Ok(())
    }

    pub fn export_genesis(&self, ctx: &Context) -> Result<GenesisState> {
        let mut bindings = Vec::new();
        self.iterate_records(ctx, |record| {
            bindings.push(record);
            Ok(())
        })?;
        bindings.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(GenesisState {
            params: self.params(ctx)?,
            bindings,
        })
    }
}
